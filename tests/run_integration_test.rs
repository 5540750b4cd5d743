//! 运行集成测试：脚本化生成器 + 内存存储驱动完整的运行

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use hive::core::{continue_while, RunSupervisor, RuntimeError, SkillError};
use hive::events::{ChannelListener, Event, EventEmitter};
use hive::llm::{Generation, ScriptedLlm};
use hive::model::{
    Checkpoint, CheckpointStatus, Expert, InteractiveToolCallResult, InteractiveToolDef,
    MessagePart, RunInput, RunSetting, Skill, Usage,
};
use hive::skills::SkillOptions;
use hive::storage::InMemoryCheckpointStore;
use hive::{run, RunOptions, RunParams};

struct Harness {
    llm: Arc<ScriptedLlm>,
    store: Arc<InMemoryCheckpointStore>,
    emitter: EventEmitter,
    events: UnboundedReceiver<Event>,
    workspace: tempfile::TempDir,
}

impl Harness {
    fn new(llm: ScriptedLlm) -> Self {
        let (listener, events) = ChannelListener::channel();
        Self {
            llm: Arc::new(llm),
            store: Arc::new(InMemoryCheckpointStore::new()),
            emitter: EventEmitter::new().with_listener(listener),
            events,
            workspace: tempfile::tempdir().unwrap(),
        }
    }

    fn params(&self, setting: RunSetting, checkpoint: Option<Checkpoint>) -> RunParams {
        RunParams {
            setting,
            checkpoint,
            llm: self.llm.clone(),
            store: self.store.clone(),
            emitter: self.emitter.clone(),
            policy: Arc::new(RunSupervisor::new()),
            options: RunOptions {
                skills: SkillOptions {
                    workspace_root: self.workspace.path().to_path_buf(),
                    request_timeout: Duration::from_secs(5),
                },
                tool_timeout: Duration::from_secs(5),
                max_concurrent_tools: 4,
            },
        }
    }

    fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// 已发出的事件类型（按发出顺序）
    fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn names(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}

fn setting_for(expert_key: &str, experts: Vec<Expert>, query: &str) -> RunSetting {
    let experts: HashMap<String, Expert> = experts.into_iter().map(|e| (e.key.clone(), e)).collect();
    RunSetting::new("job-1", expert_key, experts, "test-model", RunInput::text(query))
}

fn complete() -> Generation {
    Generation::default().with_tool_call("attemptCompletion", json!({}))
}

/// 所有工具结果片段（tool_call_id, tool_name, 内容）
fn tool_results(checkpoint: &Checkpoint) -> Vec<(String, String, Vec<MessagePart>)> {
    checkpoint
        .messages
        .iter()
        .flat_map(|m| m.contents.iter())
        .filter_map(|p| match p {
            MessagePart::ToolResultPart {
                tool_call_id,
                tool_name,
                contents,
            } => Some((tool_call_id.clone(), tool_name.clone(), contents.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_run_completes_after_attempt_completion() {
    let llm = ScriptedLlm::new()
        .then(complete())
        .then(Generation::text("the answer"));
    let mut harness = Harness::new(llm);
    let setting = setting_for("writer", vec![Expert::new("writer", "Writer", "Answer.")], "question");

    let finished = run(harness.params(setting, None)).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
    assert_eq!(finished.last_message_text().as_deref(), Some("the answer"));

    let events = harness.drain();
    let names = names(&events);
    let connected = names.iter().position(|n| *n == "skillConnected").unwrap();
    let started = names.iter().position(|n| *n == "startRun").unwrap();
    assert!(connected < started, "non-lazy skill must connect before startRun: {:?}", names);
    assert_eq!(names.first(), Some(&"initializeRuntime"));

    let run_events: Vec<&str> = events
        .iter()
        .filter_map(|e| e.as_run())
        .map(|e| e.kind.name())
        .collect();
    assert_eq!(
        run_events,
        vec!["startRun", "callTools", "attemptCompletion", "completeRun"]
    );
    assert_eq!(names.last(), Some(&"skillDisconnected"));

    // 生成器在第一步拿到了 base 技能的工具
    let requests = harness.llm.requests();
    assert!(requests[0].tools.iter().any(|t| t.name == "attemptCompletion"));
    assert!(requests[1].tools.is_empty());
}

#[tokio::test]
async fn test_max_steps_stops_run() {
    let think = || Generation::default().with_tool_call("think", json!({"thought": "hmm"}));
    let llm = ScriptedLlm::new().then(think()).then(think()).then(think());
    let harness = Harness::new(llm);
    let mut setting = setting_for("writer", vec![Expert::new("writer", "Writer", "w")], "go");
    setting.max_steps = Some(3);

    let finished = run(harness.params(setting, None)).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::StoppedByExceededMaxSteps);
    assert_eq!(finished.step_number, 3);
    assert_eq!(harness.llm.remaining(), 0);

    let steps: Vec<u32> = harness
        .store
        .checkpoints("job-1")
        .iter()
        .filter(|c| !c.status.is_terminal())
        .map(|c| c.step_number)
        .collect();
    assert_eq!(steps, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_delegation_round_trip() {
    let usage = Usage::new(10, 1);
    let llm = ScriptedLlm::new()
        .then(
            Generation::default()
                .with_tool_call("researcher", json!({"query": "find facts"}))
                .with_usage(usage),
        )
        .then(complete().with_usage(usage))
        .then(Generation::text("the facts").with_usage(usage))
        .then(complete().with_usage(usage))
        .then(Generation::text("final report").with_usage(usage));
    let mut harness = Harness::new(llm);
    let lead = Expert::new("lead", "Lead", "Lead the work.").with_delegate("researcher");
    let researcher = Expert::new("researcher", "Researcher", "Research.");
    let setting = setting_for("lead", vec![lead, researcher], "write a report");

    let finished = run(harness.params(setting, None)).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
    assert_eq!(finished.expert.key, "lead");
    assert!(finished.delegated_by.is_none());
    assert_eq!(finished.last_message_text().as_deref(), Some("final report"));
    assert_eq!(finished.usage.total_tokens, 55);

    let delegated = tool_results(&finished)
        .into_iter()
        .find(|(_, tool, _)| tool == "researcher")
        .unwrap();
    assert_eq!(delegated.2, vec![MessagePart::text("the facts")]);

    // 子运行接收的是委派的 query
    let child_request = &harness.llm.requests()[1];
    let user_text: Vec<String> = child_request
        .messages
        .iter()
        .filter_map(|m| m.text_content())
        .collect();
    assert!(user_text.iter().any(|t| t == "find facts"));

    let names = names(&harness.drain());
    assert!(names.contains(&"stopRunByDelegate"));
    assert!(names.contains(&"resumeToolCalls"));
    assert!(!names.contains(&"delegationWarning"));
}

#[tokio::test]
async fn test_interactive_stop_and_resume() {
    let mut tools = BTreeMap::new();
    tools.insert(
        "askUser".to_string(),
        InteractiveToolDef {
            description: "Ask the user".to_string(),
            input_schema: json!({"type": "object"}),
        },
    );
    let expert = Expert::new("writer", "Writer", "w").with_skill(
        "human",
        Skill::InteractiveSkill { tools, rule: None },
    );
    let llm = ScriptedLlm::new().then(
        Generation::default().with_tool_call("askUser", json!({"question": "favourite colour?"})),
    );
    let harness = Harness::new(llm);
    let setting = setting_for("writer", vec![expert], "pick a colour");

    let stopped = run(harness.params(setting.clone(), None)).await.unwrap();
    assert_eq!(stopped.status, CheckpointStatus::StoppedByInteractiveTool);
    let pending = stopped.pending_tool_calls.clone().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].skill_name, "human");

    harness.llm.push(Ok(complete()));
    harness.llm.push(Ok(Generation::text("blue it is")));
    let mut resumed_setting = setting;
    resumed_setting.run_id = stopped.run_id.clone();
    resumed_setting.input = RunInput::tool_result(InteractiveToolCallResult {
        tool_call_id: pending[0].id.clone(),
        tool_name: pending[0].tool_name.clone(),
        skill_name: pending[0].skill_name.clone(),
        text: "blue".to_string(),
    });

    let finished = run(harness.params(resumed_setting, Some(stopped))).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
    assert_eq!(finished.last_message_text().as_deref(), Some("blue it is"));
    let answer = tool_results(&finished)
        .into_iter()
        .find(|(id, _, _)| *id == pending[0].id)
        .unwrap();
    assert_eq!(answer.2, vec![MessagePart::text("blue")]);
}

#[tokio::test]
async fn test_skill_init_failure_aborts_before_start() {
    let expert = Expert::new("writer", "Writer", "w").with_skill(
        "broken",
        Skill::McpStdioSkill {
            command: "/nonexistent/hive-test-mcp-server".to_string(),
            args: vec![],
            package_name: None,
            required_env: vec![],
            pick: vec![],
            omit: vec![],
            lazy_init: false,
            rule: None,
        },
    );
    let mut harness = Harness::new(ScriptedLlm::new().then(complete()));
    let setting = setting_for("writer", vec![expert], "go");

    let err = run(harness.params(setting, None)).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Skill(SkillError::SpawnFailed { .. })));

    let names = names(&harness.drain());
    assert!(!names.contains(&"startRun"));
    assert_eq!(harness.llm.requests().len(), 0);
}

#[tokio::test]
async fn test_lazy_skill_does_not_block_run() {
    let expert = Expert::new("writer", "Writer", "w").with_skill(
        "slow",
        Skill::McpStdioSkill {
            command: "/nonexistent/hive-test-mcp-server".to_string(),
            args: vec![],
            package_name: None,
            required_env: vec![],
            pick: vec![],
            omit: vec![],
            lazy_init: true,
            rule: None,
        },
    );
    let harness = Harness::new(ScriptedLlm::new().then(complete()).then(Generation::text("ok")));
    let setting = setting_for("writer", vec![expert], "go");

    let finished = run(harness.params(setting, None)).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
}

#[tokio::test]
async fn test_parallel_results_correlate_by_id() {
    let batch = Generation::default()
        .with_tool_call("think", json!({"thought": "a"}))
        .with_tool_call("listDirectory", json!({"path": "."}))
        .with_tool_call("think", json!({"thought": "c"}))
        .with_tool_call("noSuchTool", json!({}));
    let call_ids: Vec<String> = batch.tool_calls.iter().map(|c| c.id.clone()).collect();
    let llm = ScriptedLlm::new()
        .then(batch)
        .then(complete())
        .then(Generation::text("done"));
    let harness = Harness::new(llm);
    std::fs::write(harness.workspace().join("notes.txt"), "x").unwrap();
    let setting = setting_for("writer", vec![Expert::new("writer", "Writer", "w")], "go");

    let finished = run(harness.params(setting, None)).await.unwrap();
    let results = tool_results(&finished);
    let first_step: Vec<String> = results.iter().take(4).map(|(id, _, _)| id.clone()).collect();
    assert_eq!(first_step, call_ids);
    let listing = results[1].2[0].as_text().unwrap();
    assert!(listing.contains("notes.txt"));
    assert!(results[3].2[0].as_text().unwrap().starts_with("Error:"));
}

#[tokio::test]
async fn test_open_todos_block_completion() {
    let llm = ScriptedLlm::new()
        .then(Generation::default().with_tool_call("todo", json!({"newTodos": ["write intro"]})))
        .then(complete())
        .then(Generation::default().with_tool_call("todo", json!({"completedTodos": [0]})))
        .then(complete())
        .then(Generation::text("all done"));
    let mut harness = Harness::new(llm);
    let setting = setting_for("writer", vec![Expert::new("writer", "Writer", "w")], "go");

    let finished = run(harness.params(setting, None)).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
    assert_eq!(finished.last_message_text().as_deref(), Some("all done"));

    let events = harness.drain();
    let run_events: Vec<(u32, &str)> = events
        .iter()
        .filter_map(|e| e.as_run())
        .map(|e| (e.step_number, e.kind.name()))
        .collect();
    assert!(run_events.contains(&(2, "resolveToolResults")));
    assert!(!run_events.contains(&(2, "attemptCompletion")));
    assert_eq!(
        run_events.iter().filter(|(_, n)| *n == "attemptCompletion").count(),
        1
    );
}

#[tokio::test]
async fn test_image_is_inlined_into_conversation() {
    let llm = ScriptedLlm::new()
        .then(Generation::default().with_tool_call("readImageFile", json!({"path": "pixel.png"})))
        .then(complete())
        .then(Generation::text("a tiny image"));
    let mut harness = Harness::new(llm);
    std::fs::write(harness.workspace().join("pixel.png"), [1u8, 2, 3]).unwrap();
    let setting = setting_for("writer", vec![Expert::new("writer", "Writer", "w")], "describe");

    let finished = run(harness.params(setting, None)).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
    let inline = tool_results(&finished)
        .into_iter()
        .flat_map(|(_, _, contents)| contents)
        .find(|p| matches!(p, MessagePart::ImageInlinePart { .. }))
        .unwrap();
    assert_eq!(
        inline,
        MessagePart::ImageInlinePart {
            encoded_data: "AQID".to_string(),
            mime_type: "image/png".to_string(),
        }
    );
    assert!(names(&harness.drain()).contains(&"resolveImageFile"));
}

#[tokio::test]
async fn test_continue_policy_stops_early() {
    let harness = Harness::new(ScriptedLlm::new().then(complete()));
    let setting = setting_for("writer", vec![Expert::new("writer", "Writer", "w")], "go");
    let mut params = harness.params(setting, None);
    params.policy = Arc::new(continue_while(|_, _, _| false));

    let checkpoint = run(params).await.unwrap();
    assert_eq!(checkpoint.status, CheckpointStatus::Proceeding);
    assert_eq!(harness.llm.requests().len(), 0);
}

#[tokio::test]
async fn test_delegate_without_answer_warns_parent() {
    let llm = ScriptedLlm::new()
        .then(Generation::default().with_tool_call("researcher", json!({"query": "find facts"})))
        .then(complete())
        .then(Generation::default())
        .then(complete())
        .then(Generation::text("report without facts"));
    let mut harness = Harness::new(llm);
    let lead = Expert::new("lead", "Lead", "Lead the work.").with_delegate("researcher");
    let researcher = Expert::new("researcher", "Researcher", "Research.");
    let setting = setting_for("lead", vec![lead, researcher], "write a report");

    let finished = run(harness.params(setting, None)).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
    assert_eq!(finished.expert.key, "lead");

    let delegated = tool_results(&finished)
        .into_iter()
        .find(|(_, tool, _)| tool == "researcher")
        .unwrap();
    assert!(delegated
        .2
        .iter()
        .all(|part| part.as_text().map_or(true, |t| t.is_empty())));

    let names = names(&harness.drain());
    assert_eq!(names.iter().filter(|n| **n == "delegationWarning").count(), 1);
}

#[tokio::test]
async fn test_nested_delegation_unwinds_to_root() {
    let llm = ScriptedLlm::new()
        .then(Generation::default().with_tool_call("b", json!({"query": "ask c"})))
        .then(Generation::default().with_tool_call("c", json!({"query": "leaf work"})))
        .then(complete())
        .then(Generation::text("from c"))
        .then(complete())
        .then(Generation::text("from b"))
        .then(complete())
        .then(Generation::text("from a"));
    let harness = Harness::new(llm);
    let a = Expert::new("a", "A", "Root.").with_delegate("b");
    let b = Expert::new("b", "B", "Middle.").with_delegate("c");
    let c = Expert::new("c", "C", "Leaf.");
    let setting = setting_for("a", vec![a, b, c], "start");

    let finished = run(harness.params(setting, None)).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
    assert_eq!(finished.expert.key, "a");
    assert!(finished.delegated_by.is_none());
    assert_eq!(finished.last_message_text().as_deref(), Some("from a"));
    assert_eq!(harness.llm.remaining(), 0);

    let from_b = tool_results(&finished)
        .into_iter()
        .find(|(_, tool, _)| tool == "b")
        .unwrap();
    assert_eq!(from_b.2, vec![MessagePart::text("from b")]);

    let stored = harness.store.checkpoints("job-1");
    assert!(!stored.is_empty());
    for checkpoint in &stored {
        assert!(
            checkpoint.delegated_by.is_none() || checkpoint.delegate_to.is_none(),
            "checkpoint {} of {} carries both delegation links",
            checkpoint.id,
            checkpoint.expert.key
        );
    }
    // b 回到运行时仍记得自己是被 a 委派的
    assert!(stored.iter().any(|cp| cp.expert.key == "b"
        && cp.delegate_to.is_none()
        && cp
            .delegated_by
            .as_ref()
            .map_or(false, |by| by.expert.key == "a")
        && cp.last_message_text().as_deref() == Some("from b")));
}

#[tokio::test]
async fn test_todos_survive_interactive_resume() {
    let mut tools = BTreeMap::new();
    tools.insert(
        "askUser".to_string(),
        InteractiveToolDef {
            description: "Ask the user".to_string(),
            input_schema: json!({"type": "object"}),
        },
    );
    let expert = Expert::new("writer", "Writer", "w").with_skill(
        "human",
        Skill::InteractiveSkill { tools, rule: None },
    );
    let llm = ScriptedLlm::new().then(
        Generation::default()
            .with_tool_call("todo", json!({"newTodos": ["confirm colour"]}))
            .with_tool_call("askUser", json!({"question": "favourite colour?"})),
    );
    let mut harness = Harness::new(llm);
    let setting = setting_for("writer", vec![expert], "pick a colour");

    let stopped = run(harness.params(setting.clone(), None)).await.unwrap();
    assert_eq!(stopped.status, CheckpointStatus::StoppedByInteractiveTool);
    assert_eq!(stopped.todos.len(), 1);
    assert!(!stopped.todos[0].completed);
    let pending = stopped.pending_tool_calls.clone().unwrap();
    harness.drain();

    harness.llm.push(Ok(complete()));
    harness
        .llm
        .push(Ok(Generation::default().with_tool_call("todo", json!({"completedTodos": [0]}))));
    harness.llm.push(Ok(complete()));
    harness.llm.push(Ok(Generation::text("blue it is")));
    let mut resumed_setting = setting;
    resumed_setting.run_id = stopped.run_id.clone();
    resumed_setting.input = RunInput::tool_result(InteractiveToolCallResult {
        tool_call_id: pending[0].id.clone(),
        tool_name: pending[0].tool_name.clone(),
        skill_name: pending[0].skill_name.clone(),
        text: "blue".to_string(),
    });

    let finished = run(harness.params(resumed_setting, Some(stopped))).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
    assert_eq!(finished.last_message_text().as_deref(), Some("blue it is"));
    assert!(finished.todos.iter().all(|t| t.completed));

    let events = harness.drain();
    let run_events: Vec<&str> = events
        .iter()
        .filter_map(|e| e.as_run())
        .map(|e| e.kind.name())
        .collect();
    assert_eq!(run_events.iter().filter(|n| **n == "attemptCompletion").count(), 1);
    let first_completion_outcome = run_events
        .iter()
        .skip_while(|n| **n != "callTools")
        .nth(1)
        .copied();
    assert_eq!(first_completion_outcome, Some("resolveToolResults"));
}

#[tokio::test]
async fn test_todos_survive_delegation_round_trip() {
    let llm = ScriptedLlm::new()
        .then(
            Generation::default()
                .with_tool_call("todo", json!({"newTodos": ["merge findings"]}))
                .with_tool_call("researcher", json!({"query": "find facts"})),
        )
        .then(complete())
        .then(Generation::text("the facts"))
        .then(complete())
        .then(Generation::default().with_tool_call("todo", json!({"completedTodos": [0]})))
        .then(complete())
        .then(Generation::text("final report"));
    let mut harness = Harness::new(llm);
    let lead = Expert::new("lead", "Lead", "Lead the work.").with_delegate("researcher");
    let researcher = Expert::new("researcher", "Researcher", "Research.");
    let setting = setting_for("lead", vec![lead, researcher], "write a report");

    let finished = run(harness.params(setting, None)).await.unwrap();
    assert_eq!(finished.status, CheckpointStatus::Completed);
    assert_eq!(finished.expert.key, "lead");
    assert_eq!(finished.last_message_text().as_deref(), Some("final report"));
    assert_eq!(finished.todos.len(), 1);
    assert!(finished.todos[0].completed);

    // 子运行有自己的空清单，可以直接完成
    let stored = harness.store.checkpoints("job-1");
    assert!(stored
        .iter()
        .filter(|cp| cp.expert.key == "researcher")
        .all(|cp| cp.todos.is_empty()));

    let events = harness.drain();
    let lead_completions: Vec<&str> = events
        .iter()
        .filter_map(|e| e.as_run())
        .filter(|e| e.expert_key == "lead")
        .map(|e| e.kind.name())
        .filter(|n| *n == "attemptCompletion")
        .collect();
    assert_eq!(lead_completions.len(), 1);
}
