//! 运行事件与运行时事件
//!
//! RunEvent：状态机每次转移产生一个（携带 expertKey / stepNumber）；
//! RuntimeEvent：技能进程生命周期、委派警告等与步骤无关的事件。
//! 事件一经发出不再修改。

use serde::{Deserialize, Serialize};

use crate::model::{
    new_id, now_millis, Checkpoint, DelegationTarget, Message, ToolCall, ToolResult, Usage,
};

/// 状态机事件负载（序列化为 `type` 字段 + 负载字段）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEventKind {
    #[serde(rename_all = "camelCase")]
    StartRun {
        checkpoint: Checkpoint,
        input_messages: Vec<Message>,
    },
    #[serde(rename_all = "camelCase")]
    Retry {
        reason: String,
        new_messages: Vec<Message>,
        usage: Usage,
    },
    #[serde(rename_all = "camelCase")]
    CallTools {
        new_message: Message,
        tool_calls: Vec<ToolCall>,
        usage: Usage,
    },
    #[serde(rename_all = "camelCase")]
    ResumeToolCalls {
        checkpoint: Checkpoint,
        pending_tool_calls: Vec<ToolCall>,
        partial_tool_results: Vec<ToolResult>,
    },
    #[serde(rename_all = "camelCase")]
    CallDelegate {
        delegate_to: Vec<DelegationTarget>,
        pending_tool_calls: Vec<ToolCall>,
        partial_tool_results: Vec<ToolResult>,
    },
    #[serde(rename_all = "camelCase")]
    CallInteractiveTool {
        pending_tool_calls: Vec<ToolCall>,
        partial_tool_results: Vec<ToolResult>,
    },
    #[serde(rename_all = "camelCase")]
    AttemptCompletion { tool_result: ToolResult },
    #[serde(rename_all = "camelCase")]
    ResolveToolResults { tool_results: Vec<ToolResult> },
    #[serde(rename_all = "camelCase")]
    ResolvePdfFile { tool_results: Vec<ToolResult> },
    #[serde(rename_all = "camelCase")]
    ResolveImageFile { tool_results: Vec<ToolResult> },
    #[serde(rename_all = "camelCase")]
    FinishToolCalls { new_messages: Vec<Message> },
    #[serde(rename_all = "camelCase")]
    ContinueToNextStep { checkpoint: Checkpoint },
    #[serde(rename_all = "camelCase")]
    CompleteRun {
        checkpoint: Checkpoint,
        text: String,
        usage: Usage,
    },
    #[serde(rename_all = "camelCase")]
    StopRunByInteractiveTool { checkpoint: Checkpoint },
    #[serde(rename_all = "camelCase")]
    StopRunByDelegate { checkpoint: Checkpoint },
    #[serde(rename_all = "camelCase")]
    StopRunByExceededMaxSteps { checkpoint: Checkpoint },
    #[serde(rename_all = "camelCase")]
    StopRunByError { checkpoint: Checkpoint, error: String },
}

impl RunEventKind {
    /// 事件类型名（与序列化的 `type` 一致，也是转移表的键）
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartRun { .. } => "startRun",
            Self::Retry { .. } => "retry",
            Self::CallTools { .. } => "callTools",
            Self::ResumeToolCalls { .. } => "resumeToolCalls",
            Self::CallDelegate { .. } => "callDelegate",
            Self::CallInteractiveTool { .. } => "callInteractiveTool",
            Self::AttemptCompletion { .. } => "attemptCompletion",
            Self::ResolveToolResults { .. } => "resolveToolResults",
            Self::ResolvePdfFile { .. } => "resolvePdfFile",
            Self::ResolveImageFile { .. } => "resolveImageFile",
            Self::FinishToolCalls { .. } => "finishToolCalls",
            Self::ContinueToNextStep { .. } => "continueToNextStep",
            Self::CompleteRun { .. } => "completeRun",
            Self::StopRunByInteractiveTool { .. } => "stopRunByInteractiveTool",
            Self::StopRunByDelegate { .. } => "stopRunByDelegate",
            Self::StopRunByExceededMaxSteps { .. } => "stopRunByExceededMaxSteps",
            Self::StopRunByError { .. } => "stopRunByError",
        }
    }

    /// 需要持久化的快照（如有）
    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        match self {
            Self::StartRun { checkpoint, .. }
            | Self::ResumeToolCalls { checkpoint, .. }
            | Self::ContinueToNextStep { checkpoint }
            | Self::CompleteRun { checkpoint, .. }
            | Self::StopRunByInteractiveTool { checkpoint }
            | Self::StopRunByDelegate { checkpoint }
            | Self::StopRunByExceededMaxSteps { checkpoint }
            | Self::StopRunByError { checkpoint, .. } => Some(checkpoint),
            _ => None,
        }
    }

    pub fn checkpoint_mut(&mut self) -> Option<&mut Checkpoint> {
        match self {
            Self::StartRun { checkpoint, .. }
            | Self::ResumeToolCalls { checkpoint, .. }
            | Self::ContinueToNextStep { checkpoint }
            | Self::CompleteRun { checkpoint, .. }
            | Self::StopRunByInteractiveTool { checkpoint }
            | Self::StopRunByDelegate { checkpoint }
            | Self::StopRunByExceededMaxSteps { checkpoint }
            | Self::StopRunByError { checkpoint, .. } => Some(checkpoint),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub id: String,
    pub job_id: String,
    pub run_id: String,
    pub timestamp: i64,
    pub expert_key: String,
    pub step_number: u32,
    #[serde(flatten)]
    pub kind: RunEventKind,
}

impl RunEvent {
    pub fn new(
        job_id: impl Into<String>,
        run_id: impl Into<String>,
        expert_key: impl Into<String>,
        step_number: u32,
        kind: RunEventKind,
    ) -> Self {
        Self {
            id: new_id(),
            job_id: job_id.into(),
            run_id: run_id.into(),
            timestamp: now_millis(),
            expert_key: expert_key.into(),
            step_number,
            kind,
        }
    }
}

/// 运行时事件负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuntimeEventKind {
    #[serde(rename_all = "camelCase")]
    InitializeRuntime {
        runtime_version: String,
        expert_key: String,
        model: String,
        query: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SkillStarting {
        skill_name: String,
        command: String,
        args: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    SkillConnected {
        skill_name: String,
        tool_count: usize,
        duration_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    SkillStderr { skill_name: String, message: String },
    #[serde(rename_all = "camelCase")]
    SkillDisconnected { skill_name: String },
    #[serde(rename_all = "camelCase")]
    DelegationWarning {
        tool_call_id: String,
        expert_key: String,
        message: String,
    },
}

impl RuntimeEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitializeRuntime { .. } => "initializeRuntime",
            Self::SkillStarting { .. } => "skillStarting",
            Self::SkillConnected { .. } => "skillConnected",
            Self::SkillStderr { .. } => "skillStderr",
            Self::SkillDisconnected { .. } => "skillDisconnected",
            Self::DelegationWarning { .. } => "delegationWarning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEvent {
    pub id: String,
    pub job_id: String,
    pub run_id: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub kind: RuntimeEventKind,
}

impl RuntimeEvent {
    pub fn new(job_id: impl Into<String>, run_id: impl Into<String>, kind: RuntimeEventKind) -> Self {
        Self {
            id: new_id(),
            job_id: job_id.into(),
            run_id: run_id.into(),
            timestamp: now_millis(),
            kind,
        }
    }
}

/// 发给监听者的统一事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Run(RunEvent),
    Runtime(RuntimeEvent),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Run(e) => e.kind.name(),
            Event::Runtime(e) => e.kind.name(),
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Event::Run(e) => &e.job_id,
            Event::Runtime(e) => &e.job_id,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Event::Run(e) => &e.run_id,
            Event::Runtime(e) => &e.run_id,
        }
    }

    pub fn as_run(&self) -> Option<&RunEvent> {
        match self {
            Event::Run(e) => Some(e),
            Event::Runtime(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_event_flattens_type_and_payload() {
        let event = RunEvent::new(
            "job",
            "run",
            "writer",
            2,
            RunEventKind::FinishToolCalls {
                new_messages: vec![],
            },
        );
        let v = serde_json::to_value(Event::Run(event)).unwrap();
        assert_eq!(v["type"], "finishToolCalls");
        assert_eq!(v["jobId"], "job");
        assert_eq!(v["expertKey"], "writer");
        assert_eq!(v["stepNumber"], 2);
        assert!(v["newMessages"].is_array());
    }

    #[test]
    fn test_runtime_event_type_name() {
        let event = RuntimeEvent::new(
            "job",
            "run",
            RuntimeEventKind::SkillStderr {
                skill_name: "fs".to_string(),
                message: "warming up".to_string(),
            },
        );
        let wrapped = Event::Runtime(event);
        assert_eq!(wrapped.event_type(), "skillStderr");
        let v = serde_json::to_value(&wrapped).unwrap();
        assert_eq!(v["type"], "skillStderr");
        assert_eq!(v["skillName"], "fs");
        assert!(v.get("stepNumber").is_none());
    }
}
