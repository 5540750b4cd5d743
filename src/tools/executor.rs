//! 工具执行器
//!
//! 对每次 MCP 工具调用施加超时，把失败折叠成普通的错误结果（Expert 自行决定如何应对），
//! 并输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::model::{ToolCall, ToolResult};
use crate::skills::SkillManager;

pub struct ToolExecutor {
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 执行一次调用；总是返回与调用 id 对应的结果
    pub async fn execute(&self, manager: Arc<dyn SkillManager>, call: &ToolCall) -> ToolResult {
        let start = Instant::now();
        let result = timeout(
            self.timeout,
            manager.call_tool(&call.tool_name, call.args.clone()),
        )
        .await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "skill": call.skill_name,
            "tool": call.tool_name,
            "tool_call_id": call.id,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.args),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(parts)) => ToolResult::for_call(call, parts),
            Ok(Err(e)) => ToolResult::error(call, e),
            Err(_) => ToolResult::error(
                call,
                format!("tool {} timed out after {}ms", call.tool_name, self.timeout.as_millis()),
            ),
        }
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SkillError;
    use crate::model::{MessagePart, ToolDefinition};
    use crate::skills::{SkillKind, SkillState};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct SlowSkill;

    #[async_trait]
    impl SkillManager for SlowSkill {
        fn name(&self) -> &str {
            "slow"
        }
        fn kind(&self) -> SkillKind {
            SkillKind::Mcp
        }
        async fn init(&self) -> Result<(), SkillError> {
            Ok(())
        }
        fn state(&self) -> SkillState {
            SkillState::Ready
        }
        fn tool_definitions(&self) -> Vec<ToolDefinition> {
            vec![]
        }
        async fn call_tool(&self, tool_name: &str, _args: Value) -> Result<Vec<MessagePart>, SkillError> {
            match tool_name {
                "sleep" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(vec![])
                }
                "fail" => Err(SkillError::ToolFailed {
                    tool: "fail".to_string(),
                    message: "boom".to_string(),
                }),
                _ => Ok(vec![MessagePart::text("done")]),
            }
        }
        async fn close(&self) {}
    }

    fn call(tool: &str) -> ToolCall {
        ToolCall {
            id: format!("id-{}", tool),
            skill_name: "slow".to_string(),
            tool_name: tool.to_string(),
            args: json!({}),
        }
    }

    #[tokio::test]
    async fn test_success_timeout_and_failure_all_yield_results() {
        let executor = ToolExecutor::new(Duration::from_millis(50));
        let skill: Arc<dyn SkillManager> = Arc::new(SlowSkill);

        let ok = executor.execute(skill.clone(), &call("echo")).await;
        assert_eq!(ok.first_text(), Some("done"));

        let timed_out = executor.execute(skill.clone(), &call("sleep")).await;
        assert_eq!(timed_out.id, "id-sleep");
        assert!(timed_out.first_text().unwrap().contains("timed out"));

        let failed = executor.execute(skill, &call("fail")).await;
        assert!(failed.first_text().unwrap().starts_with("Error:"));
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = json!({ "text": "x".repeat(500) });
        assert!(args_preview(&long).ends_with("..."));
        assert_eq!(args_preview(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
