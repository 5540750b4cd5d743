//! attemptCompletion：Expert 声明任务完成
//!
//! 仍有未完成待办时返回 `{"remainingTodos":[...]}`，调度器据此把它当作普通工具结果继续本步；
//! 否则返回 `{}`，运行进入 GeneratingRunResult。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::todo::TodoList;
use crate::tools::Tool;

pub const ATTEMPT_COMPLETION: &str = "attemptCompletion";

pub struct AttemptCompletionTool {
    todos: TodoList,
}

impl AttemptCompletionTool {
    pub fn new(todos: TodoList) -> Self {
        Self { todos }
    }
}

#[async_trait]
impl Tool for AttemptCompletionTool {
    fn name(&self) -> &str {
        ATTEMPT_COMPLETION
    }

    fn description(&self) -> &str {
        "Call this when the task is complete. If todos remain open, they are returned and the task continues."
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        let remaining = self.todos.remaining();
        if remaining.is_empty() {
            return Ok("{}".to_string());
        }
        tracing::info!(remaining = remaining.len(), "attemptCompletion with open todos");
        serde_json::to_string(&serde_json::json!({ "remainingTodos": remaining }))
            .map_err(|e| e.to_string())
    }
}

/// 结果文本中是否带有非空 remainingTodos
pub fn has_remaining_todos(result_text: Option<&str>) -> bool {
    result_text
        .and_then(|t| serde_json::from_str::<Value>(t).ok())
        .and_then(|v| v.get("remainingTodos").and_then(|r| r.as_array()).map(|a| !a.is_empty()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_reports_remaining_todos() {
        let todos = TodoList::new();
        let tool = AttemptCompletionTool::new(todos.clone());
        let out = tool.execute(Value::Null).await.unwrap();
        assert_eq!(out, "{}");
        assert!(!has_remaining_todos(Some(&out)));

        todos.update(&["write tests".to_string()], &[]);
        let out = tool.execute(Value::Null).await.unwrap();
        assert!(has_remaining_todos(Some(&out)));
    }

    #[test]
    fn test_has_remaining_todos_tolerates_non_json() {
        assert!(!has_remaining_todos(Some("Error: boom")));
        assert!(!has_remaining_todos(None));
        assert!(!has_remaining_todos(Some(r#"{"remainingTodos":[]}"#)));
    }
}
