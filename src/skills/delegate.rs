//! 委派技能：把另一个 Expert 暴露为一个伪工具
//!
//! 工具名即 Expert key，参数 `{query}`；调用由调度器拦截并转为 stopRunByDelegate，从不经过 call_tool。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::SkillError;
use crate::model::{Expert, ExpertRef, MessagePart, ToolDefinition};
use crate::skills::manager::{SkillKind, SkillManager, SkillState, StateCell};

pub struct DelegateSkillManager {
    expert: ExpertRef,
    description: String,
    state: StateCell,
}

impl DelegateSkillManager {
    pub fn new(expert: &Expert) -> Self {
        let description = expert
            .description
            .clone()
            .unwrap_or_else(|| format!("Delegate a task to the expert \"{}\".", expert.name));
        Self {
            expert: expert.reference(),
            description,
            state: StateCell::new(),
        }
    }

    pub fn expert(&self) -> &ExpertRef {
        &self.expert
    }
}

#[async_trait]
impl SkillManager for DelegateSkillManager {
    fn name(&self) -> &str {
        &self.expert.key
    }

    fn kind(&self) -> SkillKind {
        SkillKind::Delegate
    }

    async fn init(&self) -> Result<(), SkillError> {
        if self.state.transition(SkillState::Uninitialized, SkillState::Ready)
            || self.state.get() == SkillState::Ready
        {
            Ok(())
        } else {
            Err(SkillError::Closed(self.expert.key.clone()))
        }
    }

    fn state(&self) -> SkillState {
        self.state.get()
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        if self.state.get() != SkillState::Ready {
            return Vec::new();
        }
        vec![ToolDefinition {
            skill_name: self.expert.key.clone(),
            name: self.expert.key.clone(),
            description: self.description.clone(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The task for the expert" }
                },
                "required": ["query"]
            }),
            interactive: false,
        }]
    }

    async fn call_tool(&self, _tool_name: &str, _args: Value) -> Result<Vec<MessagePart>, SkillError> {
        Err(SkillError::NotCallable(self.expert.key.clone()))
    }

    async fn close(&self) {
        self.state.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delegate_exposes_single_tool_and_refuses_calls() {
        let expert = Expert::new("researcher", "Researcher", "Research").with_description("Finds facts");
        let manager = DelegateSkillManager::new(&expert);
        manager.init().await.unwrap();
        let defs = manager.tool_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "researcher");
        assert_eq!(defs[0].description, "Finds facts");
        assert_eq!(defs[0].input_schema["required"][0], "query");
        assert!(matches!(
            manager.call_tool("researcher", json!({"query": "x"})).await,
            Err(SkillError::NotCallable(_))
        ));
    }
}
