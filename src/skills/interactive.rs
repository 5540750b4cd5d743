//! 交互式技能：工具由运行外的人或系统完成
//!
//! 没有子进程；init 只是状态登记，call_tool 返回空结果（调度器会在调用前拦截并停止运行）。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::SkillError;
use crate::model::{InteractiveToolDef, MessagePart, ToolDefinition};
use crate::skills::manager::{SkillKind, SkillManager, SkillState, StateCell};

pub struct InteractiveSkillManager {
    name: String,
    tools: BTreeMap<String, InteractiveToolDef>,
    state: StateCell,
}

impl InteractiveSkillManager {
    pub fn new(name: impl Into<String>, tools: BTreeMap<String, InteractiveToolDef>) -> Self {
        Self {
            name: name.into(),
            tools,
            state: StateCell::new(),
        }
    }
}

#[async_trait]
impl SkillManager for InteractiveSkillManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SkillKind {
        SkillKind::Interactive
    }

    async fn init(&self) -> Result<(), SkillError> {
        if self.state.transition(SkillState::Uninitialized, SkillState::Ready) {
            return Ok(());
        }
        match self.state.get() {
            SkillState::Ready => Ok(()),
            _ => Err(SkillError::Closed(self.name.clone())),
        }
    }

    fn state(&self) -> SkillState {
        self.state.get()
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        if self.state.get() != SkillState::Ready {
            return Vec::new();
        }
        self.tools
            .iter()
            .map(|(name, def)| ToolDefinition {
                skill_name: self.name.clone(),
                name: name.clone(),
                description: def.description.clone(),
                input_schema: def.input_schema.clone(),
                interactive: true,
            })
            .collect()
    }

    async fn call_tool(&self, _tool_name: &str, _args: Value) -> Result<Vec<MessagePart>, SkillError> {
        Ok(Vec::new())
    }

    async fn close(&self) {
        self.state.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_interactive_manager() {
        let mut tools = BTreeMap::new();
        tools.insert(
            "askUser".to_string(),
            InteractiveToolDef {
                description: "Ask the user".to_string(),
                input_schema: serde_json::json!({"type": "object"}),
            },
        );
        let manager = InteractiveSkillManager::new("human", tools);
        assert!(manager.tool_definitions().is_empty());
        manager.init().await.unwrap();
        let defs = manager.tool_definitions();
        assert_eq!(defs.len(), 1);
        assert!(defs[0].interactive);
        assert!(manager
            .call_tool("askUser", Value::Null)
            .await
            .unwrap()
            .is_empty());
        manager.close().await;
        manager.close().await;
        assert_eq!(manager.state(), SkillState::Closed);
    }
}
