//! SkillManager：对一个工具提供方的统一生命周期契约
//!
//! 状态：uninitialized → initializing → ready | failed，最后 closed。
//! 管理器按运行创建、只初始化一次、只关闭一次（close 幂等，对未初始化的实例也安全）。

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::SkillError;
use crate::model::{MessagePart, ToolDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillKind {
    Mcp,
    Delegate,
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
    Closed,
}

#[async_trait]
pub trait SkillManager: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> SkillKind;

    /// true：init 在后台进行，不阻塞第一次生成
    fn lazy_init(&self) -> bool {
        false
    }

    async fn init(&self) -> Result<(), SkillError>;

    fn state(&self) -> SkillState;

    fn is_initialized(&self) -> bool {
        self.state() == SkillState::Ready
    }

    /// 就绪前为空
    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    async fn call_tool(&self, tool_name: &str, args: Value) -> Result<Vec<MessagePart>, SkillError>;

    async fn close(&self);
}

/// 供各管理器共用的状态单元
#[derive(Debug)]
pub struct StateCell(Mutex<SkillState>);

impl StateCell {
    pub fn new() -> Self {
        Self(Mutex::new(SkillState::Uninitialized))
    }

    pub fn get(&self) -> SkillState {
        self.0.lock().map(|s| *s).unwrap_or(SkillState::Failed)
    }

    pub fn set(&self, state: SkillState) {
        if let Ok(mut s) = self.0.lock() {
            *s = state;
        }
    }

    /// 仅当当前状态为 `from` 时切换到 `to`，返回是否切换成功
    pub fn transition(&self, from: SkillState, to: SkillState) -> bool {
        match self.0.lock() {
            Ok(mut s) if *s == from => {
                *s = to;
                true
            }
            _ => false,
        }
    }

    /// 切到 closed，返回此前状态；已关闭时返回 None
    pub fn close(&self) -> Option<SkillState> {
        let mut s = self.0.lock().ok()?;
        if *s == SkillState::Closed {
            return None;
        }
        let prev = *s;
        *s = SkillState::Closed;
        Some(prev)
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_close_is_idempotent() {
        let cell = StateCell::new();
        assert!(cell.transition(SkillState::Uninitialized, SkillState::Initializing));
        assert!(!cell.transition(SkillState::Uninitialized, SkillState::Ready));
        assert_eq!(cell.close(), Some(SkillState::Initializing));
        assert_eq!(cell.close(), None);
        assert_eq!(cell.get(), SkillState::Closed);
    }
}
