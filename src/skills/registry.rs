//! 一次运行的技能管理器集合
//!
//! 初始化：lazyInit 的管理器后台启动；其余并发等待。任何非 lazy 的失败都会关闭全部管理器后再返回错误。

use std::sync::Arc;

use futures_util::future::join_all;

use crate::core::SkillError;
use crate::model::ToolDefinition;
use crate::skills::manager::SkillManager;

#[derive(Clone, Default)]
pub struct SkillManagers {
    managers: Vec<Arc<dyn SkillManager>>,
}

impl SkillManagers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, manager: Arc<dyn SkillManager>) {
        self.managers.push(manager);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SkillManager>> {
        self.managers.iter()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SkillManager>> {
        self.managers.iter().find(|m| m.name() == name).cloned()
    }

    /// 当前就绪的全部工具定义（lazy 管理器就绪前不出现）
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.managers
            .iter()
            .flat_map(|m| m.tool_definitions())
            .collect()
    }

    /// 按工具名找到所属管理器
    pub fn find_by_tool(&self, tool_name: &str) -> Option<(Arc<dyn SkillManager>, ToolDefinition)> {
        self.managers.iter().find_map(|m| {
            m.tool_definitions()
                .into_iter()
                .find(|d| d.name == tool_name)
                .map(|d| (Arc::clone(m), d))
        })
    }

    pub async fn init_all(&self) -> Result<(), SkillError> {
        for manager in self.managers.iter().filter(|m| m.lazy_init()) {
            let manager = Arc::clone(manager);
            tokio::spawn(async move {
                if let Err(e) = manager.init().await {
                    tracing::warn!(skill = %manager.name(), error = %e, "lazy skill init failed");
                }
            });
        }

        let results = join_all(
            self.managers
                .iter()
                .filter(|m| !m.lazy_init())
                .map(|m| m.init()),
        )
        .await;

        if let Some(err) = results.into_iter().find_map(Result::err) {
            tracing::warn!(error = %err, "skill init failed, closing all skills");
            self.close_all().await;
            return Err(err);
        }
        Ok(())
    }

    pub async fn close_all(&self) {
        join_all(self.managers.iter().map(|m| m.close())).await;
    }
}
