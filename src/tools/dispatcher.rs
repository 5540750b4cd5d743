//! 工具调度器：一步内的全部工具调用 → 恰好一个 RunEvent
//!
//! 1. attemptCompletion 先单独执行；带有非空 remainingTodos 时降级为普通结果
//! 2. 其余调用按所属技能类型分组
//! 3. mcp 调用并发执行（信号量限流），按 id 还原为调用顺序
//! 4. 有委派 → callDelegate；否则有交互式 → callInteractiveTool；否则 resolve*

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::core::RuntimeError;
use crate::events::RunEventKind;
use crate::model::{DelegationTarget, RunSetting, ToolCall, ToolResult};
use crate::skills::{SkillKind, SkillManager, SkillManagers};
use crate::tools::completion::{has_remaining_todos, ATTEMPT_COMPLETION};
use crate::tools::executor::ToolExecutor;
use crate::tools::files::{READ_IMAGE_FILE, READ_PDF_FILE};

pub struct ToolDispatcher {
    executor: Arc<ToolExecutor>,
    semaphore: Arc<Semaphore>,
}

impl ToolDispatcher {
    pub fn new(tool_timeout: Duration, max_concurrent_tools: usize) -> Self {
        Self {
            executor: Arc::new(ToolExecutor::new(tool_timeout)),
            semaphore: Arc::new(Semaphore::new(max_concurrent_tools.max(1))),
        }
    }

    pub async fn dispatch(
        &self,
        setting: &RunSetting,
        calls: &[ToolCall],
        partial_results: Vec<ToolResult>,
        skills: &SkillManagers,
    ) -> Result<RunEventKind, RuntimeError> {
        let mut results = partial_results;
        let mut remaining: Vec<&ToolCall> = calls.iter().collect();

        if let Some(pos) = remaining.iter().position(|c| c.tool_name == ATTEMPT_COMPLETION) {
            let call = remaining.remove(pos);
            let result = self.run_single(skills, call).await;
            if !has_remaining_todos(result.first_text()) {
                tracing::info!(tool_call_id = %call.id, "attemptCompletion accepted");
                return Ok(RunEventKind::AttemptCompletion { tool_result: result });
            }
            tracing::info!(tool_call_id = %call.id, "attemptCompletion rejected, todos remain");
            results.push(result);
        }

        let mut mcp: Vec<(&ToolCall, Option<Arc<dyn SkillManager>>)> = Vec::new();
        let mut pending: Vec<ToolCall> = Vec::new();
        let mut delegates: Vec<&ToolCall> = Vec::new();
        let mut interactive = 0usize;

        for call in remaining {
            match skills.find_by_tool(&call.tool_name) {
                Some((manager, _)) => match manager.kind() {
                    SkillKind::Mcp => mcp.push((call, Some(manager))),
                    SkillKind::Delegate => {
                        delegates.push(call);
                        pending.push(call.clone());
                    }
                    SkillKind::Interactive => {
                        interactive += 1;
                        pending.push(call.clone());
                    }
                },
                None => mcp.push((call, None)),
            }
        }

        results.extend(self.run_concurrent(mcp).await);

        if !delegates.is_empty() {
            let delegate_to = delegates
                .into_iter()
                .map(|call| delegation_target(setting, call))
                .collect::<Result<Vec<_>, _>>()?;
            tracing::info!(
                delegates = delegate_to.len(),
                pending = pending.len(),
                "pausing for delegation"
            );
            return Ok(RunEventKind::CallDelegate {
                delegate_to,
                pending_tool_calls: pending,
                partial_tool_results: results,
            });
        }

        if interactive > 0 {
            tracing::info!(pending = pending.len(), "pausing for interactive tools");
            return Ok(RunEventKind::CallInteractiveTool {
                pending_tool_calls: pending,
                partial_tool_results: results,
            });
        }

        Ok(resolve_event(results))
    }

    async fn run_single(&self, skills: &SkillManagers, call: &ToolCall) -> ToolResult {
        match skills.find_by_tool(&call.tool_name) {
            Some((manager, _)) => self.executor.execute(manager, call).await,
            None => ToolResult::error(call, format!("tool {} not found", call.tool_name)),
        }
    }

    /// 并发执行；完成顺序任意，返回顺序与输入一致
    async fn run_concurrent(
        &self,
        calls: Vec<(&ToolCall, Option<Arc<dyn SkillManager>>)>,
    ) -> Vec<ToolResult> {
        let order: Vec<String> = calls.iter().map(|(c, _)| c.id.clone()).collect();
        let mut in_flight = FuturesUnordered::new();
        let mut done: HashMap<String, ToolResult> = HashMap::new();

        for (call, manager) in calls {
            let Some(manager) = manager else {
                tracing::warn!(tool = %call.tool_name, "unknown tool");
                done.insert(
                    call.id.clone(),
                    ToolResult::error(call, format!("tool {} not found", call.tool_name)),
                );
                continue;
            };
            let call = call.clone();
            let executor = Arc::clone(&self.executor);
            let semaphore = Arc::clone(&self.semaphore);
            in_flight.push(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                executor.execute(manager, &call).await
            });
        }

        while let Some(result) = in_flight.next().await {
            done.insert(result.id.clone(), result);
        }

        order.iter().filter_map(|id| done.remove(id)).collect()
    }
}

fn delegation_target(setting: &RunSetting, call: &ToolCall) -> Result<DelegationTarget, RuntimeError> {
    let expert = setting
        .experts
        .get(&call.tool_name)
        .ok_or_else(|| RuntimeError::ExpertNotFound(call.tool_name.clone()))?;
    let query = call
        .args
        .get("query")
        .and_then(|q| q.as_str())
        .unwrap_or_default()
        .to_string();
    Ok(DelegationTarget {
        expert: expert.reference(),
        tool_call_id: call.id.clone(),
        tool_name: call.tool_name.clone(),
        query,
    })
}

/// pdf 优先于图片，其余为普通结果
pub fn resolve_event(tool_results: Vec<ToolResult>) -> RunEventKind {
    if tool_results.iter().any(|r| r.tool_name == READ_PDF_FILE) {
        RunEventKind::ResolvePdfFile { tool_results }
    } else if tool_results.iter().any(|r| r.tool_name == READ_IMAGE_FILE) {
        RunEventKind::ResolveImageFile { tool_results }
    } else {
        RunEventKind::ResolveToolResults { tool_results }
    }
}
