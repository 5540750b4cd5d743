//! 各状态的逻辑函数：给定运行上下文（及注入的依赖）产生恰好一个事件

pub mod calling;
pub mod finishing;
pub mod generating;
pub mod init;
pub mod resolving;

use std::sync::Arc;

use crate::core::{RecoveryEngine, RuntimeError};
use crate::events::RunEventKind;
use crate::llm::LlmExecutor;
use crate::runtime::machine::{RunContext, RunState};
use crate::skills::SkillManagers;
use crate::tools::todo::TodoList;
use crate::tools::ToolDispatcher;

pub use init::instruction_text;

/// 逻辑函数依赖的外部能力
pub struct LogicDeps {
    pub llm: Arc<dyn LlmExecutor>,
    pub skills: SkillManagers,
    pub dispatcher: ToolDispatcher,
    pub recovery: RecoveryEngine,
    /// base 技能的待办列表，协调器据此给快照盖章
    pub todos: TodoList,
}

pub async fn run_logic(
    state: RunState,
    ctx: &RunContext,
    deps: &LogicDeps,
) -> Result<RunEventKind, RuntimeError> {
    match state {
        RunState::Init => init::init_logic(ctx),
        RunState::GeneratingStep => generating::generating_step_logic(ctx, deps).await,
        RunState::CallingTool => calling::calling_tool_logic(ctx, deps).await,
        RunState::CallingDelegate => calling::calling_delegate_logic(ctx),
        RunState::CallingInteractiveTool => calling::calling_interactive_tool_logic(ctx),
        RunState::ResolvingToolResult | RunState::ResolvingPdfFile | RunState::ResolvingImageFile => {
            resolving::resolving_logic(ctx).await
        }
        RunState::GeneratingRunResult => generating::generating_run_result_logic(ctx, deps).await,
        RunState::FinishingStep => finishing::finishing_logic(ctx),
        RunState::Stopped => Err(RuntimeError::InvalidTransition {
            state,
            event: "none",
        }),
    }
}
