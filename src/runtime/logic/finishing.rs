//! FinishingStep：折叠本步；达到 maxSteps 则停止，否则进入下一步

use crate::checkpoint::{create_next_step_checkpoint, finish_checkpoint, fold_step};
use crate::core::RuntimeError;
use crate::events::RunEventKind;
use crate::model::{CheckpointAction, CheckpointStatus};
use crate::runtime::machine::RunContext;

pub fn finishing_logic(ctx: &RunContext) -> Result<RunEventKind, RuntimeError> {
    if let Some(max_steps) = ctx.setting.max_steps {
        if ctx.checkpoint.step_number >= max_steps {
            tracing::warn!(
                step = ctx.checkpoint.step_number,
                max_steps,
                "max steps exceeded"
            );
            let checkpoint = finish_checkpoint(
                &ctx.checkpoint,
                &ctx.step,
                CheckpointStatus::StoppedByExceededMaxSteps,
                CheckpointAction::StopRunByExceededMaxSteps,
            );
            return Ok(RunEventKind::StopRunByExceededMaxSteps { checkpoint });
        }
    }
    let folded = fold_step(&ctx.checkpoint, &ctx.step);
    Ok(RunEventKind::ContinueToNextStep {
        checkpoint: create_next_step_checkpoint(&folded),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::create_initial_checkpoint;
    use crate::model::{Expert, Message, RunInput, RunSetting};
    use std::collections::HashMap;

    fn context(max_steps: Option<u32>) -> RunContext {
        let expert = Expert::new("writer", "Writer", "w");
        let mut experts = HashMap::new();
        experts.insert("writer".to_string(), expert.clone());
        let mut setting = RunSetting::new("job", "writer", experts, "m", RunInput::text("go"));
        setting.max_steps = max_steps;
        let checkpoint = create_initial_checkpoint(&setting, &expert);
        let mut ctx = RunContext::new(setting, checkpoint);
        ctx.step.new_messages.push(Message::user("go"));
        ctx
    }

    #[test]
    fn test_continue_advances_step() {
        match finishing_logic(&context(Some(2))).unwrap() {
            RunEventKind::ContinueToNextStep { checkpoint } => {
                assert_eq!(checkpoint.step_number, 2);
                assert_eq!(checkpoint.messages.len(), 1);
            }
            other => panic!("unexpected event: {}", other.name()),
        }
    }

    #[test]
    fn test_max_steps_stops() {
        match finishing_logic(&context(Some(1))).unwrap() {
            RunEventKind::StopRunByExceededMaxSteps { checkpoint } => {
                assert_eq!(checkpoint.status, CheckpointStatus::StoppedByExceededMaxSteps);
                assert_eq!(checkpoint.step_number, 1);
            }
            other => panic!("unexpected event: {}", other.name()),
        }
    }
}
