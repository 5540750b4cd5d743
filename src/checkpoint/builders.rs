//! Checkpoint 构造：初始快照、下一步快照、把 Step 折叠进快照

use crate::model::{
    new_id, Checkpoint, CheckpointAction, CheckpointStatus, Expert, RunSetting, Step,
};

/// 运行开始时的快照：第 1 步、init 状态、空消息、零用量
pub fn create_initial_checkpoint(setting: &RunSetting, expert: &Expert) -> Checkpoint {
    Checkpoint {
        id: new_id(),
        job_id: setting.job_id.clone(),
        run_id: setting.run_id.clone(),
        expert: expert.reference(),
        step_number: 1,
        status: CheckpointStatus::Init,
        messages: Vec::new(),
        usage: Default::default(),
        context_window: setting.context_window,
        context_window_usage: setting.context_window.map(|_| 0.0),
        delegated_by: None,
        delegate_to: None,
        pending_tool_calls: None,
        partial_tool_results: None,
        todos: Vec::new(),
        action: CheckpointAction::Init,
    }
}

/// 进入下一步：步数 +1、新 id、保留消息与用量、清空挂起调用与部分结果
pub fn create_next_step_checkpoint(checkpoint: &Checkpoint) -> Checkpoint {
    let mut next = checkpoint.clone();
    next.id = new_id();
    next.step_number = checkpoint.step_number + 1;
    next.status = CheckpointStatus::Proceeding;
    next.pending_tool_calls = None;
    next.partial_tool_results = None;
    next.delegate_to = None;
    next.action = CheckpointAction::ContinueToNextStep;
    next
}

/// 把一个 Step 的新消息与用量折叠进快照（不改变状态与 id）
pub fn fold_step(checkpoint: &Checkpoint, step: &Step) -> Checkpoint {
    let mut folded = checkpoint.clone();
    folded.messages.extend(step.new_messages.iter().cloned());
    folded.usage += step.usage;
    folded.with_context_window_usage()
}

/// 以终态结束：新 id + 给定状态与动作
pub fn finish_checkpoint(
    checkpoint: &Checkpoint,
    step: &Step,
    status: CheckpointStatus,
    action: CheckpointAction,
) -> Checkpoint {
    let mut done = fold_step(checkpoint, step);
    done.id = new_id();
    done.status = status;
    done.action = action;
    done
}
