//! Checkpoint 与委派模型的纯变换函数

pub mod builders;
pub mod delegation;

pub use builders::{create_initial_checkpoint, create_next_step_checkpoint, finish_checkpoint, fold_step};
pub use delegation::{build_delegate_to_state, build_delegation_return_state, DelegationReturn};
