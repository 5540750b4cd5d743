//! 运行时：步进状态机、逻辑函数、协调器与运行驱动

pub mod coordinator;
pub mod logic;
pub mod machine;
pub mod run;

pub use coordinator::RunCoordinator;
pub use logic::LogicDeps;
pub use machine::{next_state, RunContext, RunState};
pub use run::{run, RunOptions, RunParams};
