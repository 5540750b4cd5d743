//! 核心层：错误类型、生成失败恢复策略、运行监管（续跑策略 / 取消）

pub mod error;
pub mod recovery;
pub mod supervisor;

pub use error::{RuntimeError, SkillError, StorageError, TransportError};
pub use recovery::{RecoveryAction, RecoveryEngine};
pub use supervisor::{continue_while, ContinuePolicy, FnPolicy, RunSupervisor};
