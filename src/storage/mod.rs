//! Checkpoint 持久化与事件日志
//!
//! 核心只依赖 `CheckpointStore`：按 (jobId, checkpointId) 存取快照。

pub mod event_log;
pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::core::StorageError;
use crate::model::Checkpoint;

pub use event_log::EventLog;
pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;

    async fn retrieve_checkpoint(&self, job_id: &str, checkpoint_id: &str) -> Result<Checkpoint, StorageError>;
}
