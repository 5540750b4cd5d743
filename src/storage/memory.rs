//! 内存快照存储（测试与一次性运行）

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::StorageError;
use crate::model::Checkpoint;
use crate::storage::CheckpointStore;

#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Mutex<HashMap<(String, String), Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某个 job 的全部快照，按步数排序
    pub fn checkpoints(&self, job_id: &str) -> Vec<Checkpoint> {
        let mut list: Vec<Checkpoint> = self
            .checkpoints
            .lock()
            .map(|m| {
                m.iter()
                    .filter(|((job, _), _)| job == job_id)
                    .map(|(_, c)| c.clone())
                    .collect()
            })
            .unwrap_or_default();
        list.sort_by_key(|c| c.step_number);
        list
    }

    pub fn len(&self) -> usize {
        self.checkpoints.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        if let Ok(mut map) = self.checkpoints.lock() {
            map.insert(
                (checkpoint.job_id.clone(), checkpoint.id.clone()),
                checkpoint.clone(),
            );
        }
        Ok(())
    }

    async fn retrieve_checkpoint(&self, job_id: &str, checkpoint_id: &str) -> Result<Checkpoint, StorageError> {
        self.checkpoints
            .lock()
            .ok()
            .and_then(|m| m.get(&(job_id.to_string(), checkpoint_id.to_string())).cloned())
            .ok_or_else(|| StorageError::NotFound {
                job_id: job_id.to_string(),
                checkpoint_id: checkpoint_id.to_string(),
            })
    }
}
