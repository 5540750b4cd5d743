//! 文件快照存储：`<base>/jobs/<jobId>/checkpoints/<id>.json`（pretty JSON）

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::StorageError;
use crate::model::Checkpoint;
use crate::storage::CheckpointStore;

#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    base_dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn checkpoint_path(&self, job_id: &str, checkpoint_id: &str) -> PathBuf {
        self.base_dir
            .join("jobs")
            .join(job_id)
            .join("checkpoints")
            .join(format!("{}.json", checkpoint_id))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let path = self.checkpoint_path(&checkpoint.job_id, &checkpoint.id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_string_pretty(checkpoint)?;
        tokio::fs::write(&path, data).await?;
        tracing::debug!(path = %path.display(), status = checkpoint.status.as_str(), "checkpoint stored");
        Ok(())
    }

    async fn retrieve_checkpoint(&self, job_id: &str, checkpoint_id: &str) -> Result<Checkpoint, StorageError> {
        let path = self.checkpoint_path(job_id, checkpoint_id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    job_id: job_id.to_string(),
                    checkpoint_id: checkpoint_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::create_initial_checkpoint;
    use crate::model::{Expert, Message, RunInput, RunSetting};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let expert = Expert::new("writer", "Writer", "w");
        let mut experts = HashMap::new();
        experts.insert("writer".to_string(), expert.clone());
        let setting = RunSetting::new("job-1", "writer", experts, "m", RunInput::text("go"));
        let mut checkpoint = create_initial_checkpoint(&setting, &expert);
        checkpoint.messages.push(Message::user("go"));

        store.store_checkpoint(&checkpoint).await.unwrap();
        assert!(store.checkpoint_path("job-1", &checkpoint.id).exists());

        let loaded = store.retrieve_checkpoint("job-1", &checkpoint.id).await.unwrap();
        assert_eq!(loaded, checkpoint);

        assert!(matches!(
            store.retrieve_checkpoint("job-1", "missing").await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
