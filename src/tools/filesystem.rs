//! 沙箱文件系统
//!
//! SafeFs 绑定 workspace 根目录，所有路径经 resolve 校验必须在根下（禁止 ../ 逃逸）。

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FsError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Path escapes workspace: {0}")]
    PathEscape(String),

    #[error("{0}")]
    Io(String),
}

#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 解析为根目录下的绝对路径；路径必须存在
    pub fn resolve(&self, path: &str) -> Result<PathBuf, FsError> {
        let trimmed = path.trim_start_matches("./");
        let full = if Path::new(trimmed).is_absolute() {
            PathBuf::from(trimmed)
        } else {
            self.root_dir.join(trimmed)
        };
        let canonical = full
            .canonicalize()
            .map_err(|_| FsError::NotFound(path.to_string()))?;
        if canonical.starts_with(&self.root_dir) {
            Ok(canonical)
        } else {
            Err(FsError::PathEscape(path.to_string()))
        }
    }

    pub async fn read_text(&self, path: &str) -> Result<String, FsError> {
        let resolved = self.resolve(path)?;
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| FsError::Io(format!("Read failed: {}", e)))
    }

    /// 文件大小（字节）；目录返回错误
    pub async fn file_size(&self, path: &Path) -> Result<u64, FsError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| FsError::Io(e.to_string()))?;
        if !meta.is_file() {
            return Err(FsError::Io(format!("Not a file: {}", path.display())));
        }
        Ok(meta.len())
    }

    /// 列出目录：隐藏文件跳过，子目录以 `/` 结尾，按名称排序
    pub async fn list_dir(&self, path: &str) -> Result<Vec<String>, FsError> {
        let base = if path.is_empty() || path == "." {
            self.root_dir.clone()
        } else {
            self.resolve(path)?
        };
        let mut reader = tokio::fs::read_dir(&base)
            .await
            .map_err(|e| FsError::Io(format!("List failed: {}", e)))?;
        let mut entries = Vec::new();
        while let Some(e) = reader
            .next_entry()
            .await
            .map_err(|e| FsError::Io(e.to_string()))?
        {
            let name = e.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = e.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(if is_dir { format!("{}/", name) } else { name });
        }
        entries.sort();
        Ok(entries)
    }
}
