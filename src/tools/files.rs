//! 文件类工具：readTextFile / readImageFile / readPdfFile / listDirectory
//!
//! 图片与 PDF 工具只返回 `{path, mimeType, size}`；真正的内容在 Resolving 状态读入并以 base64 内联。

use std::path::Path;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::filesystem::SafeFs;
use crate::tools::registry::{parse_args, schema_for};
use crate::tools::Tool;

pub const READ_IMAGE_FILE: &str = "readImageFile";
pub const READ_PDF_FILE: &str = "readPdfFile";

/// 图片 / PDF 工具的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: String,
    pub mime_type: String,
    pub size: u64,
}

/// 按扩展名识别支持的图片类型
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PathArgs {
    /// 相对于工作区的路径
    path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadTextArgs {
    /// 相对于工作区的路径
    path: String,
    /// 起始行（从 1 开始，含）
    #[serde(default)]
    from: Option<usize>,
    /// 结束行（含）
    #[serde(default)]
    to: Option<usize>,
}

pub struct ReadTextFileTool {
    fs: SafeFs,
}

impl ReadTextFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadTextFileTool {
    fn name(&self) -> &str {
        "readTextFile"
    }

    fn description(&self) -> &str {
        "Read a text file in the workspace. Optionally restrict to lines from..to (1-based, inclusive)."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<ReadTextArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: ReadTextArgs = parse_args(self.name(), args)?;
        tracing::info!(path = %args.path, "readTextFile tool execute");
        let content = self.fs.read_text(&args.path).await.map_err(|e| e.to_string())?;
        if args.from.is_none() && args.to.is_none() {
            return Ok(content);
        }
        let from = args.from.unwrap_or(1).max(1);
        let to = args.to.unwrap_or(usize::MAX);
        Ok(content
            .lines()
            .enumerate()
            .filter(|(i, _)| (from..=to).contains(&(i + 1)))
            .map(|(_, line)| line)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

pub struct ReadImageFileTool {
    fs: SafeFs,
}

impl ReadImageFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadImageFileTool {
    fn name(&self) -> &str {
        READ_IMAGE_FILE
    }

    fn description(&self) -> &str {
        "Read an image file (png, jpeg, gif, webp) in the workspace. The image is attached to the conversation."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<PathArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: PathArgs = parse_args(self.name(), args)?;
        let resolved = self.fs.resolve(&args.path).map_err(|e| e.to_string())?;
        let mime_type = image_mime_type(&resolved)
            .ok_or_else(|| format!("Unsupported image type: {}", args.path))?;
        let size = self.fs.file_size(&resolved).await.map_err(|e| e.to_string())?;
        let info = FileInfo {
            path: resolved.to_string_lossy().to_string(),
            mime_type: mime_type.to_string(),
            size,
        };
        serde_json::to_string(&info).map_err(|e| e.to_string())
    }
}

pub struct ReadPdfFileTool {
    fs: SafeFs,
}

impl ReadPdfFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadPdfFileTool {
    fn name(&self) -> &str {
        READ_PDF_FILE
    }

    fn description(&self) -> &str {
        "Read a PDF file in the workspace. The document is attached to the conversation."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<PathArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: PathArgs = parse_args(self.name(), args)?;
        let resolved = self.fs.resolve(&args.path).map_err(|e| e.to_string())?;
        let is_pdf = resolved
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            return Err(format!("Not a PDF file: {}", args.path));
        }
        let size = self.fs.file_size(&resolved).await.map_err(|e| e.to_string())?;
        let info = FileInfo {
            path: resolved.to_string_lossy().to_string(),
            mime_type: "application/pdf".to_string(),
            size,
        };
        serde_json::to_string(&info).map_err(|e| e.to_string())
    }
}

pub struct ListDirectoryTool {
    fs: SafeFs,
}

impl ListDirectoryTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "listDirectory"
    }

    fn description(&self) -> &str {
        "List a directory in the workspace. Directories end with '/'."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<PathArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();
        tracing::info!(path = %path, "listDirectory tool execute");
        let entries = self.fs.list_dir(&path).await.map_err(|e| e.to_string())?;
        Ok(entries.join("\n"))
    }
}
