//! Resolving*：工具结果 → 一条工具消息
//!
//! readImageFile / readPdfFile 的结果只含文件信息，这里读出文件并以 base64 内联；
//! 读取失败降级为说明性文本片段，本步继续。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::core::RuntimeError;
use crate::events::RunEventKind;
use crate::model::{Message, MessagePart, ToolResult};
use crate::runtime::machine::RunContext;
use crate::tools::{FileInfo, READ_IMAGE_FILE, READ_PDF_FILE};

pub async fn resolving_logic(ctx: &RunContext) -> Result<RunEventKind, RuntimeError> {
    let results = ctx.step.tool_results.clone().unwrap_or_default();
    let mut parts = Vec::with_capacity(results.len());
    for result in &results {
        let contents = if result.tool_name == READ_IMAGE_FILE || result.tool_name == READ_PDF_FILE {
            inline_file(result).await
        } else {
            result.result.clone()
        };
        parts.push(MessagePart::ToolResultPart {
            tool_call_id: result.id.clone(),
            tool_name: result.tool_name.clone(),
            contents,
        });
    }
    Ok(RunEventKind::FinishToolCalls {
        new_messages: vec![Message::tool(parts)],
    })
}

async fn inline_file(result: &ToolResult) -> Vec<MessagePart> {
    let Some(info) = result
        .first_text()
        .and_then(|t| serde_json::from_str::<FileInfo>(t).ok())
    else {
        // 工具本身报错（路径越界、类型不支持等），原样保留
        return result.result.clone();
    };

    match tokio::fs::read(&info.path).await {
        Ok(bytes) => {
            let encoded_data = STANDARD.encode(bytes);
            tracing::debug!(path = %info.path, size = info.size, "inlined file");
            let part = if result.tool_name == READ_PDF_FILE {
                MessagePart::FileInlinePart {
                    encoded_data,
                    mime_type: info.mime_type,
                }
            } else {
                MessagePart::ImageInlinePart {
                    encoded_data,
                    mime_type: info.mime_type,
                }
            };
            vec![part]
        }
        Err(e) => {
            tracing::warn!(path = %info.path, error = %e, "failed to read file for inlining");
            vec![MessagePart::text(format!("Failed to read file {}: {}", info.path, e))]
        }
    }
}
