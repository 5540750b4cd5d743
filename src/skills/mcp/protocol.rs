//! MCP JSON-RPC 报文与传输抽象

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::TransportError;
use crate::model::MessagePart;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: i64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> JsonRpcNotification<'a> {
    pub fn new(method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// 服务端发来的任意报文；只有带 id 且有 result / error 的才是响应
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl IncomingMessage {
    /// 若为响应则返回 (id, 结果)
    pub fn into_response(self) -> Option<(i64, Result<Value, TransportError>)> {
        if self.method.is_some() {
            return None;
        }
        let id = self.id.as_ref()?.as_i64()?;
        let result = match self.error {
            Some(err) => Err(TransportError::Server(format!(
                "MCP Error {}: {}",
                err.code, err.message
            ))),
            None => Ok(self.result.unwrap_or(Value::Null)),
        };
        Some((id, result))
    }
}

/// 一条 MCP 连接：请求按 id 复用，通知无响应
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError>;

    async fn close(&self);
}

pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": { "name": "hive", "version": env!("CARGO_PKG_VERSION") }
    })
}

/// tools/list 结果中的单个工具
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_input_schema")]
    pub input_schema: Value,
}

fn default_input_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn parse_tools_list(result: Value) -> Result<Vec<McpTool>, TransportError> {
    let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
    Ok(serde_json::from_value(tools)?)
}

/// tools/call 结果 → (是否为错误, MessagePart 列表)
pub fn parse_call_result(result: &Value) -> (bool, Vec<MessagePart>) {
    let is_error = result
        .get("isError")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let parts = result
        .get("content")
        .and_then(|c| c.as_array())
        .map(|items| items.iter().filter_map(content_to_part).collect())
        .unwrap_or_default();
    (is_error, parts)
}

fn content_to_part(item: &Value) -> Option<MessagePart> {
    let str_field = |v: &Value, key: &str| v.get(key).and_then(|x| x.as_str()).map(String::from);
    match item.get("type").and_then(|t| t.as_str())? {
        "text" => str_field(item, "text").map(MessagePart::text),
        "image" => Some(MessagePart::ImageInlinePart {
            encoded_data: str_field(item, "data")?,
            mime_type: str_field(item, "mimeType").unwrap_or_else(|| "image/png".to_string()),
        }),
        "resource" => {
            let resource = item.get("resource")?;
            if let Some(text) = str_field(resource, "text") {
                return Some(MessagePart::text(text));
            }
            Some(MessagePart::FileInlinePart {
                encoded_data: str_field(resource, "blob")?,
                mime_type: str_field(resource, "mimeType")
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            })
        }
        _ => None,
    }
}
