//! 进程内传输：把 ToolRegistry 当作 MCP 服务器
//!
//! 直接在内存里应答 initialize / tools/list / tools/call，让 base 技能与外部 MCP 服务器走同一条管理器路径。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::TransportError;
use crate::skills::mcp::protocol::{McpTransport, PROTOCOL_VERSION};
use crate::tools::ToolRegistry;

pub struct InProcessTransport {
    server_name: String,
    registry: ToolRegistry,
}

impl InProcessTransport {
    pub fn new(server_name: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            server_name: server_name.into(),
            registry,
        }
    }
}

#[async_trait]
impl McpTransport for InProcessTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": self.server_name, "version": env!("CARGO_PKG_VERSION") }
            })),
            "tools/list" => {
                let tools: Vec<Value> = self
                    .registry
                    .definitions(&self.server_name)
                    .into_iter()
                    .map(|d| {
                        json!({
                            "name": d.name,
                            "description": d.description,
                            "inputSchema": d.input_schema,
                        })
                    })
                    .collect();
                Ok(json!({ "tools": tools }))
            }
            "tools/call" => {
                let name = params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| TransportError::Protocol("tools/call without name".to_string()))?;
                let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                let (text, is_error) = match self.registry.execute(name, args).await {
                    Ok(text) => (text, false),
                    Err(e) => (e, true),
                };
                Ok(json!({
                    "content": [{ "type": "text", "text": text }],
                    "isError": is_error,
                }))
            }
            other => Err(TransportError::Server(format!("Method not found: {}", other))),
        }
    }

    async fn notify(&self, _method: &str, _params: Value) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::base::base_tool_registry;
    use crate::tools::todo::TodoList;

    #[tokio::test]
    async fn test_in_process_lists_and_calls_tools() {
        let transport = InProcessTransport::new("base", base_tool_registry(".", TodoList::new()));
        let listed = transport.request("tools/list", json!({})).await.unwrap();
        assert_eq!(listed["tools"].as_array().unwrap().len(), 8);

        let called = transport
            .request(
                "tools/call",
                json!({"name": "think", "arguments": {"thought": "hmm"}}),
            )
            .await
            .unwrap();
        assert_eq!(called["isError"], false);

        let missing = transport
            .request("tools/call", json!({"name": "nope", "arguments": {}}))
            .await
            .unwrap();
        assert_eq!(missing["isError"], true);
    }
}
