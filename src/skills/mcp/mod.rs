//! MCP 客户端：协议报文、三种传输、技能管理器

pub mod in_process;
pub mod manager;
pub mod protocol;
pub mod sse;
pub mod stdio;

pub use in_process::InProcessTransport;
pub use manager::{McpConnector, McpSkillManager};
pub use protocol::McpTransport;
pub use sse::SseTransport;
pub use stdio::{StdioConfig, StdioTransport};
