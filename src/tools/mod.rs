//! 工具层
//!
//! - `registry`：进程内工具（Tool trait + ToolRegistry），由进程内 MCP 传输对外暴露
//! - `base`：每个 Expert 默认挂载的 base 技能工具集
//! - `executor` / `dispatcher`：一步内工具调用的超时、审计、并发与路由

pub mod base;
pub mod completion;
pub mod dispatcher;
pub mod executor;
pub mod files;
pub mod filesystem;
pub mod registry;
pub mod think;
pub mod todo;

pub use base::{base_tool_registry, BASE_SKILL_NAME};
pub use completion::{has_remaining_todos, ATTEMPT_COMPLETION};
pub use dispatcher::ToolDispatcher;
pub use executor::ToolExecutor;
pub use files::{FileInfo, READ_IMAGE_FILE, READ_PDF_FILE};
pub use filesystem::SafeFs;
pub use registry::{Tool, ToolRegistry};
