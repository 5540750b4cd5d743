//! 技能系统
//!
//! 技能（Skill）是工具提供方：进程内 / 子进程 / 远程 MCP 服务器、人在回路的交互式工具、
//! 以及把另一个 Expert 包装成工具的委派技能。每次运行按 Expert 配置创建一组 SkillManager。

pub mod delegate;
pub mod factory;
pub mod interactive;
pub mod loader;
pub mod manager;
pub mod mcp;
pub mod registry;

pub use delegate::DelegateSkillManager;
pub use factory::{build_skill_managers, default_stdio_args, SkillOptions};
pub use interactive::InteractiveSkillManager;
pub use loader::{load_experts, parse_experts, ExpertLoadError};
pub use manager::{SkillKind, SkillManager, SkillState};
pub use registry::SkillManagers;
