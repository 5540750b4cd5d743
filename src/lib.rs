//! Hive - Expert 运行时
//!
//! 模块划分：
//! - **model**: Expert、Skill、RunSetting、Checkpoint、Step、消息与工具调用
//! - **checkpoint**: 快照构造与委派移交/返回的纯函数
//! - **runtime**: 步进状态机、各状态逻辑、协调器与运行驱动
//! - **skills**: 技能管理器（MCP stdio / SSE / 进程内、交互式、委派）与 Expert 加载
//! - **tools**: base 技能工具集、工具执行器与调度器
//! - **llm**: 生成器抽象（OpenAI 兼容 / 脚本化）
//! - **events**: 运行事件与运行时事件的发射
//! - **storage**: 快照存储与事件日志
//! - **core**: 错误类型、恢复策略、运行监管
//! - **config**: 配置加载（TOML + 环境变量）
//! - **observability**: tracing 初始化

pub mod checkpoint;
pub mod config;
pub mod core;
pub mod events;
pub mod llm;
pub mod model;
pub mod observability;
pub mod runtime;
pub mod skills;
pub mod storage;
pub mod tools;

pub use runtime::{run, RunOptions, RunParams};
