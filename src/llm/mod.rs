//! 生成器层：抽象与实现（OpenAI 兼容 / 脚本化）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::ScriptedLlm;
pub use openai::OpenAiExecutor;
pub use traits::{Generation, GenerationError, GenerationRequest, LlmExecutor};
