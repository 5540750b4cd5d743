//! 运行时配置：从 config/hive.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__RUNTIME__MAX_STEPS=20`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::RunSupervisor;
use crate::runtime::RunOptions;
use crate::skills::SkillOptions;

/// 配置根（对应 config/hive.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HiveConfig {
    pub runtime: RuntimeSection,
    pub storage: StorageSection,
    pub llm: LlmSection,
    /// Expert 定义文件
    pub experts_file: Option<PathBuf>,
}

/// [runtime] 段：步数、重试、超时与并发
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// 不设置表示不限制步数
    pub max_steps: Option<u32>,
    pub max_retries: u32,
    /// 单次生成超时（毫秒）
    pub timeout_ms: u64,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub max_concurrent_tools: usize,
    /// 整个作业的 token 预算，超出后在下一次转移处停止
    pub max_total_tokens: Option<u64>,
    /// base 技能文件工具的根目录，未设置时用当前目录
    pub workspace_root: Option<PathBuf>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            max_steps: None,
            max_retries: 5,
            timeout_ms: 300_000,
            tool_timeout_secs: 60,
            max_concurrent_tools: 8,
            max_total_tokens: None,
            workspace_root: None,
        }
    }
}

impl RuntimeSection {
    pub fn supervisor(&self) -> RunSupervisor {
        match self.max_total_tokens {
            Some(budget) => RunSupervisor::new().with_token_budget(budget),
            None => RunSupervisor::new(),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        let tool_timeout = Duration::from_secs(self.tool_timeout_secs);
        RunOptions {
            skills: SkillOptions {
                workspace_root: self
                    .workspace_root
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(".")),
                request_timeout: tool_timeout,
            },
            tool_timeout,
            max_concurrent_tools: self.max_concurrent_tools,
        }
    }
}

/// [storage] 段：快照与事件日志的根目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub base_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".hive"),
        }
    }
}

/// [llm] 段：OpenAI 兼容端点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 存放 API Key 的环境变量名（Key 本身不写入配置文件）
    pub api_key_env: String,
    pub context_window: Option<u64>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            context_window: None,
        }
    }
}

impl LlmSection {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

/// 加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 查找 config/hive.toml 或 hive.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在，可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<HiveConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/hive", "hive"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
experts_file = "experts.toml"

[runtime]
max_steps = 12
max_concurrent_tools = 2
max_total_tokens = 5000

[llm]
model = "local-model"
base_url = "http://localhost:8080/v1"
"#,
        )
        .unwrap();

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.runtime.max_steps, Some(12));
        assert_eq!(config.runtime.max_concurrent_tools, 2);
        assert_eq!(config.runtime.max_retries, 5);
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.experts_file, Some(PathBuf::from("experts.toml")));
        assert_eq!(config.runtime.run_options().max_concurrent_tools, 2);
        assert_eq!(config.runtime.max_total_tokens, Some(5000));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(load_config(Some(PathBuf::from("/nonexistent/hive.toml"))).is_err());
    }
}
