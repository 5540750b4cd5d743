//! RunSetting：单次运行的解析后配置
//!
//! 大部分字段在运行期间只读；委派移交/返回时只改变 `expert_key`、`input`（以及 run_id）。

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{now_millis, Expert};

/// LLM 提供方配置（对核心不透明，原样传给 LlmExecutor）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub provider_name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// 外部（人或委派返回）补充的交互式工具结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveToolCallResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub skill_name: String,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub interactive_tool_call_result: Option<InteractiveToolCallResult>,
}

impl RunInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            interactive_tool_call_result: None,
        }
    }

    pub fn tool_result(result: InteractiveToolCallResult) -> Self {
        Self {
            text: None,
            interactive_tool_call_result: Some(result),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSetting {
    pub job_id: String,
    pub run_id: String,
    pub expert_key: String,
    pub experts: HashMap<String, Expert>,
    pub model: String,
    pub provider_config: ProviderConfig,
    pub input: RunInput,
    /// None 表示不限制步数
    #[serde(default)]
    pub max_steps: Option<u32>,
    pub max_retries: u32,
    /// 单次生成超时（毫秒）
    pub timeout: u64,
    #[serde(default)]
    pub context_window: Option<u64>,
    #[serde(default, skip_serializing)]
    pub env: HashMap<String, String>,
    pub started_at: i64,
    pub updated_at: i64,
}

impl RunSetting {
    /// 以默认限制创建一次新运行的设置
    pub fn new(
        job_id: impl Into<String>,
        expert_key: impl Into<String>,
        experts: HashMap<String, Expert>,
        model: impl Into<String>,
        input: RunInput,
    ) -> Self {
        let now = now_millis();
        Self {
            job_id: job_id.into(),
            run_id: crate::model::new_id(),
            expert_key: expert_key.into(),
            experts,
            model: model.into(),
            provider_config: ProviderConfig::default(),
            input,
            max_steps: None,
            max_retries: 3,
            timeout: 60_000,
            context_window: None,
            env: HashMap::new(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// 当前 Expert
    pub fn expert(&self) -> Option<&Expert> {
        self.experts.get(&self.expert_key)
    }
}
