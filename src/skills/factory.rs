//! 为一次运行创建技能管理器
//!
//! base 技能（除非 Expert 自己声明了同名技能）+ Expert 声明的技能 + 每个可委派 Expert 的委派技能。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::RuntimeError;
use crate::events::RuntimeEventSink;
use crate::model::{RunSetting, Skill};
use crate::skills::delegate::DelegateSkillManager;
use crate::skills::interactive::InteractiveSkillManager;
use crate::skills::mcp::{McpConnector, McpSkillManager};
use crate::skills::SkillManagers;
use crate::tools::base::{base_tool_registry, BASE_SKILL_NAME};
use crate::tools::todo::TodoList;

#[derive(Debug, Clone)]
pub struct SkillOptions {
    /// base 技能文件工具的根目录
    pub workspace_root: PathBuf,
    /// 单个 MCP 请求的超时
    pub request_timeout: Duration,
}

impl Default for SkillOptions {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// stdio 技能的默认参数：未给 args 时用 packageName（npx 加 `-y`）
pub fn default_stdio_args(command: &str, args: &[String], package_name: Option<&str>) -> Vec<String> {
    if !args.is_empty() {
        return args.to_vec();
    }
    match package_name {
        Some(pkg) if command == "npx" => vec!["-y".to_string(), pkg.to_string()],
        Some(pkg) => vec![pkg.to_string()],
        None => Vec::new(),
    }
}

pub fn build_skill_managers(
    setting: &RunSetting,
    options: &SkillOptions,
    todos: &TodoList,
    sink: RuntimeEventSink,
) -> Result<SkillManagers, RuntimeError> {
    let expert = setting
        .expert()
        .ok_or_else(|| RuntimeError::ExpertNotFound(setting.expert_key.clone()))?;
    let mut managers = SkillManagers::new();

    if !expert.skills.contains_key(BASE_SKILL_NAME) {
        managers.push(Arc::new(
            McpSkillManager::new(
                BASE_SKILL_NAME,
                McpConnector::InProcess(base_tool_registry(&options.workspace_root, todos.clone())),
                sink.clone(),
            )
            .with_request_timeout(options.request_timeout),
        ));
    }

    for (name, skill) in &expert.skills {
        match skill {
            Skill::McpStdioSkill {
                command,
                args,
                package_name,
                required_env,
                pick,
                omit,
                lazy_init,
                ..
            } => {
                let connector = McpConnector::Stdio {
                    command: command.clone(),
                    args: default_stdio_args(command, args, package_name.as_deref()),
                    required_env: required_env.clone(),
                    available_env: setting.env.clone(),
                };
                managers.push(Arc::new(
                    McpSkillManager::new(name.clone(), connector, sink.clone())
                        .with_filter(pick.clone(), omit.clone())
                        .with_lazy_init(*lazy_init)
                        .with_request_timeout(options.request_timeout),
                ));
            }
            Skill::McpSseSkill {
                endpoint,
                pick,
                omit,
                ..
            } => {
                let connector = McpConnector::Sse {
                    endpoint: endpoint.clone(),
                };
                managers.push(Arc::new(
                    McpSkillManager::new(name.clone(), connector, sink.clone())
                        .with_filter(pick.clone(), omit.clone())
                        .with_request_timeout(options.request_timeout),
                ));
            }
            Skill::InteractiveSkill { tools, .. } => {
                managers.push(Arc::new(InteractiveSkillManager::new(name.clone(), tools.clone())));
            }
        }
    }

    for key in &expert.delegates {
        let delegate = setting
            .experts
            .get(key)
            .ok_or_else(|| RuntimeError::ExpertNotFound(key.clone()))?;
        managers.push(Arc::new(DelegateSkillManager::new(delegate)));
    }

    tracing::info!(
        expert = %expert.key,
        skills = managers.len(),
        "skill managers created"
    );
    Ok(managers)
}
