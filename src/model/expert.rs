//! Expert 与 Skill 配置
//!
//! Expert 在一次运行准备阶段解析完毕后不可变；Skill 是封闭的 tagged union，
//! 由 `skills::factory` 根据变体创建对应的 SkillManager。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 一个可执行的 Expert（指令 + 技能 + 允许委派的对象）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expert {
    pub key: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub instruction: String,
    #[serde(default)]
    pub skills: BTreeMap<String, Skill>,
    /// 可委派的 Expert key
    #[serde(default)]
    pub delegates: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl Expert {
    pub fn new(key: impl Into<String>, name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            version: default_version(),
            description: None,
            instruction: instruction.into(),
            skills: BTreeMap::new(),
            delegates: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_skill(mut self, name: impl Into<String>, skill: Skill) -> Self {
        self.skills.insert(name.into(), skill);
        self
    }

    pub fn with_delegate(mut self, key: impl Into<String>) -> Self {
        self.delegates.push(key.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reference(&self) -> ExpertRef {
        ExpertRef {
            key: self.key.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

/// Checkpoint / 委派记录中引用 Expert 的身份
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpertRef {
    pub key: String,
    pub name: String,
    pub version: String,
}

/// 交互式工具定义（由人或外部系统在运行外完成）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveToolDef {
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// 技能：工具提供方配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Skill {
    /// 子进程 MCP 服务器（stdio）
    #[serde(rename_all = "camelCase")]
    McpStdioSkill {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        package_name: Option<String>,
        #[serde(default)]
        required_env: Vec<String>,
        #[serde(default)]
        pick: Vec<String>,
        #[serde(default)]
        omit: Vec<String>,
        #[serde(default)]
        lazy_init: bool,
        #[serde(default)]
        rule: Option<String>,
    },
    /// 远程 MCP 服务器（SSE）
    #[serde(rename_all = "camelCase")]
    McpSseSkill {
        endpoint: String,
        #[serde(default)]
        pick: Vec<String>,
        #[serde(default)]
        omit: Vec<String>,
        #[serde(default)]
        rule: Option<String>,
    },
    /// 人在回路的交互式工具
    #[serde(rename_all = "camelCase")]
    InteractiveSkill {
        tools: BTreeMap<String, InteractiveToolDef>,
        #[serde(default)]
        rule: Option<String>,
    },
}

impl Skill {
    /// 技能附带的使用规则（拼入 instruction）
    pub fn rule(&self) -> Option<&str> {
        match self {
            Skill::McpStdioSkill { rule, .. }
            | Skill::McpSseSkill { rule, .. }
            | Skill::InteractiveSkill { rule, .. } => rule.as_deref(),
        }
    }
}

/// pick / omit 过滤：两者都给出时 pick 优先
pub fn filter_tool_names(name: &str, pick: &[String], omit: &[String]) -> bool {
    if !pick.is_empty() {
        return pick.iter().any(|p| p == name);
    }
    !omit.iter().any(|o| o == name)
}
