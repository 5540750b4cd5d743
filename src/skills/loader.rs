//! Expert 加载器
//!
//! 从 TOML 文件加载 Expert 定义；表名即 Expert key：
//!
//! ```text
//! [experts.writer]
//! name = "Writer"
//! instruction = "You write concise answers."
//! delegates = ["researcher"]
//!
//! [experts.writer.skills.fs]
//! type = "mcpStdioSkill"
//! command = "npx"
//! packageName = "@modelcontextprotocol/server-filesystem"
//! ```

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::model::Expert;

#[derive(Error, Debug)]
pub enum ExpertLoadError {
    #[error("Failed to read experts file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse experts file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid expert {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Expert {expert} delegates to unknown expert {delegate}")]
    UnknownDelegate { expert: String, delegate: String },
}

/// 解析 TOML 文本
pub fn parse_experts(content: &str) -> Result<HashMap<String, Expert>, ExpertLoadError> {
    let root: toml::Table = toml::from_str(content)?;
    let mut experts = HashMap::new();
    let Some(toml::Value::Table(entries)) = root.get("experts") else {
        return Ok(experts);
    };

    for (key, value) in entries {
        let mut table = match value {
            toml::Value::Table(t) => t.clone(),
            _ => {
                return Err(ExpertLoadError::Invalid {
                    key: key.clone(),
                    message: "expected a table".to_string(),
                })
            }
        };
        for field in ["key", "name"] {
            if !table.contains_key(field) {
                table.insert(field.to_string(), toml::Value::String(key.clone()));
            }
        }
        let expert: Expert = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ExpertLoadError::Invalid {
                key: key.clone(),
                message: e.to_string(),
            })?;
        experts.insert(key.clone(), expert);
    }

    for expert in experts.values() {
        if let Some(missing) = expert.delegates.iter().find(|d| !experts.contains_key(*d)) {
            return Err(ExpertLoadError::UnknownDelegate {
                expert: expert.key.clone(),
                delegate: missing.clone(),
            });
        }
    }

    tracing::info!("Loaded {} experts", experts.len());
    Ok(experts)
}

/// 读取并解析文件；文件不存在时返回空集合
pub fn load_experts(path: impl AsRef<Path>) -> Result<HashMap<String, Expert>, ExpertLoadError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(path = %path.display(), "experts file not found");
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ExpertLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_experts(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Skill;

    const EXPERTS: &str = r#"
[experts.writer]
name = "Writer"
instruction = "Write."
delegates = ["researcher"]

[experts.writer.skills.fs]
type = "mcpStdioSkill"
command = "npx"
packageName = "@example/fs"
lazyInit = true

[experts.writer.skills.human]
type = "interactiveSkill"

[experts.writer.skills.human.tools.askUser]
description = "Ask the user a question"

[experts.researcher]
instruction = "Research."
"#;

    #[test]
    fn test_parse_experts() {
        let experts = parse_experts(EXPERTS).unwrap();
        assert_eq!(experts.len(), 2);
        let writer = &experts["writer"];
        assert_eq!(writer.key, "writer");
        assert_eq!(writer.version, "1.0.0");
        assert_eq!(writer.delegates, vec!["researcher".to_string()]);
        assert!(matches!(
            writer.skills.get("fs"),
            Some(Skill::McpStdioSkill { lazy_init: true, .. })
        ));
        match writer.skills.get("human") {
            Some(Skill::InteractiveSkill { tools, .. }) => {
                assert_eq!(tools["askUser"].input_schema["type"], "object");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(experts["researcher"].name, "researcher");
    }

    #[test]
    fn test_unknown_delegate_is_rejected() {
        let err = parse_experts(
            r#"
[experts.a]
instruction = "x"
delegates = ["ghost"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ExpertLoadError::UnknownDelegate { .. }));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let experts = load_experts("/nonexistent/hive/experts.toml").unwrap();
        assert!(experts.is_empty());
    }
}
