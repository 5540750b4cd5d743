//! think 工具：记录一段思考，不产生副作用

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::registry::{parse_args, schema_for};
use crate::tools::Tool;

#[derive(Debug, Deserialize, JsonSchema)]
struct ThinkArgs {
    /// 思考内容
    thought: String,
}

pub struct ThinkTool;

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "Think step by step about the problem before acting. The thought is recorded; nothing else happens."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<ThinkArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: ThinkArgs = parse_args(self.name(), args)?;
        tracing::debug!(len = args.thought.len(), "think");
        Ok(serde_json::json!({ "thought": args.thought }).to_string())
    }
}
