//! OpenAI 兼容 API 生成器
//!
//! 直接用 reqwest 调 `/chat/completions`（可配置 base_url），支持 DeepSeek、OpenAI、自建代理等。
//! 工具定义映射为 function tools；内联图片 / 文件以 data URL 放进紧随工具消息之后的 user 消息。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{Generation, GenerationError, GenerationRequest, LlmExecutor};
use crate::model::{Message, MessageKind, MessagePart, ToolCall, Usage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiExecutor {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiExecutor {
    pub fn new(base_url: Option<&str>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
        }
    }

    fn endpoint(&self, request: &GenerationRequest) -> String {
        let base = request
            .provider_config
            .base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .unwrap_or(&self.base_url);
        format!("{}/chat/completions", base)
    }
}

#[async_trait]
impl LlmExecutor for OpenAiExecutor {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
        let mut body = json!({
            "model": request.model,
            "messages": to_openai_messages(&request.messages),
        });
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        let mut http = self
            .client
            .post(self.endpoint(&request))
            .timeout(request.timeout)
            .json(&body);
        let api_key = request
            .provider_config
            .api_key
            .as_ref()
            .or(self.api_key.as_ref());
        if let Some(key) = api_key {
            http = http.bearer_auth(key);
        }
        for (name, value) in &request.provider_config.headers {
            http = http.header(name.as_str(), value.as_str());
        }

        let response = http
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, request.timeout))?;
        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = retry_after_ms(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => GenerationError::RateLimited { retry_after_ms },
                500..=599 => GenerationError::Transient(format!("HTTP {}: {}", status, text)),
                _ => GenerationError::Fatal(format!("HTTP {}: {}", status, text)),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Transient(format!("invalid response body: {}", e)))?;
        parse_completion(&payload)
    }
}

/// Retry-After（秒）换算为毫秒，缺失或无法解析时按 1 秒
fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(1000)
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(timeout.as_millis() as u64)
    } else if e.is_connect() || e.is_request() {
        GenerationError::Transient(e.to_string())
    } else {
        GenerationError::Fatal(e.to_string())
    }
}

fn join_text(parts: &[MessagePart]) -> String {
    parts
        .iter()
        .filter_map(|p| p.as_text())
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline_part(part: &MessagePart) -> Option<Value> {
    match part {
        MessagePart::ImageInlinePart {
            encoded_data,
            mime_type,
        } => Some(json!({
            "type": "image_url",
            "image_url": { "url": format!("data:{};base64,{}", mime_type, encoded_data) }
        })),
        MessagePart::FileInlinePart {
            encoded_data,
            mime_type,
        } => Some(json!({
            "type": "file",
            "file": { "file_data": format!("data:{};base64,{}", mime_type, encoded_data) }
        })),
        _ => None,
    }
}

fn user_content(parts: &[MessagePart]) -> Value {
    let inline: Vec<Value> = parts.iter().filter_map(inline_part).collect();
    if inline.is_empty() {
        return Value::String(join_text(parts));
    }
    let mut content = vec![json!({ "type": "text", "text": join_text(parts) })];
    content.extend(inline);
    Value::Array(content)
}

/// Message → OpenAI chat messages
pub fn to_openai_messages(messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::new();
    for m in messages {
        match m.kind {
            MessageKind::InstructionMessage => {
                out.push(json!({ "role": "system", "content": join_text(&m.contents) }));
            }
            MessageKind::UserMessage => {
                out.push(json!({ "role": "user", "content": user_content(&m.contents) }));
            }
            MessageKind::ExpertMessage => {
                let tool_calls: Vec<Value> = m
                    .contents
                    .iter()
                    .filter_map(|p| match p {
                        MessagePart::ToolCallPart {
                            tool_call_id,
                            tool_name,
                            args,
                        } => Some(json!({
                            "id": tool_call_id,
                            "type": "function",
                            "function": { "name": tool_name, "arguments": args.to_string() }
                        })),
                        _ => None,
                    })
                    .collect();
                let text = join_text(&m.contents);
                let content = if text.is_empty() {
                    Value::Null
                } else {
                    Value::String(text)
                };
                let mut msg = json!({ "role": "assistant", "content": content });
                if !tool_calls.is_empty() {
                    msg["tool_calls"] = Value::Array(tool_calls);
                }
                out.push(msg);
            }
            MessageKind::ToolMessage => {
                let mut attachments = Vec::new();
                for part in &m.contents {
                    if let MessagePart::ToolResultPart {
                        tool_call_id,
                        contents,
                        ..
                    } = part
                    {
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_call_id,
                            "content": join_text(contents),
                        }));
                        attachments.extend(contents.iter().filter_map(inline_part));
                    }
                }
                if !attachments.is_empty() {
                    out.push(json!({ "role": "user", "content": attachments }));
                }
            }
        }
    }
    out
}

fn parse_completion(payload: &Value) -> Result<Generation, GenerationError> {
    let message = payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| GenerationError::Transient("response has no choices".to_string()))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from);

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for call in calls {
            let id = call.get("id").and_then(|v| v.as_str()).unwrap_or_default();
            let function = call.get("function").cloned().unwrap_or(Value::Null);
            let name = function.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            let raw_args = function
                .get("arguments")
                .and_then(|v| v.as_str())
                .unwrap_or("{}");
            let args = serde_json::from_str(raw_args).unwrap_or_else(|_| json!({}));
            tool_calls.push(ToolCall {
                id: if id.is_empty() {
                    crate::model::new_id()
                } else {
                    id.to_string()
                },
                skill_name: String::new(),
                tool_name: name.to_string(),
                args,
            });
        }
    }

    let usage = payload.get("usage").map(parse_usage).unwrap_or_default();
    Ok(Generation {
        text,
        tool_calls,
        usage,
    })
}

fn parse_usage(u: &Value) -> Usage {
    let get = |v: Option<&Value>| v.and_then(|x| x.as_u64()).unwrap_or(0);
    let input_tokens = get(u.get("prompt_tokens"));
    let output_tokens = get(u.get("completion_tokens"));
    Usage {
        input_tokens,
        cached_input_tokens: get(u.pointer("/prompt_tokens_details/cached_tokens")),
        output_tokens,
        reasoning_tokens: get(u.pointer("/completion_tokens_details/reasoning_tokens")),
        total_tokens: u
            .get("total_tokens")
            .and_then(|x| x.as_u64())
            .unwrap_or(input_tokens + output_tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_ms(&headers), 1000);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after_ms(&headers), 7000);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("18446744073709551615"));
        assert_eq!(retry_after_ms(&headers), u64::MAX);
    }

    #[test]
    fn test_parse_completion_with_tool_calls() {
        let payload = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "readTextFile", "arguments": "{\"path\":\"a.txt\"}" }
                    }]
                }
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 3,
                "total_tokens": 15,
                "prompt_tokens_details": { "cached_tokens": 4 }
            }
        });
        let generation = parse_completion(&payload).unwrap();
        assert!(generation.text.is_none());
        assert_eq!(generation.tool_calls.len(), 1);
        assert_eq!(generation.tool_calls[0].id, "call_1");
        assert_eq!(generation.tool_calls[0].args["path"], "a.txt");
        assert_eq!(generation.usage.input_tokens, 12);
        assert_eq!(generation.usage.cached_input_tokens, 4);
        assert_eq!(generation.usage.total_tokens, 15);
    }

    #[test]
    fn test_tool_message_becomes_tool_role_plus_attachments() {
        let tool_msg = Message::tool(vec![MessagePart::ToolResultPart {
            tool_call_id: "c1".to_string(),
            tool_name: "readImageFile".to_string(),
            contents: vec![MessagePart::ImageInlinePart {
                encoded_data: "AAAA".to_string(),
                mime_type: "image/png".to_string(),
            }],
        }]);
        let out = to_openai_messages(&[tool_msg]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["role"], "tool");
        assert_eq!(out[0]["tool_call_id"], "c1");
        assert_eq!(out[1]["role"], "user");
        assert_eq!(
            out[1]["content"][0]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }
}
