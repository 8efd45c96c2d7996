use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::AssistantConfig;
use crate::tools::ToolDef;

/// A message in the chat-completions wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    /// The result of one executed tool call, correlated by call id.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Tool call as carried on the wire (OpenAI format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: WireFunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    /// JSON-encoded argument object.
    #[serde(default)]
    pub arguments: String,
}

/// A tool call decoded for local execution.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Wire representation of this call as decoded: fabricated ids and
    /// degraded arguments included. Forwarding these instead of the raw wire
    /// calls keeps the follow-up conversation consistent with the tool-result
    /// messages that reference them.
    pub fn to_wire(&self) -> WireToolCall {
        WireToolCall {
            id: self.call_id.clone(),
            call_type: default_call_type(),
            function: WireFunctionCall {
                name: self.name.clone(),
                arguments: serde_json::to_string(&self.arguments)
                    .unwrap_or_else(|_| "{}".to_string()),
            },
        }
    }
}

/// Decode the tool calls carried by an assistant message.
///
/// Providers are sloppy here: argument strings may be unparsable and call ids
/// may be missing. Bad arguments degrade to an empty map and missing ids get
/// a fabricated one, so result messages can always be correlated. Calls with
/// no function name are kept with an empty name; the caller decides how to
/// answer them. Order is preserved.
pub fn decode_tool_calls(message: &ChatMessage) -> Vec<ToolCall> {
    let Some(wire_calls) = message.tool_calls.as_ref() else {
        return Vec::new();
    };

    wire_calls
        .iter()
        .map(|wire| {
            let name = wire.function.name.trim();

            let raw_args = wire.function.arguments.trim();
            let arguments = if raw_args.is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(raw_args) {
                    Ok(Value::Object(map)) => map,
                    Ok(_) => {
                        tracing::warn!("Arguments for tool call '{}' are not an object", name);
                        Map::new()
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse arguments for tool call '{}': {}", name, e);
                        Map::new()
                    }
                }
            };

            let call_id = if wire.id.trim().is_empty() {
                format!("call_{}", Uuid::new_v4().simple())
            } else {
                wire.id.clone()
            };

            ToolCall {
                call_id,
                name: name.to_string(),
                arguments,
            }
        })
        .collect()
}

/// One model invocation against an OpenAI-compatible endpoint.
///
/// `tools` present means function definitions go out with the request;
/// `None` means a plain text completion is expected back.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDef]>,
    ) -> Result<ChatMessage>;
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint
/// (Ollama, LM Studio, vLLM, OpenAI, etc.).
#[derive(Clone)]
pub struct ChatClient {
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    strict_json: bool,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: &AssistantConfig) -> Self {
        Self {
            api_url: config.llm_api_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            // strict_json only applies to embedded-JSON deployments. Under
            // tool calling the tool-free invocation is the closing message,
            // which must stay prose.
            strict_json: config.strict_json && !config.strategy.tool_mode(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelClient for ChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDef]>,
    ) -> Result<ChatMessage> {
        let url = format!("{}/chat/completions", self.api_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        match tools {
            Some(tool_defs) if !tool_defs.is_empty() => {
                body["tools"] = serde_json::to_value(tool_defs)?;
            }
            _ => {
                // Endpoints that honor response_format keep small models from
                // wrapping the payload in prose.
                if self.strict_json {
                    body["response_format"] = serde_json::json!({"type": "json_object"});
                }
            }
        }

        let mut req = self.client.post(&url).json(&body);

        // Add API key header if provided (not needed for local models)
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req.send().await.context("Failed to send LLM request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error {}: {}", status, body);
        }

        let response_json: Value = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let choice = response_json["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .context("Empty choices in LLM response")?;

        let message = &choice["message"];
        let content = message["content"].as_str().map(String::from);
        let tool_calls: Option<Vec<WireToolCall>> = message
            .get("tool_calls")
            .and_then(|tc| serde_json::from_value(tc.clone()).ok());

        Ok(ChatMessage {
            role: "assistant".to_string(),
            content,
            tool_calls,
            tool_call_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_call(id: &str, name: &str, arguments: &str) -> WireToolCall {
        WireToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: WireFunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    fn assistant_with_calls(calls: Vec<WireToolCall>) -> ChatMessage {
        ChatMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    #[test]
    fn test_plain_message_serializes_without_tool_fields() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }

    #[test]
    fn test_tool_result_carries_call_id() {
        let msg = ChatMessage::tool_result("call_7", "Saved.");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["content"], "Saved.");
        assert_eq!(json["tool_call_id"], "call_7");
    }

    #[test]
    fn test_decode_tool_calls_parses_arguments() {
        let msg = assistant_with_calls(vec![
            wire_call("call_1", "add_log", r#"{"message": "ran 5k"}"#),
            wire_call("call_2", "upsert_profile_field", r#"{"key": "city", "value": "Oslo"}"#),
        ]);

        let calls = decode_tool_calls(&msg);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "add_log");
        assert_eq!(calls[0].call_id, "call_1");
        assert_eq!(calls[0].arguments["message"], "ran 5k");
        assert_eq!(calls[1].name, "upsert_profile_field");
    }

    #[test]
    fn test_decode_tool_calls_bad_arguments_degrade_to_empty() {
        let msg = assistant_with_calls(vec![wire_call("call_1", "add_log", "not json {")]);
        let calls = decode_tool_calls(&msg);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].arguments.is_empty());
    }

    #[test]
    fn test_decode_tool_calls_fabricates_missing_id() {
        let msg = assistant_with_calls(vec![wire_call("", "add_log", "{}")]);
        let calls = decode_tool_calls(&msg);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].call_id.starts_with("call_"));
        assert!(calls[0].call_id.len() > "call_".len());
    }

    #[test]
    fn test_decode_tool_calls_keeps_unnamed_calls() {
        let msg = assistant_with_calls(vec![
            wire_call("call_1", "", "{}"),
            wire_call("call_2", "add_log", r#"{"message": "x"}"#),
        ]);
        let calls = decode_tool_calls(&msg);
        assert_eq!(calls.len(), 2);
        assert!(calls[0].name.is_empty());
        assert_eq!(calls[0].call_id, "call_1");
        assert_eq!(calls[1].name, "add_log");
    }

    #[test]
    fn test_to_wire_carries_fabricated_id_and_degraded_arguments() {
        let msg = assistant_with_calls(vec![wire_call("", "add_log", "not json {")]);
        let calls = decode_tool_calls(&msg);

        let wire = calls[0].to_wire();
        assert_eq!(wire.id, calls[0].call_id);
        assert!(wire.id.starts_with("call_"));
        assert_eq!(wire.call_type, "function");
        assert_eq!(wire.function.name, "add_log");
        assert_eq!(wire.function.arguments, "{}");
    }

    #[test]
    fn test_decode_tool_calls_empty_arguments_string() {
        let msg = assistant_with_calls(vec![wire_call("call_1", "add_log", "")]);
        let calls = decode_tool_calls(&msg);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].arguments.is_empty());
    }

    #[test]
    fn test_strict_json_disabled_under_tool_calls_strategy() {
        use crate::config::DecodingStrategy;

        let mut config = AssistantConfig::default();
        config.strict_json = true;
        assert!(ChatClient::new(&config).strict_json);

        config.strategy = DecodingStrategy::ToolCalls;
        assert!(!ChatClient::new(&config).strict_json);
    }

    #[test]
    fn test_wire_round_trip_from_provider_json() {
        let provider_json = r#"{
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "abc", "type": "function", "function": {"name": "add_log", "arguments": "{\"message\": \"hi\"}"}}
            ]
        }"#;
        let msg: ChatMessage = serde_json::from_str(provider_json).unwrap();
        let calls = decode_tool_calls(&msg);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["message"], "hi");
    }
}
