//! Reply decoding.
//!
//! One assistant turn produces an [`AgentReply`]: text for the user plus any
//! validated side-effect actions. Models embed the structured payload in
//! their reply text with varying discipline, so decoding is a ladder of
//! recovery strategies that ends in a plain-text fallback. Decoding never
//! fails; the worst malformed reply still reaches the user as prose.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::{Action, ActionRegistry};

/// JSON key carrying the user-visible message in an embedded payload.
pub const ASSISTANT_TEXT_KEY: &str = "assistant_text";

/// The decoded outcome of one assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    pub assistant_text: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl AgentReply {
    /// A reply carrying only conversational text.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            assistant_text: text.into(),
            actions: Vec::new(),
        }
    }
}

/// Decode normalized reply text into an [`AgentReply`].
///
/// Candidate selection, in order:
/// 1. the inner content of the first fenced code block (```json or bare ```),
/// 2. the whole text, when it starts with `{`.
///
/// A candidate that fails strict JSON parsing gets one recovery attempt: a
/// scan for a minimal balanced object containing the message key. If no
/// candidate exists or recovery fails, the whole text becomes the assistant
/// message verbatim.
pub fn decode_reply(normalized: &str, registry: &ActionRegistry) -> AgentReply {
    let text = normalized.trim();

    let candidate = match extract_fenced_block(text) {
        Some(block) => Some(block),
        None if text.starts_with('{') => Some(text.to_string()),
        None => None,
    };

    let Some(candidate) = candidate else {
        return AgentReply::text_only(text);
    };

    let parsed = serde_json::from_str::<Value>(&candidate)
        .ok()
        .filter(Value::is_object)
        .or_else(|| {
            tracing::debug!("Payload candidate is not strict JSON, trying recovery scan");
            recover_minimal_object(&candidate)
        });

    match parsed {
        Some(value) => reply_from_value(&value, text, registry),
        None => {
            tracing::debug!("No decodable payload in reply, treating it as plain text");
            AgentReply::text_only(text)
        }
    }
}

/// Inner content of the first fenced code block. An optional `json` language
/// tag on the fence is skipped. The content is returned as-is even when it
/// does not look like JSON; the parse and recovery steps decide what to make
/// of it.
fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let end = after.find("```")?;

    let mut inner = after[..end].trim();
    if let Some(tagged) = inner.strip_prefix("json") {
        inner = tagged.trim_start();
    }

    Some(inner.to_string())
}

/// Last-resort scan for a minimal balanced object mentioning the message
/// key, e.g. `{"assistant_text": "...", ...}` buried in trailing junk. Only
/// objects with no nested braces can match, which is exactly the flat shape
/// the payload contract uses.
fn recover_minimal_object(text: &str) -> Option<Value> {
    let pattern = format!(r#"\{{[^{{}}]*"{}"[^{{}}]*\}}"#, ASSISTANT_TEXT_KEY);
    let re = Regex::new(&pattern).ok()?;
    let found = re.find(text)?;
    let value = serde_json::from_str::<Value>(found.as_str()).ok()?;
    value.is_object().then_some(value)
}

fn reply_from_value(value: &Value, normalized: &str, registry: &ActionRegistry) -> AgentReply {
    // A payload object without the message key still yields readable output:
    // the whole normalized reply stands in for the missing text.
    let assistant_text = value
        .get(ASSISTANT_TEXT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| normalized.to_string());

    let mut actions = Vec::new();
    match value.get("actions") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for item in items {
                match registry.validate_value(item) {
                    Ok(action) => actions.push(action),
                    Err(rejection) => {
                        tracing::warn!("Dropping action ({}): {}", rejection, item);
                    }
                }
            }
        }
        Some(other) => {
            tracing::warn!("Ignoring non-array actions field: {}", other);
        }
    }

    AgentReply {
        assistant_text,
        actions,
    }
}
