//! Planner tool surface for function-calling deployments.
//!
//! These tools do not mutate anything. Executing one produces a short
//! conversational confirmation that is fed back to the model; the actual side
//! effect is carried to the embedding application as an [`crate::actions::Action`]
//! derived from the same call. Each tool declares a JSON Schema for its
//! parameters, and the registry generates OpenAI-format function definitions
//! from those schemas.

pub mod planner;

use anyhow::Result;
use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A capability the model may request through function calling.
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Unique name used in function-calling. For planner tools this doubles
    /// as the action kind the call is converted into.
    fn name(&self) -> &str;

    /// Human-readable description shown to the LLM
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    ///
    /// This is used directly in OpenAI-format function definitions.
    fn parameters_schema(&self) -> Value;

    /// Produce the confirmation text fed back to the model.
    async fn execute(&self, args: &Map<String, Value>) -> Result<String>;
}

/// OpenAI-format function definition for LLM function-calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// OpenAI-format tool definition (wraps FunctionDef)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

/// Registry of tools offered to the model.
///
/// Built once at startup and read-only afterwards; registration order is the
/// order definitions are sent in, so prompts stay stable between requests.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        tracing::info!("Registered tool: {}", tool.name());
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate OpenAI-format tool definitions for all registered tools.
    ///
    /// This output can be passed directly to the `tools` parameter
    /// of an OpenAI-compatible chat completions request.
    pub fn tool_definitions(&self) -> Vec<ToolDef> {
        self.tools
            .iter()
            .map(|tool| ToolDef {
                tool_type: "function".to_string(),
                function: FunctionDef {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters_schema(),
                },
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull a clean `HH:MM` time out of noisy model output.
///
/// Models occasionally hand back "around 14:30 or so" where a bare clock time
/// belongs. Returns the first `H:MM`/`HH:MM` match, or the input unchanged
/// when nothing matches: relative phrases like "tomorrow morning" are valid
/// values and must pass through.
pub fn sanitize_time_text(raw: &str) -> String {
    if let Ok(re) = Regex::new(r"\d{1,2}:\d{2}") {
        if let Some(found) = re.find(raw) {
            return found.as_str().to_string();
        }
    }
    raw.to_string()
}
