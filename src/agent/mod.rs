//! The assistant core: one entry point per user turn.
//!
//! A turn is assemble → invoke → interpret: build the message sequence, call
//! the model through [`ModelClient`], and turn whatever came back into an
//! [`AgentReply`] of user-facing text plus validated actions. Interpretation
//! runs in one of two modes. Embedded-JSON mode expects the structured
//! payload inside the reply text and never invokes the model more than once.
//! Tool-call mode offers the planner tools via native function calling and
//! uses at most two invocations: one that may request calls, and one that
//! phrases the closing message after seeing each call's result.
//!
//! Neither mode applies side effects. Actions are handed to the embedding
//! application, which owns all storage.

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::actions::{Action, ActionRegistry};
use crate::config::AssistantConfig;
use crate::conversation::{self, ConversationTurn};
use crate::decode::{decode_reply, AgentReply};
use crate::llm_client::{decode_tool_calls, ChatMessage, ModelClient, ToolCall};
use crate::normalize::normalize_response;
use crate::tools::{sanitize_time_text, ToolRegistry};

pub struct Agent {
    client: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    actions: ActionRegistry,
    config: AssistantConfig,
}

impl Agent {
    pub fn new(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        config: AssistantConfig,
    ) -> Self {
        Self::with_action_registry(client, tools, ActionRegistry::new(), config)
    }

    /// Construct with a custom action registry, for deployments that add
    /// their own action kinds.
    pub fn with_action_registry(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        actions: ActionRegistry,
        config: AssistantConfig,
    ) -> Self {
        Self {
            client,
            tools,
            actions,
            config,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Process one user turn and produce the reply.
    ///
    /// `tool_mode` selects the interpretation mode for this turn; deployments
    /// usually pass `config.strategy.tool_mode()`. Errors surface only for
    /// infrastructure failures (endpoint unreachable, HTTP error status).
    /// A malformed model reply is never an error; it degrades to plain text.
    pub async fn process_turn(
        &self,
        system_instructions: &str,
        history: &[ConversationTurn],
        user_text: &str,
        tool_mode: bool,
    ) -> Result<AgentReply> {
        self.run_turn(system_instructions, history, user_text, None, tool_mode)
            .await
    }

    /// Like [`Agent::process_turn`], with an image analysis produced by a
    /// vision pass attached to the user message.
    pub async fn process_turn_with_image(
        &self,
        system_instructions: &str,
        history: &[ConversationTurn],
        user_text: &str,
        image_description: &str,
        tool_mode: bool,
    ) -> Result<AgentReply> {
        self.run_turn(
            system_instructions,
            history,
            user_text,
            Some(image_description),
            tool_mode,
        )
        .await
    }

    async fn run_turn(
        &self,
        system_instructions: &str,
        history: &[ConversationTurn],
        user_text: &str,
        image_description: Option<&str>,
        tool_mode: bool,
    ) -> Result<AgentReply> {
        let turn_id = Uuid::new_v4();
        let messages = conversation::assemble(
            system_instructions,
            history,
            user_text,
            image_description,
            self.config.max_history_turns,
        );
        tracing::debug!(
            "Turn {}: {} message(s) assembled, tool_mode={}",
            turn_id,
            messages.len(),
            tool_mode
        );

        let reply = if tool_mode {
            self.tool_call_turn(turn_id, messages).await?
        } else {
            self.embedded_json_turn(turn_id, messages).await?
        };

        tracing::debug!(
            "Turn {}: reply carries {} action(s)",
            turn_id,
            reply.actions.len()
        );
        Ok(reply)
    }

    async fn embedded_json_turn(
        &self,
        turn_id: Uuid,
        messages: Vec<ChatMessage>,
    ) -> Result<AgentReply> {
        let reply = self
            .client
            .complete(&messages, None)
            .await
            .context("Model invocation failed")?;

        let raw = reply.content.unwrap_or_default();
        tracing::debug!("Turn {}: raw model reply:\n{}", turn_id, raw);

        let normalized = normalize_response(&raw);
        Ok(decode_reply(&normalized, &self.actions))
    }

    async fn tool_call_turn(
        &self,
        turn_id: Uuid,
        mut messages: Vec<ChatMessage>,
    ) -> Result<AgentReply> {
        let tool_defs = self.tools.tool_definitions();
        let first = self
            .client
            .complete(&messages, Some(&tool_defs))
            .await
            .context("Model invocation failed")?;

        let calls = decode_tool_calls(&first);
        if calls.is_empty() {
            let text = normalize_response(first.content.as_deref().unwrap_or_default());
            return Ok(AgentReply::text_only(text));
        }

        tracing::debug!("Turn {}: model requested {} tool call(s)", turn_id, calls.len());

        let mut actions = Vec::new();
        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            if call.name.is_empty() {
                tracing::warn!("Turn {}: tool call {} has no function name", turn_id, call.call_id);
                results.push(ChatMessage::tool_result(
                    &call.call_id,
                    "Error: tool call carries no function name",
                ));
                continue;
            }
            let Some(tool) = self.tools.get(&call.name) else {
                tracing::warn!("Turn {}: skipping unknown tool '{}'", turn_id, call.name);
                results.push(ChatMessage::tool_result(
                    &call.call_id,
                    format!("Error: unknown tool '{}'", call.name),
                ));
                continue;
            };

            let confirmation = match tool.execute(&call.arguments).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Turn {}: tool '{}' failed: {}", turn_id, call.name, e);
                    format!("Error: {}", e)
                }
            };

            if let Some(action) = self.action_from_call(turn_id, call) {
                actions.push(action);
            }
            results.push(ChatMessage::tool_result(&call.call_id, confirmation));
        }

        // Forward the decoded calls, not the raw wire ones: fabricated ids
        // and degraded argument strings must match what the results reference.
        let mut assistant_message = first;
        assistant_message.tool_calls = Some(calls.iter().map(ToolCall::to_wire).collect());
        messages.push(assistant_message);
        messages.extend(results);

        // Second invocation phrases the closing message. No tools go out, and
        // any calls the model requests anyway are ignored.
        let closing = self
            .client
            .complete(&messages, None)
            .await
            .context("Model invocation failed")?;

        if !decode_tool_calls(&closing).is_empty() {
            tracing::warn!(
                "Turn {}: follow-up reply requested more tool calls; ignoring",
                turn_id
            );
        }

        let text = normalize_response(closing.content.as_deref().unwrap_or_default());
        Ok(AgentReply {
            assistant_text: text,
            actions,
        })
    }

    /// Convert an executed tool call into the action forwarded to the client,
    /// cleaning time-valued arguments first. Calls whose arguments do not
    /// validate against the action schema produce no action.
    fn action_from_call(&self, turn_id: Uuid, call: &ToolCall) -> Option<Action> {
        let mut fields = call.arguments.clone();

        for name in self.actions.time_fields(&call.name) {
            let cleaned = match fields.get(*name) {
                Some(Value::String(raw)) => {
                    let cleaned = sanitize_time_text(raw);
                    (cleaned != *raw).then_some(cleaned)
                }
                _ => None,
            };
            if let Some(cleaned) = cleaned {
                tracing::debug!(
                    "Turn {}: normalized time field '{}' to '{}'",
                    turn_id,
                    name,
                    cleaned
                );
                fields.insert((*name).to_string(), Value::String(cleaned));
            }
        }

        match self.actions.validate(&call.name, &fields) {
            Ok(action) => Some(action),
            Err(rejection) => {
                tracing::warn!(
                    "Turn {}: dropping action from tool call '{}' ({})",
                    turn_id,
                    call.name,
                    rejection
                );
                None
            }
        }
    }
}
