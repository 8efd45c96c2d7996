//! Response interpretation and action orchestration for a day-planning
//! assistant.
//!
//! The embedding application owns prompts, transport, and storage. This crate
//! owns the model round trip: assemble the conversation, invoke an
//! OpenAI-compatible chat-completions endpoint, and interpret the reply into
//! an [`AgentReply`] of user-facing text plus a validated list of side-effect
//! [`Action`]s. Replies are interpreted either from a JSON payload embedded
//! in the reply text or through native function calling, per
//! [`DecodingStrategy`]. Malformed model output never fails a turn; it
//! degrades to plain text.

pub mod actions;
pub mod agent;
pub mod config;
pub mod conversation;
pub mod decode;
pub mod llm_client;
pub mod normalize;
pub mod runtime;
pub mod tools;

pub use actions::{Action, ActionRegistry, ActionRejection};
pub use agent::Agent;
pub use config::{AssistantConfig, DecodingStrategy};
pub use conversation::ConversationTurn;
pub use decode::AgentReply;
pub use llm_client::{ChatClient, ChatMessage, ModelClient};
pub use runtime::AssistantRuntime;
