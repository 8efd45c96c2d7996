//! Conversation assembly.
//!
//! Callers hand over prior turns as loosely-typed data (they usually come
//! straight out of a client database or request body), so assembly tolerates
//! junk: unknown roles and blank turns are skipped rather than rejected.

use serde::{Deserialize, Serialize};

use crate::llm_client::ChatMessage;

/// One prior turn as supplied by the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            text: text.into(),
        }
    }

    fn is_well_formed(&self) -> bool {
        matches!(self.role.as_str(), "user" | "assistant") && !self.text.trim().is_empty()
    }
}

/// Build the ordered message sequence for one model invocation:
/// system instructions, then the most recent `max_history_turns` well-formed
/// history turns, then the current user message.
///
/// When an image description is present it is appended to the user message as
/// a bracketed system note, so vision context survives text-only endpoints.
pub fn assemble(
    system_instructions: &str,
    history: &[ConversationTurn],
    user_text: &str,
    image_description: Option<&str>,
    max_history_turns: usize,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_instructions)];

    let well_formed: Vec<&ConversationTurn> =
        history.iter().filter(|t| t.is_well_formed()).collect();
    let skipped = history.len() - well_formed.len();
    if skipped > 0 {
        tracing::debug!("Skipped {} malformed history turn(s)", skipped);
    }

    let start = well_formed.len().saturating_sub(max_history_turns);
    for turn in &well_formed[start..] {
        messages.push(ChatMessage {
            role: turn.role.clone(),
            content: Some(turn.text.clone()),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    let user_message = match image_description {
        Some(description) if !description.trim().is_empty() => format!(
            "{}\n\n[System note: the user attached an image. Image analysis: {}]",
            user_text,
            description.trim()
        ),
        _ => user_text.to_string(),
    };
    messages.push(ChatMessage::user(user_message));

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_first_then_history_then_user() {
        let history = vec![
            ConversationTurn::user("hi"),
            ConversationTurn::assistant("hello!"),
        ];
        let messages = assemble("You are a day planner.", &history, "what's next?", None, 20);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content.as_deref(), Some("You are a day planner."));
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content.as_deref(), Some("what's next?"));
    }

    #[test]
    fn test_malformed_turns_are_skipped() {
        let history = vec![
            ConversationTurn {
                role: "narrator".to_string(),
                text: "meanwhile...".to_string(),
            },
            ConversationTurn::user("   "),
            ConversationTurn::assistant("kept"),
        ];
        let messages = assemble("sys", &history, "next", None, 20);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content.as_deref(), Some("kept"));
    }

    #[test]
    fn test_history_bounded_to_most_recent() {
        let history: Vec<ConversationTurn> =
            (0..10).map(|i| ConversationTurn::user(format!("turn {}", i))).collect();
        let messages = assemble("sys", &history, "now", None, 3);

        // system + 3 most recent + current user message
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[1].content.as_deref(), Some("turn 7"));
        assert_eq!(messages[2].content.as_deref(), Some("turn 8"));
        assert_eq!(messages[3].content.as_deref(), Some("turn 9"));
    }

    #[test]
    fn test_bound_applies_after_filtering() {
        let history = vec![
            ConversationTurn::user("old but valid"),
            ConversationTurn {
                role: "junk".to_string(),
                text: "x".to_string(),
            },
            ConversationTurn::user("recent"),
        ];
        let messages = assemble("sys", &history, "now", None, 2);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content.as_deref(), Some("old but valid"));
        assert_eq!(messages[2].content.as_deref(), Some("recent"));
    }

    #[test]
    fn test_image_description_appended_as_note() {
        let messages = assemble("sys", &[], "what is this?", Some("a handwritten recipe"), 20);

        let user = messages.last().unwrap();
        let content = user.content.as_deref().unwrap();
        assert!(content.starts_with("what is this?"));
        assert!(content.contains("[System note: the user attached an image."));
        assert!(content.contains("a handwritten recipe"));
    }

    #[test]
    fn test_blank_image_description_ignored() {
        let messages = assemble("sys", &[], "hello", Some("   "), 20);
        assert_eq!(messages.last().unwrap().content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_empty_history() {
        let messages = assemble("sys", &[], "first message", None, 20);
        assert_eq!(messages.len(), 2);
    }
}
