//! The built-in planner tools.
//!
//! - `upsert_schedule_item`: create or update an item on today's schedule.
//! - `upsert_profile_field`: set one field of the user's profile.
//! - `add_log`: append a line to the user's activity log.
//!
//! Tool names deliberately match the action kinds they convert into, so a
//! call's name and arguments can be validated by the action registry as-is.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::{AgentTool, ToolRegistry};

fn arg<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub struct ScheduleItemTool;

#[async_trait]
impl AgentTool for ScheduleItemTool {
    fn name(&self) -> &str {
        "upsert_schedule_item"
    }

    fn description(&self) -> &str {
        "Create or update an item on the user's schedule. Pass id to update an \
         existing item; omit it to create a new one."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Identifier of an existing item to update; omit when creating"
                },
                "title": {
                    "type": "string",
                    "description": "Short name of the schedule item"
                },
                "time": {
                    "type": "string",
                    "description": "When it happens, as HH:MM (e.g. 14:30)"
                },
                "description": {
                    "type": "string",
                    "description": "Optional longer detail"
                },
                "status": {
                    "type": "string",
                    "description": "Item status, e.g. pending or done"
                }
            }
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String> {
        let id = arg(args, "id");
        let title = arg(args, "title");
        let time = arg(args, "time");

        let confirmation = match (id, title) {
            (Some(_), Some(title)) => format!("Updated \"{}\".", title),
            (Some(id), None) => format!("Updated schedule item {}.", id),
            (None, Some(title)) => match time {
                Some(time) => format!("Scheduled \"{}\" at {}.", title, time),
                None => format!("Added \"{}\" to the schedule.", title),
            },
            (None, None) => "Noted the schedule change.".to_string(),
        };
        Ok(confirmation)
    }
}

pub struct ProfileFieldTool;

#[async_trait]
impl AgentTool for ProfileFieldTool {
    fn name(&self) -> &str {
        "upsert_profile_field"
    }

    fn description(&self) -> &str {
        "Set or overwrite one field of the user's profile, such as a goal, \
         preference, or personal fact."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": {
                    "type": "string",
                    "description": "Field name, e.g. \"morning_goal\""
                },
                "value": {
                    "type": "string",
                    "description": "Field value"
                },
                "group": {
                    "type": "string",
                    "description": "Optional grouping, e.g. \"health\""
                }
            },
            "required": ["key", "value"]
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String> {
        let key = arg(args, "key");
        let value = arg(args, "value");

        match (key, value) {
            (Some(key), Some(value)) => match arg(args, "group") {
                Some(group) => Ok(format!("Saved {} = {} ({}).", key, value, group)),
                None => Ok(format!("Saved {} = {}.", key, value)),
            },
            (None, _) => anyhow::bail!("Missing required 'key' parameter"),
            (_, None) => anyhow::bail!("Missing required 'value' parameter"),
        }
    }
}

pub struct AddLogTool;

#[async_trait]
impl AgentTool for AddLogTool {
    fn name(&self) -> &str {
        "add_log"
    }

    fn description(&self) -> &str {
        "Record something the user did or reported in their activity log."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "What happened, in one line"
                },
                "level": {
                    "type": "string",
                    "description": "Log level: info (default), warning, or success"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String> {
        let Some(message) = arg(args, "message") else {
            anyhow::bail!("Missing required 'message' parameter");
        };

        match arg(args, "level") {
            Some(level) if level != "info" => Ok(format!("Logged ({}): {}", level, message)),
            _ => Ok(format!("Logged: {}", message)),
        }
    }
}

/// Register the three built-in planner tools.
pub fn register_planner_tools(registry: &mut ToolRegistry) {
    registry.register(Arc::new(ScheduleItemTool));
    registry.register(Arc::new(ProfileFieldTool));
    registry.register(Arc::new(AddLogTool));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_schedule_confirmations() {
        let tool = ScheduleItemTool;

        let out = tool
            .execute(&args(json!({"title": "Dentist", "time": "14:30"})))
            .await
            .unwrap();
        assert_eq!(out, "Scheduled \"Dentist\" at 14:30.");

        let out = tool.execute(&args(json!({"title": "Read"}))).await.unwrap();
        assert_eq!(out, "Added \"Read\" to the schedule.");

        let out = tool
            .execute(&args(json!({"id": "42", "status": "done"})))
            .await
            .unwrap();
        assert_eq!(out, "Updated schedule item 42.");

        let out = tool.execute(&args(json!({}))).await.unwrap();
        assert_eq!(out, "Noted the schedule change.");
    }

    #[tokio::test]
    async fn test_profile_requires_key_and_value() {
        let tool = ProfileFieldTool;

        let out = tool
            .execute(&args(json!({"key": "city", "value": "Oslo"})))
            .await
            .unwrap();
        assert_eq!(out, "Saved city = Oslo.");

        let out = tool
            .execute(&args(json!({"key": "goal", "value": "run", "group": "health"})))
            .await
            .unwrap();
        assert_eq!(out, "Saved goal = run (health).");

        let err = tool.execute(&args(json!({"value": "Oslo"}))).await.unwrap_err();
        assert!(err.to_string().contains("'key'"));

        let err = tool.execute(&args(json!({"key": "city"}))).await.unwrap_err();
        assert!(err.to_string().contains("'value'"));
    }

    #[tokio::test]
    async fn test_add_log_requires_message() {
        let tool = AddLogTool;

        let out = tool
            .execute(&args(json!({"message": "ran 5k"})))
            .await
            .unwrap();
        assert_eq!(out, "Logged: ran 5k");

        let out = tool
            .execute(&args(json!({"message": "skipped workout", "level": "warning"})))
            .await
            .unwrap();
        assert_eq!(out, "Logged (warning): skipped workout");

        assert!(tool.execute(&args(json!({}))).await.is_err());
    }

    #[test]
    fn test_register_planner_tools() {
        let mut registry = ToolRegistry::new();
        register_planner_tools(&mut registry);

        assert_eq!(
            registry.names(),
            vec!["upsert_schedule_item", "upsert_profile_field", "add_log"]
        );
    }
}
