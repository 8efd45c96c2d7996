//! Action schema registry.
//!
//! Assistant replies can request side effects (schedule changes, profile
//! updates, log entries). Each request arrives as an untyped field map with a
//! `kind` discriminator; the registry checks it against the declared schema
//! for that kind and builds the typed [`Action`]. Anything that does not
//! validate is rejected with a reason so callers can log and drop it instead
//! of failing the whole turn.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const DEFAULT_LOG_LEVEL: &str = "info";

/// A structured side-effect request derived from one assistant turn.
///
/// Actions are returned to the embedding application for execution; this
/// crate never applies them to any store itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Create a schedule item, or update one when `id` is present.
    UpsertScheduleItem {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    /// Set or overwrite one field of the user's profile.
    UpsertProfileField {
        key: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
    },
    /// Append a line to the user's activity log.
    AddLog {
        message: String,
        #[serde(default = "default_log_level")]
        level: String,
    },
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Action {
    /// The wire discriminator for this action.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::UpsertScheduleItem { .. } => "upsert_schedule_item",
            Action::UpsertProfileField { .. } => "upsert_profile_field",
            Action::AddLog { .. } => "add_log",
        }
    }
}

/// Why a candidate action was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRejection {
    UnknownKind,
    MissingRequiredField(&'static str),
    InvalidFieldType(&'static str),
}

impl fmt::Display for ActionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionRejection::UnknownKind => write!(f, "unknown_kind"),
            ActionRejection::MissingRequiredField(name) => {
                write!(f, "missing_required_field: {}", name)
            }
            ActionRejection::InvalidFieldType(name) => {
                write!(f, "invalid_field_type: {}", name)
            }
        }
    }
}

/// Read access to a validated field map. All values are strings by the time
/// a builder sees them, with declared defaults already filled in.
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl Fields<'_> {
    pub fn get(&self, name: &str) -> Option<String> {
        self.map
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Declared schema for one action kind.
///
/// `optional` entries may carry a default that is filled in when the field is
/// absent. `time_fields` marks fields holding clock times, so callers can run
/// time cleanup before validation. `build` turns a validated field map into
/// the typed action; validation guarantees every required field is a string
/// by the time it runs.
pub struct KindSpec {
    pub kind: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [(&'static str, Option<&'static str>)],
    pub time_fields: &'static [&'static str],
    pub build: fn(&Fields) -> Action,
}

/// The closed set of action kinds this deployment accepts.
///
/// Decoding code never matches on kind names; it asks the registry. New kinds
/// are added by registering another [`KindSpec`].
pub struct ActionRegistry {
    kinds: Vec<KindSpec>,
}

impl ActionRegistry {
    /// Registry with the built-in kinds: `upsert_schedule_item`,
    /// `upsert_profile_field`, `add_log`.
    pub fn new() -> Self {
        let mut registry = Self { kinds: Vec::new() };
        registry.register(KindSpec {
            kind: "upsert_schedule_item",
            required: &[],
            optional: &[
                ("id", None),
                ("title", None),
                ("time", None),
                ("description", None),
                ("status", None),
            ],
            time_fields: &["time"],
            build: |fields| Action::UpsertScheduleItem {
                id: fields.get("id"),
                title: fields.get("title"),
                time: fields.get("time"),
                description: fields.get("description"),
                status: fields.get("status"),
            },
        });
        registry.register(KindSpec {
            kind: "upsert_profile_field",
            required: &["key", "value"],
            optional: &[("group", None)],
            time_fields: &[],
            build: |fields| Action::UpsertProfileField {
                key: fields.get("key").unwrap_or_default(),
                value: fields.get("value").unwrap_or_default(),
                group: fields.get("group"),
            },
        });
        registry.register(KindSpec {
            kind: "add_log",
            required: &["message"],
            optional: &[("level", Some(DEFAULT_LOG_LEVEL))],
            time_fields: &[],
            build: |fields| Action::AddLog {
                message: fields.get("message").unwrap_or_default(),
                level: fields
                    .get("level")
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            },
        });
        registry
    }

    pub fn register(&mut self, spec: KindSpec) {
        self.kinds.push(spec);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.spec(kind).is_some()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.kinds.iter().map(|s| s.kind).collect()
    }

    /// Names of the time-valued fields declared for `kind`. Empty when the
    /// kind is unknown or declares none.
    pub fn time_fields(&self, kind: &str) -> &'static [&'static str] {
        self.spec(kind).map(|s| s.time_fields).unwrap_or(&[])
    }

    fn spec(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.iter().find(|s| s.kind == kind)
    }

    /// Validate an untyped field map against the schema for `kind`.
    ///
    /// A required field that is absent, `null`, or non-string rejects the
    /// candidate. An optional field set to `null` is treated as absent.
    /// Fields not declared in the schema are ignored.
    pub fn validate(&self, kind: &str, fields: &Map<String, Value>) -> Result<Action, ActionRejection> {
        let spec = self.spec(kind).ok_or(ActionRejection::UnknownKind)?;

        for name in spec.required {
            match fields.get(*name) {
                None | Some(Value::Null) => {
                    return Err(ActionRejection::MissingRequiredField(name))
                }
                Some(Value::String(_)) => {}
                Some(_) => return Err(ActionRejection::InvalidFieldType(name)),
            }
        }

        let mut normalized = fields.clone();
        for (name, default) in spec.optional {
            match normalized.get(*name) {
                None | Some(Value::Null) => {
                    normalized.remove(*name);
                    if let Some(default) = default {
                        normalized.insert((*name).to_string(), Value::String((*default).to_string()));
                    }
                }
                Some(Value::String(_)) => {}
                Some(_) => return Err(ActionRejection::InvalidFieldType(name)),
            }
        }

        Ok((spec.build)(&Fields { map: &normalized }))
    }

    /// Validate a raw JSON value holding a candidate action object. The
    /// object's `kind` field selects the schema; a non-object value or a
    /// missing/non-string `kind` is an unknown kind.
    pub fn validate_value(&self, value: &Value) -> Result<Action, ActionRejection> {
        let fields = value.as_object().ok_or(ActionRejection::UnknownKind)?;
        let kind = fields
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(ActionRejection::UnknownKind)?;
        self.validate(kind, fields)
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
