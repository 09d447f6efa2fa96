//! User profile
//!
//! A free-form JSON object. Every non-empty key is rendered into the
//! prompt context, so users can add whatever they want the assistant to know.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value facts about the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(BTreeMap<String, Value>);

impl Default for UserProfile {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), Value::from("User"));
        fields.insert("location".to_string(), Value::from("Unknown"));
        Self(fields)
    }
}

impl UserProfile {
    /// Load a profile, falling back to defaults when missing or malformed
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(profile) => {
                    tracing::info!(path = %path.display(), "loaded user profile");
                    profile
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "malformed user profile, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no user profile, using defaults");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// How the assistant should address the user
    #[must_use]
    pub fn nickname(&self) -> &str {
        self.get("nickname")
            .or_else(|| self.get("name"))
            .unwrap_or("User")
    }

    /// Reply style preference, if any
    #[must_use]
    pub fn preferences(&self) -> Option<&str> {
        self.get("preferences")
    }

    /// One-line summary for prompts, ending with the presence status
    #[must_use]
    pub fn summary(&self, presence: &str) -> String {
        let mut parts: Vec<String> = self
            .0
            .iter()
            .filter_map(|(key, value)| render_value(value).map(|v| format!("{}: {v}", capitalize(key))))
            .collect();
        parts.push(format!("Current Status: {presence}"));
        parts.join(" | ")
    }
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(render_value)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}
