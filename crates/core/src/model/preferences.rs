use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-user presentation preferences delivered alongside the quiz.
///
/// The backend owns this shape; only `theme` is interpreted here (it survives
/// a full reset). Everything else is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    theme: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl UserPreferences {
    #[must_use]
    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    pub fn set_theme(&mut self, theme: Option<String>) {
        self.theme = theme;
    }
}
