use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// One selectable answer option.
///
/// `is_correct` flags may mark zero, one, or several options of a question as
/// correct; selection semantics are multi-select throughout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

/// A quiz question as delivered by the backend.
///
/// Immutable once fetched; the only mutation the session performs is wholesale
/// replacement when a question is regenerated. `feedback` is the static
/// explanation revealed after checking, `pre_hint` the always-available hint
/// behind the hint toggle, and `hint` seeds the AI-hint slot at check time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub question: String,
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub pre_hint: Option<String>,
}

impl Question {
    /// The ids of all options marked correct, as a set.
    #[must_use]
    pub fn correct_option_ids(&self) -> BTreeSet<OptionId> {
        self.options
            .iter()
            .filter(|option| option.is_correct)
            .map(|option| option.id.clone())
            .collect()
    }

    /// Whether `option_id` names one of this question's options.
    #[must_use]
    pub fn has_option(&self, option_id: &OptionId) -> bool {
        self.options.iter().any(|option| &option.id == option_id)
    }
}
