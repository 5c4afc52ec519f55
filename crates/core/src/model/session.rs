use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, SessionKey, TutorialId, UserId};
use crate::model::preferences::UserPreferences;
use crate::model::question::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    #[error("option {option} does not belong to question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {0} is locked by a submitted check")]
    QuestionLocked(QuestionId),

    #[error("question {0} has not been checked yet")]
    NotChecked(QuestionId),

    #[error("question index {index} out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Verdict bookkeeping for one checked question.
///
/// An entry exists only once the question has been submitted; `submitted` is
/// kept explicit because the backend shape carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedStatus {
    pub submitted: bool,
    pub is_correct: bool,
    pub attempt_count: u32,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// The persisted quiz state for one (user, tutorial) pair.
///
/// All mutation goes through methods so the bookkeeping invariants hold:
/// `answers` and `checked_status` keys always name current questions, and a
/// submitted question's answers are immutable until its entries are cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    user_id: UserId,
    tutorial_id: TutorialId,
    module_title: String,
    context_text: String,
    questions: Vec<Question>,
    answers: BTreeMap<QuestionId, BTreeSet<OptionId>>,
    checked_status: BTreeMap<QuestionId, CheckedStatus>,
    ai_hints: BTreeMap<QuestionId, Option<String>>,
    is_completed: bool,
    score: u32,
    correct_count: u32,
    user_preferences: UserPreferences,
}

impl Session {
    /// Build a fresh session from a quiz fetch: no answers, no verdicts, no
    /// hints, not completed.
    #[must_use]
    pub fn new(
        user_id: UserId,
        tutorial_id: TutorialId,
        module_title: impl Into<String>,
        context_text: impl Into<String>,
        questions: Vec<Question>,
        user_preferences: UserPreferences,
    ) -> Self {
        Self {
            user_id,
            tutorial_id,
            module_title: module_title.into(),
            context_text: context_text.into(),
            questions,
            answers: BTreeMap::new(),
            checked_status: BTreeMap::new(),
            ai_hints: BTreeMap::new(),
            is_completed: false,
            score: 0,
            correct_count: 0,
            user_preferences,
        }
    }

    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.user_id.clone(), self.tutorial_id.clone())
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn tutorial_id(&self) -> &TutorialId {
        &self.tutorial_id
    }

    #[must_use]
    pub fn module_title(&self) -> &str {
        &self.module_title
    }

    #[must_use]
    pub fn context_text(&self) -> &str {
        &self.context_text
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|question| &question.id == id)
    }

    /// Selected option ids for a question; an absent entry reads as empty.
    #[must_use]
    pub fn selected_options(&self, id: &QuestionId) -> BTreeSet<OptionId> {
        self.answers.get(id).cloned().unwrap_or_default()
    }

    /// Whether the student has selected at least one option.
    #[must_use]
    pub fn has_answer(&self, id: &QuestionId) -> bool {
        self.answers.get(id).is_some_and(|set| !set.is_empty())
    }

    #[must_use]
    pub fn checked(&self, id: &QuestionId) -> Option<&CheckedStatus> {
        self.checked_status.get(id)
    }

    #[must_use]
    pub fn is_submitted(&self, id: &QuestionId) -> bool {
        self.checked_status.get(id).is_some_and(|s| s.submitted)
    }

    /// Whether every question carries a verdict entry.
    #[must_use]
    pub fn all_checked(&self) -> bool {
        !self.questions.is_empty()
            && self
                .questions
                .iter()
                .all(|question| self.checked_status.contains_key(&question.id))
    }

    /// The AI (or seeded static) hint for a checked question, if any.
    #[must_use]
    pub fn ai_hint(&self, id: &QuestionId) -> Option<&str> {
        self.ai_hints.get(id).and_then(|hint| hint.as_deref())
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Final score on the 0–100 scale; meaningful only once completed.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn user_preferences(&self) -> &UserPreferences {
        &self.user_preferences
    }

    pub fn set_theme(&mut self, theme: Option<String>) {
        self.user_preferences.set_theme(theme);
    }

    //
    // ─── MUTATIONS ─────────────────────────────────────────────────────────────
    //

    /// Toggle membership of `option` in the answer set for `question`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion`/`UnknownOption` if either id is
    /// foreign, and `SessionError::QuestionLocked` once the question has been
    /// submitted.
    pub fn toggle_answer(
        &mut self,
        question: &QuestionId,
        option: &OptionId,
    ) -> Result<(), SessionError> {
        let Some(found) = self.question(question) else {
            return Err(SessionError::UnknownQuestion(question.clone()));
        };
        if !found.has_option(option) {
            return Err(SessionError::UnknownOption {
                question: question.clone(),
                option: option.clone(),
            });
        }
        if self.is_submitted(question) {
            return Err(SessionError::QuestionLocked(question.clone()));
        }

        let selected = self.answers.entry(question.clone()).or_default();
        if !selected.remove(option) {
            selected.insert(option.clone());
        }
        // Absent entry and empty set are the same thing; keep the blob tidy.
        if selected.is_empty() {
            self.answers.remove(question);
        }
        Ok(())
    }

    /// Record the check verdict for a question and seed its AI-hint slot from
    /// the question's static `hint`, locking the question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion` for a foreign id and
    /// `SessionError::QuestionLocked` if the question was already submitted.
    pub fn record_check(
        &mut self,
        question: &QuestionId,
        is_correct: bool,
    ) -> Result<CheckedStatus, SessionError> {
        let Some(found) = self.question(question) else {
            return Err(SessionError::UnknownQuestion(question.clone()));
        };
        if self.is_submitted(question) {
            return Err(SessionError::QuestionLocked(question.clone()));
        }

        let seed = found.hint.clone();
        let attempt_count = self
            .checked_status
            .get(question)
            .map_or(0, |status| status.attempt_count)
            + 1;

        self.ai_hints.insert(question.clone(), seed);
        let status = CheckedStatus {
            submitted: true,
            is_correct,
            attempt_count,
        };
        self.checked_status.insert(question.clone(), status.clone());
        Ok(status)
    }

    /// Store a generated hint for an already-checked question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotChecked` when no verdict exists yet; hints
    /// only ever accompany checked questions.
    pub fn set_ai_hint(
        &mut self,
        question: &QuestionId,
        hint: impl Into<String>,
    ) -> Result<(), SessionError> {
        if !self.checked_status.contains_key(question) {
            return Err(SessionError::NotChecked(question.clone()));
        }
        self.ai_hints.insert(question.clone(), Some(hint.into()));
        Ok(())
    }

    /// Drop all bookkeeping for a question: answers, verdict, and hint leave
    /// together so the question reads as untouched again.
    pub fn clear_question(&mut self, question: &QuestionId) {
        self.answers.remove(question);
        self.checked_status.remove(question);
        self.ai_hints.remove(question);
    }

    /// Swap in a regenerated question at `index`, clearing the bookkeeping of
    /// the question it replaces.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IndexOutOfRange` when `index` is past the end.
    pub fn replace_question(
        &mut self,
        index: usize,
        question: Question,
    ) -> Result<(), SessionError> {
        let len = self.questions.len();
        let Some(slot) = self.questions.get_mut(index) else {
            return Err(SessionError::IndexOutOfRange { index, len });
        };
        let old_id = slot.id.clone();
        *slot = question;
        self.clear_question(&old_id);
        Ok(())
    }

    /// Mark the session completed with its final score. Overwrites any prior
    /// finalization; the stored verdicts do not change.
    pub fn finalize(&mut self, score: u32, correct_count: u32) {
        self.is_completed = true;
        self.score = score;
        self.correct_count = correct_count;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
