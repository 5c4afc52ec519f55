//! Answer checking and quiz-wide score aggregation.
//!
//! Pure functions over the model: no I/O, no side effects. The controller
//! calls [`is_question_correct`] at submission time and stores the verdict;
//! [`compute_score`] later trusts those stored verdicts rather than
//! re-deriving them from the current answer sets.

use std::collections::BTreeSet;

use crate::model::{OptionId, Question, Session};

/// Final score for a completed quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSummary {
    /// 0–100, rounded to the nearest integer.
    pub score: u32,
    pub correct_count: u32,
}

/// A submission is correct iff the selected set equals the correct set
/// exactly: no missing correct option, no extra incorrect one.
///
/// A question with zero options marked correct is therefore correct only for
/// an empty selection.
#[must_use]
pub fn is_question_correct(question: &Question, selected: &BTreeSet<OptionId>) -> bool {
    question.correct_option_ids() == *selected
}

/// Aggregate the stored verdicts into a score on the 0–100 scale.
///
/// Idempotent: the session is read, never written, and repeated calls on an
/// unchanged session return the same summary. An empty quiz scores zero.
#[must_use]
pub fn compute_score(session: &Session) -> ScoreSummary {
    let total = session.total_questions();
    let correct_count = session
        .questions()
        .iter()
        .filter(|question| {
            session
                .checked(&question.id)
                .is_some_and(|status| status.is_correct)
        })
        .count();

    // The filter runs over the question list, so the count is bounded by it.
    let correct_count = u32::try_from(correct_count).unwrap_or(u32::MAX);
    let score = if total == 0 {
        0
    } else {
        let ratio = f64::from(correct_count) * 100.0 / total as f64;
        ratio.round() as u32
    };

    ScoreSummary {
        score,
        correct_count,
    }
}
