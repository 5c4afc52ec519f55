use learncheck_core::model::{Question, Session};

/// Which surface the student is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Welcome,
    InProgress,
    Results,
}

/// Transient per-session view state. Never persisted; reset to the baseline
/// whenever the (user, tutorial) identity changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    pub(crate) screen: Screen,
    pub(crate) current_index: usize,
    pub(crate) hint_visible: bool,
}

impl ViewState {
    /// Welcome screen, first question, hint hidden.
    #[must_use]
    pub fn baseline() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        self.screen
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn hint_visible(&self) -> bool {
        self.hint_visible
    }
}

/// Presentation-agnostic controller snapshot.
///
/// This is intentionally **not** a UI view-model:
/// - no pre-formatted strings
/// - no theming decisions
///
/// The presentation surface reads these fields and flags and renders however
/// it likes; mutation happens only through controller actions.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSnapshot {
    pub session: Option<Session>,
    pub view: ViewState,
    pub busy: bool,
}

impl QuizSnapshot {
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.session.as_ref().map_or(0, Session::total_questions)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.session
            .as_ref()
            .and_then(|session| session.question_at(self.view.current_index))
    }

    #[must_use]
    pub fn is_first_question(&self) -> bool {
        self.view.current_index == 0
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        let total = self.total_questions();
        total > 0 && self.view.current_index == total - 1
    }

    /// Whether the question on screen has been submitted and locked.
    #[must_use]
    pub fn current_submitted(&self) -> bool {
        match (&self.session, self.current_question()) {
            (Some(session), Some(question)) => session.is_submitted(&question.id),
            _ => false,
        }
    }

    /// Whether the question on screen has at least one selected option.
    #[must_use]
    pub fn current_answered(&self) -> bool {
        match (&self.session, self.current_question()) {
            (Some(session), Some(question)) => session.has_answer(&question.id),
            _ => false,
        }
    }

    /// Whether every question carries a verdict, i.e. the score is viewable.
    #[must_use]
    pub fn all_checked(&self) -> bool {
        self.session.as_ref().is_some_and(Session::all_checked)
    }
}
