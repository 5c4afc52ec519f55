use std::time::Duration;

/// The asynchronous controller actions that hold the busy gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Load,
    Start,
    Navigate,
    Check,
    QuestionReset,
    FullReset,
    Score,
}

/// Minimum visible duration per action kind.
///
/// The gate stays held through the pause, so the presentation layer always
/// observes a stable loading state even when the backend answers instantly.
/// Purely a pacing concern, not a correctness one.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub load: Duration,
    pub start: Duration,
    pub navigate: Duration,
    pub check: Duration,
    pub question_reset: Duration,
    pub full_reset: Duration,
    pub score: Duration,
}

impl Pacing {
    /// The production pacing profile.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            load: Duration::from_millis(500),
            start: Duration::from_millis(800),
            navigate: Duration::from_millis(300),
            check: Duration::from_millis(300),
            question_reset: Duration::from_millis(700),
            full_reset: Duration::from_millis(1000),
            score: Duration::from_millis(1000),
        }
    }

    /// No artificial delays; tests use this.
    #[must_use]
    pub fn none() -> Self {
        Self {
            load: Duration::ZERO,
            start: Duration::ZERO,
            navigate: Duration::ZERO,
            check: Duration::ZERO,
            question_reset: Duration::ZERO,
            full_reset: Duration::ZERO,
            score: Duration::ZERO,
        }
    }

    #[must_use]
    fn duration(&self, kind: ActionKind) -> Duration {
        match kind {
            ActionKind::Load => self.load,
            ActionKind::Start => self.start,
            ActionKind::Navigate => self.navigate,
            ActionKind::Check => self.check,
            ActionKind::QuestionReset => self.question_reset,
            ActionKind::FullReset => self.full_reset,
            ActionKind::Score => self.score,
        }
    }

    /// Sleep out the minimum visible duration for `kind`.
    pub async fn pause(&self, kind: ActionKind) {
        let duration = self.duration(kind);
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::standard()
    }
}
