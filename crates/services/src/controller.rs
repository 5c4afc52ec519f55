use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use learncheck_core::Clock;
use learncheck_core::model::{
    OptionId, QuestionId, Session, SessionKey, TutorialId, UserId,
};
use learncheck_core::scoring;
use storage::repository::{SessionRecord, SessionStore};

use crate::gateway::{HintRequest, QuizGateway, QuizPayload};
use crate::pacing::{ActionKind, Pacing};
use crate::view::{QuizSnapshot, Screen, ViewState};

/// Shown when backend metadata does not name the module.
const DEFAULT_MODULE_TITLE: &str = "Learning module";

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// User-facing notification for an action that failed remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    LoadFailed,
    QuestionResetFailed,
    ResetFailed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LoadFailed => write!(f, "failed to load the quiz"),
            Notice::QuestionResetFailed => {
                write!(f, "failed to fetch a replacement question")
            }
            Notice::ResetFailed => write!(f, "failed to reset the quiz"),
        }
    }
}

/// How an action settled. Every action settles: remote failures surface as
/// `Failed(notice)`, never as an `Err` the presentation layer must handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action ran to completion (possibly with degraded enrichment).
    Done,
    /// Dropped: another action holds the busy gate. Re-issue once it clears.
    Busy,
    /// Dropped: a precondition did not hold. No state changed.
    Rejected,
    /// The remote part failed; `Notice` is what the student should see.
    Failed(Notice),
}

//
// ─── BUSY GATE ─────────────────────────────────────────────────────────────────
//

/// RAII hold on the controller's exclusive busy flag.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

struct Inner {
    key: SessionKey,
    epoch: u64,
    session: Option<Session>,
    view: ViewState,
}

/// The quiz session state machine.
///
/// Owns the session and its transient view state, writes the session store,
/// and talks to the gateway. Shared behind `Arc` by the presentation surface;
/// every action takes `&self` and returns an [`ActionOutcome`].
///
/// Concurrency model: one logical thread with suspension at await points.
/// Asynchronous actions serialize through the busy gate; anything arriving
/// while the gate is held is dropped, not queued. The inner mutex only covers
/// synchronous state edits and is never held across an await.
pub struct QuizController {
    gateway: Arc<dyn QuizGateway>,
    store: Arc<dyn SessionStore>,
    clock: Clock,
    pacing: Pacing,
    busy: AtomicBool,
    inner: Mutex<Inner>,
}

impl QuizController {
    #[must_use]
    pub fn new(
        user_id: UserId,
        tutorial_id: TutorialId,
        gateway: Arc<dyn QuizGateway>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            gateway,
            store,
            clock: Clock::default(),
            pacing: Pacing::standard(),
            busy: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                key: SessionKey::new(user_id, tutorial_id),
                epoch: 0,
                session: None,
                view: ViewState::baseline(),
            }),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Edits under the lock are single-step; a poisoned lock still holds
        // consistent state, so keep it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The identity this controller currently serves.
    #[must_use]
    pub fn identity(&self) -> SessionKey {
        self.lock().key.clone()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Immutable copy of the current state for rendering.
    #[must_use]
    pub fn snapshot(&self) -> QuizSnapshot {
        let inner = self.lock();
        QuizSnapshot {
            session: inner.session.clone(),
            view: inner.view,
            busy: self.is_busy(),
        }
    }

    //
    // ─── PERSISTENCE ───────────────────────────────────────────────────────────
    //

    /// Write the whole session blob. Failures are logged, never surfaced: the
    /// in-memory session stays authoritative and the next successful mutating
    /// action rewrites everything.
    async fn persist(&self) {
        let record = {
            let inner = self.lock();
            inner
                .session
                .clone()
                .map(|session| SessionRecord::new(session, self.clock.now()))
        };
        let Some(record) = record else { return };
        if let Err(err) = self.store.write(&record).await {
            log::error!(
                "failed to persist session {}: {err}",
                record.session.key()
            );
        }
    }

    async fn restore_from_store(&self, key: &SessionKey) -> Option<Session> {
        let record = match self.store.read(key).await {
            Ok(record) => record?,
            Err(err) => {
                log::warn!("failed to read stored session {key}: {err}");
                return None;
            }
        };
        let session = record.into_current()?;
        // A blob for another identity or an empty question bank is useless.
        (session.key() == *key && session.total_questions() > 0).then_some(session)
    }

    fn build_session(key: &SessionKey, payload: QuizPayload) -> Session {
        let module_title = payload
            .metadata
            .module_title
            .unwrap_or_else(|| DEFAULT_MODULE_TITLE.to_string());
        let context_text = payload.metadata.context_text.unwrap_or_default();
        Session::new(
            key.user_id().clone(),
            key.tutorial_id().clone(),
            module_title,
            context_text,
            payload.questions,
            payload.user_preferences,
        )
    }

    //
    // ─── ACTIONS ───────────────────────────────────────────────────────────────
    //

    /// Load the session: a valid stored blob wins, otherwise a gateway fetch
    /// builds a fresh session and persists it. Leaves the welcome screen up.
    pub async fn load(&self) -> ActionOutcome {
        let Some(_gate) = BusyGuard::acquire(&self.busy) else {
            return ActionOutcome::Busy;
        };
        let outcome = self.load_inner().await;
        self.pacing.pause(ActionKind::Load).await;
        outcome
    }

    async fn load_inner(&self) -> ActionOutcome {
        let (key, epoch) = {
            let inner = self.lock();
            (inner.key.clone(), inner.epoch)
        };

        if let Some(session) = self.restore_from_store(&key).await {
            let mut inner = self.lock();
            if inner.epoch == epoch {
                inner.session = Some(session);
            }
            return ActionOutcome::Done;
        }

        match self
            .gateway
            .fetch_quiz_data(key.tutorial_id(), key.user_id())
            .await
        {
            Ok(payload) => {
                let session = Self::build_session(&key, payload);
                let stale = {
                    let mut inner = self.lock();
                    if inner.epoch == epoch {
                        inner.session = Some(session);
                        false
                    } else {
                        true
                    }
                };
                if stale {
                    log::warn!("discarding quiz payload fetched for a replaced identity");
                    return ActionOutcome::Done;
                }
                self.persist().await;
                ActionOutcome::Done
            }
            Err(err) => {
                log::error!("failed to load quiz for {key}: {err}");
                ActionOutcome::Failed(Notice::LoadFailed)
            }
        }
    }

    /// Leave the welcome screen for the first question, loading first if no
    /// usable session is in memory yet.
    pub async fn start_quiz(&self) -> ActionOutcome {
        let Some(_gate) = BusyGuard::acquire(&self.busy) else {
            return ActionOutcome::Busy;
        };

        let epoch = self.lock().epoch;
        let needs_load = {
            let inner = self.lock();
            !inner
                .session
                .as_ref()
                .is_some_and(|session| session.total_questions() > 0)
        };
        let mut outcome = ActionOutcome::Done;
        if needs_load {
            if let ActionOutcome::Failed(notice) = self.load_inner().await {
                outcome = ActionOutcome::Failed(notice);
            }
        }

        if outcome == ActionOutcome::Done {
            let mut inner = self.lock();
            let has_questions = inner
                .session
                .as_ref()
                .is_some_and(|session| session.total_questions() > 0);
            if inner.epoch != epoch || !has_questions {
                outcome = ActionOutcome::Rejected;
            } else {
                inner.view = ViewState {
                    screen: Screen::InProgress,
                    current_index: 0,
                    hint_visible: false,
                };
            }
        }

        self.pacing.pause(ActionKind::Start).await;
        outcome
    }

    /// Toggle an option in the answer set of a question. A no-op while busy
    /// and for submitted (locked) questions.
    pub async fn select_answer(&self, question: &QuestionId, option: &OptionId) -> ActionOutcome {
        if self.is_busy() {
            return ActionOutcome::Busy;
        }
        {
            let mut inner = self.lock();
            let Some(session) = inner.session.as_mut() else {
                return ActionOutcome::Rejected;
            };
            if let Err(err) = session.toggle_answer(question, option) {
                log::debug!("ignoring answer toggle: {err}");
                return ActionOutcome::Rejected;
            }
        }
        self.persist().await;
        ActionOutcome::Done
    }

    /// Advance to the next question, hiding any open hint.
    pub async fn next(&self) -> ActionOutcome {
        let Some(_gate) = BusyGuard::acquire(&self.busy) else {
            return ActionOutcome::Busy;
        };
        let outcome = {
            let mut inner = self.lock();
            let total = inner
                .session
                .as_ref()
                .map_or(0, Session::total_questions);
            if total == 0 || inner.view.current_index + 1 >= total {
                ActionOutcome::Rejected
            } else {
                inner.view.current_index += 1;
                inner.view.hint_visible = false;
                ActionOutcome::Done
            }
        };
        self.pacing.pause(ActionKind::Navigate).await;
        outcome
    }

    /// Step back to the previous question, hiding any open hint.
    pub async fn prev(&self) -> ActionOutcome {
        let Some(_gate) = BusyGuard::acquire(&self.busy) else {
            return ActionOutcome::Busy;
        };
        let outcome = {
            let mut inner = self.lock();
            if inner.view.current_index == 0 {
                ActionOutcome::Rejected
            } else {
                inner.view.current_index -= 1;
                inner.view.hint_visible = false;
                ActionOutcome::Done
            }
        };
        self.pacing.pause(ActionKind::Navigate).await;
        outcome
    }

    /// Flip hint visibility. Pure view state, so the gate is not consulted.
    pub fn toggle_hint(&self) -> ActionOutcome {
        let mut inner = self.lock();
        inner.view.hint_visible = !inner.view.hint_visible;
        ActionOutcome::Done
    }

    /// Check the current question: write the verdict synchronously, lock the
    /// question, then try a best-effort AI hint when the answer is wrong and
    /// no static hint exists.
    pub async fn check_answer(&self) -> ActionOutcome {
        let Some(_gate) = BusyGuard::acquire(&self.busy) else {
            return ActionOutcome::Busy;
        };
        let outcome = self.check_answer_inner().await;
        self.pacing.pause(ActionKind::Check).await;
        outcome
    }

    async fn check_answer_inner(&self) -> ActionOutcome {
        // Phase 1: the verdict, written before anything remote happens.
        let (epoch, hint_request) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let epoch = inner.epoch;
            let index = inner.view.current_index;
            let Some(session) = inner.session.as_mut() else {
                return ActionOutcome::Rejected;
            };
            let Some(question) = session.question_at(index).cloned() else {
                return ActionOutcome::Rejected;
            };
            if session.is_submitted(&question.id) {
                return ActionOutcome::Rejected;
            }

            let selected = session.selected_options(&question.id);
            let is_correct = scoring::is_question_correct(&question, &selected);
            if let Err(err) = session.record_check(&question.id, is_correct) {
                log::warn!("check bookkeeping rejected: {err}");
                return ActionOutcome::Rejected;
            }
            inner.view.hint_visible = false;

            let request = (!is_correct && question.hint.is_none()).then(|| HintRequest {
                tutorial_id: session.tutorial_id().clone(),
                question_id: question.id.clone(),
                question: question.question.clone(),
                context_text: session.context_text().to_string(),
                student_answer: selected.into_iter().collect(),
                options: question.options.clone(),
            });
            (epoch, request)
        };

        self.persist().await;

        // Phase 2: enrichment. Failures degrade to "no AI hint"; a result for
        // a replaced identity is discarded.
        let Some(request) = hint_request else {
            return ActionOutcome::Done;
        };
        match self.gateway.generate_hint(&request).await {
            Ok(hint) => {
                let applied = {
                    let mut inner = self.lock();
                    if inner.epoch != epoch {
                        false
                    } else if let Some(session) = inner.session.as_mut() {
                        match session.set_ai_hint(&request.question_id, hint) {
                            Ok(()) => true,
                            Err(err) => {
                                log::warn!("dropping generated hint: {err}");
                                false
                            }
                        }
                    } else {
                        false
                    }
                };
                if applied {
                    self.persist().await;
                } else {
                    log::warn!(
                        "discarding hint generated for question {} of a replaced session",
                        request.question_id
                    );
                }
            }
            Err(err) => {
                log::warn!(
                    "hint generation failed for question {}: {err}",
                    request.question_id
                );
            }
        }
        ActionOutcome::Done
    }

    /// Regenerate the question on screen. On success the replacement slots in
    /// and the old bookkeeping goes; on failure the bookkeeping still goes so
    /// the student is never stuck on a locked, unregenerated question.
    pub async fn reset_current_question(&self) -> ActionOutcome {
        let Some(_gate) = BusyGuard::acquire(&self.busy) else {
            return ActionOutcome::Busy;
        };
        let outcome = self.reset_current_inner().await;
        self.pacing.pause(ActionKind::QuestionReset).await;
        outcome
    }

    async fn reset_current_inner(&self) -> ActionOutcome {
        let (epoch, key, index, question_id) = {
            let inner = self.lock();
            let Some(session) = inner.session.as_ref() else {
                return ActionOutcome::Rejected;
            };
            let index = inner.view.current_index;
            let Some(question) = session.question_at(index) else {
                return ActionOutcome::Rejected;
            };
            (inner.epoch, inner.key.clone(), index, question.id.clone())
        };

        match self
            .gateway
            .reset_single_question(key.tutorial_id(), key.user_id(), index)
            .await
        {
            Ok(replacement) => {
                let applied = {
                    let mut guard = self.lock();
                    let inner = &mut *guard;
                    if inner.epoch != epoch {
                        false
                    } else if let Some(session) = inner.session.as_mut() {
                        match session.replace_question(index, replacement) {
                            Ok(()) => {
                                inner.view.hint_visible = false;
                                true
                            }
                            Err(err) => {
                                log::warn!("could not apply regenerated question: {err}");
                                false
                            }
                        }
                    } else {
                        false
                    }
                };
                if applied {
                    self.persist().await;
                } else {
                    log::warn!("discarding regenerated question for a replaced session");
                }
                ActionOutcome::Done
            }
            Err(err) => {
                log::error!("failed to regenerate question {question_id}: {err}");
                let cleared = {
                    let mut guard = self.lock();
                    let inner = &mut *guard;
                    if inner.epoch != epoch {
                        false
                    } else if let Some(session) = inner.session.as_mut() {
                        session.clear_question(&question_id);
                        inner.view.hint_visible = false;
                        true
                    } else {
                        false
                    }
                };
                if cleared {
                    self.persist().await;
                }
                ActionOutcome::Failed(Notice::QuestionResetFailed)
            }
        }
    }

    /// Reset the whole quiz server-side, drop the stored blob, and reload
    /// fresh. The theme preference survives the reload; the welcome screen
    /// comes back whether or not the backend cooperated.
    pub async fn reset_all(&self) -> ActionOutcome {
        let Some(_gate) = BusyGuard::acquire(&self.busy) else {
            return ActionOutcome::Busy;
        };
        let outcome = self.reset_all_inner().await;
        self.pacing.pause(ActionKind::FullReset).await;
        outcome
    }

    async fn reset_all_inner(&self) -> ActionOutcome {
        let (epoch, key, theme) = {
            let inner = self.lock();
            let theme = inner
                .session
                .as_ref()
                .and_then(|session| session.user_preferences().theme())
                .map(str::to_string);
            (inner.epoch, inner.key.clone(), theme)
        };

        let result = self
            .gateway
            .reset_all_questions(key.tutorial_id(), key.user_id())
            .await;

        {
            let mut inner = self.lock();
            if inner.epoch == epoch {
                inner.view = ViewState::baseline();
            }
        }

        match result {
            Ok(()) => {
                if let Err(err) = self.store.clear(&key).await {
                    log::warn!("failed to clear stored session {key}: {err}");
                }
                {
                    let mut inner = self.lock();
                    if inner.epoch == epoch {
                        inner.session = None;
                    }
                }
                if let ActionOutcome::Failed(_) = self.load_inner().await {
                    return ActionOutcome::Failed(Notice::ResetFailed);
                }
                if let Some(theme) = theme {
                    let restored = {
                        let mut inner = self.lock();
                        if inner.epoch == epoch {
                            if let Some(session) = inner.session.as_mut() {
                                session.set_theme(Some(theme));
                                true
                            } else {
                                false
                            }
                        } else {
                            false
                        }
                    };
                    if restored {
                        self.persist().await;
                    }
                }
                ActionOutcome::Done
            }
            Err(err) => {
                log::error!("full reset failed for {key}: {err}");
                ActionOutcome::Failed(Notice::ResetFailed)
            }
        }
    }

    /// Finalize and show the score. Requires a verdict on every question;
    /// otherwise nothing changes.
    pub async fn view_score(&self) -> ActionOutcome {
        let Some(_gate) = BusyGuard::acquire(&self.busy) else {
            return ActionOutcome::Busy;
        };
        let outcome = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            match inner.session.as_mut() {
                Some(session) if session.all_checked() => {
                    let summary = scoring::compute_score(session);
                    session.finalize(summary.score, summary.correct_count);
                    inner.view.screen = Screen::Results;
                    inner.view.hint_visible = false;
                    ActionOutcome::Done
                }
                _ => ActionOutcome::Rejected,
            }
        };
        if outcome == ActionOutcome::Done {
            self.persist().await;
        }
        self.pacing.pause(ActionKind::Score).await;
        outcome
    }

    /// Back from the results screen to the first question. The persisted
    /// session (including its finalized score) is untouched.
    pub fn exit_to_first_question(&self) -> ActionOutcome {
        let mut inner = self.lock();
        if inner.view.screen != Screen::Results {
            return ActionOutcome::Rejected;
        }
        inner.view = ViewState {
            screen: Screen::InProgress,
            current_index: 0,
            hint_visible: false,
        };
        ActionOutcome::Done
    }

    /// Point the controller at a different (user, tutorial) pair.
    ///
    /// Deliberately bypasses the busy gate: identity changes come from
    /// outside the quiz (a navigation event), and the epoch bump makes any
    /// still-running action discard its result instead of writing into the
    /// new session. The caller re-issues `load()` afterwards.
    pub fn switch_identity(&self, user_id: UserId, tutorial_id: TutorialId) -> ActionOutcome {
        let key = SessionKey::new(user_id, tutorial_id);
        let mut inner = self.lock();
        if inner.key == key {
            return ActionOutcome::Rejected;
        }
        inner.key = key;
        inner.epoch += 1;
        inner.session = None;
        inner.view = ViewState::baseline();
        ActionOutcome::Done
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
