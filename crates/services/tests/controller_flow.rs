use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use learncheck_core::Clock;
use learncheck_core::model::{
    OptionId, Question, QuestionId, QuestionOption, SessionKey, TutorialId, UserId,
    UserPreferences,
};
use learncheck_core::time::fixed_now;
use services::error::GatewayError;
use services::gateway::{HintRequest, QuizGateway, QuizMetadata, QuizPayload};
use services::{ActionOutcome, Notice, Pacing, QuizController, Screen};
use storage::repository::{InMemorySessionStore, SessionRecord, SessionStore};

//
// ─── STUB GATEWAY ──────────────────────────────────────────────────────────────
//

/// Hand-written gateway double: canned responses, failure switches, call
/// counters, and optional gates that hold a call open until notified.
#[derive(Default)]
struct StubGateway {
    questions: Vec<Question>,
    replacement: Option<Question>,
    hint: Option<String>,
    theme: Option<String>,
    fail_fetch: bool,
    fail_hint: bool,
    fail_reset_single: bool,
    fail_reset_all: bool,
    fetch_gate: Option<Arc<Notify>>,
    hint_gate: Option<Arc<Notify>>,
    fetch_calls: AtomicUsize,
    hint_calls: AtomicUsize,
    reset_single_calls: AtomicUsize,
    reset_all_calls: AtomicUsize,
}

#[async_trait]
impl QuizGateway for StubGateway {
    async fn fetch_quiz_data(
        &self,
        _tutorial_id: &TutorialId,
        _user_id: &UserId,
    ) -> Result<QuizPayload, GatewayError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.fetch_gate {
            gate.notified().await;
        }
        if self.fail_fetch {
            return Err(GatewayError::EmptyPayload);
        }
        let mut user_preferences = UserPreferences::default();
        user_preferences.set_theme(self.theme.clone());
        Ok(QuizPayload {
            questions: self.questions.clone(),
            metadata: QuizMetadata {
                module_title: Some("Stub module".into()),
                context_text: Some("Stub context".into()),
            },
            user_preferences,
        })
    }

    async fn generate_hint(&self, _request: &HintRequest) -> Result<String, GatewayError> {
        self.hint_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.hint_gate {
            gate.notified().await;
        }
        if self.fail_hint {
            return Err(GatewayError::EmptyPayload);
        }
        Ok(self.hint.clone().unwrap_or_else(|| "try again".into()))
    }

    async fn reset_single_question(
        &self,
        _tutorial_id: &TutorialId,
        _user_id: &UserId,
        _question_index: usize,
    ) -> Result<Question, GatewayError> {
        self.reset_single_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reset_single {
            return Err(GatewayError::EmptyPayload);
        }
        self.replacement.clone().ok_or(GatewayError::EmptyPayload)
    }

    async fn reset_all_questions(
        &self,
        _tutorial_id: &TutorialId,
        _user_id: &UserId,
    ) -> Result<(), GatewayError> {
        self.reset_all_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reset_all {
            return Err(GatewayError::EmptyPayload);
        }
        Ok(())
    }
}

//
// ─── HELPERS ───────────────────────────────────────────────────────────────────
//

fn build_question(id: &str, static_hint: Option<&str>) -> Question {
    Question {
        id: QuestionId::new(id),
        question: format!("question {id}"),
        options: vec![
            QuestionOption {
                id: OptionId::new(format!("{id}-a")),
                text: "right".into(),
                is_correct: true,
            },
            QuestionOption {
                id: OptionId::new(format!("{id}-b")),
                text: "wrong".into(),
                is_correct: false,
            },
        ],
        feedback: "explained".into(),
        hint: static_hint.map(str::to_string),
        pre_hint: None,
    }
}

fn three_questions() -> Vec<Question> {
    vec![
        build_question("q1", None),
        build_question("q2", None),
        build_question("q3", None),
    ]
}

fn qid(id: &str) -> QuestionId {
    QuestionId::new(id)
}

fn oid(question: &str, option: &str) -> OptionId {
    OptionId::new(format!("{question}-{option}"))
}

fn setup(gateway: StubGateway) -> (Arc<QuizController>, Arc<StubGateway>, InMemorySessionStore) {
    let gateway = Arc::new(gateway);
    let store = InMemorySessionStore::new();
    let controller = QuizController::new(
        UserId::new("u1"),
        TutorialId::new("t1"),
        gateway.clone(),
        Arc::new(store.clone()),
    )
    .with_pacing(Pacing::none())
    .with_clock(Clock::fixed(fixed_now()));
    (Arc::new(controller), gateway, store)
}

async fn start_quiz(controller: &QuizController) {
    assert_eq!(controller.load().await, ActionOutcome::Done);
    assert_eq!(controller.start_quiz().await, ActionOutcome::Done);
}

//
// ─── LOAD & START ──────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn load_fetches_and_persists_when_store_is_empty() {
    let (controller, gateway, store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });

    assert_eq!(controller.load().await, ActionOutcome::Done);
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);

    let snapshot = controller.snapshot();
    let session = snapshot.session.as_ref().expect("session loaded");
    assert_eq!(session.module_title(), "Stub module");
    assert_eq!(session.total_questions(), 3);
    assert!(!session.is_completed());
    assert_eq!(snapshot.view.screen(), Screen::Welcome);

    let key = SessionKey::new(UserId::new("u1"), TutorialId::new("t1"));
    assert!(store.read(&key).await.unwrap().is_some());
}

#[tokio::test]
async fn load_prefers_a_valid_stored_session() {
    let (controller, gateway, store) = setup(StubGateway::default());

    let mut stored = learncheck_core::model::Session::new(
        UserId::new("u1"),
        TutorialId::new("t1"),
        "Stored module",
        "Stored context",
        three_questions(),
        UserPreferences::default(),
    );
    stored.toggle_answer(&qid("q1"), &oid("q1", "a")).unwrap();
    store
        .write(&SessionRecord::new(stored, fixed_now()))
        .await
        .unwrap();

    assert_eq!(controller.load().await, ActionOutcome::Done);
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 0);

    let snapshot = controller.snapshot();
    let session = snapshot.session.as_ref().expect("restored");
    assert_eq!(session.module_title(), "Stored module");
    assert!(session.has_answer(&qid("q1")));
}

#[tokio::test]
async fn load_failure_leaves_no_partial_session() {
    let (controller, _gateway, store) = setup(StubGateway {
        fail_fetch: true,
        ..StubGateway::default()
    });

    assert_eq!(
        controller.load().await,
        ActionOutcome::Failed(Notice::LoadFailed)
    );
    assert!(controller.snapshot().session.is_none());
    assert!(!controller.is_busy());

    let key = SessionKey::new(UserId::new("u1"), TutorialId::new("t1"));
    assert!(store.read(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn start_quiz_enters_the_first_question() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });

    start_quiz(&controller).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.view.screen(), Screen::InProgress);
    assert_eq!(snapshot.view.current_index(), 0);
    assert!(snapshot.is_first_question());
}

#[tokio::test]
async fn start_quiz_rejects_an_empty_question_bank() {
    let (controller, _gateway, _store) = setup(StubGateway::default());

    assert_eq!(controller.start_quiz().await, ActionOutcome::Rejected);
    assert_eq!(controller.snapshot().view.screen(), Screen::Welcome);
}

//
// ─── ANSWER SELECTION ──────────────────────────────────────────────────────────
//

#[tokio::test]
async fn toggling_an_option_twice_restores_the_answer_set() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    let before = controller
        .snapshot()
        .session
        .as_ref()
        .unwrap()
        .selected_options(&qid("q1"));

    assert_eq!(
        controller.select_answer(&qid("q1"), &oid("q1", "a")).await,
        ActionOutcome::Done
    );
    assert_eq!(
        controller.select_answer(&qid("q1"), &oid("q1", "a")).await,
        ActionOutcome::Done
    );

    let after = controller
        .snapshot()
        .session
        .as_ref()
        .unwrap()
        .selected_options(&qid("q1"));
    assert_eq!(before, after);
    assert!(after.is_empty());
}

#[tokio::test]
async fn submitted_question_ignores_further_selection() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "a")).await;
    assert_eq!(controller.check_answer().await, ActionOutcome::Done);

    assert_eq!(
        controller.select_answer(&qid("q1"), &oid("q1", "b")).await,
        ActionOutcome::Rejected
    );

    let session = controller.snapshot().session.unwrap();
    let selected = session.selected_options(&qid("q1"));
    assert!(selected.contains(&oid("q1", "a")));
    assert!(!selected.contains(&oid("q1", "b")));
}

#[tokio::test]
async fn answers_survive_a_new_controller_over_the_same_store() {
    let (controller, gateway, store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;
    controller.select_answer(&qid("q2"), &oid("q2", "b")).await;

    let revived = QuizController::new(
        UserId::new("u1"),
        TutorialId::new("t1"),
        gateway.clone(),
        Arc::new(store.clone()),
    )
    .with_pacing(Pacing::none());

    assert_eq!(revived.load().await, ActionOutcome::Done);
    let session = revived.snapshot().session.unwrap();
    assert!(session.selected_options(&qid("q2")).contains(&oid("q2", "b")));
    // One fetch from the first controller; the revival came from the store.
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);
}

//
// ─── CHECKING ──────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn correct_answer_records_verdict_without_hint_fetch() {
    let (controller, gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "a")).await;
    assert_eq!(controller.check_answer().await, ActionOutcome::Done);

    let session = controller.snapshot().session.unwrap();
    let status = session.checked(&qid("q1")).expect("verdict recorded");
    assert!(status.submitted);
    assert!(status.is_correct);
    assert_eq!(status.attempt_count, 1);
    assert!(session.ai_hint(&qid("q1")).is_none());
    assert_eq!(gateway.hint_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn incorrect_answer_without_static_hint_fetches_one() {
    let (controller, gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        hint: Some("reread the lesson".into()),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "b")).await;
    assert_eq!(controller.check_answer().await, ActionOutcome::Done);

    let session = controller.snapshot().session.unwrap();
    let status = session.checked(&qid("q1")).expect("verdict recorded");
    assert!(!status.is_correct);
    assert_eq!(gateway.hint_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.ai_hint(&qid("q1")), Some("reread the lesson"));
}

#[tokio::test]
async fn incorrect_answer_with_static_hint_skips_the_fetch() {
    let (controller, gateway, _store) = setup(StubGateway {
        questions: vec![build_question("q1", Some("think parity"))],
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "b")).await;
    assert_eq!(controller.check_answer().await, ActionOutcome::Done);

    let session = controller.snapshot().session.unwrap();
    assert_eq!(gateway.hint_calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.ai_hint(&qid("q1")), Some("think parity"));
}

#[tokio::test]
async fn hint_failure_degrades_to_no_hint() {
    let (controller, gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        fail_hint: true,
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "b")).await;
    // Not a failure from the student's point of view.
    assert_eq!(controller.check_answer().await, ActionOutcome::Done);

    let session = controller.snapshot().session.unwrap();
    assert_eq!(gateway.hint_calls.load(Ordering::SeqCst), 1);
    assert!(session.checked(&qid("q1")).is_some());
    assert!(session.ai_hint(&qid("q1")).is_none());
}

#[tokio::test]
async fn checking_twice_is_rejected() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "a")).await;
    assert_eq!(controller.check_answer().await, ActionOutcome::Done);
    assert_eq!(controller.check_answer().await, ActionOutcome::Rejected);

    let session = controller.snapshot().session.unwrap();
    assert_eq!(session.checked(&qid("q1")).unwrap().attempt_count, 1);
}

//
// ─── BUSY GATE ─────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn busy_gate_drops_actions_instead_of_queuing() {
    let gate = Arc::new(Notify::new());
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        fetch_gate: Some(gate.clone()),
        ..StubGateway::default()
    });

    let loading = tokio::spawn({
        let controller = controller.clone();
        async move { controller.load().await }
    });
    while !controller.is_busy() {
        tokio::task::yield_now().await;
    }

    let before = controller.snapshot();
    assert_eq!(
        controller.select_answer(&qid("q1"), &oid("q1", "a")).await,
        ActionOutcome::Busy
    );
    assert_eq!(controller.next().await, ActionOutcome::Busy);
    assert_eq!(controller.check_answer().await, ActionOutcome::Busy);
    assert_eq!(controller.reset_all().await, ActionOutcome::Busy);
    assert_eq!(before, controller.snapshot());

    gate.notify_one();
    assert_eq!(loading.await.unwrap(), ActionOutcome::Done);
    assert!(!controller.is_busy());
}

//
// ─── NAVIGATION ────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn navigation_is_bounded_and_hides_the_hint() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    assert_eq!(controller.prev().await, ActionOutcome::Rejected);

    controller.toggle_hint();
    assert!(controller.snapshot().view.hint_visible());

    assert_eq!(controller.next().await, ActionOutcome::Done);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.view.current_index(), 1);
    assert!(!snapshot.view.hint_visible());

    assert_eq!(controller.next().await, ActionOutcome::Done);
    assert_eq!(controller.next().await, ActionOutcome::Rejected);
    assert!(controller.snapshot().is_last_question());

    assert_eq!(controller.prev().await, ActionOutcome::Done);
    assert_eq!(controller.snapshot().view.current_index(), 1);
}

//
// ─── SCORING ───────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn view_score_requires_every_question_checked() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "a")).await;
    controller.check_answer().await;
    controller.next().await;
    controller.select_answer(&qid("q2"), &oid("q2", "b")).await;
    controller.check_answer().await;

    assert_eq!(controller.view_score().await, ActionOutcome::Rejected);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.view.screen(), Screen::InProgress);
    assert!(!snapshot.session.as_ref().unwrap().is_completed());

    controller.next().await;
    controller.select_answer(&qid("q3"), &oid("q3", "a")).await;
    controller.check_answer().await;

    assert_eq!(controller.view_score().await, ActionOutcome::Done);
    let snapshot = controller.snapshot();
    let session = snapshot.session.as_ref().unwrap();
    assert_eq!(snapshot.view.screen(), Screen::Results);
    assert!(session.is_completed());
    assert_eq!(session.correct_count(), 2);
    assert_eq!(session.score(), 67);
}

#[tokio::test]
async fn exit_to_first_question_only_leaves_the_results_screen() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: vec![build_question("q1", None)],
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    assert_eq!(controller.exit_to_first_question(), ActionOutcome::Rejected);

    controller.select_answer(&qid("q1"), &oid("q1", "a")).await;
    controller.check_answer().await;
    assert_eq!(controller.view_score().await, ActionOutcome::Done);

    assert_eq!(controller.exit_to_first_question(), ActionOutcome::Done);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.view.screen(), Screen::InProgress);
    assert_eq!(snapshot.view.current_index(), 0);
    // The finalized score stays on the persisted session.
    assert!(snapshot.session.as_ref().unwrap().is_completed());
}

//
// ─── RESETS ────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn reset_current_question_swaps_in_the_replacement() {
    let (controller, gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        replacement: Some(build_question("q1-new", None)),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "a")).await;
    controller.check_answer().await;

    assert_eq!(
        controller.reset_current_question().await,
        ActionOutcome::Done
    );
    assert_eq!(gateway.reset_single_calls.load(Ordering::SeqCst), 1);

    let session = controller.snapshot().session.unwrap();
    assert_eq!(session.question_at(0).unwrap().id, qid("q1-new"));
    assert!(session.checked(&qid("q1")).is_none());
    assert!(session.selected_options(&qid("q1")).is_empty());

    // The regenerated question restarts its attempt counter.
    controller
        .select_answer(&qid("q1-new"), &oid("q1-new", "a"))
        .await;
    controller.check_answer().await;
    let session = controller.snapshot().session.unwrap();
    assert_eq!(session.checked(&qid("q1-new")).unwrap().attempt_count, 1);
}

#[tokio::test]
async fn reset_current_question_failure_still_unlocks_the_question() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        fail_reset_single: true,
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "a")).await;
    controller.check_answer().await;

    assert_eq!(
        controller.reset_current_question().await,
        ActionOutcome::Failed(Notice::QuestionResetFailed)
    );

    let session = controller.snapshot().session.unwrap();
    // Answers and verdict are gone together; the question itself stayed.
    assert_eq!(session.question_at(0).unwrap().id, qid("q1"));
    assert!(session.checked(&qid("q1")).is_none());
    assert!(session.selected_options(&qid("q1")).is_empty());

    // And the student can answer again.
    assert_eq!(
        controller.select_answer(&qid("q1"), &oid("q1", "b")).await,
        ActionOutcome::Done
    );
}

#[tokio::test]
async fn reset_all_reloads_fresh_and_preserves_the_theme() {
    let (controller, gateway, store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });

    // The stored session carries a theme the backend no longer sends.
    let mut stored = learncheck_core::model::Session::new(
        UserId::new("u1"),
        TutorialId::new("t1"),
        "Stored module",
        "Stored context",
        three_questions(),
        UserPreferences::default(),
    );
    stored.set_theme(Some("dark".into()));
    stored.toggle_answer(&qid("q1"), &oid("q1", "a")).unwrap();
    stored.record_check(&qid("q1"), true).unwrap();
    store
        .write(&SessionRecord::new(stored, fixed_now()))
        .await
        .unwrap();

    start_quiz(&controller).await;
    assert_eq!(controller.reset_all().await, ActionOutcome::Done);
    assert_eq!(gateway.reset_all_calls.load(Ordering::SeqCst), 1);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.view.screen(), Screen::Welcome);
    let session = snapshot.session.as_ref().expect("fresh session");
    assert!(session.checked(&qid("q1")).is_none());
    assert!(session.selected_options(&qid("q1")).is_empty());
    assert!(session.ai_hint(&qid("q1")).is_none());
    assert!(!session.is_completed());
    assert_eq!(session.user_preferences().theme(), Some("dark"));

    // The preserved theme made it into the persisted blob too.
    let key = SessionKey::new(UserId::new("u1"), TutorialId::new("t1"));
    let record = store.read(&key).await.unwrap().expect("persisted");
    assert_eq!(record.session.user_preferences().theme(), Some("dark"));
}

#[tokio::test]
async fn reset_all_failure_still_returns_to_welcome() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        fail_reset_all: true,
        ..StubGateway::default()
    });
    start_quiz(&controller).await;

    controller.select_answer(&qid("q1"), &oid("q1", "a")).await;
    controller.check_answer().await;

    assert_eq!(
        controller.reset_all().await,
        ActionOutcome::Failed(Notice::ResetFailed)
    );

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.view.screen(), Screen::Welcome);
    // Persisted data is untouched on failure.
    let session = snapshot.session.as_ref().unwrap();
    assert!(session.checked(&qid("q1")).is_some());
}

//
// ─── IDENTITY & STALE RESPONSES ────────────────────────────────────────────────
//

#[tokio::test]
async fn switch_identity_resets_the_view_baseline() {
    let (controller, _gateway, _store) = setup(StubGateway {
        questions: three_questions(),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;
    controller.next().await;

    assert_eq!(
        controller.switch_identity(UserId::new("u2"), TutorialId::new("t1")),
        ActionOutcome::Done
    );
    let snapshot = controller.snapshot();
    assert!(snapshot.session.is_none());
    assert_eq!(snapshot.view.screen(), Screen::Welcome);
    assert_eq!(snapshot.view.current_index(), 0);
    assert_eq!(
        controller.identity(),
        SessionKey::new(UserId::new("u2"), TutorialId::new("t1"))
    );

    // Pointing at the same identity again is a no-op.
    assert_eq!(
        controller.switch_identity(UserId::new("u2"), TutorialId::new("t1")),
        ActionOutcome::Rejected
    );
}

#[tokio::test]
async fn stale_hint_is_discarded_after_identity_switch() {
    let gate = Arc::new(Notify::new());
    let (controller, gateway, store) = setup(StubGateway {
        questions: three_questions(),
        hint: Some("stale hint".into()),
        hint_gate: Some(gate.clone()),
        ..StubGateway::default()
    });
    start_quiz(&controller).await;
    controller.select_answer(&qid("q1"), &oid("q1", "b")).await;

    let checking = tokio::spawn({
        let controller = controller.clone();
        async move { controller.check_answer().await }
    });
    while gateway.hint_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    // Identity changes while the hint call is in flight.
    assert_eq!(
        controller.switch_identity(UserId::new("u2"), TutorialId::new("t1")),
        ActionOutcome::Done
    );
    gate.notify_one();
    assert_eq!(checking.await.unwrap(), ActionOutcome::Done);

    // The new identity saw nothing of the hint.
    assert!(controller.snapshot().session.is_none());

    // The old session kept its seeded (empty) hint slot: the verdict was
    // written in phase one, the stale enrichment was dropped.
    let old_key = SessionKey::new(UserId::new("u1"), TutorialId::new("t1"));
    let record = store.read(&old_key).await.unwrap().expect("old blob");
    assert!(record.session.checked(&qid("q1")).is_some());
    assert!(record.session.ai_hint(&qid("q1")).is_none());
}
