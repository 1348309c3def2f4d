use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use profe_core::model::{AudioState, ChatRole, ProficiencyLevel, QuizHistoryEntry, UserId};
use profe_core::time::fixed_now;
use services::ai::flows::OPEN_CONVERSATION;
use services::identity::InMemoryIdentity;
use services::{
    AdvanceOutcome, AppConfig, AppServices, AudioPayload, Clock, CompletionRequest, ExerciseError,
    FeedbackRequest, FeedbackResult, FlowConfig, GenerationError, LlmClient, QuizError, QuizPhase,
    QuizRequest, QuizService, QuizSession, SpeechSynthesizer, TutorSession,
};
use storage::repository::{InMemoryRepository, QuizHistoryRepository, Storage, StorageError};

//
// ─── FAKES ─────────────────────────────────────────────────────────────────────
//

/// Replies in order and remembers every request.
#[derive(Default)]
struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_owned()));
        self
    }

    fn fail(self, error: GenerationError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    fn requests_for(&self, flow: &str) -> Vec<CompletionRequest> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.flow == flow)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

/// Never answers within any reasonable deadline.
struct StalledLlm;

#[async_trait]
impl LlmClient for StalledLlm {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, GenerationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(r#"{"correctedText":"tarde","feedback":"tarde"}"#.to_owned())
    }
}

struct FakeSpeech;

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(
        &self,
        text: &str,
        _voice: Option<&str>,
    ) -> Result<AudioPayload, GenerationError> {
        Ok(AudioPayload {
            mime_type: "audio/mpeg".into(),
            data: text.as_bytes().to_vec(),
        })
    }
}

/// Fails the first history write, then stores normally.
#[derive(Default)]
struct FlakyHistory {
    inner: InMemoryRepository,
    failed: AtomicBool,
}

#[async_trait]
impl QuizHistoryRepository for FlakyHistory {
    async fn append_history(
        &self,
        uid: &UserId,
        entry: &QuizHistoryEntry,
    ) -> Result<i64, StorageError> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(StorageError::Connection("offline".into()));
        }
        self.inner.append_history(uid, entry).await
    }

    async fn list_history(
        &self,
        uid: &UserId,
        limit: u32,
    ) -> Result<Vec<QuizHistoryEntry>, StorageError> {
        self.inner.list_history(uid, limit).await
    }
}

fn config() -> AppConfig {
    AppConfig {
        db_url: "sqlite::memory:".into(),
        ai: None,
        flows: FlowConfig::default(),
        firebase: None,
    }
}

fn app_with(llm: Arc<dyn LlmClient>, flows: FlowConfig) -> AppServices {
    app_over(Storage::in_memory(), llm, flows)
}

fn app_over(storage: Storage, llm: Arc<dyn LlmClient>, flows: FlowConfig) -> AppServices {
    let config = AppConfig { flows, ..config() };
    AppServices::with_clients(
        storage,
        llm,
        Arc::new(FakeSpeech),
        Arc::new(InMemoryIdentity::new()),
        &config,
        Clock::fixed(fixed_now()),
    )
}

async fn signed_up(app: &AppServices) -> UserId {
    app.auth()
        .sign_up("ana@example.com", "secreto", Some("Ana"))
        .await
        .unwrap()
        .uid
}

const ONE_QUESTION: &str = r#"```json
{"questions":[{"question":"¿Cómo se dice 'hello'?","answer":"Hola","options":["Adiós","Hola","Gracias"],"feedback":"¡Muy bien!"}]}
```"#;

const A2_RESULT: &str =
    r#"{"proficiencyLevel":"A2","reasoning":"Conoce saludos básicos y vocabulario común."}"#;

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn one_question_quiz_finishes_and_is_recorded() {
    let llm = Arc::new(ScriptedLlm::default().reply(ONE_QUESTION).reply(A2_RESULT));
    let app = app_with(llm.clone(), FlowConfig::default());
    let uid = signed_up(&app).await;

    let quiz = QuizService::new(app.flows().clone(), app.progress())
        .with_request(QuizRequest::default().with_question_count(1));
    let mut session = QuizSession::new();
    quiz.load_questions(&mut session).await.unwrap();
    assert_eq!(session.phase(), QuizPhase::Ongoing);

    let answer = quiz.answer(&mut session, "Hola").unwrap();
    assert!(answer.is_correct());

    let outcome = quiz.advance(&mut session, Some(&uid)).await.unwrap();
    assert_eq!(session.phase(), QuizPhase::Finished);

    // A perfect score is always reported as the top level.
    let AdvanceOutcome::Finished(result) = outcome else {
        panic!("expected a finished quiz, got {outcome:?}");
    };
    assert_eq!(result.level(), ProficiencyLevel::C2);

    let analysis = llm.requests_for("analyze-proficiency-level");
    assert_eq!(analysis.len(), 1);
    assert_eq!(analysis[0].prompt.matches("¿Cómo se dice 'hello'?").count(), 1);

    let history = app.progress().quiz_history(&uid, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].level, ProficiencyLevel::C2);
    assert_eq!(
        app.progress().profile(&uid).await.unwrap().level(),
        Some(ProficiencyLevel::C2)
    );
}

#[tokio::test]
async fn failed_generation_keeps_quiz_loading() {
    let llm = Arc::new(ScriptedLlm::default().reply(r#"{"questions":[]}"#));
    let app = app_with(llm, FlowConfig::default());

    let mut session = QuizSession::new();
    let err = app.quiz().load_questions(&mut session).await.unwrap_err();

    assert!(matches!(err, QuizError::Generation(_)));
    assert_eq!(session.phase(), QuizPhase::Loading);
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn failed_analysis_can_be_retried() {
    let llm = Arc::new(
        ScriptedLlm::default()
            .reply(ONE_QUESTION)
            .reply("no es JSON")
            .reply(A2_RESULT),
    );
    let app = app_with(llm.clone(), FlowConfig::default());
    let uid = signed_up(&app).await;

    let quiz = app.quiz();
    let mut session = QuizSession::new();
    quiz.load_questions(&mut session).await.unwrap();
    quiz.answer(&mut session, "Adiós").unwrap();

    let err = quiz.advance(&mut session, Some(&uid)).await.unwrap_err();
    assert!(matches!(err, QuizError::Generation(_)));
    assert!(session.is_finished());
    assert!(session.result().is_none());
    assert!(app.progress().quiz_history(&uid, 10).await.unwrap().is_empty());

    let result = quiz.retry_analysis(&mut session, Some(&uid)).await.unwrap();
    assert_eq!(result.level(), ProficiencyLevel::A2);
    assert_eq!(session.answers().len(), 1);
    assert_eq!(llm.requests_for("analyze-proficiency-level").len(), 2);

    // Retrying a quiz that already has a result does not call the model again.
    quiz.retry_analysis(&mut session, Some(&uid)).await.unwrap();
    assert_eq!(llm.requests_for("analyze-proficiency-level").len(), 2);
    assert_eq!(app.progress().quiz_history(&uid, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unsaved_result_is_saved_on_retry_without_reanalysis() {
    let llm = Arc::new(ScriptedLlm::default().reply(ONE_QUESTION).reply(A2_RESULT));
    let storage = Storage {
        history: Arc::new(FlakyHistory::default()),
        ..Storage::in_memory()
    };
    let app = app_over(storage, llm.clone(), FlowConfig::default());
    let uid = signed_up(&app).await;

    let quiz = app.quiz();
    let mut session = QuizSession::new();
    quiz.load_questions(&mut session).await.unwrap();
    quiz.answer(&mut session, "Adiós").unwrap();

    let err = quiz.advance(&mut session, Some(&uid)).await.unwrap_err();
    assert!(matches!(err, QuizError::Store(_)));
    assert_eq!(session.result().map(|r| r.level()), Some(ProficiencyLevel::A2));
    assert!(!session.is_persisted());
    assert!(app.progress().quiz_history(&uid, 10).await.unwrap().is_empty());

    let result = quiz.retry_analysis(&mut session, Some(&uid)).await.unwrap();
    assert_eq!(result.level(), ProficiencyLevel::A2);
    assert!(session.is_persisted());
    assert!(session.last_error().is_none());
    assert_eq!(llm.requests_for("analyze-proficiency-level").len(), 1);

    let history = app.progress().quiz_history(&uid, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].level, ProficiencyLevel::A2);
    assert_eq!(
        app.progress().profile(&uid).await.unwrap().level(),
        Some(ProficiencyLevel::A2)
    );

    quiz.retry_analysis(&mut session, Some(&uid)).await.unwrap();
    assert_eq!(app.progress().quiz_history(&uid, 10).await.unwrap().len(), 1);
}

//
// ─── FEEDBACK AND TUTOR ────────────────────────────────────────────────────────
//

#[tokio::test]
async fn open_conversation_returns_a_reply_not_a_correction() {
    let llm = Arc::new(ScriptedLlm::default().reply(r#"{"reply":"¡Hola! ¿Qué tal tu día?"}"#));
    let app = app_with(llm.clone(), FlowConfig::default());

    let request = FeedbackRequest::classify(OPEN_CONVERSATION, "Hola", ProficiencyLevel::A1);
    let result = app.flows().provide_feedback(&request).await.unwrap();

    match result {
        FeedbackResult::ConversationalReply { text } => assert!(!text.trim().is_empty()),
        other => panic!("expected a conversational reply, got {other:?}"),
    }
    assert_eq!(llm.requests_for("provide-automated-feedback").len(), 1);
}

#[tokio::test]
async fn tutor_replies_and_speaks() {
    let llm = Arc::new(
        ScriptedLlm::default()
            .reply(r#"{"reply":"¡Hola! ¿Cómo estás?"}"#)
            .fail(GenerationError::EmptyResponse),
    );
    let app = app_with(llm, FlowConfig::default());
    let tutor = app.tutor();
    let mut session = TutorSession::new(ProficiencyLevel::A2);

    let reply = tutor.send(&mut session, "Hola").await.unwrap();
    assert_eq!(reply.role(), ChatRole::Tutor);
    assert_eq!(session.messages().len(), 2);

    let audio = tutor.speak(&mut session, reply.id()).await.unwrap();
    assert_eq!(session.message(reply.id()).unwrap().audio(), AudioState::Ready(audio));
    assert_eq!(session.audio(audio).unwrap().data, reply.text().as_bytes());

    // A failed reply keeps the learner's message and frees the session.
    assert!(tutor.send(&mut session, "¿Y tú?").await.is_err());
    assert_eq!(session.messages().len(), 3);
    assert!(tutor.send(&mut session, "").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn stalled_model_times_out() {
    let flows = FlowConfig {
        timeout: Duration::from_secs(5),
        ..FlowConfig::default()
    };
    let app = app_with(Arc::new(StalledLlm), flows);

    let err = app.flows().correct_text("Yo es estudiante").await.unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Timeout { flow: "correct-user-text", after } if after == Duration::from_secs(5)
    ));
}

//
// ─── EXERCISES ─────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn completing_greetings_unlocks_the_next_exercise() {
    let app = app_with(Arc::new(ScriptedLlm::default()), FlowConfig::default());
    let uid = signed_up(&app).await;
    let exercises = app.exercises();

    assert!(matches!(
        exercises.complete(&uid, "articles").await,
        Err(ExerciseError::Locked(id)) if id == "articles"
    ));

    assert!(exercises.complete(&uid, "greetings").await.unwrap());
    assert!(!exercises.complete(&uid, "greetings").await.unwrap());

    let profile = app.progress().profile(&uid).await.unwrap();
    let completed: Vec<&str> = profile
        .completed_exercises()
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(completed, ["greetings"]);

    let view = exercises.catalog_view(Some(&profile));
    assert!(view[0].completed);
    assert!(!view[1].locked);
    assert!(view[2].locked);
}

#[tokio::test]
async fn locked_exercise_is_refused_before_practice() {
    let app = app_with(Arc::new(ScriptedLlm::default()), FlowConfig::default());
    let uid = signed_up(&app).await;
    let exercises = app.exercises();

    assert!(matches!(
        exercises.open(&uid, "articles").await,
        Err(ExerciseError::Locked(id)) if id == "articles"
    ));
    assert!(matches!(
        exercises.open(&uid, "no-existe").await,
        Err(ExerciseError::UnknownExercise(_))
    ));

    let greetings = exercises.open(&uid, "greetings").await.unwrap();
    assert!(!greetings.scenarios.is_empty());

    exercises.complete(&uid, "greetings").await.unwrap();
    assert_eq!(exercises.open(&uid, "articles").await.unwrap().id, "articles");
}

#[tokio::test]
async fn exercise_response_without_correction_is_correct() {
    let llm = Arc::new(ScriptedLlm::default().reply(
        r#"{"feedback":"¡Excelente presentación!","correctedAnswer":"Buenos días, me llamo Ana."}"#,
    ));
    let app = app_with(llm, FlowConfig::default());
    let exercises = app.exercises();
    let greetings = exercises.find("greetings").unwrap();

    let check = exercises
        .check_response(
            &greetings.scenarios[0],
            "Buenos días, me llamo Ana.",
            ProficiencyLevel::A1,
        )
        .await
        .unwrap();
    assert!(check.is_correct);
    assert_eq!(check.corrected, None);
    assert!(!check.feedback.is_empty());
}
