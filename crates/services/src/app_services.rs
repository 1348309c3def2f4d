use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::ai::{LlmClient, OpenAiClient, PromptFlows, SpeechSynthesizer};
use crate::config::AppConfig;
use crate::error::AppServicesError;
use crate::exercise_service::ExerciseService;
use crate::identity::{AuthSession, FirebaseIdentity, IdentityProvider, InMemoryIdentity};
use crate::progress::ProgressService;
use crate::quiz::QuizService;
use crate::tutor::TutorService;

/// Assembles app-facing services over one storage backend and one set of
/// model clients.
#[derive(Clone)]
pub struct AppServices {
    flows: PromptFlows,
    progress: Arc<ProgressService>,
    quiz: Arc<QuizService>,
    tutor: Arc<TutorService>,
    exercises: Arc<ExerciseService>,
    auth: AuthSession,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the configured remote
    /// model and identity services.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        Ok(Self::from_config(storage, config, clock))
    }

    /// Build services over in-memory storage with the configured remote clients.
    #[must_use]
    pub fn in_memory(config: &AppConfig, clock: Clock) -> Self {
        Self::from_config(Storage::in_memory(), config, clock)
    }

    fn from_config(storage: Storage, config: &AppConfig, clock: Clock) -> Self {
        let openai = Arc::new(OpenAiClient::new(config.ai.clone()));
        if !openai.enabled() {
            tracing::warn!("no model api key configured; prompt flows are disabled");
        }

        let identity: Arc<dyn IdentityProvider> = match &config.firebase {
            Some(firebase) => Arc::new(FirebaseIdentity::new(Some(firebase.clone()), clock)),
            None => {
                tracing::info!("no identity service configured; using local accounts");
                Arc::new(InMemoryIdentity::new())
            }
        };

        let flows = PromptFlows::new(openai.clone(), openai, config.flows.clone());
        let voice = config.ai.as_ref().map(|ai| ai.tts_voice.clone());
        Self::assemble(storage, flows, identity, voice, clock)
    }

    /// Build services from explicit parts. Used by tests and embedders that
    /// bring their own model clients.
    #[must_use]
    pub fn with_clients(
        storage: Storage,
        llm: Arc<dyn LlmClient>,
        speech: Arc<dyn SpeechSynthesizer>,
        identity: Arc<dyn IdentityProvider>,
        config: &AppConfig,
        clock: Clock,
    ) -> Self {
        let flows = PromptFlows::new(llm, speech, config.flows.clone());
        Self::assemble(storage, flows, identity, None, clock)
    }

    fn assemble(
        storage: Storage,
        flows: PromptFlows,
        identity: Arc<dyn IdentityProvider>,
        voice: Option<String>,
        clock: Clock,
    ) -> Self {
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.history),
        ));
        let quiz = Arc::new(QuizService::new(flows.clone(), Arc::clone(&progress)));
        let tutor = match voice {
            Some(voice) => TutorService::new(flows.clone()).with_voice(voice),
            None => TutorService::new(flows.clone()),
        };
        let exercises = Arc::new(ExerciseService::new(flows.clone(), Arc::clone(&progress)));
        let auth = AuthSession::new(identity, Arc::clone(&progress));

        Self {
            flows,
            progress,
            quiz,
            tutor: Arc::new(tutor),
            exercises,
            auth,
        }
    }

    #[must_use]
    pub fn flows(&self) -> &PromptFlows {
        &self.flows
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn tutor(&self) -> Arc<TutorService> {
        Arc::clone(&self.tutor)
    }

    #[must_use]
    pub fn exercises(&self) -> Arc<ExerciseService> {
        Arc::clone(&self.exercises)
    }

    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }
}
