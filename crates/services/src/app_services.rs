use std::sync::Arc;

use assess_core::model::UserId;
use assess_core::results::ResultNormalizer;
use storage::repository::Storage;

use crate::Clock;
use crate::api::{AssessmentApi, HttpAssessmentApi};
use crate::cache::{CachingAssessmentApi, SubmissionCache};
use crate::config::ApiConfig;
use crate::error::{AppServicesError, ConfigError};
use crate::quiz::QuizSessionService;
use crate::results_service::ResultsService;

/// Assembles app-facing services over one API client and one key/value store.
#[derive(Clone)]
pub struct AppServices {
    user_id: UserId,
    quiz: Arc<QuizSessionService>,
    results: Arc<ResultsService>,
}

impl AppServices {
    /// Build services backed by `SQLite` key/value storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization, configuration, or
    /// HTTP client setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        config: ApiConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::with_storage(&storage, config, clock)
    }

    /// Build services backed by in-memory key/value storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if configuration or HTTP client setup fails.
    pub fn new_in_memory(config: ApiConfig, clock: Clock) -> Result<Self, AppServicesError> {
        Self::with_storage(&Storage::in_memory(), config, clock)
    }

    fn with_storage(
        storage: &Storage,
        config: ApiConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let user_id = config.user_id.ok_or(ConfigError::Missing {
            name: "LEARN_USER_ID",
        })?;
        let http: Arc<dyn AssessmentApi> = Arc::new(HttpAssessmentApi::new(config)?);
        let cache = SubmissionCache::new(Arc::clone(&storage.key_values)).with_clock(clock);
        let api: Arc<dyn AssessmentApi> = Arc::new(CachingAssessmentApi::new(http, cache));
        Ok(Self::from_api(api, user_id, clock))
    }

    /// Build services over an existing API client.
    #[must_use]
    pub fn from_api(api: Arc<dyn AssessmentApi>, user_id: UserId, clock: Clock) -> Self {
        let normalizer = ResultNormalizer::default();
        let quiz = Arc::new(
            QuizSessionService::new(Arc::clone(&api), user_id)
                .with_clock(clock)
                .with_normalizer(normalizer),
        );
        let results = Arc::new(ResultsService::new(api).with_normalizer(normalizer));
        Self {
            user_id,
            quiz,
            results,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizSessionService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn results(&self) -> Arc<ResultsService> {
        Arc::clone(&self.results)
    }
}
