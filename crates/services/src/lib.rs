#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod cache;
pub mod config;
pub mod error;
pub mod quiz;
pub mod results_service;

pub use assess_core::Clock;

pub use api::{AssessmentApi, HttpAssessmentApi};
pub use app_services::AppServices;
pub use cache::{CachingAssessmentApi, SubmissionCache};
pub use config::ApiConfig;
pub use error::{ApiError, AppServicesError, ConfigError, QuizError, ResultsError};
pub use quiz::{
    QuizCommand, QuizEvent, QuizSession, QuizSessionService, RunOutcome, SessionState,
    SubmitOutcome, SubmitTrigger, TickOutcome,
};
pub use results_service::{AssessmentResults, ResultsService};
