//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::formatter::SubmissionError;
use assess_core::model::AssessmentError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Failures talking to the assessment backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiError {
    #[error("request rejected: {message}")]
    Validation { message: String },
    #[error("authentication failed")]
    Auth,
    #[error("resource not found")]
    NotFound,
    #[error("server error (status {status})")]
    Server { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success HTTP status. `message` is the server's own
    /// explanation, if the body carried one.
    #[must_use]
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            401 | 403 => ApiError::Auth,
            404 => ApiError::NotFound,
            500.. => ApiError::Server { status },
            400 => ApiError::Validation {
                message: message.unwrap_or_else(|| "Invalid submission data".to_string()),
            },
            other => ApiError::Validation {
                message: message.unwrap_or_else(|| format!("request failed with status {other}")),
            },
        }
    }

    /// Whether the caller may try the same request again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ApiError::Auth | ApiError::NotFound)
    }

    /// Text suitable for showing to the test-taker.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation { message } => message.clone(),
            ApiError::Auth => "Authentication failed. Please log in again.".to_string(),
            ApiError::NotFound => "Assessment not found".to_string(),
            ApiError::Server { .. } => "Server error. Please try again later.".to_string(),
            ApiError::Network(_) => "Network error. Please check your connection.".to_string(),
            ApiError::Timeout => "Request timed out. Please try again.".to_string(),
            ApiError::Decode(_) => "Invalid response format from server".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::from_status(status.as_u16(), None)
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Errors emitted by the quiz session and its orchestrator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("operation not allowed while the session is {state}")]
    InvalidState { state: &'static str },
    #[error("question {index} does not exist")]
    QuestionOutOfRange { index: usize },
    #[error("question {question} has no option {option}")]
    OptionOutOfRange { question: usize, option: usize },
    #[error("the session has been closed")]
    Disposed,
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl QuizError {
    /// Local validation failures leave the session in progress.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            QuizError::Submission(_)
                | QuizError::QuestionOutOfRange { .. }
                | QuizError::OptionOutOfRange { .. }
        )
    }

    /// Whether a failed submission may be retried from the same session.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            QuizError::Api(err) => err.is_retryable(),
            QuizError::Submission(_) => true,
            _ => false,
        }
    }

    /// Text suitable for showing to the test-taker.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            QuizError::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

/// Errors emitted by `ResultsService`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultsError {
    #[error("no result found for this attempt")]
    Empty,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{name} is required")]
    Missing { name: &'static str },
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_taxonomy() {
        assert_eq!(ApiError::from_status(401, None), ApiError::Auth);
        assert_eq!(ApiError::from_status(403, None), ApiError::Auth);
        assert_eq!(ApiError::from_status(404, None), ApiError::NotFound);
        assert_eq!(ApiError::from_status(503, None), ApiError::Server { status: 503 });
        assert_eq!(
            ApiError::from_status(400, Some("answers required".into())),
            ApiError::Validation {
                message: "answers required".into()
            }
        );
        assert_eq!(
            ApiError::from_status(400, None).user_message(),
            "Invalid submission data"
        );
    }

    #[test]
    fn auth_and_not_found_are_terminal() {
        assert!(!ApiError::Auth.is_retryable());
        assert!(!ApiError::NotFound.is_retryable());
        assert!(ApiError::Timeout.is_retryable());
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::Server { status: 500 }.is_retryable());
    }

    #[test]
    fn user_messages_match_the_client_copy() {
        assert_eq!(
            ApiError::Auth.user_message(),
            "Authentication failed. Please log in again."
        );
        assert_eq!(
            ApiError::Timeout.user_message(),
            "Request timed out. Please try again."
        );
        assert_eq!(
            QuizError::from(ApiError::Server { status: 502 }).user_message(),
            "Server error. Please try again later."
        );
    }
}
