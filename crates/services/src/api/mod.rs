//! Contract with the remote assessment backend.

use async_trait::async_trait;
use serde_json::Value;

use assess_core::model::{AssessmentDefinition, AssessmentId, SubmissionPayload};

use crate::error::ApiError;

mod http;
mod wire;

pub use http::HttpAssessmentApi;
pub use wire::decode_assessment;

/// REST calls consumed by the quiz lifecycle. Every call carries the bearer
/// credential.
#[async_trait]
pub trait AssessmentApi: Send + Sync {
    /// `GET /assessments/{id}`
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport failures and non-success statuses.
    async fn fetch_assessment(&self, id: AssessmentId) -> Result<AssessmentDefinition, ApiError>;

    /// `POST /assessments/{id}/submit`, returning the raw scored result.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport failures, non-success statuses, and
    /// responses that are not a JSON object.
    async fn submit(&self, payload: &SubmissionPayload) -> Result<Value, ApiError>;

    /// `GET /assessments/{id}/results`, returning one raw result or an array.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport failures and non-success statuses.
    async fn fetch_results(&self, id: AssessmentId) -> Result<Value, ApiError>;
}
