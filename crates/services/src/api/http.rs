use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use assess_core::model::{AssessmentDefinition, AssessmentId, SubmissionPayload};

use super::AssessmentApi;
use super::wire::decode_assessment;
use crate::config::ApiConfig;
use crate::error::ApiError;

/// `reqwest`-backed client for the assessment REST API.
#[derive(Clone)]
pub struct HttpAssessmentApi {
    client: Client,
    config: ApiConfig,
}

impl HttpAssessmentApi {
    /// Build a client honoring the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the TLS backend cannot be initialized.
    pub fn new(config: ApiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = request
            .bearer_auth(&self.config.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status.as_u16(), server_message(&body));
            warn!(status = status.as_u16(), error = %err, "assessment API request failed");
            return Err(err);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

/// The `message` field of an error body, if any.
fn server_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl AssessmentApi for HttpAssessmentApi {
    async fn fetch_assessment(&self, id: AssessmentId) -> Result<AssessmentDefinition, ApiError> {
        debug!(assessment_id = %id, "fetching assessment");
        let url = self.config.url(&format!("assessments/{id}"));
        let body = self.send(self.client.get(url)).await?;
        decode_assessment(id, body)
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<Value, ApiError> {
        let id = payload.assessment_id();
        debug!(
            assessment_id = %id,
            answers = payload.answers().len(),
            auto = payload.is_auto_submit(),
            "submitting answers"
        );
        let url = self.config.url(&format!("assessments/{id}/submit"));
        let body = self.send(self.client.post(url).json(payload)).await?;
        if !body.is_object() {
            return Err(ApiError::Decode("submit response is not an object".into()));
        }
        Ok(body)
    }

    async fn fetch_results(&self, id: AssessmentId) -> Result<Value, ApiError> {
        debug!(assessment_id = %id, "fetching results");
        let url = self.config.url(&format!("assessments/{id}/results"));
        self.send(self.client.get(url)).await
    }
}
