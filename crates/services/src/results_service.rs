use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{info, warn};

use assess_core::model::{AssessmentId, ScoredResult, UserId};
use assess_core::results::{ResultNormalizer, ResultStatistics, SortConfig, compute_statistics};

use crate::api::AssessmentApi;
use crate::error::ResultsError;

/// Normalized results for one assessment, ordered by `sort`.
///
/// Statistics are recomputed from `results` whenever the list is rebuilt; sorting
/// never changes them.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentResults {
    pub assessment_id: AssessmentId,
    pub results: Vec<ScoredResult>,
    pub statistics: ResultStatistics,
    pub sort: SortConfig,
}

impl AssessmentResults {
    /// Build a view in the default order (newest attempt first).
    #[must_use]
    pub fn new(assessment_id: AssessmentId, results: Vec<ScoredResult>) -> Self {
        let sort = SortConfig::default();
        let statistics = compute_statistics(&results);
        let results = sort.apply(&results);
        Self {
            assessment_id,
            results,
            statistics,
            sort,
        }
    }

    #[must_use]
    pub fn empty(assessment_id: AssessmentId) -> Self {
        Self::new(assessment_id, Vec::new())
    }

    /// Apply a column-header click: toggle the sort and reorder.
    pub fn toggle_sort(&mut self, key: &str) {
        self.sort.toggle(key);
        self.results = self.sort.apply(&self.results);
    }

    /// Replace the ordering outright.
    pub fn set_sort(&mut self, sort: SortConfig) {
        self.sort = sort;
        self.results = self.sort.apply(&self.results);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Fetches and normalizes results for test-takers and instructors.
#[derive(Clone)]
pub struct ResultsService {
    api: Arc<dyn AssessmentApi>,
    normalizer: ResultNormalizer,
}

impl ResultsService {
    #[must_use]
    pub fn new(api: Arc<dyn AssessmentApi>) -> Self {
        Self {
            api,
            normalizer: ResultNormalizer::default(),
        }
    }

    #[must_use]
    pub fn with_normalizer(mut self, normalizer: ResultNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// All attempts for one assessment.
    ///
    /// # Errors
    ///
    /// Returns `ResultsError::Api` when the fetch fails.
    pub async fn results_for_assessment(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<AssessmentResults, ResultsError> {
        let raw = self.api.fetch_results(assessment_id).await?;
        let results = self.normalizer.normalize(raw);
        info!(assessment_id = %assessment_id, attempts = results.len(), "results loaded");
        Ok(AssessmentResults::new(assessment_id, results))
    }

    /// The result a test-taker sees after an attempt: the newest attempt, limited
    /// to `user_id` when that user has any.
    ///
    /// # Errors
    ///
    /// Returns `ResultsError::Api` when the fetch fails and `ResultsError::Empty`
    /// when the response holds no attempt.
    pub async fn attempt_result(
        &self,
        assessment_id: AssessmentId,
        user_id: Option<UserId>,
    ) -> Result<ScoredResult, ResultsError> {
        let raw = self.api.fetch_results(assessment_id).await?;
        let results = self.normalizer.normalize(raw);

        let user_key = user_id.map(|id| id.to_string());
        let mine = |result: &&ScoredResult| {
            user_key
                .as_deref()
                .is_some_and(|key| result.user().id.eq_ignore_ascii_case(key))
        };
        let pool: Vec<&ScoredResult> = if results.iter().any(|r| mine(&r)) {
            results.iter().filter(mine).collect()
        } else {
            results.iter().collect()
        };

        pool.into_iter()
            .max_by_key(|result| result.attempt_timestamp())
            .cloned()
            .ok_or(ResultsError::Empty)
    }

    /// Instructor dashboard: results for many assessments, fetched concurrently.
    ///
    /// A failed fetch yields an empty list for that assessment; the others still
    /// load. Output order follows `assessment_ids`.
    pub async fn results_for_assessments(
        &self,
        assessment_ids: &[AssessmentId],
    ) -> Vec<AssessmentResults> {
        let loads = assessment_ids.iter().map(|&id| async move {
            match self.results_for_assessment(id).await {
                Ok(view) => view,
                Err(err) => {
                    warn!(assessment_id = %id, error = %err, "failed to load results");
                    AssessmentResults::empty(id)
                }
            }
        });
        join_all(loads).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use assess_core::model::{AssessmentDefinition, SubmissionPayload};
    use assess_core::results::SortDirection;
    use assess_core::time::DisplayZone;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    struct FakeResults {
        by_assessment: HashMap<AssessmentId, Result<Value, ApiError>>,
    }

    #[async_trait]
    impl AssessmentApi for FakeResults {
        async fn fetch_assessment(
            &self,
            _id: AssessmentId,
        ) -> Result<AssessmentDefinition, ApiError> {
            Err(ApiError::NotFound)
        }

        async fn submit(&self, _payload: &SubmissionPayload) -> Result<Value, ApiError> {
            Err(ApiError::NotFound)
        }

        async fn fetch_results(&self, id: AssessmentId) -> Result<Value, ApiError> {
            self.by_assessment
                .get(&id)
                .cloned()
                .unwrap_or(Err(ApiError::NotFound))
        }
    }

    fn service(entries: Vec<(AssessmentId, Result<Value, ApiError>)>) -> ResultsService {
        let api: Arc<dyn AssessmentApi> = Arc::new(FakeResults {
            by_assessment: entries.into_iter().collect(),
        });
        ResultsService::new(api).with_normalizer(ResultNormalizer::new(DisplayZone::utc()))
    }

    fn attempts() -> Value {
        json!([
            { "user": { "id": "u-1", "name": "Bob" }, "correctAnswers": 5, "totalQuestions": 10, "attemptDate": "2024-03-01T09:00:00Z" },
            { "user": { "id": "u-2", "name": "ann" }, "correctAnswers": 8, "totalQuestions": 10, "attemptDate": "2024-03-02T09:00:00Z" },
            { "user": { "id": "u-1", "name": "Bob" }, "correctAnswers": 10, "totalQuestions": 10, "attemptDate": "2024-03-03T09:00:00Z" }
        ])
    }

    #[tokio::test]
    async fn results_default_to_newest_first_with_statistics() {
        let id = AssessmentId::random();
        let view = service(vec![(id, Ok(attempts()))])
            .results_for_assessment(id)
            .await
            .unwrap();

        let scores: Vec<u8> = view.results.iter().map(ScoredResult::score).collect();
        assert_eq!(scores, [100, 80, 50]);
        assert_eq!(view.statistics.average, 76.67);
        assert_eq!(view.statistics.total_attempts, 3);
    }

    #[tokio::test]
    async fn toggling_sort_keeps_statistics() {
        let id = AssessmentId::random();
        let mut view = service(vec![(id, Ok(attempts()))])
            .results_for_assessment(id)
            .await
            .unwrap();
        let statistics = view.statistics;

        view.toggle_sort("name");
        assert_eq!(view.results[0].user().name, "ann");
        assert_eq!(view.sort.direction(), SortDirection::Ascending);

        view.toggle_sort("name");
        assert_eq!(view.results[0].user().name, "Bob");
        assert_eq!(view.statistics, statistics);
    }

    #[tokio::test]
    async fn attempt_result_prefers_the_users_newest_attempt() {
        let id = AssessmentId::random();
        let service = service(vec![(id, Ok(attempts()))]);

        let newest = service.attempt_result(id, None).await.unwrap();
        assert_eq!(newest.score(), 100);

        let empty = service.attempt_result(AssessmentId::random(), None).await;
        assert_eq!(empty, Err(ResultsError::Api(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn attempt_result_limits_to_the_given_user() {
        let id = AssessmentId::random();
        let user = UserId::random();
        let other = UserId::random();
        let raw = json!([
            { "user": { "id": user.to_string(), "name": "Ann" }, "correctAnswers": 4, "totalQuestions": 10, "attemptDate": "2024-03-01T09:00:00Z" },
            { "user": { "id": user.to_string(), "name": "Ann" }, "correctAnswers": 6, "totalQuestions": 10, "attemptDate": "2024-03-02T09:00:00Z" },
            { "user": { "id": other.to_string(), "name": "Bob" }, "correctAnswers": 9, "totalQuestions": 10, "attemptDate": "2024-03-05T09:00:00Z" }
        ]);
        let service = service(vec![(id, Ok(raw))]);

        let mine = service.attempt_result(id, Some(user)).await.unwrap();
        assert_eq!(mine.user().name, "Ann");
        assert_eq!(mine.score(), 60);

        let stranger = service
            .attempt_result(id, Some(UserId::random()))
            .await
            .unwrap();
        assert_eq!(stranger.user().name, "Bob");
        assert_eq!(stranger.score(), 90);
    }

    #[tokio::test]
    async fn single_result_envelope_is_unwrapped() {
        let id = AssessmentId::random();
        let raw = json!({ "result": { "correctAnswers": 3, "totalQuestions": 4 }, "title": "Macros" });
        let result = service(vec![(id, Ok(raw))])
            .attempt_result(id, None)
            .await
            .unwrap();
        assert_eq!(result.score(), 75);
        assert_eq!(result.context().title.as_deref(), Some("Macros"));
    }

    #[tokio::test]
    async fn dashboard_isolates_failures_per_assessment() {
        let ok = AssessmentId::random();
        let broken = AssessmentId::random();
        let service = service(vec![
            (ok, Ok(attempts())),
            (broken, Err(ApiError::Server { status: 500 })),
        ]);

        let views = service.results_for_assessments(&[broken, ok]).await;
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].assessment_id, broken);
        assert!(views[0].is_empty());
        assert_eq!(views[0].statistics, ResultStatistics::default());
        assert_eq!(views[1].results.len(), 3);
    }
}
