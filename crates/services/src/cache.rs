//! Short-lived cache bridging read-after-write lag after a submission.
//!
//! Right after a successful submit the raw result is written to key/value
//! storage. A results fetch for the same assessment within the TTL is served from
//! there instead of the network. Every cache failure is logged and ignored.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use assess_core::Clock;
use assess_core::model::{AssessmentDefinition, AssessmentId, SubmissionPayload};
use storage::repository::KeyValueStore;

use crate::api::AssessmentApi;
use crate::error::ApiError;

pub const SUBMISSION_DATA_KEY: &str = "submissionData";
pub const LAST_SUBMITTED_ASSESSMENT_KEY: &str = "lastSubmittedAssessment";
pub const LAST_SUBMISSION_TIME_KEY: &str = "lastSubmissionTime";

/// How long a cached submission answers results fetches.
pub const SUBMISSION_CACHE_TTL_MILLIS: i64 = 5_000;

#[derive(Clone)]
pub struct SubmissionCache {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
    ttl: Duration,
}

impl SubmissionCache {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Clock::default(),
            ttl: Duration::milliseconds(SUBMISSION_CACHE_TTL_MILLIS),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Remember `raw` as the latest submission for `id`, stamped with the current
    /// time.
    ///
    /// The assessment marker is cleared first and written last, so a partial
    /// write never pairs one assessment's id with another's data.
    pub async fn record(&self, id: AssessmentId, raw: &Value) {
        if let Err(err) = self.store.remove(LAST_SUBMITTED_ASSESSMENT_KEY).await {
            warn!(key = LAST_SUBMITTED_ASSESSMENT_KEY, error = %err, "failed to cache submission");
            return;
        }

        let now = self
            .clock
            .now()
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let writes = [
            (SUBMISSION_DATA_KEY, raw.to_string()),
            (LAST_SUBMISSION_TIME_KEY, now),
            (LAST_SUBMITTED_ASSESSMENT_KEY, id.to_string()),
        ];

        for (key, value) in writes {
            if let Err(err) = self.store.set(key, &value).await {
                warn!(key, error = %err, "failed to cache submission");
                return;
            }
        }
    }

    /// The cached raw result for `id`, if it was recorded within the TTL.
    pub async fn lookup(&self, id: AssessmentId) -> Option<Value> {
        match self.try_lookup(id).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(assessment_id = %id, error = %err, "submission cache unreadable");
                None
            }
        }
    }

    async fn try_lookup(&self, id: AssessmentId) -> Result<Option<Value>, String> {
        let get = |key: &'static str| async move {
            self.store.get(key).await.map_err(|err| err.to_string())
        };

        let Some(last_id) = get(LAST_SUBMITTED_ASSESSMENT_KEY).await? else {
            return Ok(None);
        };
        if last_id.parse::<AssessmentId>().ok() != Some(id) {
            return Ok(None);
        }

        let (Some(data), Some(stamp)) = (
            get(SUBMISSION_DATA_KEY).await?,
            get(LAST_SUBMISSION_TIME_KEY).await?,
        ) else {
            return Ok(None);
        };

        let submitted_at = DateTime::parse_from_rfc3339(&stamp)
            .map_err(|err| err.to_string())?
            .with_timezone(&Utc);
        if self.clock.now() - submitted_at >= self.ttl {
            return Ok(None);
        }

        serde_json::from_str(&data)
            .map(Some)
            .map_err(|err| err.to_string())
    }
}

/// [`AssessmentApi`] decorator that records successful submissions and serves
/// fresh ones back to results fetches.
#[derive(Clone)]
pub struct CachingAssessmentApi {
    inner: Arc<dyn AssessmentApi>,
    cache: SubmissionCache,
}

impl CachingAssessmentApi {
    #[must_use]
    pub fn new(inner: Arc<dyn AssessmentApi>, cache: SubmissionCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl AssessmentApi for CachingAssessmentApi {
    async fn fetch_assessment(&self, id: AssessmentId) -> Result<AssessmentDefinition, ApiError> {
        self.inner.fetch_assessment(id).await
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<Value, ApiError> {
        let raw = self.inner.submit(payload).await?;
        if !raw.is_null() {
            self.cache.record(payload.assessment_id(), &raw).await;
        }
        Ok(raw)
    }

    async fn fetch_results(&self, id: AssessmentId) -> Result<Value, ApiError> {
        if let Some(cached) = self.cache.lookup(id).await {
            debug!(assessment_id = %id, "serving results from submission cache");
            return Ok(cached);
        }
        self.inner.fetch_results(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::time::{fixed_clock, fixed_now};
    use serde_json::json;
    use storage::repository::{InMemoryKeyValueStore, StorageError};

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(InMemoryKeyValueStore::new())
    }

    #[tokio::test]
    async fn fresh_submission_is_served_for_the_same_assessment() {
        let store = store();
        let id = AssessmentId::random();
        let cache = SubmissionCache::new(Arc::clone(&store)).with_clock(fixed_clock());
        cache.record(id, &json!({ "score": 4 })).await;

        let mut later = fixed_clock();
        later.advance(Duration::milliseconds(4_999));
        let reader = SubmissionCache::new(Arc::clone(&store)).with_clock(later);
        assert_eq!(reader.lookup(id).await, Some(json!({ "score": 4 })));
        assert_eq!(reader.lookup(AssessmentId::random()).await, None);
    }

    #[tokio::test]
    async fn entries_expire_after_the_ttl() {
        let store = store();
        let id = AssessmentId::random();
        SubmissionCache::new(Arc::clone(&store))
            .with_clock(fixed_clock())
            .record(id, &json!({ "score": 1 }))
            .await;

        let expired = SubmissionCache::new(store)
            .with_clock(Clock::fixed(fixed_now() + Duration::milliseconds(5_000)));
        assert_eq!(expired.lookup(id).await, None);
    }

    /// Store whose writes to one key always fail.
    struct FailingKeyStore {
        inner: InMemoryKeyValueStore,
        failing_key: &'static str,
    }

    #[async_trait]
    impl KeyValueStore for FailingKeyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.failing_key {
                return Err(StorageError::Connection("disk full".into()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn partial_write_never_serves_another_assessments_result() {
        for failing_key in [
            SUBMISSION_DATA_KEY,
            LAST_SUBMISSION_TIME_KEY,
            LAST_SUBMITTED_ASSESSMENT_KEY,
        ] {
            let inner = InMemoryKeyValueStore::new();
            let first = AssessmentId::random();
            let second = AssessmentId::random();
            SubmissionCache::new(Arc::new(inner.clone()))
                .with_clock(fixed_clock())
                .record(first, &json!({ "resultId": "A" }))
                .await;

            let failing: Arc<dyn KeyValueStore> = Arc::new(FailingKeyStore {
                inner: inner.clone(),
                failing_key,
            });
            let mut later = fixed_clock();
            later.advance(Duration::seconds(1));
            SubmissionCache::new(failing)
                .with_clock(later)
                .record(second, &json!({ "resultId": "B" }))
                .await;

            let mut reader_clock = fixed_clock();
            reader_clock.advance(Duration::seconds(2));
            let reader = SubmissionCache::new(Arc::new(inner)).with_clock(reader_clock);
            assert_eq!(reader.lookup(first).await, None, "failing key {failing_key}");
            assert_eq!(reader.lookup(second).await, None, "failing key {failing_key}");
        }
    }

    #[tokio::test]
    async fn corrupt_entries_are_ignored() {
        let store = store();
        let id = AssessmentId::random();
        store
            .set(LAST_SUBMITTED_ASSESSMENT_KEY, &id.to_string())
            .await
            .unwrap();
        store.set(SUBMISSION_DATA_KEY, "{").await.unwrap();
        store.set(LAST_SUBMISSION_TIME_KEY, "yesterday").await.unwrap();

        let cache = SubmissionCache::new(store).with_clock(fixed_clock());
        assert_eq!(cache.lookup(id).await, None);
    }
}
