//! Sorted views and descriptive statistics over normalized results.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::model::{Precision, ScoredResult, round_to};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown sort key: {0}")]
pub struct UnknownSortKey(pub String);

/// Columns a result list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Test-taker name, case-insensitive.
    Name,
    /// Score percentage.
    Score,
    /// Attempt instant; unparseable dates sort as the epoch.
    AttemptTimestamp,
}

impl SortKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Score => "score",
            SortKey::AttemptTimestamp => "attemptTimestamp",
        }
    }

    /// Compare two results by this key, ascending.
    #[must_use]
    pub fn compare(self, a: &ScoredResult, b: &ScoredResult) -> Ordering {
        match self {
            SortKey::Name => a
                .user()
                .name
                .to_lowercase()
                .cmp(&b.user().name.to_lowercase()),
            SortKey::Score => a
                .details()
                .score_percentage
                .value()
                .total_cmp(&b.details().score_percentage.value()),
            SortKey::AttemptTimestamp => a.attempt_timestamp().cmp(&b.attempt_timestamp()),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "name" => Ok(SortKey::Name),
            "score" => Ok(SortKey::Score),
            "attemptTimestamp" | "attemptDate" | "timestamp" | "date" => {
                Ok(SortKey::AttemptTimestamp)
            }
            other => Err(UnknownSortKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Current ordering of a results table.
///
/// The key is kept as text so a view can carry a column this module does not
/// know how to order; such a view leaves results in their original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    key: String,
    direction: SortDirection,
}

impl Default for SortConfig {
    /// Newest attempts first.
    fn default() -> Self {
        Self::new(SortKey::AttemptTimestamp.as_str(), SortDirection::Descending)
    }
}

impl SortConfig {
    #[must_use]
    pub fn new(key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Column-header behavior: the same key sorted ascending flips to descending;
    /// anything else starts ascending on `key`.
    pub fn toggle(&mut self, key: &str) {
        self.direction = if self.key == key && self.direction == SortDirection::Ascending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        self.key = key.to_string();
    }

    #[must_use]
    pub fn apply(&self, results: &[ScoredResult]) -> Vec<ScoredResult> {
        sort_results(results, &self.key, self.direction)
    }
}

/// Sorted copy of `results`. The sort is stable; unknown keys keep input order.
#[must_use]
pub fn sort_results(
    results: &[ScoredResult],
    key: &str,
    direction: SortDirection,
) -> Vec<ScoredResult> {
    let mut sorted = results.to_vec();
    if let Ok(key) = key.parse::<SortKey>() {
        sorted.sort_by(|a, b| direction.apply(key.compare(a, b)));
    }
    sorted
}

/// Summary of a result collection. Percentages carry two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStatistics {
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub total_attempts: usize,
}

/// Statistics over each result's `correct / total * 100`, recomputed from the raw
/// counts. An empty collection yields all zeros.
#[must_use]
pub fn compute_statistics(results: &[ScoredResult]) -> ResultStatistics {
    if results.is_empty() {
        return ResultStatistics::default();
    }

    let scores: Vec<f64> = results
        .iter()
        .map(ScoredResult::raw_score_percentage)
        .collect();
    let sum: f64 = scores.iter().sum();
    let highest = scores.iter().copied().fold(f64::MIN, f64::max);
    let lowest = scores.iter().copied().fold(f64::MAX, f64::min);

    #[allow(clippy::cast_precision_loss)]
    let average = sum / scores.len() as f64;

    ResultStatistics {
        average: round_to(average, Precision::Statistics),
        highest: round_to(highest, Precision::Statistics),
        lowest: round_to(lowest, Precision::Statistics),
        total_attempts: results.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultNormalizer;
    use crate::time::DisplayZone;
    use serde_json::json;

    fn normalize(raw: serde_json::Value) -> Vec<ScoredResult> {
        ResultNormalizer::new(DisplayZone::utc()).normalize(raw)
    }

    fn names(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|r| r.user().name.as_str()).collect()
    }

    #[test]
    fn statistics_recompute_from_counts() {
        let results = normalize(json!([
            { "correctAnswers": 8, "totalQuestions": 10 },
            { "correctAnswers": 5, "totalQuestions": 10 },
            { "correctAnswers": 10, "totalQuestions": 10 }
        ]));
        let stats = compute_statistics(&results);
        assert_eq!(
            stats,
            ResultStatistics {
                average: 76.67,
                highest: 100.0,
                lowest: 50.0,
                total_attempts: 3,
            }
        );
    }

    #[test]
    fn statistics_ignore_stale_server_percentages() {
        let results = normalize(json!([
            { "correctAnswers": 1, "totalQuestions": 4, "details": { "scorePercentage": 90 } }
        ]));
        assert_eq!(compute_statistics(&results).highest, 25.0);
    }

    #[test]
    fn empty_collection_has_zero_statistics() {
        assert_eq!(compute_statistics(&[]), ResultStatistics::default());
    }

    #[test]
    fn name_sort_is_case_insensitive() {
        let results = normalize(json!([
            { "user": { "name": "Bob" }, "correctAnswers": 7, "totalQuestions": 10 },
            { "user": { "name": "ann" }, "correctAnswers": 9, "totalQuestions": 10 }
        ]));
        let sorted = sort_results(&results, "name", SortDirection::Ascending);
        assert_eq!(names(&sorted), ["ann", "Bob"]);

        let sorted = sort_results(&results, "name", SortDirection::Descending);
        assert_eq!(names(&sorted), ["Bob", "ann"]);
    }

    #[test]
    fn score_and_date_sorts_are_numeric() {
        let results = normalize(json!([
            { "user": { "name": "a" }, "correctAnswers": 9, "totalQuestions": 10, "attemptDate": "2024-03-02T10:00:00Z" },
            { "user": { "name": "b" }, "correctAnswers": 10, "totalQuestions": 10, "attemptDate": "2024-03-01T10:00:00Z" },
            { "user": { "name": "c" }, "correctAnswers": 2, "totalQuestions": 10, "attemptDate": "2024-03-03T10:00:00Z" }
        ]));
        assert_eq!(
            names(&sort_results(&results, "score", SortDirection::Ascending)),
            ["c", "a", "b"]
        );
        assert_eq!(
            names(&SortConfig::default().apply(&results)),
            ["c", "a", "b"]
        );
        assert_eq!(
            names(&sort_results(&results, "attemptTimestamp", SortDirection::Ascending)),
            ["b", "a", "c"]
        );
    }

    #[test]
    fn unknown_key_preserves_order() {
        let results = normalize(json!([
            { "user": { "name": "z" } },
            { "user": { "name": "a" } }
        ]));
        let sorted = sort_results(&results, "email", SortDirection::Descending);
        assert_eq!(names(&sorted), ["z", "a"]);
    }

    #[test]
    fn toggle_flips_only_the_active_ascending_key() {
        let mut config = SortConfig::default();
        config.toggle("attemptTimestamp");
        assert_eq!(config.direction(), SortDirection::Ascending);

        config.toggle("attemptTimestamp");
        assert_eq!(config.direction(), SortDirection::Descending);

        config.toggle("name");
        assert_eq!(config.key(), "name");
        assert_eq!(config.direction(), SortDirection::Ascending);
    }
}
