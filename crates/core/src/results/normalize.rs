//! Raw scoring-backend payloads to canonical [`ScoredResult`]s.
//!
//! All field fallbacks live here. Malformed input never fails normalization; it
//! degrades to defaults so a partially broken response still renders.

use serde_json::{Map, Value};

use crate::model::{
    AttemptContext, Percent, ResultDetails, ResultUser, ScoredResult, leading_integer,
};
use crate::results::date::AttemptDate;
use crate::time::DisplayZone;

type Record = Map<String, Value>;

/// Accepted shapes of a scoring-backend response.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// `null` or a scalar: nothing to normalize.
    Empty,
    /// One attempt. A `{ "result": { .. } }` envelope is already unwrapped.
    Single(Record),
    /// Many attempts. Non-object items normalize as records with every field missing.
    Batch(Vec<Value>),
}

impl RawResult {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RawResult::Empty => 0,
            RawResult::Single(_) => 1,
            RawResult::Batch(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Value> for RawResult {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => RawResult::Batch(items),
            Value::Object(record) => RawResult::Single(unwrap_envelope(record)),
            _ => RawResult::Empty,
        }
    }
}

/// Lift the inner `result` object, keeping outer fields the inner one lacks.
fn unwrap_envelope(mut outer: Record) -> Record {
    match outer.remove("result") {
        Some(Value::Object(mut inner)) => {
            for (key, value) in outer {
                inner.entry(key).or_insert(value);
            }
            inner
        }
        Some(other) => {
            outer.insert("result".to_string(), other);
            outer
        }
        None => outer,
    }
}

/// Normalizes raw results against a display zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultNormalizer {
    zone: DisplayZone,
}

impl ResultNormalizer {
    #[must_use]
    pub fn new(zone: DisplayZone) -> Self {
        Self { zone }
    }

    #[must_use]
    pub fn zone(&self) -> DisplayZone {
        self.zone
    }

    /// Normalize a response of any accepted shape, preserving input order.
    #[must_use]
    pub fn normalize(&self, raw: impl Into<RawResult>) -> Vec<ScoredResult> {
        let empty = Record::new();
        match raw.into() {
            RawResult::Empty => Vec::new(),
            RawResult::Single(record) => vec![self.normalize_record(&record)],
            RawResult::Batch(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(record) => self.normalize_record(record),
                    _ => self.normalize_record(&empty),
                })
                .collect(),
        }
    }

    /// Normalize a response expected to hold a single attempt.
    ///
    /// For a batch the first attempt is returned.
    #[must_use]
    pub fn normalize_one(&self, raw: impl Into<RawResult>) -> Option<ScoredResult> {
        self.normalize(raw).into_iter().next()
    }

    /// Normalize one raw attempt record.
    #[must_use]
    pub fn normalize_record(&self, record: &Record) -> ScoredResult {
        let total_questions = count(record.get("totalQuestions"))
            .filter(|total| *total > 0)
            .unwrap_or(1);

        let correct_answers = present(record, "correctAnswers")
            .or_else(|| present(record, "score"))
            .and_then(|value| count(Some(value)))
            .unwrap_or(0)
            .min(total_questions);

        let questions_attempted = present(record, "questionsAttempted")
            .and_then(|value| count(Some(value)))
            .unwrap_or(total_questions)
            .clamp(correct_answers, total_questions);

        let server_details = record.get("details").and_then(Value::as_object);
        let server_percent =
            |key: &str| server_details.and_then(|d| percent(d.get(key))).map(Percent::new);

        let accuracy = if questions_attempted > 0 {
            Percent::ratio(correct_answers, questions_attempted)
        } else {
            Percent::default()
        };
        let details = ResultDetails {
            completion_rate: server_percent("completionRate")
                .unwrap_or_else(|| Percent::ratio(questions_attempted, total_questions)),
            accuracy: server_percent("accuracy").unwrap_or(accuracy),
            score_percentage: server_percent("scorePercentage")
                .unwrap_or_else(|| Percent::ratio(correct_answers, total_questions)),
        };

        let raw_attempt_date = text(record.get("attemptDate"));
        let attempt_date = AttemptDate::resolve(raw_attempt_date.as_deref(), self.zone);

        ScoredResult {
            result_id: text(record.get("resultId")),
            user: user(record.get("user")),
            correct_answers,
            questions_attempted,
            total_questions,
            score: details.score_percentage.whole(),
            attempt_timestamp: attempt_date.timestamp_millis,
            attempt_date_display: attempt_date.display,
            raw_attempt_date,
            details,
            context: context(record),
        }
    }
}

/// A field that is present and not `null`.
fn present<'a>(record: &'a Record, key: &str) -> Option<&'a Value> {
    record.get(key).filter(|value| !value.is_null())
}

/// Integer-ish count. Numbers truncate, strings use their leading integer,
/// negatives floor at zero.
fn count(value: Option<&Value>) -> Option<u32> {
    let signed = match value? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(truncate))?,
        Value::String(text) => leading_integer(text)?,
        _ => return None,
    };
    Some(u32::try_from(signed.max(0)).unwrap_or(u32::MAX))
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(value: f64) -> i64 {
    value.trunc() as i64
}

fn percent(value: Option<&Value>) -> Option<f64> {
    let parsed: f64 = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse().ok()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// Non-empty text, stringifying numbers.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn user(value: Option<&Value>) -> ResultUser {
    let mut user = ResultUser::default();
    let Some(record) = value.and_then(Value::as_object) else {
        return user;
    };

    if let Some(id) = text(record.get("id")) {
        user.id = id;
    }
    if let Some(name) = text(record.get("name")) {
        user.name = name;
    }
    if let Some(email) = text(record.get("email")) {
        user.email = email;
    }
    user
}

fn context(record: &Record) -> AttemptContext {
    let assessment = record.get("assessment").and_then(Value::as_object);
    let nested = |key: &str| assessment.and_then(|a| a.get(key));

    AttemptContext {
        title: text(nested("title")).or_else(|| text(record.get("title"))),
        duration_minutes: count(nested("duration"))
            .or_else(|| count(record.get("duration")))
            .filter(|minutes| *minutes > 0),
        time_taken_minutes: count(record.get("timeTaken")),
    }
}
