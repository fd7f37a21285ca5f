use serde_json::{Map, Value};
use tracing::warn;

use assess_core::model::{AssessmentDefinition, AssessmentId, Question, parse_question_list};

use crate::error::ApiError;

const ID_KEYS: &[&str] = &["AssessmentId", "assessmentId", "id"];
const TITLE_KEYS: &[&str] = &["Title", "title"];
const DURATION_KEYS: &[&str] = &["Duration", "duration", "durationMinutes"];
const QUESTION_KEYS: &[&str] = &["Questions", "questions"];

const UNTITLED: &str = "Untitled assessment";

fn first<'a>(body: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| body.get(*key).filter(|value| !value.is_null()))
}

/// Decode a `GET /assessments/{id}` body.
///
/// The body's own id wins when it parses; otherwise `requested` is used. An
/// unreadable question list decodes as empty so validation can reject it.
///
/// # Errors
///
/// Returns `ApiError::Decode` when the body is not a JSON object.
pub fn decode_assessment(
    requested: AssessmentId,
    body: Value,
) -> Result<AssessmentDefinition, ApiError> {
    let Value::Object(body) = body else {
        return Err(ApiError::Decode("assessment body is not an object".into()));
    };

    let id = first(&body, ID_KEYS)
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<AssessmentId>().ok())
        .unwrap_or(requested);

    let title = first(&body, TITLE_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(UNTITLED);

    let duration = first(&body, DURATION_KEYS).map_or(0, duration_minutes);
    let questions = first(&body, QUESTION_KEYS).map_or_else(Vec::new, |raw| questions(id, raw));

    Ok(AssessmentDefinition::new(id, title, duration, questions))
}

fn duration_minutes(value: &Value) -> u32 {
    let minutes = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    minutes
        .and_then(|minutes| u32::try_from(minutes).ok())
        .unwrap_or(0)
}

fn questions(id: AssessmentId, raw: &Value) -> Vec<Question> {
    let decoded = match raw {
        Value::String(encoded) => parse_question_list(encoded),
        Value::Array(_) => serde_json::from_value(raw.clone()),
        _ => {
            warn!(assessment_id = %id, "questions field has an unexpected type");
            return Vec::new();
        }
    };

    decoded.unwrap_or_else(|err| {
        warn!(assessment_id = %id, error = %err, "failed to parse question list");
        Vec::new()
    })
}
