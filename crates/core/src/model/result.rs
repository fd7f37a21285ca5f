use serde::{Serialize, Serializer};

/// Placeholder shown when an attempt date cannot be parsed.
pub const UNKNOWN_DATE_DISPLAY: &str = "N/A";

/// Email shown when the backend omits one.
pub const UNKNOWN_EMAIL: &str = "N/A";

/// Points awarded per correct answer in the points view.
pub const POINTS_PER_CORRECT_ANSWER: u32 = 10;

/// Rounding applied when a percentage is handed to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Whole,
    /// Single-result displays.
    Display,
    /// Aggregate statistics.
    Statistics,
}

impl Precision {
    #[must_use]
    pub fn decimals(self) -> i32 {
        match self {
            Precision::Whole => 0,
            Precision::Display => 1,
            Precision::Statistics => 2,
        }
    }
}

/// Round half away from zero to the given precision.
#[must_use]
pub fn round_to(value: f64, precision: Precision) -> f64 {
    let factor = 10_f64.powi(precision.decimals());
    (value * factor).round() / factor
}

/// A percentage clamped to `[0, 100]`, kept unrounded.
///
/// Consumers round through [`Percent::rounded`], so every rounding starts from
/// the same underlying value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Percent(f64);

impl Percent {
    /// Clamp `raw` into range. `NaN` becomes zero.
    #[must_use]
    pub fn new(raw: f64) -> Self {
        if raw.is_nan() {
            return Self(0.0);
        }
        Self(raw.clamp(0.0, 100.0))
    }

    /// `numerator / denominator * 100`, or zero for a zero denominator.
    #[must_use]
    pub fn ratio(numerator: u32, denominator: u32) -> Self {
        if denominator == 0 {
            return Self(0.0);
        }
        Self::new(f64::from(numerator) / f64::from(denominator) * 100.0)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn rounded(self, precision: Precision) -> f64 {
        round_to(self.0, precision)
    }

    #[must_use]
    pub fn whole(self) -> u8 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let whole = self.rounded(Precision::Whole) as u8;
        whole
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.rounded(Precision::Display))
    }
}

/// Test-taker identity as reported by the scoring backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl Default for ResultUser {
    fn default() -> Self {
        Self {
            id: "unknown".to_string(),
            name: "Unknown Student".to_string(),
            email: UNKNOWN_EMAIL.to_string(),
        }
    }
}

/// Derived percentages for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDetails {
    pub completion_rate: Percent,
    pub accuracy: Percent,
    pub score_percentage: Percent,
}

/// Optional context some backends attach to a single result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_taken_minutes: Option<u32>,
}

/// Canonical scored attempt produced by the result normalizer.
///
/// Counts satisfy `correct_answers <= questions_attempted <= total_questions` and
/// `total_questions >= 1`. `score` is the whole-number rendering of
/// `details.score_percentage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    pub(crate) result_id: Option<String>,
    pub(crate) user: ResultUser,
    pub(crate) correct_answers: u32,
    pub(crate) questions_attempted: u32,
    pub(crate) total_questions: u32,
    pub(crate) score: u8,
    pub(crate) attempt_timestamp: i64,
    pub(crate) attempt_date_display: String,
    pub(crate) raw_attempt_date: Option<String>,
    pub(crate) details: ResultDetails,
    pub(crate) context: AttemptContext,
}

impl ScoredResult {
    #[must_use]
    pub fn result_id(&self) -> Option<&str> {
        self.result_id.as_deref()
    }

    #[must_use]
    pub fn user(&self) -> &ResultUser {
        &self.user
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn questions_attempted(&self) -> u32 {
        self.questions_attempted
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    /// Whole-number score percentage in `[0, 100]`.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    /// Epoch milliseconds of the attempt, or zero when the date was unparseable.
    #[must_use]
    pub fn attempt_timestamp(&self) -> i64 {
        self.attempt_timestamp
    }

    #[must_use]
    pub fn attempt_date_display(&self) -> &str {
        &self.attempt_date_display
    }

    #[must_use]
    pub fn raw_attempt_date(&self) -> Option<&str> {
        self.raw_attempt_date.as_deref()
    }

    #[must_use]
    pub fn has_attempt_date(&self) -> bool {
        self.attempt_timestamp != 0
    }

    #[must_use]
    pub fn details(&self) -> &ResultDetails {
        &self.details
    }

    #[must_use]
    pub fn context(&self) -> &AttemptContext {
        &self.context
    }

    /// Points view: a fixed number of points per correct answer.
    #[must_use]
    pub fn points(&self) -> u32 {
        self.correct_answers.saturating_mul(POINTS_PER_CORRECT_ANSWER)
    }

    /// Maximum points for this attempt.
    #[must_use]
    pub fn max_points(&self) -> u32 {
        self.total_questions.saturating_mul(POINTS_PER_CORRECT_ANSWER)
    }

    /// Raw-count score used by statistics, ignoring any server-provided percentage.
    #[must_use]
    pub fn raw_score_percentage(&self) -> f64 {
        f64::from(self.correct_answers) / f64::from(self.total_questions.max(1)) * 100.0
    }
}
