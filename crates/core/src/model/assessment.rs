use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::AssessmentId;

/// Minimum number of options every question must offer.
pub const MIN_OPTIONS: usize = 2;

/// Duration applied when the backend omits one (or sends zero).
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("this assessment has no questions")]
    NoQuestions,

    #[error("question {index} has {count} options; at least {MIN_OPTIONS} are required")]
    TooFewOptions { index: usize, count: usize },

    #[error("question {index} has no text")]
    EmptyQuestionText { index: usize },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question.
///
/// `correct_option_index` is only present on instructor-side definitions; a
/// client-bound definition is [redacted](AssessmentDefinition::redacted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(alias = "question", alias = "questionText")]
    text: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(
        default,
        alias = "correctAnswer",
        skip_serializing_if = "Option::is_none"
    )]
    correct_option_index: Option<usize>,
}

impl Question {
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        options: Vec<String>,
        correct_option_index: Option<usize>,
    ) -> Self {
        Self {
            text: text.into(),
            options,
            correct_option_index,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn correct_option_index(&self) -> Option<usize> {
        self.correct_option_index
    }

    /// Copy of this question without the answer key.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            correct_option_index: None,
            ..self.clone()
        }
    }
}

/// Decode a JSON-encoded question list.
///
/// The backend ships questions as a string containing a JSON array.
///
/// # Errors
///
/// Returns the underlying `serde_json::Error` when the text is not a question array.
pub fn parse_question_list(encoded: &str) -> Result<Vec<Question>, serde_json::Error> {
    serde_json::from_str(encoded)
}

//
// ─── ASSESSMENT ────────────────────────────────────────────────────────────────
//

/// Timed assessment as fetched for a session. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDefinition {
    id: AssessmentId,
    title: String,
    duration_minutes: u32,
    questions: Vec<Question>,
}

impl AssessmentDefinition {
    /// Build a definition. A zero duration falls back to
    /// [`DEFAULT_DURATION_MINUTES`].
    ///
    /// No structural validation happens here; call [`AssessmentDefinition::validate`]
    /// before starting a session.
    #[must_use]
    pub fn new(
        id: AssessmentId,
        title: impl Into<String>,
        duration_minutes: u32,
        questions: Vec<Question>,
    ) -> Self {
        let duration_minutes = if duration_minutes == 0 {
            DEFAULT_DURATION_MINUTES
        } else {
            duration_minutes
        };
        Self {
            id,
            title: title.into(),
            duration_minutes,
            questions,
        }
    }

    /// Check that the definition can be taken.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NoQuestions` for an empty question list and
    /// `AssessmentError::TooFewOptions` when any question offers fewer than two options.
    pub fn validate(&self) -> Result<(), AssessmentError> {
        if self.questions.is_empty() {
            return Err(AssessmentError::NoQuestions);
        }

        for (index, question) in self.questions.iter().enumerate() {
            if question.text.trim().is_empty() {
                return Err(AssessmentError::EmptyQuestionText { index });
            }
            if question.options.len() < MIN_OPTIONS {
                return Err(AssessmentError::TooFewOptions {
                    index,
                    count: question.options.len(),
                });
            }
        }

        Ok(())
    }

    /// Copy of this definition with every answer key removed.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            questions: self.questions.iter().map(Question::redacted).collect(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn id(&self) -> AssessmentId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options: &[&str]) -> Question {
        Question::new(
            "Which keyword declares a constant?",
            options.iter().map(|o| (*o).to_string()).collect(),
            Some(0),
        )
    }

    #[test]
    fn zero_duration_falls_back_to_default() {
        let def = AssessmentDefinition::new(AssessmentId::random(), "Quiz", 0, vec![]);
        assert_eq!(def.duration_minutes(), DEFAULT_DURATION_MINUTES);
    }

    #[test]
    fn empty_question_list_is_invalid() {
        let def = AssessmentDefinition::new(AssessmentId::random(), "Quiz", 10, vec![]);
        assert_eq!(def.validate(), Err(AssessmentError::NoQuestions));
    }

    #[test]
    fn single_option_question_is_invalid() {
        let def = AssessmentDefinition::new(
            AssessmentId::random(),
            "Quiz",
            10,
            vec![question(&["const", "let"]), question(&["static"])],
        );
        assert_eq!(
            def.validate(),
            Err(AssessmentError::TooFewOptions { index: 1, count: 1 })
        );
    }

    #[test]
    fn redaction_strips_answer_keys() {
        let def = AssessmentDefinition::new(
            AssessmentId::random(),
            "Quiz",
            10,
            vec![question(&["const", "let"])],
        );
        assert!(def.validate().is_ok());
        let redacted = def.redacted();
        assert_eq!(redacted.questions()[0].correct_option_index(), None);
        assert_eq!(redacted.questions()[0].options(), def.questions()[0].options());
    }

    #[test]
    fn encoded_question_list_accepts_backend_field_names() {
        let encoded = r#"[{"question":"2 + 2?","options":["3","4"],"correctAnswer":1}]"#;
        let questions = parse_question_list(encoded).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text(), "2 + 2?");
        assert_eq!(questions[0].correct_option_index(), Some(1));
    }

    #[test]
    fn malformed_question_list_is_an_error() {
        assert!(parse_question_list("not json").is_err());
    }
}
