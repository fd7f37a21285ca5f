use serde::Serialize;

use crate::model::ids::{AssessmentId, UserId};

/// One answered question on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_index: usize,
    pub selected_answer: usize,
}

/// Normalized submission body for `POST /assessments/{id}/submit`.
///
/// Built once per submit attempt by [`format_submission`](crate::formatter::format_submission)
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    #[serde(skip)]
    assessment_id: AssessmentId,
    user_id: UserId,
    answers: Vec<SubmittedAnswer>,
    /// Whole minutes, at least one. This is the field the scoring backend reads.
    #[serde(rename = "timeTaken")]
    time_taken_minutes: u32,
    time_taken_seconds: u64,
    is_auto_submit: bool,
}

impl SubmissionPayload {
    pub(crate) fn new(
        assessment_id: AssessmentId,
        user_id: UserId,
        answers: Vec<SubmittedAnswer>,
        time_taken_seconds: u64,
        is_auto_submit: bool,
    ) -> Self {
        let time_taken_seconds = time_taken_seconds.max(1);
        let time_taken_minutes =
            u32::try_from((time_taken_seconds / 60).max(1)).unwrap_or(u32::MAX);
        Self {
            assessment_id,
            user_id,
            answers,
            time_taken_minutes,
            time_taken_seconds,
            is_auto_submit,
        }
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn answers(&self) -> &[SubmittedAnswer] {
        &self.answers
    }

    #[must_use]
    pub fn time_taken_minutes(&self) -> u32 {
        self.time_taken_minutes
    }

    #[must_use]
    pub fn time_taken_seconds(&self) -> u64 {
        self.time_taken_seconds
    }

    #[must_use]
    pub fn is_auto_submit(&self) -> bool {
        self.is_auto_submit
    }
}
