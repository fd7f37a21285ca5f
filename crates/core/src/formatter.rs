//! Turns in-progress answer state into a submission payload.

use thiserror::Error;

use crate::model::{AnswerMap, AssessmentId, SubmissionPayload, SubmittedAnswer, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("please answer at least one question before submitting")]
    NoAnswers,
}

/// Build the wire payload for a submission.
///
/// Only questions whose selection coerces to an option index are included, in
/// ascending question order. Entries that are unanswered or fail to coerce are
/// dropped. `elapsed_secs` is the wall-clock time since the session started; the
/// payload carries it floored to whole minutes with a one-minute minimum.
///
/// # Errors
///
/// Returns `SubmissionError::NoAnswers` if no entry survives coercion.
pub fn format_submission(
    answers: &AnswerMap,
    assessment_id: AssessmentId,
    user_id: UserId,
    elapsed_secs: u64,
    is_auto_submit: bool,
) -> Result<SubmissionPayload, SubmissionError> {
    let submitted: Vec<SubmittedAnswer> = answers
        .iter()
        .filter_map(|(question_index, selection)| {
            selection.coerce().map(|selected_answer| SubmittedAnswer {
                question_index,
                selected_answer,
            })
        })
        .collect();

    if submitted.is_empty() {
        return Err(SubmissionError::NoAnswers);
    }

    Ok(SubmissionPayload::new(
        assessment_id,
        user_id,
        submitted,
        elapsed_secs,
        is_auto_submit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Selection;

    fn ids() -> (AssessmentId, UserId) {
        (AssessmentId::random(), UserId::random())
    }

    #[test]
    fn keeps_only_coercible_answers_in_question_order() {
        let (assessment_id, user_id) = ids();
        let answers: AnswerMap = [
            (4, Selection::Index(1)),
            (0, Selection::from("2")),
            (2, Selection::Unanswered),
            (3, Selection::from("garbage")),
            (1, Selection::Number(0.0)),
        ]
        .into_iter()
        .collect();

        let payload = format_submission(&answers, assessment_id, user_id, 300, false).unwrap();

        let indices: Vec<usize> = payload.answers().iter().map(|a| a.question_index).collect();
        assert_eq!(indices, vec![0, 1, 4]);
        assert_eq!(payload.answers()[0].selected_answer, 2);
        assert_eq!(payload.answers().len(), answers.answered_count());
    }

    #[test]
    fn empty_or_unanswered_map_is_rejected() {
        let (assessment_id, user_id) = ids();
        assert_eq!(
            format_submission(&AnswerMap::new(), assessment_id, user_id, 10, false),
            Err(SubmissionError::NoAnswers)
        );

        let mut answers = AnswerMap::new();
        answers.clear(0);
        assert_eq!(
            format_submission(&answers, assessment_id, user_id, 10, true),
            Err(SubmissionError::NoAnswers)
        );
    }

    #[test]
    fn time_taken_floors_to_minutes_with_one_minute_minimum() {
        let (assessment_id, user_id) = ids();
        let mut answers = AnswerMap::new();
        answers.select(0, 1);

        let quick = format_submission(&answers, assessment_id, user_id, 0, false).unwrap();
        assert_eq!(quick.time_taken_minutes(), 1);
        assert_eq!(quick.time_taken_seconds(), 1);

        let slow = format_submission(&answers, assessment_id, user_id, 179, true).unwrap();
        assert_eq!(slow.time_taken_minutes(), 2);
        assert!(slow.is_auto_submit());
    }

    #[test]
    fn wire_shape_uses_camel_case_and_omits_assessment_id() {
        let (assessment_id, user_id) = ids();
        let mut answers = AnswerMap::new();
        answers.select(1, 3);

        let payload = format_submission(&answers, assessment_id, user_id, 125, false).unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["userId"], user_id.to_string());
        assert_eq!(json["answers"][0]["questionIndex"], 1);
        assert_eq!(json["answers"][0]["selectedAnswer"], 3);
        assert_eq!(json["timeTaken"], 2);
        assert_eq!(json["timeTakenSeconds"], 125);
        assert_eq!(json["isAutoSubmit"], false);
        assert!(json.get("assessmentId").is_none());
    }
}
