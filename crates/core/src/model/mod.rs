mod answers;
mod assessment;
mod ids;
mod result;
mod submission;

pub use answers::{AnswerMap, Selection};
pub(crate) use answers::leading_integer;
pub use assessment::{
    AssessmentDefinition, AssessmentError, DEFAULT_DURATION_MINUTES, MIN_OPTIONS, Question,
    parse_question_list,
};
pub use ids::{AssessmentId, ParseIdError, UserId};
pub use result::{
    AttemptContext, POINTS_PER_CORRECT_ANSWER, Percent, Precision, ResultDetails, ResultUser,
    ScoredResult, UNKNOWN_DATE_DISPLAY, UNKNOWN_EMAIL, round_to,
};
pub use submission::{SubmissionPayload, SubmittedAnswer};
