use thiserror::Error;

use crate::formatter::SubmissionError;
use crate::model::AssessmentError;

/// Any domain failure raised by this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}
