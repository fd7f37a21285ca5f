#![forbid(unsafe_code)]

pub mod countdown;
pub mod error;
pub mod formatter;
pub mod model;
pub mod results;
pub mod time;

pub use countdown::{Countdown, Tick};
pub use error::Error;
pub use formatter::{SubmissionError, format_submission};
pub use time::{Clock, DisplayZone};
