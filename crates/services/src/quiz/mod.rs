mod session;
mod workflow;

// Public API of the quiz subsystem.
pub use crate::error::QuizError;
pub use session::{QuizSession, SessionState, SubmitTrigger, TickOutcome};
pub use workflow::{QuizCommand, QuizEvent, QuizSessionService, RunOutcome, SubmitOutcome};
