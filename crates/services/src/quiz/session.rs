use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use assess_core::countdown::{Countdown, Tick};
use assess_core::formatter::format_submission;
use assess_core::model::{
    AnswerMap, AssessmentDefinition, AssessmentId, ScoredResult, SubmissionPayload, UserId,
};

use crate::error::{ApiError, QuizError};

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of one assessment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Waiting for the definition to be fetched and validated.
    Loading,
    /// Countdown running; answers may change.
    InProgress,
    /// A submission is in flight. Ticks and further submits are ignored.
    Submitting,
    /// The backend accepted the submission.
    Completed(Box<ScoredResult>),
    /// Loading or submission failed.
    Failed(QuizError),
}

impl SessionState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::InProgress => "in progress",
            SessionState::Submitting => "submitting",
            SessionState::Completed(_) => "completed",
            SessionState::Failed(_) => "failed",
        }
    }
}

/// What asked for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    TimerExpired,
}

impl SubmitTrigger {
    #[must_use]
    pub fn is_auto(self) -> bool {
        self == SubmitTrigger::TimerExpired
    }
}

/// Result of feeding one clock tick to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Remaining(u32),
    /// Time ran out and this tick won the submit latch.
    AutoSubmit(SubmissionPayload),
    Ignored,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Client-side state machine for a timed assessment.
///
/// Entry into `Submitting` is guarded by a single latch: whichever of a manual
/// submit or the countdown expiry reaches [`QuizSession::begin_submit`] first wins,
/// and the other becomes a no-op. The latch is released when the submission is
/// rejected locally or fails with a retryable error.
#[derive(Debug)]
pub struct QuizSession {
    assessment_id: AssessmentId,
    user_id: UserId,
    state: SessionState,
    definition: Option<AssessmentDefinition>,
    answers: AnswerMap,
    countdown: Countdown,
    started_at: Option<DateTime<Utc>>,
    submit_latched: bool,
    disposed: bool,
}

impl QuizSession {
    /// A session in `Loading` for the given assessment and test-taker.
    #[must_use]
    pub fn new(assessment_id: AssessmentId, user_id: UserId) -> Self {
        Self {
            assessment_id,
            user_id,
            state: SessionState::Loading,
            definition: None,
            answers: AnswerMap::new(),
            countdown: Countdown::new(0),
            started_at: None,
            submit_latched: false,
            disposed: false,
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
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The redacted definition, once loaded.
    #[must_use]
    pub fn definition(&self) -> Option<&AssessmentDefinition> {
        self.definition.as_ref()
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn is_submit_latched(&self) -> bool {
        self.submit_latched
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.state == SessionState::InProgress
    }

    #[must_use]
    pub fn result(&self) -> Option<&ScoredResult> {
        match &self.state {
            SessionState::Completed(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&QuizError> {
        match &self.state {
            SessionState::Failed(err) => Some(err),
            _ => None,
        }
    }

    fn ensure_live(&self) -> Result<(), QuizError> {
        if self.disposed {
            return Err(QuizError::Disposed);
        }
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<(), QuizError> {
        self.ensure_live()?;
        if self.state != SessionState::InProgress {
            return Err(QuizError::InvalidState {
                state: self.state.name(),
            });
        }
        Ok(())
    }

    /// Accept a fetched definition and start the countdown.
    ///
    /// The definition is redacted before it is kept.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidState` unless loading, and `QuizError::Assessment`
    /// when the definition fails validation; the session is then `Failed`.
    pub fn load(
        &mut self,
        definition: AssessmentDefinition,
        now: DateTime<Utc>,
    ) -> Result<(), QuizError> {
        self.ensure_live()?;
        if self.state != SessionState::Loading {
            return Err(QuizError::InvalidState {
                state: self.state.name(),
            });
        }

        if let Err(err) = definition.validate() {
            warn!(assessment_id = %self.assessment_id, error = %err, "assessment rejected");
            self.state = SessionState::Failed(err.clone().into());
            return Err(err.into());
        }

        self.countdown = Countdown::from_minutes(definition.duration_minutes());
        self.countdown.start();
        self.definition = Some(definition.redacted());
        self.started_at = Some(now);
        self.state = SessionState::InProgress;

        info!(
            assessment_id = %self.assessment_id,
            duration_secs = self.countdown.total_secs(),
            "assessment started"
        );
        Ok(())
    }

    /// Record that the definition could not be fetched.
    pub fn fail_loading(&mut self, err: ApiError) {
        if self.disposed || self.state != SessionState::Loading {
            return;
        }
        self.state = SessionState::Failed(err.into());
    }

    /// Select `option` for `question`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidState` outside `InProgress`, and
    /// `QuestionOutOfRange`/`OptionOutOfRange` for indices the definition lacks.
    pub fn select_answer(&mut self, question: usize, option: usize) -> Result<(), QuizError> {
        self.ensure_in_progress()?;
        let option_count = self
            .definition
            .as_ref()
            .and_then(|def| def.question(question))
            .map(|q| q.option_count())
            .ok_or(QuizError::QuestionOutOfRange { index: question })?;
        if option >= option_count {
            return Err(QuizError::OptionOutOfRange { question, option });
        }

        self.answers.select(question, option);
        Ok(())
    }

    /// Mark `question` as explicitly unanswered.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidState` outside `InProgress` and
    /// `QuizError::QuestionOutOfRange` for an unknown question.
    pub fn clear_answer(&mut self, question: usize) -> Result<(), QuizError> {
        self.ensure_in_progress()?;
        let known = self
            .definition
            .as_ref()
            .is_some_and(|def| question < def.question_count());
        if !known {
            return Err(QuizError::QuestionOutOfRange { index: question });
        }

        self.answers.clear(question);
        Ok(())
    }

    /// Advance the countdown by one second. On expiry the session tries to
    /// auto-submit.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Submission` when time runs out with nothing answered;
    /// the session stays `InProgress` with the countdown expired.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, QuizError> {
        if self.disposed || self.state != SessionState::InProgress {
            return Ok(TickOutcome::Ignored);
        }

        match self.countdown.tick() {
            Tick::Remaining(remaining) => Ok(TickOutcome::Remaining(remaining)),
            Tick::Ignored => Ok(TickOutcome::Ignored),
            Tick::Expired => {
                info!(assessment_id = %self.assessment_id, "time is up");
                Ok(self
                    .begin_submit(SubmitTrigger::TimerExpired, now)?
                    .map_or(TickOutcome::Ignored, TickOutcome::AutoSubmit))
            }
        }
    }

    /// Try to take the submit latch and build the payload.
    ///
    /// Returns `Ok(None)` when another trigger already holds the latch or the
    /// session is past submission.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Submission` when no question is answered (the latch is
    /// released and the countdown resumes if time remains), `QuizError::Disposed`
    /// after teardown, and `QuizError::InvalidState` while loading or failed.
    pub fn begin_submit(
        &mut self,
        trigger: SubmitTrigger,
        now: DateTime<Utc>,
    ) -> Result<Option<SubmissionPayload>, QuizError> {
        self.ensure_live()?;
        match self.state {
            SessionState::InProgress => {}
            SessionState::Submitting | SessionState::Completed(_) => return Ok(None),
            SessionState::Loading | SessionState::Failed(_) => {
                return Err(QuizError::InvalidState {
                    state: self.state.name(),
                });
            }
        }
        if self.submit_latched {
            return Ok(None);
        }

        self.submit_latched = true;
        self.countdown.stop();

        let payload = format_submission(
            &self.answers,
            self.assessment_id,
            self.user_id,
            self.elapsed_secs(now),
            trigger.is_auto(),
        );

        match payload {
            Ok(payload) => {
                self.state = SessionState::Submitting;
                info!(
                    assessment_id = %self.assessment_id,
                    answers = payload.answers().len(),
                    auto = trigger.is_auto(),
                    "submitting assessment"
                );
                Ok(Some(payload))
            }
            Err(err) => {
                self.submit_latched = false;
                self.countdown.resume();
                Err(err.into())
            }
        }
    }

    /// Wall-clock seconds since the session started, independent of the countdown.
    fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        self.started_at
            .map(|started| (now - started).num_seconds())
            .and_then(|secs| u64::try_from(secs).ok())
            .unwrap_or(0)
    }

    /// Accept the normalized result of the in-flight submission.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Disposed` after teardown (the result is discarded) and
    /// `QuizError::InvalidState` unless submitting.
    pub fn complete(&mut self, result: ScoredResult) -> Result<(), QuizError> {
        if self.disposed {
            debug!(assessment_id = %self.assessment_id, "discarding result for closed session");
            return Err(QuizError::Disposed);
        }
        if self.state != SessionState::Submitting {
            return Err(QuizError::InvalidState {
                state: self.state.name(),
            });
        }

        info!(
            assessment_id = %self.assessment_id,
            score = result.score(),
            "assessment completed"
        );
        self.state = SessionState::Completed(Box::new(result));
        Ok(())
    }

    /// Record a failed submission. Retryable failures release the latch.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Disposed` after teardown and `QuizError::InvalidState`
    /// unless submitting.
    pub fn fail(&mut self, err: ApiError) -> Result<(), QuizError> {
        if self.disposed {
            debug!(assessment_id = %self.assessment_id, "discarding failure for closed session");
            return Err(QuizError::Disposed);
        }
        if self.state != SessionState::Submitting {
            return Err(QuizError::InvalidState {
                state: self.state.name(),
            });
        }

        if err.is_retryable() {
            self.submit_latched = false;
            warn!(assessment_id = %self.assessment_id, error = %err, "submission failed");
        } else {
            error!(assessment_id = %self.assessment_id, error = %err, "submission failed");
        }
        self.state = SessionState::Failed(err.into());
        Ok(())
    }

    /// Return from a retryable submission failure to `InProgress`, keeping the
    /// answers and resuming the countdown if time remains.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidState` unless the session failed a submission
    /// with a retryable error.
    pub fn retry(&mut self) -> Result<(), QuizError> {
        self.ensure_live()?;
        let retryable = matches!(&self.state, SessionState::Failed(err) if err.is_retryable())
            && self.definition.is_some()
            && !self.submit_latched;
        if !retryable {
            return Err(QuizError::InvalidState {
                state: self.state.name(),
            });
        }

        self.state = SessionState::InProgress;
        self.countdown.resume();
        info!(assessment_id = %self.assessment_id, "retrying submission");
        Ok(())
    }

    /// Tear the session down. The countdown stops and no further transitions
    /// happen; a late submission result is discarded.
    pub fn dispose(&mut self) {
        if !self.disposed {
            debug!(assessment_id = %self.assessment_id, state = self.state.name(), "session closed");
        }
        self.disposed = true;
        self.countdown.stop();
    }
}
