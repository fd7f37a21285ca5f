use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use assess_core::model::{AssessmentId, ScoredResult, SubmissionPayload, UserId};
use assess_core::results::ResultNormalizer;

use super::session::{QuizSession, SubmitTrigger, TickOutcome};
use crate::Clock;
use crate::api::AssessmentApi;
use crate::error::{ApiError, QuizError};

/// Outcome of a submit request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Completed(Box<ScoredResult>),
    /// Another trigger already holds the latch, or the session is past submission.
    AlreadySubmitted,
}

/// Input to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizCommand {
    Select { question: usize, option: usize },
    Clear { question: usize },
    Submit,
    Retry,
    Quit,
}

/// Progress reported by a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizEvent {
    Tick { remaining_secs: u32 },
    AnswerRecorded { question: usize, option: usize },
    AnswerCleared { question: usize },
    Rejected { message: String },
    Submitting { auto: bool },
    Resumed,
    Completed(Box<ScoredResult>),
    Failed { message: String, retryable: bool },
}

/// How [`QuizSessionService::run`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Box<ScoredResult>),
    Failed(QuizError),
    Quit,
}

enum Step {
    Continue,
    Submit(SubmissionPayload),
    Exit(RunOutcome),
}

/// Orchestrates a quiz session against the assessment backend.
#[derive(Clone)]
pub struct QuizSessionService {
    clock: Clock,
    api: Arc<dyn AssessmentApi>,
    normalizer: ResultNormalizer,
    user_id: UserId,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(api: Arc<dyn AssessmentApi>, user_id: UserId) -> Self {
        Self {
            clock: Clock::default(),
            api,
            normalizer: ResultNormalizer::default(),
            user_id,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_normalizer(mut self, normalizer: ResultNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Fetch and validate the assessment, returning a session in progress.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Api` if the fetch fails and `QuizError::Assessment` if
    /// the definition cannot be taken.
    pub async fn start(&self, assessment_id: AssessmentId) -> Result<QuizSession, QuizError> {
        let mut session = QuizSession::new(assessment_id, self.user_id);
        match self.api.fetch_assessment(assessment_id).await {
            Ok(definition) => session.load(definition, self.clock.now())?,
            Err(err) => {
                warn!(assessment_id = %assessment_id, error = %err, "failed to load assessment");
                session.fail_loading(err.clone());
                return Err(err.into());
            }
        }
        Ok(session)
    }

    /// Submit manually.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` for local validation failures and failed deliveries.
    pub async fn submit(&self, session: &mut QuizSession) -> Result<SubmitOutcome, QuizError> {
        match session.begin_submit(SubmitTrigger::Manual, self.clock.now())? {
            Some(payload) => self.deliver(session, &payload).await,
            None => Ok(SubmitOutcome::AlreadySubmitted),
        }
    }

    /// Feed one clock tick, delivering the auto-submission if time ran out.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` when an expiry cannot be submitted or delivery fails.
    pub async fn on_tick(&self, session: &mut QuizSession) -> Result<TickOutcome, QuizError> {
        let outcome = session.tick(self.clock.now())?;
        if let TickOutcome::AutoSubmit(payload) = &outcome {
            self.deliver(session, payload).await?;
        }
        Ok(outcome)
    }

    /// Send a payload obtained from [`QuizSession::begin_submit`] and apply the
    /// response.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Api` when the backend rejects the submission.
    pub async fn deliver(
        &self,
        session: &mut QuizSession,
        payload: &SubmissionPayload,
    ) -> Result<SubmitOutcome, QuizError> {
        let response = self.api.submit(payload).await;
        self.apply_response(session, response)
    }

    fn apply_response(
        &self,
        session: &mut QuizSession,
        response: Result<Value, ApiError>,
    ) -> Result<SubmitOutcome, QuizError> {
        let scored = response.and_then(|raw| {
            self.normalizer
                .normalize_one(raw)
                .ok_or_else(|| ApiError::Decode("submit response held no result".into()))
        });

        match scored {
            Ok(result) => {
                session.complete(result.clone())?;
                Ok(SubmitOutcome::Completed(Box::new(result)))
            }
            Err(err) => {
                session.fail(err.clone())?;
                Err(err.into())
            }
        }
    }

    /// Drive a session from a command channel and a one-second ticker until it
    /// completes, fails terminally, or is quit.
    ///
    /// Commands and ticks are handled one at a time. A `Quit` that arrives while a
    /// submission is in flight closes the session; the late response is dropped.
    pub async fn run(
        &self,
        session: &mut QuizSession,
        mut commands: mpsc::Receiver<QuizCommand>,
        events: mpsc::Sender<QuizEvent>,
    ) -> RunOutcome {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            let step = tokio::select! {
                command = commands.recv() => self.handle_command(session, command, &events).await,
                _ = ticker.tick() => self.handle_tick(session, &events).await,
            };

            match step {
                Step::Continue => {}
                Step::Exit(outcome) => return outcome,
                Step::Submit(payload) => {
                    if let Some(outcome) = self
                        .run_delivery(session, &payload, &mut commands, &events)
                        .await
                    {
                        return outcome;
                    }
                }
            }
        }
    }

    async fn handle_command(
        &self,
        session: &mut QuizSession,
        command: Option<QuizCommand>,
        events: &mpsc::Sender<QuizEvent>,
    ) -> Step {
        let result = match command {
            None | Some(QuizCommand::Quit) => {
                session.dispose();
                return Step::Exit(RunOutcome::Quit);
            }
            Some(QuizCommand::Select { question, option }) => session
                .select_answer(question, option)
                .map(|()| QuizEvent::AnswerRecorded { question, option }),
            Some(QuizCommand::Clear { question }) => session
                .clear_answer(question)
                .map(|()| QuizEvent::AnswerCleared { question }),
            Some(QuizCommand::Retry) => session.retry().map(|()| QuizEvent::Resumed),
            Some(QuizCommand::Submit) => {
                match session.begin_submit(SubmitTrigger::Manual, self.clock.now()) {
                    Ok(Some(payload)) => return Step::Submit(payload),
                    Ok(None) => return Step::Continue,
                    Err(err) => Err(err),
                }
            }
        };

        let event = result.unwrap_or_else(|err| QuizEvent::Rejected {
            message: err.user_message(),
        });
        emit(events, event).await;
        Step::Continue
    }

    async fn handle_tick(&self, session: &mut QuizSession, events: &mpsc::Sender<QuizEvent>) -> Step {
        match session.tick(self.clock.now()) {
            Ok(TickOutcome::Remaining(remaining_secs)) => {
                emit(events, QuizEvent::Tick { remaining_secs }).await;
                Step::Continue
            }
            Ok(TickOutcome::AutoSubmit(payload)) => Step::Submit(payload),
            Ok(TickOutcome::Ignored) => Step::Continue,
            Err(err) => {
                emit(
                    events,
                    QuizEvent::Rejected {
                        message: err.user_message(),
                    },
                )
                .await;
                Step::Continue
            }
        }
    }

    async fn run_delivery(
        &self,
        session: &mut QuizSession,
        payload: &SubmissionPayload,
        commands: &mut mpsc::Receiver<QuizCommand>,
        events: &mpsc::Sender<QuizEvent>,
    ) -> Option<RunOutcome> {
        emit(
            events,
            QuizEvent::Submitting {
                auto: payload.is_auto_submit(),
            },
        )
        .await;

        let submit = self.api.submit(payload);
        tokio::pin!(submit);
        let response = loop {
            tokio::select! {
                response = &mut submit => break response,
                Some(command) = commands.recv(), if !session.is_disposed() => {
                    if command == QuizCommand::Quit {
                        session.dispose();
                    } else {
                        debug!(?command, "ignoring command while submitting");
                    }
                }
            }
        };

        match self.apply_response(session, response) {
            Ok(SubmitOutcome::Completed(result)) => {
                emit(events, QuizEvent::Completed(result.clone())).await;
                Some(RunOutcome::Completed(result))
            }
            Ok(SubmitOutcome::AlreadySubmitted) => None,
            Err(QuizError::Disposed) => Some(RunOutcome::Quit),
            Err(err) => {
                let retryable = err.is_retryable();
                emit(
                    events,
                    QuizEvent::Failed {
                        message: err.user_message(),
                        retryable,
                    },
                )
                .await;
                (!retryable).then_some(RunOutcome::Failed(err))
            }
        }
    }
}

async fn emit(events: &mpsc::Sender<QuizEvent>, event: QuizEvent) {
    if events.send(event).await.is_err() {
        debug!("quiz event receiver dropped");
    }
}
