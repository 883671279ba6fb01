use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use assess_core::model::{
    Question, QuestionId, QuestionSet, SessionId, SubmissionReceipt, SubmissionResult,
    SubmissionTrigger,
};
use assess_core::session::{
    AssessmentSession, ClockEvent, OverviewCell, SessionSnapshot, SessionStatus, SubmissionTicket,
};
use storage::repository::ReceiptRepository;

use crate::Clock;
use crate::collaborators::ExternalGrader;
use crate::error::{GraderError, RunnerError};

use super::events::{SessionEvent, SessionEvents};

/// State shared between the handle, the countdown task and in-flight grading.
struct Shared {
    session: Mutex<AssessmentSession>,
    questions: Arc<QuestionSet>,
    clock: Clock,
    grader: Arc<dyn ExternalGrader>,
    receipts: Option<Arc<dyn ReceiptRepository>>,
    events: UnboundedSender<SessionEvent>,
}

enum TickStep {
    Continue,
    Stop,
    Grade(SubmissionTicket),
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, AssessmentSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // The host may have stopped listening; that never affects the session.
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn tick(&self) -> TickStep {
        let (outcome, remaining, still_running) = {
            let mut session = self.lock();
            if !session.is_clock_running() {
                return TickStep::Stop;
            }
            let outcome = session.tick();
            (
                outcome,
                session.remaining_seconds(),
                session.is_clock_running(),
            )
        };

        debug!(remaining, "tick");
        self.emit(SessionEvent::Tick {
            remaining_seconds: remaining,
        });
        for event in outcome.events {
            match event {
                ClockEvent::ThresholdCrossed { seconds } => {
                    info!(seconds, "time warning");
                    self.emit(SessionEvent::ThresholdCrossed { seconds });
                }
                ClockEvent::Expired => {
                    info!("time expired");
                    self.emit(SessionEvent::Expired);
                }
            }
        }

        match outcome.ticket {
            Some(ticket) => {
                self.announce(&ticket);
                TickStep::Grade(ticket)
            }
            None if still_running => TickStep::Continue,
            None => TickStep::Stop,
        }
    }

    fn begin(&self, trigger: SubmissionTrigger) -> Option<SubmissionTicket> {
        let ticket = self.lock().try_begin_submission(trigger);
        match &ticket {
            Some(ticket) => self.announce(ticket),
            None => debug!(trigger = trigger.as_str(), "submission not available; ignoring"),
        }
        ticket
    }

    fn announce(&self, ticket: &SubmissionTicket) {
        info!(
            session_id = %ticket.session_id,
            trigger = ticket.trigger().as_str(),
            attempt = ticket.token.attempt(),
            answered = ticket.payload.answers.len(),
            "submitting"
        );
        self.emit(SessionEvent::Submitting {
            trigger: ticket.trigger(),
            answered: ticket.payload.answers.len(),
        });
    }

    async fn grade(&self, ticket: SubmissionTicket) -> Result<SubmissionResult, GraderError> {
        let in_flight = InFlight::new(self, ticket.clone());
        let outcome = self.grader.submit(&ticket.payload).await;
        in_flight.settle();

        let applied = self
            .lock()
            .finish_submission(&ticket, outcome.as_ref().cloned().map_err(|err| err.to_string()));
        if !applied {
            warn!(
                session_id = %ticket.session_id,
                attempt = ticket.token.attempt(),
                "grading outcome for a stale attempt ignored"
            );
            return outcome;
        }

        match &outcome {
            Ok(result) => {
                info!(
                    session_id = %ticket.session_id,
                    score = result.score,
                    passed = result.is_passed,
                    "submitted"
                );
                self.emit(SessionEvent::Submitted(result.clone()));
                self.store_receipt(&ticket, result).await;
            }
            Err(err) => {
                warn!(session_id = %ticket.session_id, error = %err, "grading failed");
                self.emit(SessionEvent::Failed {
                    reason: err.to_string(),
                });
            }
        }
        outcome
    }

    async fn store_receipt(&self, ticket: &SubmissionTicket, result: &SubmissionResult) {
        let Some(receipts) = self.receipts.as_ref() else {
            return;
        };
        let receipt = SubmissionReceipt {
            session_id: ticket.session_id,
            assessment_id: ticket.payload.assessment_id,
            trigger: ticket.trigger(),
            started_at: ticket.payload.started_at,
            submitted_at: self.clock.now(),
            answered: u32::try_from(ticket.payload.answers.len()).unwrap_or(u32::MAX),
            total: u32::try_from(self.questions.len()).unwrap_or(u32::MAX),
            result: result.clone(),
        };
        if let Err(err) = receipts.append_receipt(&receipt).await {
            warn!(session_id = %ticket.session_id, error = %err, "failed to store receipt");
        }
    }
}

/// Releases the guard to `Failed` if the grading future is dropped before the
/// grader answers, so the attempt can be retried.
struct InFlight<'a> {
    shared: &'a Shared,
    ticket: Option<SubmissionTicket>,
}

impl<'a> InFlight<'a> {
    fn new(shared: &'a Shared, ticket: SubmissionTicket) -> Self {
        Self {
            shared,
            ticket: Some(ticket),
        }
    }

    fn settle(mut self) {
        self.ticket = None;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        let reason = "submission cancelled before the grader answered".to_string();
        if self
            .shared
            .lock()
            .finish_submission(&ticket, Err(reason.clone()))
        {
            warn!(
                session_id = %ticket.session_id,
                attempt = ticket.token.attempt(),
                "grading cancelled"
            );
            self.shared.emit(SessionEvent::Failed { reason });
        }
    }
}

/// Drives the countdown. Holds only a weak reference so a dropped session
/// ends the loop even if the abort is missed.
async fn run_ticker(shared: Weak<Shared>, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        match shared.tick() {
            TickStep::Continue => {}
            TickStep::Stop => break,
            TickStep::Grade(ticket) => {
                // Grading runs on its own task so tearing down the view cannot
                // cut off a request that is already on the wire.
                tokio::spawn(async move {
                    let _ = shared.grade(ticket).await;
                });
                break;
            }
        }
    }
}

/// Host-facing handle to a running session.
///
/// Dropping the handle cancels the countdown.
pub struct SessionHandle {
    session_id: SessionId,
    shared: Arc<Shared>,
    ticker: JoinHandle<()>,
}

impl SessionHandle {
    pub(crate) fn spawn(
        session: AssessmentSession,
        questions: Arc<QuestionSet>,
        clock: Clock,
        grader: Arc<dyn ExternalGrader>,
        receipts: Option<Arc<dyn ReceiptRepository>>,
        tick_period: Duration,
    ) -> (Self, SessionEvents) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session_id = session.id();
        let remaining_seconds = session.remaining_seconds();

        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            questions,
            clock,
            grader,
            receipts,
            events,
        });
        shared.emit(SessionEvent::Started {
            session_id,
            remaining_seconds,
        });
        let ticker = tokio::spawn(run_ticker(Arc::downgrade(&shared), tick_period));

        (
            Self {
                session_id,
                shared,
                ticker,
            },
            receiver,
        )
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn questions(&self) -> &QuestionSet {
        &self.shared.questions
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.shared.lock().status()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().snapshot()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        let index = self.shared.lock().current_index();
        self.shared.questions.get(index)
    }

    #[must_use]
    pub fn selected(&self, question_id: QuestionId) -> Option<String> {
        self.shared.lock().answers().get(question_id).map(str::to_string)
    }

    /// Record or overwrite an answer.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Session` if the session no longer accepts answers or
    /// the question/option is invalid.
    pub fn answer(&self, question_id: QuestionId, option: &str) -> Result<(), RunnerError> {
        self.shared.lock().record_answer(question_id, option)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RunnerError::Session` if the session no longer accepts answers.
    pub fn clear_answer(&self, question_id: QuestionId) -> Result<Option<String>, RunnerError> {
        Ok(self.shared.lock().clear_answer(question_id)?)
    }

    pub fn go_to(&self, index: usize) -> usize {
        self.shared.lock().go_to(index)
    }

    pub fn next(&self) -> usize {
        self.shared.lock().next()
    }

    pub fn previous(&self) -> usize {
        self.shared.lock().previous()
    }

    #[must_use]
    pub fn overview(&self) -> Vec<OverviewCell> {
        self.shared.lock().overview()
    }

    /// Manual submit (also the retry after a failed attempt).
    ///
    /// Returns `Ok(None)` without contacting the grader when another trigger
    /// already holds the submission or the session is closed. Dropping the
    /// future before the grader answers leaves the session `Failed`.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Grader` when grading fails; the session is then
    /// `Failed` and may be submitted again.
    pub async fn submit(&self) -> Result<Option<SubmissionResult>, RunnerError> {
        let Some(ticket) = self.shared.begin(SubmissionTrigger::Manual) else {
            return Ok(None);
        };
        let result = self.shared.grade(ticket).await?;
        Ok(Some(result))
    }

    /// The host view is going away: stop the countdown and refuse grading.
    pub fn abandon(&self) {
        self.shared.lock().abandon();
        self.ticker.abort();
        info!(session_id = %self.session_id, "session abandoned");
    }

    /// Whether the countdown task is still alive.
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        !self.ticker.is_finished()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}
