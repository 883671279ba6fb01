use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    Question, QuestionId, QuestionSet, SessionId, SubmissionPayload, SubmissionResult,
    SubmissionTrigger,
};

use super::answers::{AnswerError, AnswerStore};
use super::clock::{ClockEvent, SessionClock};
use super::guard::{GuardToken, SessionStatus, SubmissionGuard};
use super::navigator::{Navigator, OverviewCell};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session was already started")]
    AlreadyStarted,

    #[error("session was abandoned")]
    Abandoned,

    #[error("answers cannot change while the session is {}", .0.as_str())]
    NotAcceptingAnswers(SessionStatus),

    #[error(transparent)]
    Answer(#[from] AnswerError),
}

//
// ─── TICKETS AND SNAPSHOTS ─────────────────────────────────────────────────────
//

/// Issued to whichever trigger acquired the guard; carries everything needed
/// for the one grading call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub session_id: SessionId,
    pub token: GuardToken,
    pub payload: SubmissionPayload,
}

impl SubmissionTicket {
    #[must_use]
    pub fn trigger(&self) -> SubmissionTrigger {
        self.token.trigger()
    }
}

/// What a single clock tick produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub events: Vec<ClockEvent>,
    /// Present when expiry won the guard and grading must now happen.
    pub ticket: Option<SubmissionTicket>,
}

/// Read-only view of a session for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub remaining_seconds: u32,
    pub time_limit_seconds: u32,
    pub current_index: usize,
    pub current_question_id: QuestionId,
    pub answered: usize,
    pub total: usize,
    pub warnings_fired: Vec<u32>,
    pub result: Option<SubmissionResult>,
    pub last_error: Option<String>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Aggregate root for one timed attempt at an assessment.
///
/// All methods are synchronous; the only suspension point (the grading call)
/// happens outside, between [`AssessmentSession::try_begin_submission`] and
/// [`AssessmentSession::finish_submission`].
pub struct AssessmentSession {
    id: SessionId,
    questions: Arc<QuestionSet>,
    started_at: Option<DateTime<Utc>>,
    answers: AnswerStore,
    navigator: Navigator,
    clock: SessionClock,
    guard: SubmissionGuard,
    result: Option<SubmissionResult>,
    last_error: Option<String>,
    abandoned: bool,
}

impl AssessmentSession {
    #[must_use]
    pub fn new(questions: Arc<QuestionSet>, warning_thresholds: &[u32]) -> Self {
        Self::with_id(SessionId::new_v4(), questions, warning_thresholds)
    }

    #[must_use]
    pub fn with_id(
        id: SessionId,
        questions: Arc<QuestionSet>,
        warning_thresholds: &[u32],
    ) -> Self {
        Self {
            id,
            answers: AnswerStore::new(Arc::clone(&questions)),
            navigator: Navigator::new(questions.len()),
            clock: SessionClock::new(questions.time_limit_seconds(), warning_thresholds),
            questions,
            started_at: None,
            guard: SubmissionGuard::new(),
            result: None,
            last_error: None,
            abandoned: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn question_set(&self) -> &QuestionSet {
        &self.questions
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.guard.status()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.clock.remaining()
    }

    #[must_use]
    pub fn is_clock_running(&self) -> bool {
        self.clock.is_running()
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    #[must_use]
    pub fn result(&self) -> Option<&SubmissionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// `NotStarted → InProgress`: stamps `started_at` and starts the clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` if the session left `NotStarted`
    /// and `SessionError::Abandoned` after [`AssessmentSession::abandon`].
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.abandoned {
            return Err(SessionError::Abandoned);
        }
        if !self.guard.begin() {
            return Err(SessionError::AlreadyStarted);
        }
        self.started_at = Some(now);
        self.clock.start();
        Ok(())
    }

    /// Advance the countdown by one second.
    ///
    /// When this tick expires the clock, expiry immediately tries to acquire the
    /// guard; the resulting ticket (if any) is returned for grading.
    pub fn tick(&mut self) -> TickOutcome {
        if self.guard.status() != SessionStatus::InProgress || self.abandoned {
            return TickOutcome::default();
        }
        let events = self.clock.tick();
        let ticket = if events.contains(&ClockEvent::Expired) {
            self.try_begin_submission(SubmissionTrigger::Expiry)
        } else {
            None
        };
        TickOutcome { events, ticket }
    }

    /// Record or overwrite an answer. Only allowed while `InProgress`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAcceptingAnswers` outside `InProgress` and
    /// `SessionError::Answer` for unknown questions or options.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        option: &str,
    ) -> Result<(), SessionError> {
        self.ensure_accepting_answers()?;
        self.answers.record(question_id, option)?;
        Ok(())
    }

    /// Remove an answer. Only allowed while `InProgress`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAcceptingAnswers` outside `InProgress`.
    pub fn clear_answer(
        &mut self,
        question_id: QuestionId,
    ) -> Result<Option<String>, SessionError> {
        self.ensure_accepting_answers()?;
        Ok(self.answers.clear(question_id))
    }

    fn ensure_accepting_answers(&self) -> Result<(), SessionError> {
        if self.abandoned {
            return Err(SessionError::Abandoned);
        }
        match self.guard.status() {
            SessionStatus::InProgress => Ok(()),
            other => Err(SessionError::NotAcceptingAnswers(other)),
        }
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.navigator.current()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.navigator.current())
    }

    pub fn go_to(&mut self, index: usize) -> usize {
        self.navigator.go_to(index)
    }

    pub fn next(&mut self) -> usize {
        self.navigator.next()
    }

    pub fn previous(&mut self) -> usize {
        self.navigator.previous()
    }

    #[must_use]
    pub fn overview(&self) -> Vec<OverviewCell> {
        self.navigator.overview(&self.answers)
    }

    /// Single check-and-set on the guard.
    ///
    /// The winner gets a ticket and the clock is stopped before this returns; any
    /// later caller gets `None` and must do nothing.
    pub fn try_begin_submission(&mut self, trigger: SubmissionTrigger) -> Option<SubmissionTicket> {
        if self.abandoned {
            return None;
        }
        let started_at = self.started_at?;
        let token = self.guard.try_acquire(trigger)?;
        self.clock.stop();
        self.last_error = None;
        Some(SubmissionTicket {
            session_id: self.id,
            token,
            payload: SubmissionPayload {
                assessment_id: self.questions.assessment_id(),
                started_at,
                answers: self.answers.answered(),
            },
        })
    }

    /// Apply the grader's outcome for `ticket`.
    ///
    /// Returns `false` (and changes nothing) when the ticket is not the one
    /// currently in flight.
    pub fn finish_submission(
        &mut self,
        ticket: &SubmissionTicket,
        outcome: Result<SubmissionResult, String>,
    ) -> bool {
        if ticket.session_id != self.id {
            return false;
        }
        let succeeded = outcome.is_ok();
        if !self.guard.release(ticket.token, succeeded) {
            return false;
        }
        match outcome {
            Ok(result) => self.result = Some(result),
            Err(reason) => self.last_error = Some(reason),
        }
        true
    }

    /// The hosting view went away: stop the clock and refuse any further grading.
    pub fn abandon(&mut self) {
        self.abandoned = true;
        self.clock.stop();
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let current_index = self.navigator.current();
        let current_question_id = self
            .questions
            .get(current_index)
            .or_else(|| self.questions.get(0))
            .map_or_else(|| QuestionId::new(0), Question::id);
        SessionSnapshot {
            session_id: self.id,
            status: self.guard.status(),
            started_at: self.started_at,
            remaining_seconds: self.clock.remaining(),
            time_limit_seconds: self.clock.time_limit(),
            current_index,
            current_question_id,
            answered: self.answers.answered_count(),
            total: self.questions.len(),
            warnings_fired: self.clock.warnings_fired(),
            result: self.result.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

impl fmt::Debug for AssessmentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentSession")
            .field("id", &self.id)
            .field("assessment_id", &self.questions.assessment_id())
            .field("status", &self.guard.status())
            .field("remaining", &self.clock.remaining())
            .field("answered", &self.answers.answered_count())
            .field("current", &self.navigator.current())
            .field("abandoned", &self.abandoned)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssessmentId;
    use crate::time::fixed_now;

    fn question_set(count: u64, time_limit: u32) -> Arc<QuestionSet> {
        let questions = (1..=count)
            .map(|id| Question::new(QuestionId::new(id), format!("Q{id}"), ["yes", "no"]))
            .collect();
        Arc::new(
            QuestionSet::new(AssessmentId::new(7), None, questions, time_limit, None).unwrap(),
        )
    }

    fn started(count: u64, time_limit: u32) -> AssessmentSession {
        let mut session = AssessmentSession::new(question_set(count, time_limit), &[]);
        session.start(fixed_now()).unwrap();
        session
    }

    fn passing() -> SubmissionResult {
        SubmissionResult {
            score: 100.0,
            is_passed: true,
            certificate_url: None,
            certificate_code: Some("CERT-1".into()),
        }
    }

    #[test]
    fn start_stamps_time_once() {
        let mut session = AssessmentSession::new(question_set(2, 60), &[]);
        assert_eq!(session.status(), SessionStatus::NotStarted);
        session.start(fixed_now()).unwrap();
        assert_eq!(session.started_at(), Some(fixed_now()));
        assert!(session.is_clock_running());
        let later = fixed_now() + chrono::Duration::seconds(5);
        assert_eq!(session.start(later), Err(SessionError::AlreadyStarted));
        assert_eq!(session.started_at(), Some(fixed_now()));
    }

    #[test]
    fn ticks_before_start_do_nothing() {
        let mut session = AssessmentSession::new(question_set(1, 5), &[]);
        assert_eq!(session.tick(), TickOutcome::default());
        assert_eq!(session.remaining_seconds(), 5);
    }

    #[test]
    fn partial_submission_sends_only_answered_questions() {
        let mut session = started(25, 600);
        for id in 1..=10 {
            session.record_answer(QuestionId::new(id * 2), "yes").unwrap();
        }
        let ticket = session.try_begin_submission(SubmissionTrigger::Manual).unwrap();
        assert_eq!(ticket.payload.answers.len(), 10);
        assert!(
            ticket
                .payload
                .answers
                .iter()
                .all(|a| a.question_id.value() % 2 == 0 && a.selected_answer == "yes")
        );
        assert_eq!(ticket.payload.started_at, fixed_now());
        assert_eq!(ticket.payload.assessment_id, AssessmentId::new(7));
    }

    #[test]
    fn navigation_does_not_touch_answers() {
        let mut session = started(6, 600);
        session.go_to(4);
        let q5 = session.current_question().unwrap().id();
        session.record_answer(q5, "no").unwrap();
        session.go_to(0);
        assert_eq!(session.current_index(), 0);
        session.go_to(4);
        assert_eq!(session.answers().get(q5), Some("no"));
        assert_eq!(session.go_to(99), 5);
    }

    #[test]
    fn expiry_acquires_guard_and_stops_clock() {
        let mut session = started(3, 2);
        session.record_answer(QuestionId::new(2), "yes").unwrap();
        assert!(session.tick().ticket.is_none());
        let outcome = session.tick();
        assert!(outcome.events.contains(&ClockEvent::Expired));
        let ticket = outcome.ticket.unwrap();
        assert_eq!(ticket.trigger(), SubmissionTrigger::Expiry);
        assert_eq!(ticket.payload.answers.len(), 1);
        assert_eq!(session.status(), SessionStatus::Submitting);
        assert!(!session.is_clock_running());
        assert_eq!(session.tick(), TickOutcome::default());
    }

    #[test]
    fn manual_submit_after_expiry_is_a_no_op() {
        let mut session = started(1, 1);
        let ticket = session.tick().ticket.unwrap();
        assert!(session.try_begin_submission(SubmissionTrigger::Manual).is_none());
        assert!(session.finish_submission(&ticket, Ok(passing())));
        assert_eq!(session.status(), SessionStatus::Submitted);
        assert_eq!(session.result(), Some(&passing()));
    }

    #[test]
    fn manual_submit_stops_clock_so_expiry_never_fires() {
        let mut session = started(1, 3);
        let _ticket = session.try_begin_submission(SubmissionTrigger::Manual).unwrap();
        for _ in 0..5 {
            assert_eq!(session.tick(), TickOutcome::default());
        }
        assert_eq!(session.remaining_seconds(), 3);
    }

    #[test]
    fn failure_keeps_answers_and_allows_retry() {
        let mut session = started(3, 60);
        session.record_answer(QuestionId::new(1), "yes").unwrap();
        let ticket = session.try_begin_submission(SubmissionTrigger::Manual).unwrap();
        assert!(session.finish_submission(&ticket, Err("timeout".into())));
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.last_error(), Some("timeout"));
        assert_eq!(session.answers().get(QuestionId::new(1)), Some("yes"));
        assert!(matches!(
            session.record_answer(QuestionId::new(2), "no"),
            Err(SessionError::NotAcceptingAnswers(SessionStatus::Failed))
        ));

        let retry = session.try_begin_submission(SubmissionTrigger::Manual).unwrap();
        assert_eq!(retry.payload, ticket.payload);
        assert_eq!(session.last_error(), None);
        assert!(session.finish_submission(&retry, Ok(passing())));
        assert_eq!(session.status(), SessionStatus::Submitted);
    }

    #[test]
    fn abandon_blocks_grading_and_ticks() {
        let mut session = started(2, 2);
        session.abandon();
        assert!(!session.is_clock_running());
        assert_eq!(session.tick(), TickOutcome::default());
        assert!(session.try_begin_submission(SubmissionTrigger::Manual).is_none());
        assert_eq!(
            session.record_answer(QuestionId::new(1), "yes"),
            Err(SessionError::Abandoned)
        );
    }

    #[test]
    fn invalid_answer_is_rejected() {
        let mut session = started(2, 60);
        let err = session.record_answer(QuestionId::new(1), "maybe").unwrap_err();
        assert!(matches!(err, SessionError::Answer(AnswerError::InvalidOption { .. })));
        let err = session.record_answer(QuestionId::new(50), "yes").unwrap_err();
        assert!(matches!(err, SessionError::Answer(AnswerError::UnknownQuestion(_))));
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut session = AssessmentSession::new(question_set(3, 400), &[300]);
        session.start(fixed_now()).unwrap();
        session.record_answer(QuestionId::new(3), "no").unwrap();
        session.next();
        for _ in 0..100 {
            session.tick();
        }
        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::InProgress);
        assert_eq!(snap.remaining_seconds, 300);
        assert_eq!(snap.warnings_fired, vec![300]);
        assert_eq!(snap.current_index, 1);
        assert_eq!(snap.current_question_id, QuestionId::new(2));
        assert_eq!(snap.answered, 1);
        assert_eq!(snap.total, 3);
    }

    #[test]
    fn overview_marks_answered_and_current() {
        let mut session = started(3, 60);
        session.record_answer(QuestionId::new(2), "yes").unwrap();
        session.go_to(2);
        let cells = session.overview();
        assert_eq!(cells.len(), 3);
        assert!(!cells[0].answered);
        assert!(cells[1].answered);
        assert!(cells[2].current && !cells[0].current);
    }
}
