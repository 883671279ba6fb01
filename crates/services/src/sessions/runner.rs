use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use assess_core::model::{
    AppSettings, AssessmentId, CandidateId, DEFAULT_WARNING_THRESHOLDS, JobId, QuestionSet,
};
use assess_core::session::AssessmentSession;
use storage::repository::ReceiptRepository;

use crate::Clock;
use crate::collaborators::{AssessmentSource, ExternalGrader};
use crate::error::RunnerError;
use crate::gating_service::GatingService;

use super::events::SessionEvents;
use super::handle::SessionHandle;

/// One countdown step per second.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Creates sessions and wires them to the grader, the countdown driver and
/// receipt storage.
#[derive(Clone)]
pub struct SessionRunner {
    clock: Clock,
    grader: Arc<dyn ExternalGrader>,
    receipts: Option<Arc<dyn ReceiptRepository>>,
    warning_thresholds: Vec<u32>,
    tick_period: Duration,
}

impl SessionRunner {
    #[must_use]
    pub fn new(clock: Clock, grader: Arc<dyn ExternalGrader>) -> Self {
        Self {
            clock,
            grader,
            receipts: None,
            warning_thresholds: DEFAULT_WARNING_THRESHOLDS.to_vec(),
            tick_period: DEFAULT_TICK_PERIOD,
        }
    }

    /// Persist a receipt for every graded session.
    #[must_use]
    pub fn with_receipts(mut self, receipts: Arc<dyn ReceiptRepository>) -> Self {
        self.receipts = Some(receipts);
        self
    }

    #[must_use]
    pub fn with_warning_thresholds(mut self, thresholds: &[u32]) -> Self {
        self.warning_thresholds = thresholds.to_vec();
        self
    }

    #[must_use]
    pub fn with_settings(self, settings: &AppSettings) -> Self {
        self.with_warning_thresholds(settings.warning_thresholds())
    }

    /// Override the countdown period. Intended for tests and demos.
    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Start a session over an already loaded question set.
    ///
    /// Must be called from within a Tokio runtime; the countdown runs on a
    /// spawned task that lives until the session leaves `InProgress` or the
    /// returned handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Session` if the session cannot be started.
    pub fn start(
        &self,
        questions: Arc<QuestionSet>,
    ) -> Result<(SessionHandle, SessionEvents), RunnerError> {
        let mut session = AssessmentSession::new(Arc::clone(&questions), &self.warning_thresholds);
        session.start(self.clock.now())?;
        info!(
            session_id = %session.id(),
            assessment_id = %session.question_set().assessment_id(),
            questions = session.question_set().len(),
            time_limit = session.question_set().time_limit_seconds(),
            "session started"
        );
        Ok(SessionHandle::spawn(
            session,
            questions,
            self.clock,
            Arc::clone(&self.grader),
            self.receipts.clone(),
            self.tick_period,
        ))
    }

    /// Fetch a skill assessment and start a session over it.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Fetch` or `RunnerError::QuestionSet` when the
    /// assessment cannot be loaded; no session exists in that case.
    pub async fn start_assessment(
        &self,
        source: &dyn AssessmentSource,
        assessment_id: AssessmentId,
    ) -> Result<(SessionHandle, SessionEvents), RunnerError> {
        let wire = source.fetch_assessment(assessment_id).await?;
        let questions = QuestionSet::from_wire(wire)?;
        self.start(Arc::new(questions))
    }

    /// Check gating once, then fetch the job's pre-selection test and start it.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Gating` when the candidate may not take the test
    /// and `RunnerError::Fetch`/`RunnerError::QuestionSet` when it cannot be loaded.
    pub async fn start_preselection(
        &self,
        gating: &GatingService,
        source: &dyn AssessmentSource,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<(SessionHandle, SessionEvents), RunnerError> {
        gating.ensure_may_start_test(job_id, candidate_id).await?;
        let wire = source.fetch_job_test(job_id).await?;
        let questions = QuestionSet::from_wire(wire)?;
        self.start(Arc::new(questions))
    }
}
