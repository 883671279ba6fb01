use std::sync::Arc;

use tracing::{info, warn};

use assess_core::model::{CandidateId, GatingDecision, GatingStatus, JobId, SubmissionResult};
use storage::repository::GatingRepository;

use crate::Clock;
use crate::collaborators::GatingCheck;
use crate::error::GatingServiceError;

/// Decides whether a candidate may apply to a job or must take its
/// pre-selection test first, and remembers the answer.
#[derive(Clone)]
pub struct GatingService {
    clock: Clock,
    remote: Arc<dyn GatingCheck>,
    decisions: Arc<dyn GatingRepository>,
}

impl GatingService {
    #[must_use]
    pub fn new(
        clock: Clock,
        remote: Arc<dyn GatingCheck>,
        decisions: Arc<dyn GatingRepository>,
    ) -> Self {
        Self {
            clock,
            remote,
            decisions,
        }
    }

    /// Ask the server and remember the verdict.
    ///
    /// A failure to persist the verdict is logged and does not fail the check.
    ///
    /// # Errors
    ///
    /// Returns `GatingServiceError::Api` when the status cannot be fetched.
    pub async fn evaluate(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<GatingDecision, GatingServiceError> {
        let status = self.remote.check(job_id, candidate_id).await?;
        let decision = GatingDecision::from_status(job_id, candidate_id, &status, self.clock.now());
        info!(
            job_id = %job_id,
            candidate_id = %candidate_id,
            verdict = decision.verdict.as_str(),
            "gating check"
        );
        self.remember(&decision).await;
        Ok(decision)
    }

    /// Previously remembered decision, if any. Does not contact the server.
    ///
    /// # Errors
    ///
    /// Returns `GatingServiceError::Storage` on repository failures.
    pub async fn cached_decision(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<Option<GatingDecision>, GatingServiceError> {
        Ok(self.decisions.get_decision(job_id, candidate_id).await?)
    }

    /// Evaluate once and refuse unless the test still has to be taken.
    ///
    /// # Errors
    ///
    /// Returns `GatingServiceError::Blocked` with the verdict when the candidate
    /// has no test to take (not required, already passed or already failed).
    pub async fn ensure_may_start_test(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<GatingDecision, GatingServiceError> {
        let decision = self.evaluate(job_id, candidate_id).await?;
        if decision.verdict.may_start_test() {
            Ok(decision)
        } else {
            Err(GatingServiceError::Blocked(decision.verdict))
        }
    }

    /// Evaluate once and refuse unless the application may proceed.
    ///
    /// # Errors
    ///
    /// Returns `GatingServiceError::Blocked` when a test is pending or failed.
    pub async fn ensure_may_apply(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<GatingDecision, GatingServiceError> {
        let decision = self.evaluate(job_id, candidate_id).await?;
        if decision.verdict.may_apply() {
            Ok(decision)
        } else {
            Err(GatingServiceError::Blocked(decision.verdict))
        }
    }

    /// Update the remembered decision from a graded pre-selection test.
    pub async fn record_submission(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
        passing_score: Option<u32>,
        result: &SubmissionResult,
    ) -> GatingDecision {
        let status = GatingStatus {
            required: true,
            submitted: true,
            score: Some(result.score),
            passing_score,
            is_passed: Some(result.is_passed),
        };
        let decision = GatingDecision::from_status(job_id, candidate_id, &status, self.clock.now());
        self.remember(&decision).await;
        decision
    }

    /// Drop the remembered decision.
    ///
    /// # Errors
    ///
    /// Returns `GatingServiceError::Storage` on repository failures.
    pub async fn forget(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<(), GatingServiceError> {
        Ok(self.decisions.clear_decision(job_id, candidate_id).await?)
    }

    async fn remember(&self, decision: &GatingDecision) {
        if let Err(err) = self.decisions.save_decision(decision).await {
            warn!(
                job_id = %decision.job_id,
                candidate_id = %decision.candidate_id,
                error = %err,
                "failed to persist gating decision"
            );
        }
    }
}
