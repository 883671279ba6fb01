//! Contracts for the remote services the session engine talks to.

use async_trait::async_trait;

use assess_core::model::{
    AssessmentId, AssessmentWire, CandidateId, GatingStatus, JobId, SubmissionPayload,
    SubmissionResult,
};

use crate::error::{ApiError, GraderError};

/// Scores a finished session. Called at most once per acquisition of the
/// submission guard; the engine never retries on its own.
#[async_trait]
pub trait ExternalGrader: Send + Sync {
    /// # Errors
    ///
    /// Returns `GraderError` for transport failures or a rejected payload.
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionResult, GraderError>;
}

/// Where question sets come from.
#[async_trait]
pub trait AssessmentSource: Send + Sync {
    /// Fetch a skill assessment.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the assessment cannot be fetched.
    async fn fetch_assessment(&self, id: AssessmentId) -> Result<AssessmentWire, ApiError>;

    /// Fetch the pre-selection test attached to a job.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the test cannot be fetched.
    async fn fetch_job_test(&self, job_id: JobId) -> Result<AssessmentWire, ApiError>;
}

/// Asks whether a candidate still has to take (or already failed) a job's test.
#[async_trait]
pub trait GatingCheck: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` if the status cannot be fetched.
    async fn check(&self, job_id: JobId, candidate_id: CandidateId)
    -> Result<GatingStatus, ApiError>;
}
