use async_trait::async_trait;
use assess_core::model::{AssessmentId, CandidateId, GatingDecision, JobId, SubmissionReceipt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage identifier for a persisted submission receipt.
pub type ReceiptId = i64;

/// Remembers gating verdicts per job + candidate.
#[async_trait]
pub trait GatingRepository: Send + Sync {
    /// Insert or replace the decision for the decision's job + candidate.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the decision cannot be stored.
    async fn save_decision(&self, decision: &GatingDecision) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures; a missing decision is `Ok(None)`.
    async fn get_decision(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<Option<GatingDecision>, StorageError>;

    /// Forget the decision so the next check goes back to the server.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn clear_decision(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<(), StorageError>;
}

/// Append-only log of graded sessions.
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the receipt cannot be stored.
    async fn append_receipt(&self, receipt: &SubmissionReceipt) -> Result<ReceiptId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no receipt has that id.
    async fn get_receipt(&self, id: ReceiptId) -> Result<SubmissionReceipt, StorageError>;

    /// Most recent receipt for an assessment, by submission time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn latest_receipt(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Option<SubmissionReceipt>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    decisions: Arc<Mutex<HashMap<(JobId, CandidateId), GatingDecision>>>,
    receipts: Arc<Mutex<Vec<SubmissionReceipt>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::Connection(err.to_string())
}

#[async_trait]
impl GatingRepository for InMemoryRepository {
    async fn save_decision(&self, decision: &GatingDecision) -> Result<(), StorageError> {
        let mut guard = self.decisions.lock().map_err(poisoned)?;
        guard.insert((decision.job_id, decision.candidate_id), decision.clone());
        Ok(())
    }

    async fn get_decision(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<Option<GatingDecision>, StorageError> {
        let guard = self.decisions.lock().map_err(poisoned)?;
        Ok(guard.get(&(job_id, candidate_id)).cloned())
    }

    async fn clear_decision(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<(), StorageError> {
        let mut guard = self.decisions.lock().map_err(poisoned)?;
        guard.remove(&(job_id, candidate_id));
        Ok(())
    }
}

#[async_trait]
impl ReceiptRepository for InMemoryRepository {
    async fn append_receipt(&self, receipt: &SubmissionReceipt) -> Result<ReceiptId, StorageError> {
        let mut guard = self.receipts.lock().map_err(poisoned)?;
        guard.push(receipt.clone());
        ReceiptId::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("receipt id overflow".into()))
    }

    async fn get_receipt(&self, id: ReceiptId) -> Result<SubmissionReceipt, StorageError> {
        let guard = self.receipts.lock().map_err(poisoned)?;
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| guard.get(index))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn latest_receipt(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Option<SubmissionReceipt>, StorageError> {
        let guard = self.receipts.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|r| r.assessment_id == assessment_id)
            .max_by_key(|r| r.submitted_at)
            .cloned())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub gating: Arc<dyn GatingRepository>,
    pub receipts: Arc<dyn ReceiptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let gating: Arc<dyn GatingRepository> = Arc::new(repo.clone());
        let receipts: Arc<dyn ReceiptRepository> = Arc::new(repo);
        Self { gating, receipts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{
        GatingVerdict, SessionId, SubmissionResult, SubmissionTrigger,
    };
    use assess_core::time::fixed_now;
    use chrono::Duration;

    fn decision(verdict: GatingVerdict) -> GatingDecision {
        GatingDecision {
            job_id: JobId::new(1),
            candidate_id: CandidateId::new(2),
            verdict,
            score: None,
            passing_score: Some(70),
            checked_at: fixed_now(),
        }
    }

    fn receipt(assessment: u64, offset_secs: i64, score: f64) -> SubmissionReceipt {
        SubmissionReceipt {
            session_id: SessionId::new_v4(),
            assessment_id: AssessmentId::new(assessment),
            trigger: SubmissionTrigger::Manual,
            started_at: fixed_now(),
            submitted_at: fixed_now() + Duration::seconds(offset_secs),
            answered: 3,
            total: 5,
            result: SubmissionResult {
                score,
                is_passed: score >= 70.0,
                certificate_url: None,
                certificate_code: None,
            },
        }
    }

    #[tokio::test]
    async fn decision_is_replaced_and_cleared() {
        let repo = InMemoryRepository::new();
        repo.save_decision(&decision(GatingVerdict::TestRequired))
            .await
            .unwrap();
        repo.save_decision(&decision(GatingVerdict::Passed)).await.unwrap();

        let stored = repo
            .get_decision(JobId::new(1), CandidateId::new(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.verdict, GatingVerdict::Passed);

        repo.clear_decision(JobId::new(1), CandidateId::new(2))
            .await
            .unwrap();
        assert!(
            repo.get_decision(JobId::new(1), CandidateId::new(2))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn receipts_are_numbered_from_one() {
        let repo = InMemoryRepository::new();
        let first = repo.append_receipt(&receipt(1, 10, 50.0)).await.unwrap();
        let second = repo.append_receipt(&receipt(1, 20, 90.0)).await.unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(repo.get_receipt(2).await.unwrap().result.score, 90.0);
        assert!(matches!(
            repo.get_receipt(0).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn latest_receipt_picks_newest_for_assessment() {
        let repo = InMemoryRepository::new();
        repo.append_receipt(&receipt(1, 30, 80.0)).await.unwrap();
        repo.append_receipt(&receipt(1, 10, 40.0)).await.unwrap();
        repo.append_receipt(&receipt(2, 99, 10.0)).await.unwrap();

        let latest = repo.latest_receipt(AssessmentId::new(1)).await.unwrap().unwrap();
        assert_eq!(latest.result.score, 80.0);
        assert!(repo.latest_receipt(AssessmentId::new(3)).await.unwrap().is_none());
    }
}
