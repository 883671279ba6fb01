use async_trait::async_trait;
use assess_core::model::{CandidateId, GatingDecision, JobId};

use crate::repository::{GatingRepository, StorageError};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_decision_row};

#[async_trait]
impl GatingRepository for SqliteRepository {
    async fn save_decision(&self, decision: &GatingDecision) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO gating_decisions (
                job_id,
                candidate_id,
                verdict,
                score,
                passing_score,
                checked_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(job_id, candidate_id) DO UPDATE SET
                verdict = excluded.verdict,
                score = excluded.score,
                passing_score = excluded.passing_score,
                checked_at = excluded.checked_at
            ",
        )
        .bind(id_to_i64("job_id", decision.job_id.value())?)
        .bind(id_to_i64("candidate_id", decision.candidate_id.value())?)
        .bind(decision.verdict.as_str())
        .bind(decision.score)
        .bind(decision.passing_score.map(i64::from))
        .bind(decision.checked_at)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn get_decision(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<Option<GatingDecision>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT job_id, candidate_id, verdict, score, passing_score, checked_at
            FROM gating_decisions
            WHERE job_id = ?1 AND candidate_id = ?2
            ",
        )
        .bind(id_to_i64("job_id", job_id.value())?)
        .bind(id_to_i64("candidate_id", candidate_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        row.as_ref().map(map_decision_row).transpose()
    }

    async fn clear_decision(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM gating_decisions WHERE job_id = ?1 AND candidate_id = ?2")
            .bind(id_to_i64("job_id", job_id.value())?)
            .bind(id_to_i64("candidate_id", candidate_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}
