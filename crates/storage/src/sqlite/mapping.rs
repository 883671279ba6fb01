use assess_core::model::{
    AssessmentId, CandidateId, GatingDecision, GatingVerdict, JobId, SessionId,
    SubmissionReceipt, SubmissionResult, SubmissionTrigger,
};
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn map_decision_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<GatingDecision, StorageError> {
    let verdict_raw: String = row.try_get("verdict").map_err(ser)?;
    let verdict = GatingVerdict::parse(&verdict_raw)
        .ok_or_else(|| StorageError::Serialization(format!("invalid verdict: {verdict_raw}")))?;

    let passing_score = row
        .try_get::<Option<i64>, _>("passing_score")
        .map_err(ser)?
        .map(|v| i64_to_u32("passing_score", v))
        .transpose()?;

    Ok(GatingDecision {
        job_id: JobId::new(i64_to_u64("job_id", row.try_get("job_id").map_err(ser)?)?),
        candidate_id: CandidateId::new(i64_to_u64(
            "candidate_id",
            row.try_get("candidate_id").map_err(ser)?,
        )?),
        verdict,
        score: row.try_get("score").map_err(ser)?,
        passing_score,
        checked_at: row.try_get::<DateTime<Utc>, _>("checked_at").map_err(ser)?,
    })
}

pub(crate) fn map_receipt_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<SubmissionReceipt, StorageError> {
    let session_raw: String = row.try_get("session_id").map_err(ser)?;
    let session_id: SessionId = session_raw.parse().map_err(ser)?;

    let trigger_raw: String = row.try_get("submit_trigger").map_err(ser)?;
    let trigger = SubmissionTrigger::parse(&trigger_raw)
        .ok_or_else(|| StorageError::Serialization(format!("invalid trigger: {trigger_raw}")))?;

    Ok(SubmissionReceipt {
        session_id,
        assessment_id: AssessmentId::new(i64_to_u64(
            "assessment_id",
            row.try_get("assessment_id").map_err(ser)?,
        )?),
        trigger,
        started_at: row.try_get("started_at").map_err(ser)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
        answered: i64_to_u32("answered", row.try_get("answered").map_err(ser)?)?,
        total: i64_to_u32("total", row.try_get("total").map_err(ser)?)?,
        result: SubmissionResult {
            score: row.try_get("score").map_err(ser)?,
            is_passed: row.try_get("is_passed").map_err(ser)?,
            certificate_url: row.try_get("certificate_url").map_err(ser)?,
            certificate_code: row.try_get("certificate_code").map_err(ser)?,
        },
    })
}
