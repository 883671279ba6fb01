use async_trait::async_trait;
use assess_core::model::{AssessmentId, SubmissionReceipt};

use crate::repository::{ReceiptId, ReceiptRepository, StorageError};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_receipt_row};

const RECEIPT_COLUMNS: &str = "session_id, assessment_id, submit_trigger, started_at, submitted_at, \
     answered, total, score, is_passed, certificate_url, certificate_code";

#[async_trait]
impl ReceiptRepository for SqliteRepository {
    async fn append_receipt(&self, receipt: &SubmissionReceipt) -> Result<ReceiptId, StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO submission_receipts (
                session_id,
                assessment_id,
                submit_trigger,
                started_at,
                submitted_at,
                answered,
                total,
                score,
                is_passed,
                certificate_url,
                certificate_code
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(receipt.session_id.to_string())
        .bind(id_to_i64("assessment_id", receipt.assessment_id.value())?)
        .bind(receipt.trigger.as_str())
        .bind(receipt.started_at)
        .bind(receipt.submitted_at)
        .bind(i64::from(receipt.answered))
        .bind(i64::from(receipt.total))
        .bind(receipt.result.score)
        .bind(receipt.result.is_passed)
        .bind(receipt.result.certificate_url.as_deref())
        .bind(receipt.result.certificate_code.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    async fn get_receipt(&self, id: ReceiptId) -> Result<SubmissionReceipt, StorageError> {
        let sql = format!("SELECT {RECEIPT_COLUMNS} FROM submission_receipts WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?
            .ok_or(StorageError::NotFound)?;
        map_receipt_row(&row)
    }

    async fn latest_receipt(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Option<SubmissionReceipt>, StorageError> {
        let sql = format!(
            "SELECT {RECEIPT_COLUMNS} FROM submission_receipts \
             WHERE assessment_id = ?1 ORDER BY submitted_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(id_to_i64("assessment_id", assessment_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        row.as_ref().map(map_receipt_row).transpose()
    }
}
