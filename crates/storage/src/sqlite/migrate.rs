use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Creates the schema (gating decisions and submission receipts) once per database.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS gating_decisions (
                    job_id INTEGER NOT NULL,
                    candidate_id INTEGER NOT NULL,
                    verdict TEXT NOT NULL,
                    score REAL,
                    passing_score INTEGER CHECK (passing_score IS NULL OR passing_score >= 0),
                    checked_at TEXT NOT NULL,
                    PRIMARY KEY (job_id, candidate_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS submission_receipts (
                    id INTEGER PRIMARY KEY,
                    session_id TEXT NOT NULL UNIQUE,
                    assessment_id INTEGER NOT NULL,
                    submit_trigger TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    submitted_at TEXT NOT NULL,
                    answered INTEGER NOT NULL CHECK (answered >= 0),
                    total INTEGER NOT NULL CHECK (total >= answered),
                    score REAL NOT NULL,
                    is_passed INTEGER NOT NULL CHECK (is_passed IN (0, 1)),
                    certificate_url TEXT,
                    certificate_code TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_submission_receipts_assessment_submitted
                    ON submission_receipts (assessment_id, submitted_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
