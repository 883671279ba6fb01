use assess_core::model::{
    AssessmentId, CandidateId, GatingDecision, GatingVerdict, JobId, SessionId,
    SubmissionReceipt, SubmissionResult, SubmissionTrigger,
};
use assess_core::time::fixed_now;
use chrono::Duration;
use storage::repository::{GatingRepository, ReceiptRepository, Storage, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn receipt(assessment: u64, offset_secs: i64, certificate: Option<&str>) -> SubmissionReceipt {
    SubmissionReceipt {
        session_id: SessionId::new_v4(),
        assessment_id: AssessmentId::new(assessment),
        trigger: SubmissionTrigger::Expiry,
        started_at: fixed_now(),
        submitted_at: fixed_now() + Duration::seconds(offset_secs),
        answered: 10,
        total: 25,
        result: SubmissionResult {
            score: 72.5,
            is_passed: true,
            certificate_url: certificate.map(|c| format!("https://certs.example.com/{c}")),
            certificate_code: certificate.map(str::to_string),
        },
    }
}

#[tokio::test]
async fn sqlite_round_trips_gating_decisions() {
    let repo = connect("memdb_gating").await;
    let decision = GatingDecision {
        job_id: JobId::new(12),
        candidate_id: CandidateId::new(34),
        verdict: GatingVerdict::NotPassed,
        score: Some(41.0),
        passing_score: Some(60),
        checked_at: fixed_now(),
    };
    repo.save_decision(&decision).await.unwrap();

    let fetched = repo
        .get_decision(JobId::new(12), CandidateId::new(34))
        .await
        .unwrap()
        .expect("decision stored");
    assert_eq!(fetched, decision);

    let updated = GatingDecision {
        verdict: GatingVerdict::TestRequired,
        score: None,
        ..decision.clone()
    };
    repo.save_decision(&updated).await.unwrap();
    let fetched = repo
        .get_decision(JobId::new(12), CandidateId::new(34))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.verdict, GatingVerdict::TestRequired);
    assert_eq!(fetched.score, None);

    repo.clear_decision(JobId::new(12), CandidateId::new(34))
        .await
        .unwrap();
    assert!(
        repo.get_decision(JobId::new(12), CandidateId::new(34))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sqlite_round_trips_receipts() {
    let repo = connect("memdb_receipts").await;
    let older = receipt(5, 10, None);
    let newer = receipt(5, 60, Some("ABC-123"));

    let older_id = repo.append_receipt(&older).await.unwrap();
    let newer_id = repo.append_receipt(&newer).await.unwrap();
    assert_ne!(older_id, newer_id);

    assert_eq!(repo.get_receipt(older_id).await.unwrap(), older);
    let latest = repo
        .latest_receipt(AssessmentId::new(5))
        .await
        .unwrap()
        .expect("latest receipt");
    assert_eq!(latest, newer);
    assert_eq!(latest.result.certificate_code.as_deref(), Some("ABC-123"));

    assert!(matches!(
        repo.get_receipt(9_999).await,
        Err(StorageError::NotFound)
    ));
    assert!(repo.latest_receipt(AssessmentId::new(6)).await.unwrap().is_none());
}

#[tokio::test]
async fn storage_sqlite_wires_both_repositories() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    let id = storage.receipts.append_receipt(&receipt(1, 1, None)).await.unwrap();
    assert!(storage.receipts.get_receipt(id).await.is_ok());
    assert!(
        storage
            .gating
            .get_decision(JobId::new(1), CandidateId::new(1))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}
