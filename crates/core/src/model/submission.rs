use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AssessmentId, QuestionId, SessionId};

/// Which of the two independent triggers asked for grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionTrigger {
    /// The candidate pressed submit.
    Manual,
    /// The countdown reached zero.
    Expiry,
}

impl SubmissionTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Expiry => "expiry",
        }
    }
}

/// A single answered question as sent to the grader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    pub question_id: QuestionId,
    pub selected_answer: String,
}

/// Request body for the remote grading call. Only answered questions are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub assessment_id: AssessmentId,
    pub started_at: DateTime<Utc>,
    pub answers: Vec<AnsweredQuestion>,
}

/// Grading verdict owned by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub score: f64,
    pub is_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_code: Option<String>,
}

/// Local record of a graded session, kept for the results view.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub session_id: SessionId,
    pub assessment_id: AssessmentId,
    pub trigger: SubmissionTrigger,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub answered: u32,
    pub total: u32,
    pub result: SubmissionResult,
}

impl SubmissionTrigger {
    /// Parse the value produced by [`SubmissionTrigger::as_str`].
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "manual" => Some(Self::Manual),
            "expiry" => Some(Self::Expiry),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use serde_json::json;

    #[test]
    fn payload_uses_camel_case_field_names() {
        let payload = SubmissionPayload {
            assessment_id: AssessmentId::new(5),
            started_at: fixed_now(),
            answers: vec![AnsweredQuestion {
                question_id: QuestionId::new(1),
                selected_answer: "fn".into(),
            }],
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["assessmentId"], json!(5));
        assert_eq!(value["startedAt"], json!("2023-11-14T22:13:20Z"));
        assert_eq!(
            value["answers"],
            json!([{"questionId": 1, "selectedAnswer": "fn"}])
        );
    }

    #[test]
    fn result_accepts_missing_certificate() {
        let result: SubmissionResult =
            serde_json::from_value(json!({"score": 42.5, "isPassed": false})).unwrap();
        assert!(!result.is_passed);
        assert_eq!(result.certificate_url, None);
        assert_eq!(result.certificate_code, None);
    }

    #[test]
    fn trigger_names_round_trip() {
        for trigger in [SubmissionTrigger::Manual, SubmissionTrigger::Expiry] {
            assert_eq!(SubmissionTrigger::parse(trigger.as_str()), Some(trigger));
        }
        assert_eq!(SubmissionTrigger::parse("timer"), None);
    }
}
