use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CandidateId, JobId};

/// Remote answer to "does this job require a pre-selection test, and how did
/// this candidate do on it?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatingStatus {
    pub required: bool,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub passing_score: Option<u32>,
    #[serde(default)]
    pub is_passed: Option<bool>,
}

/// What the application flow is allowed to do for a job + candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatingVerdict {
    /// No test configured; apply directly.
    NotRequired,
    /// Test configured but not taken yet; redirect to the test.
    TestRequired,
    /// Test taken and passed; apply directly.
    Passed,
    /// Test taken and failed; application is closed for this candidate.
    NotPassed,
}

impl GatingStatus {
    #[must_use]
    pub fn verdict(&self) -> GatingVerdict {
        if !self.required {
            return GatingVerdict::NotRequired;
        }
        if !self.submitted {
            return GatingVerdict::TestRequired;
        }
        if self.passed() {
            GatingVerdict::Passed
        } else {
            GatingVerdict::NotPassed
        }
    }

    // An explicit verdict wins; otherwise fall back to comparing the score.
    fn passed(&self) -> bool {
        if let Some(passed) = self.is_passed {
            return passed;
        }
        match (self.score, self.passing_score) {
            (Some(score), Some(passing)) => score >= f64::from(passing),
            _ => false,
        }
    }
}

impl GatingVerdict {
    #[must_use]
    pub fn may_apply(self) -> bool {
        matches!(self, Self::NotRequired | Self::Passed)
    }

    #[must_use]
    pub fn may_start_test(self) -> bool {
        matches!(self, Self::TestRequired)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::TestRequired => "test_required",
            Self::Passed => "passed",
            Self::NotPassed => "not_passed",
        }
    }

    /// Parse the value produced by [`GatingVerdict::as_str`].
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "not_required" => Some(Self::NotRequired),
            "test_required" => Some(Self::TestRequired),
            "passed" => Some(Self::Passed),
            "not_passed" => Some(Self::NotPassed),
            _ => None,
        }
    }
}

/// A gating verdict remembered for a job + candidate pair so the application
/// flow can resume after a reload without asking the server again.
#[derive(Debug, Clone, PartialEq)]
pub struct GatingDecision {
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub verdict: GatingVerdict,
    pub score: Option<f64>,
    pub passing_score: Option<u32>,
    pub checked_at: DateTime<Utc>,
}

impl GatingDecision {
    #[must_use]
    pub fn from_status(
        job_id: JobId,
        candidate_id: CandidateId,
        status: &GatingStatus,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            candidate_id,
            verdict: status.verdict(),
            score: status.score,
            passing_score: status.passing_score,
            checked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(required: bool, submitted: bool, is_passed: Option<bool>) -> GatingStatus {
        GatingStatus {
            required,
            submitted,
            score: None,
            passing_score: None,
            is_passed,
        }
    }

    #[test]
    fn not_required_allows_application() {
        let verdict = status(false, false, None).verdict();
        assert_eq!(verdict, GatingVerdict::NotRequired);
        assert!(verdict.may_apply());
        assert!(!verdict.may_start_test());
    }

    #[test]
    fn required_and_not_submitted_redirects_to_test() {
        let verdict = status(true, false, None).verdict();
        assert_eq!(verdict, GatingVerdict::TestRequired);
        assert!(!verdict.may_apply());
        assert!(verdict.may_start_test());
    }

    #[test]
    fn submitted_and_failed_blocks_everything() {
        let verdict = status(true, true, Some(false)).verdict();
        assert_eq!(verdict, GatingVerdict::NotPassed);
        assert!(!verdict.may_apply());
        assert!(!verdict.may_start_test());
    }

    #[test]
    fn submitted_and_passed_allows_application() {
        assert_eq!(status(true, true, Some(true)).verdict(), GatingVerdict::Passed);
    }

    #[test]
    fn score_decides_when_verdict_missing() {
        let mut s = status(true, true, None);
        s.score = Some(80.0);
        s.passing_score = Some(75);
        assert_eq!(s.verdict(), GatingVerdict::Passed);
        s.score = Some(74.9);
        assert_eq!(s.verdict(), GatingVerdict::NotPassed);
    }

    #[test]
    fn verdict_string_round_trip() {
        for verdict in [
            GatingVerdict::NotRequired,
            GatingVerdict::TestRequired,
            GatingVerdict::Passed,
            GatingVerdict::NotPassed,
        ] {
            assert_eq!(GatingVerdict::parse(verdict.as_str()), Some(verdict));
        }
        assert_eq!(GatingVerdict::parse("maybe"), None);
    }

    #[test]
    fn decision_captures_verdict_and_scores() {
        let mut s = status(true, true, Some(false));
        s.score = Some(40.0);
        s.passing_score = Some(60);
        let decision = GatingDecision::from_status(
            JobId::new(4),
            CandidateId::new(8),
            &s,
            crate::time::fixed_now(),
        );
        assert_eq!(decision.verdict, GatingVerdict::NotPassed);
        assert_eq!(decision.score, Some(40.0));
        assert_eq!(decision.passing_score, Some(60));
    }
}
