use serde::{Deserialize, Serialize};

use crate::model::SubmissionTrigger;

/// Lifecycle of one assessment-taking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Submitting,
    Submitted,
    Failed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Failed => "failed",
        }
    }

    /// `Submitted` is final; `Failed` still allows a manual retry.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Submitted)
    }
}

/// Proof that the holder won the right to call the grader.
///
/// Each acquisition gets a fresh attempt number so a result coming back for an
/// older attempt can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardToken {
    attempt: u32,
    trigger: SubmissionTrigger,
}

impl GuardToken {
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn trigger(&self) -> SubmissionTrigger {
        self.trigger
    }
}

/// Status state machine with a single check-and-set acquire.
///
/// `NotStarted → InProgress → Submitting → {Submitted | Failed}`, plus
/// `Failed → Submitting` for a manual retry.
#[derive(Debug, Clone)]
pub struct SubmissionGuard {
    status: SessionStatus,
    attempts: u32,
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: SessionStatus::NotStarted,
            attempts: 0,
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `NotStarted → InProgress`. Returns `false` from any other state.
    pub fn begin(&mut self) -> bool {
        if self.status != SessionStatus::NotStarted {
            return false;
        }
        self.status = SessionStatus::InProgress;
        true
    }

    /// Try to move into `Submitting`.
    ///
    /// Succeeds from `InProgress` for either trigger and from `Failed` for a manual
    /// retry. Every other combination returns `None` and leaves the guard untouched.
    pub fn try_acquire(&mut self, trigger: SubmissionTrigger) -> Option<GuardToken> {
        let allowed = match self.status {
            SessionStatus::InProgress => true,
            SessionStatus::Failed => trigger == SubmissionTrigger::Manual,
            SessionStatus::NotStarted | SessionStatus::Submitting | SessionStatus::Submitted => {
                false
            }
        };
        if !allowed {
            return None;
        }
        self.status = SessionStatus::Submitting;
        self.attempts = self.attempts.saturating_add(1);
        Some(GuardToken {
            attempt: self.attempts,
            trigger,
        })
    }

    /// Release the guard with the grader's outcome. Returns `false` for a stale token.
    pub fn release(&mut self, token: GuardToken, succeeded: bool) -> bool {
        if self.status != SessionStatus::Submitting || token.attempt != self.attempts {
            return false;
        }
        self.status = if succeeded {
            SessionStatus::Submitted
        } else {
            SessionStatus::Failed
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_progress() -> SubmissionGuard {
        let mut guard = SubmissionGuard::new();
        assert!(guard.begin());
        guard
    }

    #[test]
    fn cannot_acquire_before_start() {
        let mut guard = SubmissionGuard::new();
        assert!(guard.try_acquire(SubmissionTrigger::Manual).is_none());
        assert_eq!(guard.status(), SessionStatus::NotStarted);
    }

    #[test]
    fn begin_only_once() {
        let mut guard = in_progress();
        assert!(!guard.begin());
        assert_eq!(guard.status(), SessionStatus::InProgress);
    }

    #[test]
    fn second_trigger_is_a_no_op() {
        let mut guard = in_progress();
        let token = guard.try_acquire(SubmissionTrigger::Expiry).unwrap();
        assert_eq!(token.trigger(), SubmissionTrigger::Expiry);
        assert!(guard.try_acquire(SubmissionTrigger::Manual).is_none());
        assert!(guard.try_acquire(SubmissionTrigger::Expiry).is_none());
        assert_eq!(guard.status(), SessionStatus::Submitting);
        assert_eq!(guard.attempts(), 1);
    }

    #[test]
    fn success_is_final() {
        let mut guard = in_progress();
        let token = guard.try_acquire(SubmissionTrigger::Manual).unwrap();
        assert!(guard.release(token, true));
        assert_eq!(guard.status(), SessionStatus::Submitted);
        assert!(guard.status().is_final());
        assert!(guard.try_acquire(SubmissionTrigger::Manual).is_none());
    }

    #[test]
    fn failure_allows_manual_retry_only() {
        let mut guard = in_progress();
        let token = guard.try_acquire(SubmissionTrigger::Manual).unwrap();
        assert!(guard.release(token, false));
        assert_eq!(guard.status(), SessionStatus::Failed);

        assert!(guard.try_acquire(SubmissionTrigger::Expiry).is_none());
        let retry = guard.try_acquire(SubmissionTrigger::Manual).unwrap();
        assert_eq!(retry.attempt(), 2);
        assert!(guard.release(retry, true));
        assert_eq!(guard.status(), SessionStatus::Submitted);
    }

    #[test]
    fn stale_token_is_ignored() {
        let mut guard = in_progress();
        let first = guard.try_acquire(SubmissionTrigger::Manual).unwrap();
        assert!(guard.release(first, false));
        let second = guard.try_acquire(SubmissionTrigger::Manual).unwrap();
        assert!(!guard.release(first, true));
        assert_eq!(guard.status(), SessionStatus::Submitting);
        assert!(guard.release(second, false));
        assert!(!guard.release(second, true));
    }
}
