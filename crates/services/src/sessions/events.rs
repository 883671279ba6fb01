use tokio::sync::mpsc::UnboundedReceiver;

use assess_core::model::{SessionId, SubmissionResult, SubmissionTrigger};

/// Notifications a running session pushes to its host view.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started {
        session_id: SessionId,
        remaining_seconds: u32,
    },
    Tick {
        remaining_seconds: u32,
    },
    ThresholdCrossed {
        seconds: u32,
    },
    Expired,
    /// The guard was acquired; raised once per grading attempt.
    Submitting {
        trigger: SubmissionTrigger,
        answered: usize,
    },
    Submitted(SubmissionResult),
    /// Grading failed; a manual retry is allowed and answers are intact.
    Failed {
        reason: String,
    },
}

pub type SessionEvents = UnboundedReceiver<SessionEvent>;
