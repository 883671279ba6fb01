//! The timed assessment-taking engine: answers, navigation, countdown and the
//! submission state machine, all synchronous and deterministic.

mod answers;
mod clock;
mod guard;
mod navigator;
mod state;

pub use answers::{AnswerError, AnswerStore};
pub use clock::{ClockEvent, SessionClock};
pub use guard::{GuardToken, SessionStatus, SubmissionGuard};
pub use navigator::{Navigator, OverviewCell};
pub use state::{AssessmentSession, SessionError, SessionSnapshot, SubmissionTicket, TickOutcome};
