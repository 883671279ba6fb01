mod gating;
mod ids;
mod options;
mod question;
mod settings;
mod submission;

pub use gating::{GatingDecision, GatingStatus, GatingVerdict};
pub use ids::{AssessmentId, CandidateId, JobId, ParseIdError, QuestionId, SessionId};
pub use options::normalize_options;
pub use question::{AssessmentWire, Question, QuestionSet, QuestionSetError, QuestionWire};
pub use settings::{AppSettings, AppSettingsDraft, DEFAULT_WARNING_THRESHOLDS, SettingsError};
pub use submission::{
    AnsweredQuestion, SubmissionPayload, SubmissionReceipt, SubmissionResult, SubmissionTrigger,
};
