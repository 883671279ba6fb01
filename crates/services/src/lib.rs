#![forbid(unsafe_code)]

pub mod collaborators;
pub mod config;
pub mod error;
pub mod gating_service;
pub mod http_client;
pub mod sessions;

pub use assess_core::Clock;

pub use collaborators::{AssessmentSource, ExternalGrader, GatingCheck};
pub use error::{ApiError, GatingServiceError, GraderError, RunnerError};
pub use gating_service::GatingService;
pub use http_client::HttpApiClient;
pub use sessions::{SessionEvent, SessionEvents, SessionHandle, SessionRunner};
