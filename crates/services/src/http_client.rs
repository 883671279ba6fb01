use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use assess_core::model::{
    AppSettings, AssessmentId, AssessmentWire, CandidateId, GatingStatus, JobId,
    SubmissionPayload, SubmissionResult,
};

use crate::collaborators::{AssessmentSource, ExternalGrader, GatingCheck};
use crate::error::{ApiError, GraderError};

/// Some endpoints wrap their body in `{"data": ...}`, others return it bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } | Envelope::Bare(data) => data,
        }
    }
}

/// JSON-over-HTTP adapter for the job-board API.
#[derive(Clone, Debug)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApiClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Build a client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotConfigured` when no base URL is set.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, ApiError> {
        let base_url = settings.api_base_url().ok_or(ApiError::NotConfigured)?;
        Ok(Self::new(base_url, settings.api_token().map(str::to_string)))
    }

    fn assessment_url(&self, id: AssessmentId) -> String {
        format!("{}/assessments/{id}", self.base_url)
    }

    fn job_test_url(&self, job_id: JobId) -> String {
        format!("{}/jobs/{job_id}/preselection-test", self.base_url)
    }

    fn gating_url(&self, job_id: JobId, candidate_id: CandidateId) -> String {
        format!(
            "{}/jobs/{job_id}/preselection-test/status?candidateId={candidate_id}",
            self.base_url
        )
    }

    fn submit_url(&self, id: AssessmentId) -> String {
        format!("{}/assessments/{id}/submit", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ApiError> {
        debug!(%url, "GET");
        let response = self.authorized(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }
        Ok(response.json::<Envelope<T>>().await?.into_inner())
    }
}

#[async_trait]
impl AssessmentSource for HttpApiClient {
    async fn fetch_assessment(&self, id: AssessmentId) -> Result<AssessmentWire, ApiError> {
        self.get_json(self.assessment_url(id)).await
    }

    async fn fetch_job_test(&self, job_id: JobId) -> Result<AssessmentWire, ApiError> {
        self.get_json(self.job_test_url(job_id)).await
    }
}

#[async_trait]
impl GatingCheck for HttpApiClient {
    async fn check(
        &self,
        job_id: JobId,
        candidate_id: CandidateId,
    ) -> Result<GatingStatus, ApiError> {
        self.get_json(self.gating_url(job_id, candidate_id)).await
    }
}

#[async_trait]
impl ExternalGrader for HttpApiClient {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionResult, GraderError> {
        let url = self.submit_url(payload.assessment_id);
        debug!(%url, answers = payload.answers.len(), "POST");
        let response = self
            .authorized(self.client.post(url))
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;
        grade_response(response).await
    }
}

fn transport_error(err: reqwest::Error) -> GraderError {
    if err.is_connect() || err.is_timeout() {
        GraderError::Transport(err.to_string())
    } else {
        GraderError::Http(err)
    }
}

async fn grade_response(response: Response) -> Result<SubmissionResult, GraderError> {
    let status = response.status();
    if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
        let body = response.text().await.unwrap_or_default();
        return Err(GraderError::Rejected(body));
    }
    if !status.is_success() {
        return Err(GraderError::HttpStatus(status));
    }
    Ok(response.json::<Envelope<SubmissionResult>>().await?.into_inner())
}
