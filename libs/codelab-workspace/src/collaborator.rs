//! Execution service client
//!
//! The sandbox that compiles and runs code is an external service reached
//! through two operations, RunCode and SubmitSolution. `HttpCollaborator`
//! realizes them over JSON/HTTP. It never retries: a repeated Submit could be
//! graded twice, so a failure goes back to the learner instead.

use crate::error::CollaboratorError;
use crate::templates::{normalize_template_map, TemplateSource};
use async_trait::async_trait;
use codelab_common::config::WorkspaceConfig;
use codelab_common::types::{ExecutionResponse, RunCodeRequest, SubmitSolutionRequest};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[async_trait]
pub trait ExecutionCollaborator: Send + Sync {
    async fn run_code(&self, request: &RunCodeRequest) -> Result<ExecutionResponse, CollaboratorError>;

    async fn submit_solution(
        &self,
        request: &SubmitSolutionRequest,
    ) -> Result<ExecutionResponse, CollaboratorError>;
}

#[derive(Clone)]
pub struct HttpCollaborator {
    http: reqwest::Client,
    run_url: String,
    submit_url: String,
    templates_url: String,
}

impl HttpCollaborator {
    pub fn new(config: &WorkspaceConfig) -> Result<Self, CollaboratorError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("codelab-workspace/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| CollaboratorError::Transport {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            run_url: config.run_url(),
            submit_url: config.submit_url(),
            templates_url: config.templates_url(),
        })
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, CollaboratorError> {
        debug!(url = %url, "POST execution service");
        let response = self.http.post(url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CollaboratorError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                status_code: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ExecutionCollaborator for HttpCollaborator {
    async fn run_code(&self, request: &RunCodeRequest) -> Result<ExecutionResponse, CollaboratorError> {
        self.post(&self.run_url, request).await
    }

    async fn submit_solution(
        &self,
        request: &SubmitSolutionRequest,
    ) -> Result<ExecutionResponse, CollaboratorError> {
        self.post(&self.submit_url, request).await
    }
}

#[async_trait]
impl TemplateSource for HttpCollaborator {
    async fn fetch_templates(&self) -> Result<HashMap<String, String>, CollaboratorError> {
        debug!(url = %self.templates_url, "GET templates");
        let response = self.http.get(&self.templates_url).send().await?;
        let raw: HashMap<String, String> = Self::decode(response).await?;
        Ok(normalize_template_map(raw))
    }
}
