//! Test doubles for the execution service, the template source and the cache

use crate::cache::{BufferCache, MemoryCache};
use crate::collaborator::ExecutionCollaborator;
use crate::error::{CacheError, CollaboratorError};
use crate::templates::TemplateSource;
use async_trait::async_trait;
use codelab_common::redis::BufferMap;
use codelab_common::types::{ExecutionResponse, RunCodeRequest, SubmitSolutionRequest};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Default)]
pub struct Recorded {
    pub runs: Vec<RunCodeRequest>,
    pub submits: Vec<SubmitSolutionRequest>,
}

/// Scripted collaborator; a gated one parks every call until the gate is notified
pub struct ScriptedCollaborator {
    response: Result<serde_json::Value, ()>,
    pub recorded: Mutex<Recorded>,
    gate: Option<Arc<Notify>>,
    pub entered: Arc<Notify>,
}

impl ScriptedCollaborator {
    pub fn replying(value: serde_json::Value) -> Self {
        Self {
            response: Ok(value),
            recorded: Mutex::new(Recorded::default()),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: Err(()),
            ..Self::replying(serde_json::Value::Null)
        }
    }

    pub fn gated(value: serde_json::Value, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::replying(value)
        }
    }

    async fn respond(&self) -> Result<ExecutionResponse, CollaboratorError> {
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.response {
            Ok(value) => Ok(serde_json::from_value(value.clone())?),
            Err(()) => Err(CollaboratorError::Timeout),
        }
    }
}

#[async_trait]
impl ExecutionCollaborator for ScriptedCollaborator {
    async fn run_code(&self, request: &RunCodeRequest) -> Result<ExecutionResponse, CollaboratorError> {
        self.recorded.lock().runs.push(request.clone());
        self.respond().await
    }

    async fn submit_solution(
        &self,
        request: &SubmitSolutionRequest,
    ) -> Result<ExecutionResponse, CollaboratorError> {
        self.recorded.lock().submits.push(request.clone());
        self.respond().await
    }
}

/// Template source returning a fixed map, or failing
pub struct StaticTemplates(pub Option<HashMap<String, String>>);

#[async_trait]
impl TemplateSource for StaticTemplates {
    async fn fetch_templates(&self) -> Result<HashMap<String, String>, CollaboratorError> {
        self.0.clone().ok_or(CollaboratorError::Transport {
            message: "templates unavailable".to_string(),
        })
    }
}

/// Memory cache whose buffer loads for one problem park until the gate is notified
pub struct GatedCache {
    inner: MemoryCache,
    gated_problem: String,
    gate: Arc<Notify>,
    pub loading: Arc<Notify>,
}

impl GatedCache {
    pub fn new(gated_problem: &str, gate: Arc<Notify>) -> Self {
        Self {
            inner: MemoryCache::new(),
            gated_problem: gated_problem.to_string(),
            gate,
            loading: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl BufferCache for GatedCache {
    async fn load_buffers(
        &self,
        owner: &str,
        problem_id: &str,
    ) -> Result<Option<BufferMap>, CacheError> {
        if problem_id == self.gated_problem {
            self.loading.notify_one();
            self.gate.notified().await;
        }
        self.inner.load_buffers(owner, problem_id).await
    }

    async fn store_buffers(
        &self,
        owner: &str,
        problem_id: &str,
        buffers: &BufferMap,
    ) -> Result<(), CacheError> {
        self.inner.store_buffers(owner, problem_id, buffers).await
    }

    async fn load_templates(&self) -> Result<Option<HashMap<String, String>>, CacheError> {
        self.inner.load_templates().await
    }

    async fn store_templates(&self, templates: &HashMap<String, String>) -> Result<(), CacheError> {
        self.inner.store_templates(templates).await
    }
}
