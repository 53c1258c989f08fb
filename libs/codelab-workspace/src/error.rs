use crate::orchestrator::EvaluationPhase;
use thiserror::Error;

/// Failure talking to the execution service
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("execution service returned status {status_code}")]
    Status { status_code: u16, body: String },

    #[error("execution service timed out")]
    Timeout,

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("malformed payload: {message}")]
    MalformedPayload { message: String },
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CollaboratorError::Timeout
        } else if err.is_decode() {
            CollaboratorError::MalformedPayload {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            CollaboratorError::Status {
                status_code: status.as_u16(),
                body: String::new(),
            }
        } else {
            CollaboratorError::Transport {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(err: serde_json::Error) -> Self {
        CollaboratorError::MalformedPayload {
            message: err.to_string(),
        }
    }
}

/// A Run/Submit rejected before any request was built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Write some code before running or submitting")]
    EmptySource,

    #[error("An evaluation is already in progress ({active:?}); wait for it to finish")]
    Busy { active: EvaluationPhase },

    #[error("No problem is open")]
    NoProblem,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("snapshot render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_user_readable() {
        assert!(!EvaluationError::EmptySource.to_string().is_empty());
        let busy = EvaluationError::Busy {
            active: EvaluationPhase::Running,
        };
        assert!(busy.to_string().contains("Running"));
    }

    #[test]
    fn test_serde_errors_are_malformed_payloads() {
        let err: CollaboratorError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, CollaboratorError::MalformedPayload { .. }));
    }
}
