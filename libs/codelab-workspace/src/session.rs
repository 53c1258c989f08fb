use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Identity of one problem-viewing instance
///
/// Never mutated: opening a different problem produces a new context with a
/// fresh `session_id`, and anything tied to the old id (in-flight results,
/// assistant conversation) stays behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    session_id: Uuid,
    problem_id: String,
    course_id: Option<String>,
    topic_id: Option<String>,
    opened_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn open(
        problem_id: impl Into<String>,
        course_id: Option<String>,
        topic_id: Option<String>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            problem_id: problem_id.into(),
            course_id,
            topic_id,
            opened_at: Utc::now(),
        }
    }

    /// Context for navigating to `problem_id`
    ///
    /// Same problem keeps the current identity; any other problem gets a new session.
    pub fn navigate(
        &self,
        problem_id: &str,
        course_id: Option<String>,
        topic_id: Option<String>,
    ) -> Self {
        if self.problem_id == problem_id {
            self.clone()
        } else {
            Self::open(problem_id, course_id, topic_id)
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn problem_id(&self) -> &str {
        &self.problem_id
    }

    pub fn course_id(&self) -> Option<&str> {
        self.course_id.as_deref()
    }

    pub fn topic_id(&self) -> Option<&str> {
        self.topic_id.as_deref()
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn owns(&self, session_id: Uuid) -> bool {
        self.session_id == session_id
    }
}
