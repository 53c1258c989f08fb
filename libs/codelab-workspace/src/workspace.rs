//! Evaluation workspace
//!
//! Wires the pieces together for one learner: the current session, its
//! problem, the per-language buffers, the custom cases and the latest
//! Run/Submit reports. Results are written back only if they were issued by
//! the session that is still current; anything else is dropped silently.
//!
//! Navigations are serialized: a second `open_problem` waits for the first,
//! so one problem never ends up with two sessions or two orchestrators.
//! Persisted buffers are scoped to the workspace's owner.

use crate::cache::BufferCache;
use crate::code_store::LanguageCodeStore;
use crate::collaborator::ExecutionCollaborator;
use crate::error::{EvaluationError, SnapshotError};
use crate::orchestrator::{EvaluationOrchestrator, EvaluationPhase, EvaluationReport};
use crate::session::SessionContext;
use crate::snapshot::render_assistant_snapshot;
use crate::templates::TemplateSource;
use codelab_common::redis::BufferMap;
use codelab_common::types::{normalize_language, CustomTestCase, EvaluationMode, Problem};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_LANGUAGE: &str = "python";

/// What happened to a finished evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "delivery", rename_all = "lowercase")]
pub enum Delivery {
    /// Written into the current session's display model
    Applied(EvaluationReport),
    /// Issued by a session that is no longer current
    Discarded { session_id: Uuid },
}

struct ActiveSession {
    session: SessionContext,
    problem: Arc<Problem>,
    store: LanguageCodeStore,
    language: String,
    custom_cases: Vec<CustomTestCase>,
    orchestrator: Arc<EvaluationOrchestrator>,
    latest_run: Option<EvaluationReport>,
    latest_submit: Option<EvaluationReport>,
}

#[derive(Default)]
struct WorkspaceState {
    active: Option<ActiveSession>,
    templates: HashMap<String, String>,
    preferred_language: Option<String>,
}

pub struct EvaluationWorkspace {
    collaborator: Arc<dyn ExecutionCollaborator>,
    cache: Arc<dyn BufferCache>,
    /// Key under which this learner's buffers are persisted
    owner: String,
    default_language: String,
    state: Mutex<WorkspaceState>,
    navigation: tokio::sync::Mutex<()>,
    session_tx: watch::Sender<Option<SessionContext>>,
}

impl EvaluationWorkspace {
    pub fn new(collaborator: Arc<dyn ExecutionCollaborator>, cache: Arc<dyn BufferCache>) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            collaborator,
            cache,
            owner: Uuid::new_v4().to_string(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            state: Mutex::new(WorkspaceState::default()),
            navigation: tokio::sync::Mutex::new(()),
            session_tx,
        }
    }

    /// Persist buffers under `owner` instead of a throwaway id
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn with_default_language(mut self, language: &str) -> Self {
        self.default_language = normalize_language(language);
        self
    }

    /// Session change notifications for external subscribers
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionContext>> {
        self.session_tx.subscribe()
    }

    pub fn session(&self) -> Option<SessionContext> {
        self.state.lock().active.as_ref().map(|a| a.session.clone())
    }

    pub fn problem(&self) -> Option<Arc<Problem>> {
        self.state.lock().active.as_ref().map(|a| Arc::clone(&a.problem))
    }

    /// Open `problem`, rotating the session if it differs from the current one
    pub async fn open_problem(
        &self,
        problem: Problem,
        course_id: Option<String>,
        topic_id: Option<String>,
    ) -> SessionContext {
        let _navigation = self.navigation.lock().await;

        let outgoing = {
            let mut state = self.state.lock();
            match state.active.as_mut() {
                Some(active) if active.session.problem_id() == problem.id => {
                    return active.session.clone();
                }
                Some(active) => pending_changes(active),
                None => None,
            }
        };

        if let Some((problem_id, buffers)) = outgoing {
            self.persist_buffers(&problem_id, &buffers).await;
        }

        let persisted = match self.cache.load_buffers(&self.owner, &problem.id).await {
            Ok(buffers) => buffers.unwrap_or_default(),
            Err(e) => {
                warn!(problem_id = %problem.id, error = %e, "Failed to load persisted buffers");
                BufferMap::new()
            }
        };

        let (session, late_edits) = {
            let mut state = self.state.lock();
            if let Some(active) = state.active.as_ref() {
                if active.session.problem_id() == problem.id {
                    return active.session.clone();
                }
            }
            // Edits accepted while the cache calls above were pending
            let late_edits = state.active.as_mut().and_then(pending_changes);

            let session = match state.active.as_ref() {
                Some(active) => active.session.navigate(&problem.id, course_id, topic_id),
                None => SessionContext::open(problem.id.clone(), course_id, topic_id),
            };
            let language = state
                .preferred_language
                .clone()
                .unwrap_or_else(|| self.default_language.clone());
            let store = LanguageCodeStore::new(problem.id.clone(), persisted, state.templates.clone());

            state.active = Some(ActiveSession {
                session: session.clone(),
                problem: Arc::new(problem),
                store,
                language,
                custom_cases: Vec::new(),
                orchestrator: Arc::new(EvaluationOrchestrator::new(Arc::clone(&self.collaborator))),
                latest_run: None,
                latest_submit: None,
            });
            (session, late_edits)
        };

        if let Some((problem_id, buffers)) = late_edits {
            self.persist_buffers(&problem_id, &buffers).await;
        }

        info!(
            session_id = %session.session_id(),
            problem_id = %session.problem_id(),
            "Session opened"
        );
        self.session_tx.send_replace(Some(session.clone()));
        session
    }

    pub fn active_language(&self) -> Option<String> {
        self.state.lock().active.as_ref().map(|a| a.language.clone())
    }

    pub fn active_code(&self) -> Result<String, EvaluationError> {
        let mut state = self.state.lock();
        let active = state.active.as_mut().ok_or(EvaluationError::NoProblem)?;
        let language = active.language.clone();
        Ok(active.store.get_active_code(&language))
    }

    /// Replace the active language's buffer with the editor's content
    pub fn edit(&self, code: impl Into<String>) -> Result<(), EvaluationError> {
        let mut state = self.state.lock();
        let active = state.active.as_mut().ok_or(EvaluationError::NoProblem)?;
        let language = active.language.clone();
        active.store.set_active_code(&language, code);
        Ok(())
    }

    /// Switch the editor to `language`, persisting the buffer being left
    pub async fn switch_language(&self, language: &str) -> Result<String, EvaluationError> {
        let target = normalize_language(language);
        let (code, pending) = {
            let mut state = self.state.lock();
            let active = state.active.as_mut().ok_or(EvaluationError::NoProblem)?;
            let from = std::mem::replace(&mut active.language, target.clone());
            let code = active.store.switch_language(&from, &target);
            debug!(from = %from, to = %target, "Language switched");
            let pending = active
                .store
                .take_changes()
                .map(|buffers| (active.session.problem_id().to_string(), buffers));
            state.preferred_language = Some(target);
            (code, pending)
        };

        if let Some((problem_id, buffers)) = pending {
            self.persist_buffers(&problem_id, &buffers).await;
        }
        Ok(code)
    }

    /// Write every learner-modified buffer to the cache
    pub async fn persist(&self) -> Result<(), EvaluationError> {
        let pending = {
            let mut state = self.state.lock();
            let active = state.active.as_mut().ok_or(EvaluationError::NoProblem)?;
            pending_changes(active)
        };
        if let Some((problem_id, buffers)) = pending {
            self.persist_buffers(&problem_id, &buffers).await;
        }
        Ok(())
    }

    async fn persist_buffers(&self, problem_id: &str, buffers: &BufferMap) {
        if let Err(e) = self.cache.store_buffers(&self.owner, problem_id, buffers).await {
            warn!(problem_id = %problem_id, error = %e, "Failed to persist buffers");
        }
    }

    pub fn add_custom_case(&self, case: CustomTestCase) -> Result<Uuid, EvaluationError> {
        let mut state = self.state.lock();
        let active = state.active.as_mut().ok_or(EvaluationError::NoProblem)?;
        let id = case.id;
        active.custom_cases.push(case);
        Ok(id)
    }

    pub fn remove_custom_case(&self, id: Uuid) -> bool {
        let mut state = self.state.lock();
        match state.active.as_mut() {
            Some(active) => {
                let before = active.custom_cases.len();
                active.custom_cases.retain(|case| case.id != id);
                active.custom_cases.len() != before
            }
            None => false,
        }
    }

    pub fn custom_cases(&self) -> Vec<CustomTestCase> {
        self.state
            .lock()
            .active
            .as_ref()
            .map(|a| a.custom_cases.clone())
            .unwrap_or_default()
    }

    pub fn phase(&self) -> EvaluationPhase {
        self.state
            .lock()
            .active
            .as_ref()
            .map(|a| a.orchestrator.phase())
            .unwrap_or(EvaluationPhase::Idle)
    }

    pub fn latest(&self, mode: EvaluationMode) -> Option<EvaluationReport> {
        let state = self.state.lock();
        let active = state.active.as_ref()?;
        match mode {
            EvaluationMode::Run => active.latest_run.clone(),
            EvaluationMode::Submit => active.latest_submit.clone(),
        }
    }

    /// Run the active buffer against basic + custom cases
    pub async fn run(&self) -> Result<Delivery, EvaluationError> {
        let ticket = self.ticket()?;
        let report = ticket
            .orchestrator
            .run(
                &ticket.session,
                &ticket.problem,
                &ticket.code,
                &ticket.language,
                &ticket.custom_cases,
            )
            .await?;
        Ok(self.deliver(report))
    }

    /// Submit the active buffer against basic + advanced cases
    pub async fn submit(&self) -> Result<Delivery, EvaluationError> {
        let ticket = self.ticket()?;
        let report = ticket
            .orchestrator
            .submit(&ticket.session, &ticket.problem, &ticket.code, &ticket.language)
            .await?;
        Ok(self.deliver(report))
    }

    fn ticket(&self) -> Result<Ticket, EvaluationError> {
        let mut state = self.state.lock();
        let active = state.active.as_mut().ok_or(EvaluationError::NoProblem)?;
        let language = active.language.clone();
        Ok(Ticket {
            session: active.session.clone(),
            problem: Arc::clone(&active.problem),
            code: active.store.get_active_code(&language),
            language,
            custom_cases: active.custom_cases.clone(),
            orchestrator: Arc::clone(&active.orchestrator),
        })
    }

    fn deliver(&self, report: EvaluationReport) -> Delivery {
        let mut state = self.state.lock();
        match state.active.as_mut() {
            Some(active) if active.session.owns(report.session_id) => {
                match report.mode {
                    EvaluationMode::Run => active.latest_run = Some(report.clone()),
                    EvaluationMode::Submit => active.latest_submit = Some(report.clone()),
                }
                Delivery::Applied(report)
            }
            _ => {
                debug!(
                    session_id = %report.session_id,
                    mode = %report.mode,
                    "Discarding result from a previous session"
                );
                Delivery::Discarded {
                    session_id: report.session_id,
                }
            }
        }
    }

    /// Text context for the AI assistant; None when no problem is open
    pub fn assistant_snapshot(&self) -> Result<Option<String>, SnapshotError> {
        let mut state = self.state.lock();
        let Some(active) = state.active.as_mut() else {
            return Ok(None);
        };
        let language = active.language.clone();
        let code = active.store.get_active_code(&language);
        render_assistant_snapshot(&active.problem, &language, &code).map(Some)
    }

    /// Apply cached templates immediately, then refresh them from `source`
    ///
    /// Never fails: a fetch error leaves the fallbacks in place.
    pub async fn refresh_templates(&self, source: &dyn TemplateSource) {
        match self.cache.load_templates().await {
            Ok(Some(cached)) => self.apply_templates(&cached),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read cached templates"),
        }

        match source.fetch_templates().await {
            Ok(fresh) => {
                if let Err(e) = self.cache.store_templates(&fresh).await {
                    warn!(error = %e, "Failed to cache templates");
                }
                info!(languages = fresh.len(), "Templates refreshed");
                self.apply_templates(&fresh);
            }
            Err(e) => {
                warn!(error = %e, "Template fetch failed; keeping fallback templates");
            }
        }
    }

    fn apply_templates(&self, templates: &HashMap<String, String>) {
        let mut state = self.state.lock();
        state.templates.extend(
            templates
                .iter()
                .map(|(language, source)| (normalize_language(language), source.clone())),
        );
        if let Some(active) = state.active.as_mut() {
            let refreshed = active.store.apply_templates(templates);
            if !refreshed.is_empty() {
                debug!(languages = ?refreshed, "Untouched buffers refreshed from templates");
            }
        }
    }
}

/// Snapshot every buffer; the problem id and map if anything needs writing
fn pending_changes(active: &mut ActiveSession) -> Option<(String, BufferMap)> {
    active.store.snapshot_all();
    active
        .store
        .take_changes()
        .map(|buffers| (active.session.problem_id().to_string(), buffers))
}

/// Everything one evaluation needs, copied out so no lock is held across the call
struct Ticket {
    session: SessionContext,
    problem: Arc<Problem>,
    code: String,
    language: String,
    custom_cases: Vec<CustomTestCase>,
    orchestrator: Arc<EvaluationOrchestrator>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::reconciler::EvaluationStatus;
    use crate::templates::fallback_template;
    use crate::testing::{GatedCache, ScriptedCollaborator, StaticTemplates};
    use codelab_common::types::TestCase;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::Notify;

    fn problem(id: &str) -> Problem {
        Problem {
            id: id.to_string(),
            title: format!("Problem {}", id),
            difficulty: "Easy".to_string(),
            test_cases_basic: vec![TestCase::new("2 3", "5")],
            test_cases_advanced: vec![TestCase::new("4 4", "8")],
            ..Default::default()
        }
    }

    fn passing() -> serde_json::Value {
        json!({
            "status": "completed",
            "test_results": {
                "passed": 1,
                "total": 1,
                "results": [{"input": "2 3", "expected_output": "5", "actual_output": "5", "passed": true}]
            }
        })
    }

    fn workspace(collaborator: ScriptedCollaborator) -> (EvaluationWorkspace, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let ws = EvaluationWorkspace::new(Arc::new(collaborator), cache.clone());
        (ws, cache)
    }

    #[tokio::test]
    async fn test_language_switch_round_trip() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));
        ws.open_problem(problem("p1"), None, None).await;

        ws.edit("X").unwrap();
        let js = ws.switch_language("javascript").await.unwrap();
        assert_eq!(js, fallback_template("javascript").unwrap());

        let back = ws.switch_language("python").await.unwrap();
        assert_eq!(back, "X");
    }

    #[tokio::test]
    async fn test_run_applies_result_to_current_session() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));
        let session = ws.open_problem(problem("p1"), None, None).await;
        ws.edit("print(sum(map(int, input().split())))").unwrap();

        let delivery = ws.run().await.unwrap();

        let Delivery::Applied(report) = delivery else {
            panic!("expected applied delivery");
        };
        assert_eq!(report.session_id, session.session_id());
        assert_eq!(report.result.score_line().as_deref(), Some("1/1"));
        assert_eq!(report.result.error_message, None);
        assert_eq!(ws.latest(EvaluationMode::Run), Some(report));
        assert_eq!(ws.latest(EvaluationMode::Submit), None);
    }

    #[tokio::test]
    async fn test_collaborator_error_leaves_buffer_unchanged() {
        let (ws, _) = workspace(ScriptedCollaborator::failing());
        ws.open_problem(problem("p1"), None, None).await;
        ws.edit("print('mine')").unwrap();

        let delivery = ws.submit().await.unwrap();

        let Delivery::Applied(report) = delivery else {
            panic!("expected applied delivery");
        };
        assert_eq!(report.result.status, EvaluationStatus::Errored);
        assert!(!report.result.error_message.unwrap_or_default().is_empty());
        assert_eq!(ws.active_code().unwrap(), "print('mine')");
        assert_eq!(ws.phase(), EvaluationPhase::Idle);
    }

    #[tokio::test]
    async fn test_custom_cases_feed_run_but_not_submit() {
        let collaborator = Arc::new(ScriptedCollaborator::replying(passing()));
        let ws = EvaluationWorkspace::new(collaborator.clone(), Arc::new(MemoryCache::new()));
        ws.open_problem(problem("p1"), None, None).await;
        ws.edit("code").unwrap();
        let kept = ws.add_custom_case(CustomTestCase::new("9 9", "18")).unwrap();
        let dropped = ws.add_custom_case(CustomTestCase::new("0 1", "1")).unwrap();
        assert!(ws.remove_custom_case(dropped));
        assert!(!ws.remove_custom_case(dropped));

        ws.run().await.unwrap();
        ws.submit().await.unwrap();

        let recorded = collaborator.recorded.lock();
        assert_eq!(recorded.runs[0].test_cases_custom.len(), 1);
        assert_eq!(recorded.runs[0].test_cases_custom[0].input, "9 9");
        assert_eq!(recorded.submits[0].test_cases_basic.len(), 1);
        assert_eq!(recorded.submits[0].test_cases_advanced.len(), 1);
        assert_eq!(ws.custom_cases()[0].id, kept);
    }

    #[tokio::test]
    async fn test_empty_buffer_rejected() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));
        ws.open_problem(problem("p1"), None, None).await;
        ws.edit("   ").unwrap();

        assert_eq!(ws.run().await.unwrap_err(), EvaluationError::EmptySource);
        assert_eq!(ws.latest(EvaluationMode::Run), None);
    }

    #[tokio::test]
    async fn test_no_problem_open() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));
        assert_eq!(ws.run().await.unwrap_err(), EvaluationError::NoProblem);
        assert_eq!(ws.active_code().unwrap_err(), EvaluationError::NoProblem);
        assert_eq!(ws.assistant_snapshot().unwrap(), None);
    }

    #[tokio::test]
    async fn test_stale_response_discarded_after_navigation() {
        let gate = Arc::new(Notify::new());
        let collaborator = ScriptedCollaborator::gated(passing(), gate.clone());
        let entered = collaborator.entered.clone();
        let (ws, _) = workspace(collaborator);
        let ws = Arc::new(ws);
        let old = ws.open_problem(problem("p1"), None, None).await;
        ws.edit("code").unwrap();

        let in_flight = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.run().await })
        };
        entered.notified().await;

        let new = ws.open_problem(problem("p2"), None, None).await;
        assert_ne!(old.session_id(), new.session_id());
        gate.notify_one();

        let delivery = in_flight.await.unwrap().unwrap();
        assert_eq!(
            delivery,
            Delivery::Discarded {
                session_id: old.session_id()
            }
        );
        assert_eq!(ws.latest(EvaluationMode::Run), None);
    }

    #[tokio::test]
    async fn test_reopening_same_problem_keeps_session() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));
        let first = ws.open_problem(problem("p1"), None, None).await;
        ws.edit("kept").unwrap();
        let again = ws.open_problem(problem("p1"), None, None).await;

        assert_eq!(first, again);
        assert_eq!(ws.active_code().unwrap(), "kept");
    }

    #[tokio::test]
    async fn test_buffers_survive_navigation_via_cache() {
        let (ws, cache) = workspace(ScriptedCollaborator::replying(passing()));
        ws.open_problem(problem("p1"), None, None).await;
        ws.edit("p1 code").unwrap();

        ws.open_problem(problem("p2"), None, None).await;
        assert_ne!(ws.active_code().unwrap(), "p1 code");
        assert_eq!(
            cache
                .load_buffers(ws.owner(), "p1")
                .await
                .unwrap()
                .unwrap()
                .get("python")
                .map(String::as_str),
            Some("p1 code")
        );

        ws.open_problem(problem("p1"), None, None).await;
        assert_eq!(ws.active_code().unwrap(), "p1 code");
    }

    #[tokio::test]
    async fn test_subscribers_see_session_changes() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));
        let mut rx = ws.subscribe();
        assert!(rx.borrow().is_none());

        let session = ws.open_problem(problem("p1"), None, None).await;

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref(), Some(&session));
    }

    #[tokio::test]
    async fn test_late_templates_respect_learner_text() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));
        ws.open_problem(problem("p1"), None, None).await;
        ws.edit("typed before templates").unwrap();
        ws.switch_language("java").await.unwrap();

        let mut templates = HashMap::new();
        templates.insert("python".to_string(), "# server python".to_string());
        templates.insert("java".to_string(), "// server java".to_string());
        ws.refresh_templates(&StaticTemplates(Some(templates))).await;

        assert_eq!(ws.active_code().unwrap(), "// server java");
        assert_eq!(ws.switch_language("python").await.unwrap(), "typed before templates");
    }

    #[tokio::test]
    async fn test_template_fetch_failure_is_silent() {
        let (ws, cache) = workspace(ScriptedCollaborator::replying(passing()));
        ws.open_problem(problem("p1"), None, None).await;

        ws.refresh_templates(&StaticTemplates(None)).await;

        assert_eq!(ws.active_code().unwrap(), fallback_template("python").unwrap());
        assert_eq!(cache.load_templates().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cached_templates_used_for_next_problem() {
        let (ws, cache) = workspace(ScriptedCollaborator::replying(passing()));
        let mut templates = HashMap::new();
        templates.insert("python".to_string(), "# cached".to_string());
        cache.store_templates(&templates).await.unwrap();

        ws.refresh_templates(&StaticTemplates(None)).await;
        ws.open_problem(problem("p1"), None, None).await;

        assert_eq!(ws.active_code().unwrap(), "# cached");
    }

    #[tokio::test]
    async fn test_snapshot_includes_active_buffer() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));
        ws.open_problem(problem("p1"), None, None).await;
        ws.edit("print(42)").unwrap();

        let text = ws.assistant_snapshot().unwrap().unwrap();

        assert!(text.contains("Problem: Problem p1"));
        assert!(text.contains("print(42)"));
    }

    #[tokio::test]
    async fn test_learners_sharing_a_cache_never_see_each_others_drafts() {
        let cache = Arc::new(MemoryCache::new());
        let alice = EvaluationWorkspace::new(
            Arc::new(ScriptedCollaborator::replying(passing())),
            cache.clone(),
        )
        .with_owner("alice");
        let bob = EvaluationWorkspace::new(
            Arc::new(ScriptedCollaborator::replying(passing())),
            cache.clone(),
        )
        .with_owner("bob");

        alice.open_problem(problem("p1"), None, None).await;
        alice.edit("alice's draft").unwrap();
        alice.persist().await.unwrap();
        bob.open_problem(problem("p1"), None, None).await;

        assert_eq!(bob.active_code().unwrap(), fallback_template("python").unwrap());

        let alice_again = EvaluationWorkspace::new(
            Arc::new(ScriptedCollaborator::replying(passing())),
            cache,
        )
        .with_owner("alice");
        alice_again.open_problem(problem("p1"), None, None).await;
        assert_eq!(alice_again.active_code().unwrap(), "alice's draft");
    }

    #[tokio::test]
    async fn test_concurrent_opens_share_one_session_and_one_slot() {
        let load_gate = Arc::new(Notify::new());
        let cache = Arc::new(GatedCache::new("p2", load_gate.clone()));
        let run_gate = Arc::new(Notify::new());
        let collaborator = ScriptedCollaborator::gated(passing(), run_gate.clone());
        let entered = collaborator.entered.clone();
        let ws = Arc::new(EvaluationWorkspace::new(Arc::new(collaborator), cache.clone()));
        ws.open_problem(problem("p1"), None, None).await;

        let first = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.open_problem(problem("p2"), None, None).await })
        };
        cache.loading.notified().await;
        let second = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.open_problem(problem("p2"), None, None).await })
        };
        load_gate.notify_one();
        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert_eq!(first.session_id(), second.session_id());

        ws.edit("code").unwrap();
        let in_flight = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.run().await })
        };
        entered.notified().await;

        assert!(matches!(ws.run().await, Err(EvaluationError::Busy { .. })));

        run_gate.notify_one();
        assert!(matches!(in_flight.await.unwrap(), Ok(Delivery::Applied(_))));
    }

    #[tokio::test]
    async fn test_edit_during_navigation_is_persisted() {
        let load_gate = Arc::new(Notify::new());
        let cache = Arc::new(GatedCache::new("p2", load_gate.clone()));
        let ws = Arc::new(EvaluationWorkspace::new(
            Arc::new(ScriptedCollaborator::replying(passing())),
            cache.clone(),
        ));
        ws.open_problem(problem("p1"), None, None).await;
        ws.edit("A").unwrap();

        let navigation = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.open_problem(problem("p2"), None, None).await })
        };
        cache.loading.notified().await;
        ws.edit("B").unwrap();
        load_gate.notify_one();
        navigation.await.unwrap();

        let saved = cache.load_buffers(ws.owner(), "p1").await.unwrap().unwrap();
        assert_eq!(saved.get("python").map(String::as_str), Some("B"));

        ws.open_problem(problem("p1"), None, None).await;
        assert_eq!(ws.active_code().unwrap(), "B");
    }

    #[tokio::test]
    async fn test_reverting_to_template_survives_navigation() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));
        ws.open_problem(problem("p1"), None, None).await;
        let template = ws.active_code().unwrap();
        ws.edit("draft").unwrap();
        ws.switch_language("java").await.unwrap();
        ws.switch_language("python").await.unwrap();
        ws.edit(template.clone()).unwrap();

        ws.open_problem(problem("p2"), None, None).await;
        ws.open_problem(problem("p1"), None, None).await;

        assert_eq!(ws.active_code().unwrap(), template);
    }

    #[tokio::test]
    async fn test_failed_switch_keeps_preferred_language() {
        let (ws, _) = workspace(ScriptedCollaborator::replying(passing()));

        assert_eq!(
            ws.switch_language("java").await.unwrap_err(),
            EvaluationError::NoProblem
        );
        ws.open_problem(problem("p1"), None, None).await;

        assert_eq!(ws.active_language().as_deref(), Some(DEFAULT_LANGUAGE));
    }
}
