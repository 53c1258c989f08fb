//! Per-language source buffers for one problem
//!
//! Resolution order for a language the learner has not opened yet:
//! persisted buffer, then server template, then built-in fallback.
//! A buffer seeded from a template stays "pristine" until its text differs
//! from the seed; only pristine buffers are ever replaced by a later template.

use crate::templates::fallback_template;
use codelab_common::redis::BufferMap;
use codelab_common::types::normalize_language;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct Buffer {
    code: String,
    /// Template text this buffer was seeded from
    seed: Option<String>,
}

impl Buffer {
    fn learner(code: String) -> Self {
        Self { code, seed: None }
    }

    fn seeded(template: String) -> Self {
        Self {
            code: template.clone(),
            seed: Some(template),
        }
    }

    fn is_pristine(&self) -> bool {
        self.seed.as_deref() == Some(self.code.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LanguageCodeStore {
    problem_id: String,
    buffers: HashMap<String, Buffer>,
    persisted: BufferMap,
    /// `persisted` changed since the last `take_changes`
    dirty: bool,
    server_templates: HashMap<String, String>,
}

impl LanguageCodeStore {
    pub fn new(
        problem_id: impl Into<String>,
        persisted: BufferMap,
        server_templates: HashMap<String, String>,
    ) -> Self {
        let persisted = persisted
            .into_iter()
            .map(|(language, code)| (normalize_language(&language), code))
            .collect();
        Self {
            problem_id: problem_id.into(),
            buffers: HashMap::new(),
            persisted,
            dirty: false,
            server_templates,
        }
    }

    pub fn problem_id(&self) -> &str {
        &self.problem_id
    }

    /// Current code for `language`, resolving and remembering it on first access
    ///
    /// Returns an empty string only when the language has no buffer and no template.
    pub fn get_active_code(&mut self, language: &str) -> String {
        let language = normalize_language(language);
        if let Some(buffer) = self.buffers.get(&language) {
            return buffer.code.clone();
        }

        let buffer = if let Some(code) = self.persisted.get(&language) {
            debug!(problem_id = %self.problem_id, language = %language, "Restored persisted buffer");
            Buffer::learner(code.clone())
        } else if let Some(template) = self.server_templates.get(&language) {
            Buffer::seeded(template.clone())
        } else if let Some(template) = fallback_template(&language) {
            Buffer::seeded(template.to_string())
        } else {
            Buffer::learner(String::new())
        };

        let code = buffer.code.clone();
        self.buffers.insert(language, buffer);
        code
    }

    /// Overwrite the in-memory buffer for `language` only
    pub fn set_active_code(&mut self, language: &str, code: impl Into<String>) {
        let language = normalize_language(language);
        let code = code.into();
        match self.buffers.get_mut(&language) {
            Some(buffer) => buffer.code = code,
            None => {
                self.buffers.insert(language, Buffer::learner(code));
            }
        }
    }

    /// Persist `from`'s buffer, then resolve `to`
    pub fn switch_language(&mut self, from: &str, to: &str) -> String {
        self.snapshot(from);
        self.get_active_code(to)
    }

    /// Sync every opened buffer into the persisted map
    pub fn snapshot_all(&mut self) {
        let languages: Vec<String> = self.buffers.keys().cloned().collect();
        for language in languages {
            self.snapshot(&language);
        }
    }

    /// A buffer edited back to its template drops its persisted draft,
    /// otherwise the old draft would come back on the next visit
    fn snapshot(&mut self, language: &str) {
        let language = normalize_language(language);
        let Some(buffer) = self.buffers.get(&language) else {
            return;
        };
        if buffer.is_pristine() {
            if self.persisted.remove(&language).is_some() {
                self.dirty = true;
            }
        } else if self.persisted.get(&language) != Some(&buffer.code) {
            self.persisted.insert(language, buffer.code.clone());
            self.dirty = true;
        }
    }

    /// Record newly fetched server templates
    ///
    /// A buffer already open is replaced only while it still holds exactly
    /// the fallback/template it was seeded with. Returns the refreshed languages.
    pub fn apply_templates(&mut self, templates: &HashMap<String, String>) -> Vec<String> {
        let mut refreshed = Vec::new();
        for (language, template) in templates {
            let language = normalize_language(language);
            self.server_templates.insert(language.clone(), template.clone());

            if let Some(buffer) = self.buffers.get_mut(&language) {
                if buffer.is_pristine() && buffer.code != *template {
                    *buffer = Buffer::seeded(template.clone());
                    refreshed.push(language);
                }
            }
        }
        refreshed.sort();
        refreshed
    }

    /// Whether `language`'s buffer is still an unmodified template
    pub fn is_pristine(&self, language: &str) -> bool {
        self.buffers
            .get(&normalize_language(language))
            .map(Buffer::is_pristine)
            .unwrap_or(false)
    }

    /// Learner buffers to write to the persistent cache
    pub fn persisted(&self) -> &BufferMap {
        &self.persisted
    }

    /// The persisted map, if it changed since the previous call
    pub fn take_changes(&mut self) -> Option<BufferMap> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.persisted.clone())
    }
}
