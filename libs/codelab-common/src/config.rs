// Environment configuration shared by the API and the CLI

use std::time::Duration;

pub const DEFAULT_EXECUTION_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_RUN_PATH: &str = "/api/code/run";
pub const DEFAULT_SUBMIT_PATH: &str = "/api/code/submit";
pub const DEFAULT_TEMPLATES_PATH: &str = "/api/code/templates";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceConfig {
    pub execution_url: String,
    pub run_path: String,
    pub submit_path: String,
    pub templates_path: String,
    pub timeout: Duration,
    /// None selects the in-process cache
    pub redis_url: Option<String>,
    pub bind_addr: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            execution_url: DEFAULT_EXECUTION_URL.to_string(),
            run_path: DEFAULT_RUN_PATH.to_string(),
            submit_path: DEFAULT_SUBMIT_PATH.to_string(),
            templates_path: DEFAULT_TEMPLATES_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            redis_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl WorkspaceConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timeout = match lookup("CODELAB_TIMEOUT_SECONDS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid CODELAB_TIMEOUT_SECONDS value: {}", raw))?;
                if secs == 0 {
                    return Err("CODELAB_TIMEOUT_SECONDS must be greater than zero".to_string());
                }
                Duration::from_secs(secs)
            }
            None => defaults.timeout,
        };

        let execution_url = lookup("CODELAB_EXECUTION_URL")
            .unwrap_or(defaults.execution_url)
            .trim_end_matches('/')
            .to_string();
        if execution_url.is_empty() {
            return Err("CODELAB_EXECUTION_URL cannot be empty".to_string());
        }

        Ok(Self {
            execution_url,
            run_path: lookup("CODELAB_RUN_PATH").unwrap_or(defaults.run_path),
            submit_path: lookup("CODELAB_SUBMIT_PATH").unwrap_or(defaults.submit_path),
            templates_path: lookup("CODELAB_TEMPLATES_PATH").unwrap_or(defaults.templates_path),
            timeout,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            bind_addr: lookup("CODELAB_BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }

    pub fn run_url(&self) -> String {
        format!("{}{}", self.execution_url, self.run_path)
    }

    pub fn submit_url(&self) -> String {
        format!("{}{}", self.execution_url, self.submit_path)
    }

    pub fn templates_url(&self) -> String {
        format!("{}{}", self.execution_url, self.templates_path)
    }
}
