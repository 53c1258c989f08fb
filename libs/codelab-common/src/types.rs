use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status string the execution service reports for a finished, successful execution
pub const STATUS_COMPLETED: &str = "completed";

/// Weight assigned to any case that does not carry one
pub const DEFAULT_WEIGHT: u32 = 1;

/// A raw test-case value as it arrives from the problem payload
///
/// Problem authors store some inputs as plain text and others as JSON
/// structures (arrays, objects, numbers). Everything is folded into a
/// string by `normalize` before it leaves the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseValue {
    Text(String),
    Structured(serde_json::Value),
}

impl CaseValue {
    /// String form of the value: text verbatim, anything else as compact JSON
    pub fn normalize(&self) -> String {
        match self {
            CaseValue::Text(text) => text.clone(),
            CaseValue::Structured(value) => value.to_string(),
        }
    }
}

impl Default for CaseValue {
    fn default() -> Self {
        CaseValue::Text(String::new())
    }
}

impl From<&str> for CaseValue {
    fn from(text: &str) -> Self {
        CaseValue::Text(text.to_string())
    }
}

impl From<String> for CaseValue {
    fn from(text: String) -> Self {
        CaseValue::Text(text)
    }
}

impl From<serde_json::Value> for CaseValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => CaseValue::Text(text),
            other => CaseValue::Structured(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: CaseValue,
    #[serde(default, alias = "output")]
    pub expected_output: CaseValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl TestCase {
    pub fn new(input: impl Into<CaseValue>, expected_output: impl Into<CaseValue>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Learner-authored case; lives only in the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTestCase {
    pub id: Uuid,
    #[serde(default)]
    pub input: CaseValue,
    #[serde(default, alias = "output")]
    pub expected_output: CaseValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl CustomTestCase {
    pub fn new(input: impl Into<CaseValue>, expected_output: impl Into<CaseValue>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input: input.into(),
            expected_output: expected_output.into(),
            weight: None,
        }
    }
}

/// Which source list a weighted case was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseOrigin {
    Basic,
    Advanced,
    Custom,
}

/// Normalized case as sent to the execution service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightedCase {
    pub input: String,
    pub expected_output: String,
    pub weight: u32,
    #[serde(skip)]
    pub origin: CaseOrigin,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemExample {
    #[serde(default)]
    pub input: CaseValue,
    #[serde(default, alias = "expected_output")]
    pub output: CaseValue,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Coding problem as served by the platform API; read-only to this crate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_format: String,
    #[serde(default)]
    pub output_format: String,
    #[serde(default)]
    pub constraints: String,
    #[serde(default)]
    pub examples: Vec<ProblemExample>,
    #[serde(default)]
    pub test_cases_basic: Vec<TestCase>,
    #[serde(default)]
    pub test_cases_advanced: Vec<TestCase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    Run,
    Submit,
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMode::Run => write!(f, "run"),
            EvaluationMode::Submit => write!(f, "submit"),
        }
    }
}

/// Payload of the execution service's RunCode operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunCodeRequest {
    pub code: String,
    pub language: String,
    pub test_cases: Vec<WeightedCase>,
    pub test_cases_custom: Vec<WeightedCase>,
    pub problem_title: String,
}

/// Payload of the execution service's SubmitSolution operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitSolutionRequest {
    pub code: String,
    pub language: String,
    pub question_id: String,
    pub test_cases_basic: Vec<WeightedCase>,
    pub test_cases_advanced: Vec<WeightedCase>,
}

/// Response of both RunCode and SubmitSolution
///
/// Only `status` is mandatory; a body without it is a malformed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub status: String,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Milliseconds
    #[serde(default, deserialize_with = "lenient::float")]
    pub execution_time: Option<f64>,
    /// Bytes
    #[serde(default, deserialize_with = "lenient::bytes")]
    pub memory_usage: Option<u64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub plagiarism_score: Option<f64>,
    #[serde(default)]
    pub test_results: Option<RawTestResults>,
}

impl ExecutionResponse {
    pub fn is_completed(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(STATUS_COMPLETED)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTestResults {
    #[serde(default, deserialize_with = "lenient::count")]
    pub passed: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total: Option<u32>,
    #[serde(default)]
    pub results: Option<Vec<RawCaseResult>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCaseResult {
    #[serde(default)]
    pub input: CaseValue,
    #[serde(default)]
    pub expected_output: CaseValue,
    #[serde(default)]
    pub actual_output: CaseValue,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub passed: bool,
    #[serde(default, deserialize_with = "lenient::float")]
    pub execution_time: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Decoders for numeric and boolean fields the execution service does not type consistently
///
/// Accept integers, floats, numeric strings and null; anything unreadable
/// becomes "absent" instead of failing the whole response.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn number(value: Option<Value>) -> Option<f64> {
        let parsed = match value? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|n| n.is_finite())
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(number(Option::<Value>::deserialize(d)?))
    }

    pub fn bytes<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(number(Option::<Value>::deserialize(d)?)
            .filter(|n| *n >= 0.0)
            .map(|n| n.round() as u64))
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(number(Option::<Value>::deserialize(d)?)
            .filter(|n| *n >= 0.0 && *n <= u32::MAX as f64)
            .map(|n| n.round() as u32))
    }

    /// Null or missing means "not passed"
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64() == Some(1.0),
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        })
    }
}

/// Canonical language key: trimmed, lowercase, common aliases folded
pub fn normalize_language(language: &str) -> String {
    let lower = language.trim().to_lowercase();
    match lower.as_str() {
        "py" | "python3" => "python".to_string(),
        "js" | "node" | "nodejs" => "javascript".to_string(),
        "ts" => "typescript".to_string(),
        "c++" | "cplusplus" => "cpp".to_string(),
        "rs" => "rust".to_string(),
        "golang" => "go".to_string(),
        _ => lower,
    }
}
