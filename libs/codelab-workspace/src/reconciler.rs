//! Result Reconciler
//!
//! Maps a raw execution response into the display model.
//!
//! **Status Rules:**
//! - Completed only when the service reports "completed"
//! - Anything else is Errored, but partial output and test results are kept
//!
//! **Count Rules:**
//! - Reported `passed`/`total` are authoritative when present
//! - Missing counts are derived from the `results` array
//! - When both exist and disagree, the reported values stay and the
//!   disagreement is attached as a `CountDiscrepancy`
//!
//! Metrics are independently optional.

use codelab_common::types::{ExecutionResponse, RawCaseResult, RawTestResults};
use serde::Serialize;
use tracing::warn;

/// Message shown for any transport-level failure; the cause is only logged
pub const EXECUTION_FAILED: &str = "Execution failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Completed,
    Errored,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub execution_time_ms: Option<f64>,
    pub memory_bytes: Option<u64>,
    pub plagiarism_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerCaseResult {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    pub execution_time_ms: Option<f64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResultsSummary {
    pub passed: u32,
    pub total: u32,
    pub results: Vec<PerCaseResult>,
}

/// Reported counts that disagree with a recount of `results`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountDiscrepancy {
    pub reported_passed: Option<u32>,
    pub reported_total: Option<u32>,
    pub counted_passed: u32,
    pub counted_total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub status: EvaluationStatus,
    pub output: String,
    pub error_message: Option<String>,
    pub metrics: Metrics,
    pub test_results: Option<TestResultsSummary>,
    pub discrepancy: Option<CountDiscrepancy>,
}

impl EvaluationResult {
    /// Terminal result for a request that never produced a usable response
    pub fn transport_failure() -> Self {
        Self {
            status: EvaluationStatus::Errored,
            output: String::new(),
            error_message: Some(EXECUTION_FAILED.to_string()),
            metrics: Metrics::default(),
            test_results: None,
            discrepancy: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == EvaluationStatus::Completed
    }

    /// "passed/total", or None when the response carried no test results
    pub fn score_line(&self) -> Option<String> {
        self.test_results
            .as_ref()
            .map(|summary| format!("{}/{}", summary.passed, summary.total))
    }
}

fn per_case(raw: RawCaseResult) -> PerCaseResult {
    PerCaseResult {
        input: raw.input.normalize(),
        expected_output: raw.expected_output.normalize(),
        actual_output: raw.actual_output.normalize(),
        passed: raw.passed,
        execution_time_ms: raw.execution_time,
        error_message: raw.error_message,
    }
}

fn summarize(raw: RawTestResults) -> (TestResultsSummary, Option<CountDiscrepancy>) {
    let results: Option<Vec<PerCaseResult>> = raw
        .results
        .map(|cases| cases.into_iter().map(per_case).collect());

    let counted = results.as_ref().map(|cases| {
        let passed = cases.iter().filter(|case| case.passed).count() as u32;
        (passed, cases.len() as u32)
    });

    let passed = raw.passed.or(counted.map(|(p, _)| p)).unwrap_or(0);
    let total = raw.total.or(counted.map(|(_, t)| t)).unwrap_or(0);

    let discrepancy = counted.and_then(|(counted_passed, counted_total)| {
        let passed_differs = raw.passed.is_some_and(|p| p != counted_passed);
        let total_differs = raw.total.is_some_and(|t| t != counted_total);
        (passed_differs || total_differs).then_some(CountDiscrepancy {
            reported_passed: raw.passed,
            reported_total: raw.total,
            counted_passed,
            counted_total,
        })
    });

    let summary = TestResultsSummary {
        passed,
        total,
        results: results.unwrap_or_default(),
    };
    (summary, discrepancy)
}

/// Turn a raw execution response into the display model
pub fn reconcile(response: ExecutionResponse) -> EvaluationResult {
    let status = if response.is_completed() {
        EvaluationStatus::Completed
    } else {
        EvaluationStatus::Errored
    };

    let error_message = match (status, response.error_message) {
        (_, Some(message)) if !message.trim().is_empty() => Some(message),
        (EvaluationStatus::Errored, _) => Some(format!(
            "Execution finished with status '{}'",
            response.status
        )),
        (EvaluationStatus::Completed, _) => None,
    };

    let (test_results, discrepancy) = match response.test_results {
        Some(raw) => {
            let (summary, discrepancy) = summarize(raw);
            (Some(summary), discrepancy)
        }
        None => (None, None),
    };

    if let Some(d) = &discrepancy {
        warn!(
            reported_passed = ?d.reported_passed,
            reported_total = ?d.reported_total,
            counted_passed = d.counted_passed,
            counted_total = d.counted_total,
            "Reported test counts disagree with per-case results"
        );
    }

    EvaluationResult {
        status,
        output: response.output.unwrap_or_default(),
        error_message,
        metrics: Metrics {
            execution_time_ms: response.execution_time,
            memory_bytes: response.memory_usage,
            plagiarism_score: response.plagiarism_score,
        },
        test_results,
        discrepancy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn response(value: serde_json::Value) -> ExecutionResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_completed_run_with_passing_case() {
        let result = reconcile(response(json!({
            "status": "completed",
            "test_results": {
                "passed": 1,
                "total": 1,
                "results": [{
                    "input": "2 3",
                    "expected_output": "5",
                    "actual_output": "5",
                    "passed": true
                }]
            }
        })));

        assert_eq!(result.status, EvaluationStatus::Completed);
        assert_eq!(result.score_line().as_deref(), Some("1/1"));
        assert_eq!(result.error_message, None);
        assert_eq!(result.discrepancy, None);
        assert_eq!(result.test_results.unwrap().results[0].actual_output, "5");
    }

    #[test]
    fn test_counts_derived_from_results_when_absent() {
        let result = reconcile(response(json!({
            "status": "completed",
            "test_results": {
                "results": [
                    {"input": "1", "expected_output": "1", "actual_output": "1", "passed": true},
                    {"input": "2", "expected_output": "2", "actual_output": "3", "passed": false},
                    {"input": [3], "expected_output": 3, "actual_output": 3, "passed": true}
                ]
            }
        })));

        let summary = result.test_results.unwrap();
        assert_eq!((summary.passed, summary.total), (2, 3));
        assert_eq!(summary.results[2].input, "[3]");
        assert_eq!(result.discrepancy, None);
    }

    #[test]
    fn test_discrepancy_surfaced_without_overwriting() {
        let result = reconcile(response(json!({
            "status": "completed",
            "test_results": {
                "passed": 2,
                "total": 2,
                "results": [
                    {"input": "1", "expected_output": "1", "actual_output": "1", "passed": true},
                    {"input": "2", "expected_output": "2", "actual_output": "0", "passed": false}
                ]
            }
        })));

        let summary = result.test_results.as_ref().unwrap();
        assert_eq!((summary.passed, summary.total), (2, 2));
        assert_eq!(
            result.discrepancy,
            Some(CountDiscrepancy {
                reported_passed: Some(2),
                reported_total: Some(2),
                counted_passed: 1,
                counted_total: 2,
            })
        );
    }

    #[test]
    fn test_non_completed_status_keeps_partial_payload() {
        let result = reconcile(response(json!({
            "status": "runtime_error",
            "output": "Traceback ...",
            "test_results": {"passed": 0, "total": 3}
        })));

        assert_eq!(result.status, EvaluationStatus::Errored);
        assert_eq!(result.output, "Traceback ...");
        assert_eq!(result.score_line().as_deref(), Some("0/3"));
        assert!(result.error_message.unwrap().contains("runtime_error"));
    }

    #[test]
    fn test_service_error_message_preferred() {
        let result = reconcile(response(json!({
            "status": "timeout",
            "error_message": "Time limit exceeded"
        })));
        assert_eq!(result.error_message.as_deref(), Some("Time limit exceeded"));
        assert!(result.test_results.is_none());
    }

    #[test]
    fn test_metrics_independently_optional() {
        let result = reconcile(response(json!({
            "status": "completed",
            "execution_time": 12.5,
            "memory_usage": 2048
        })));
        assert_eq!(
            result.metrics,
            Metrics {
                execution_time_ms: Some(12.5),
                memory_bytes: Some(2048),
                plagiarism_score: None,
            }
        );
    }

    #[test]
    fn test_loosely_typed_response_keeps_partial_information() {
        let result = reconcile(response(json!({
            "status": "completed",
            "output": "1\n2",
            "memory_usage": 1536.5,
            "test_results": {
                "passed": null,
                "total": null,
                "results": [
                    {"input": "1", "expected_output": "1", "actual_output": "0", "passed": null},
                    {"input": "2", "expected_output": "2", "actual_output": "2", "passed": true}
                ]
            }
        })));

        assert!(result.is_completed());
        assert_eq!(result.output, "1\n2");
        assert_eq!(result.metrics.memory_bytes, Some(1537));
        assert_eq!(result.score_line().as_deref(), Some("1/2"));
        assert!(result.discrepancy.is_none());
        assert!(!result.test_results.unwrap().results[0].passed);
    }

    #[test]
    fn test_transport_failure_is_errored_with_message() {
        let result = EvaluationResult::transport_failure();
        assert!(!result.is_completed());
        assert_eq!(result.error_message.as_deref(), Some(EXECUTION_FAILED));
    }
}
