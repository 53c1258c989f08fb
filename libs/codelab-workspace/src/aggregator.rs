//! Test Case Aggregator
//!
//! Folds the problem's basic and advanced lists and the learner's custom
//! cases into one ordered, weighted list for a Run or a Submit.
//!
//! **Composition Rules:**
//! - Run: basic ++ custom
//! - Submit: basic ++ advanced (custom cases are never graded)
//! - Source order is preserved within each group
//!
//! **Normalization Rules:**
//! - `input` and `expected_output` become strings (structured values as JSON)
//! - Missing weight becomes `DEFAULT_WEIGHT`
//!
//! The problem's own lists are only borrowed; every call builds a new Vec.

use codelab_common::types::{
    CaseOrigin, CaseValue, CustomTestCase, EvaluationMode, Problem, TestCase, WeightedCase,
    DEFAULT_WEIGHT,
};

fn weighted(
    input: &CaseValue,
    expected_output: &CaseValue,
    weight: Option<u32>,
    origin: CaseOrigin,
) -> WeightedCase {
    WeightedCase {
        input: input.normalize(),
        expected_output: expected_output.normalize(),
        weight: weight.unwrap_or(DEFAULT_WEIGHT),
        origin,
    }
}

fn from_problem(cases: &[TestCase], origin: CaseOrigin) -> impl Iterator<Item = WeightedCase> + '_ {
    cases
        .iter()
        .map(move |case| weighted(&case.input, &case.expected_output, case.weight, origin))
}

/// Build the case list for one evaluation request
pub fn build_cases(
    mode: EvaluationMode,
    problem: &Problem,
    custom_cases: &[CustomTestCase],
) -> Vec<WeightedCase> {
    let basic = from_problem(&problem.test_cases_basic, CaseOrigin::Basic);

    match mode {
        EvaluationMode::Run => basic
            .chain(custom_cases.iter().map(|case| {
                weighted(&case.input, &case.expected_output, case.weight, CaseOrigin::Custom)
            }))
            .collect(),
        EvaluationMode::Submit => basic
            .chain(from_problem(&problem.test_cases_advanced, CaseOrigin::Advanced))
            .collect(),
    }
}

/// Split a built list back into its source groups, preserving order
pub fn partition(cases: Vec<WeightedCase>) -> (Vec<WeightedCase>, Vec<WeightedCase>) {
    cases
        .into_iter()
        .partition(|case| case.origin == CaseOrigin::Basic)
}
