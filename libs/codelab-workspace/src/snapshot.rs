//! Plain-text snapshot of the session handed to the AI assistant.
//! One-way: the assistant's replies are never parsed back into session state.

use crate::error::SnapshotError;
use codelab_common::types::Problem;
use handlebars::{no_escape, Handlebars};
use serde::Serialize;

const SNAPSHOT_TEMPLATE: &str = "\
Problem: {{title}}
Difficulty: {{difficulty}}
Score: {{score}}

Description:
{{description}}
{{#if input_format}}

Input format:
{{input_format}}
{{/if}}
{{#if output_format}}

Output format:
{{output_format}}
{{/if}}
{{#if constraints}}

Constraints:
{{constraints}}
{{/if}}
{{#each examples}}

Example {{number}}:
Input:
{{input}}
Output:
{{output}}
{{#if explanation}}
Explanation: {{explanation}}
{{/if}}
{{/each}}

Current code ({{language}}):
{{code}}
";

#[derive(Serialize)]
struct ExampleView {
    number: usize,
    input: String,
    output: String,
    explanation: Option<String>,
}

#[derive(Serialize)]
struct SnapshotView<'a> {
    title: &'a str,
    difficulty: &'a str,
    score: u32,
    description: &'a str,
    input_format: &'a str,
    output_format: &'a str,
    constraints: &'a str,
    examples: Vec<ExampleView>,
    language: &'a str,
    code: &'a str,
}

/// Render the assistant context for `problem` and the current buffer
pub fn render_assistant_snapshot(
    problem: &Problem,
    language: &str,
    code: &str,
) -> Result<String, SnapshotError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(no_escape);
    handlebars.register_template_string("snapshot", SNAPSHOT_TEMPLATE)?;

    let view = SnapshotView {
        title: &problem.title,
        difficulty: &problem.difficulty,
        score: problem.score,
        description: &problem.description,
        input_format: &problem.input_format,
        output_format: &problem.output_format,
        constraints: &problem.constraints,
        examples: problem
            .examples
            .iter()
            .enumerate()
            .map(|(idx, example)| ExampleView {
                number: idx + 1,
                input: example.input.normalize(),
                output: example.output.normalize(),
                explanation: example.explanation.clone(),
            })
            .collect(),
        language,
        code,
    };

    Ok(handlebars.render("snapshot", &view)?)
}
