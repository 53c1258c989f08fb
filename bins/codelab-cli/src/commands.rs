// CLI commands driving an evaluation workspace from the terminal
use anyhow::{bail, Context, Result};
use codelab_common::config::WorkspaceConfig;
use codelab_common::types::{CustomTestCase, EvaluationMode, Problem, TestCase};
use codelab_workspace::{
    Delivery, EvaluationReport, EvaluationStatus, EvaluationWorkspace, HttpCollaborator,
    MemoryCache, TemplateSource,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Load a problem definition
fn load_problem(path: &Path) -> Result<Problem> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse problem in {}", path.display()))
}

/// Load custom cases; same shape as the problem's test cases
fn load_custom_cases(path: &Path) -> Result<Vec<CustomTestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cases: Vec<TestCase> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse custom cases in {}", path.display()))?;

    Ok(cases
        .into_iter()
        .map(|case| {
            let mut custom = CustomTestCase::new(case.input, case.expected_output);
            custom.weight = case.weight;
            custom
        })
        .collect())
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

async fn open_workspace(problem: Problem, language: &str) -> Result<EvaluationWorkspace> {
    let config = WorkspaceConfig::from_env().map_err(anyhow::Error::msg)?;
    let collaborator = Arc::new(HttpCollaborator::new(&config)?);
    let workspace = EvaluationWorkspace::new(collaborator, Arc::new(MemoryCache::new()))
        .with_default_language(language);
    workspace.open_problem(problem, None, None).await;
    Ok(workspace)
}

/// Run against basic + custom cases
pub async fn run(problem: &Path, language: &str, source: &Path, custom: Option<&Path>) -> Result<()> {
    let problem = load_problem(problem)?;
    println!("🏃 Running {} ({})", problem.title, language);

    let workspace = open_workspace(problem, language).await?;
    workspace.edit(read_source(source)?)?;
    if let Some(path) = custom {
        for case in load_custom_cases(path)? {
            workspace.add_custom_case(case)?;
        }
        println!("   + {} custom case(s)", workspace.custom_cases().len());
    }

    let delivery = workspace.run().await?;
    print_delivery(delivery)
}

/// Submit against basic + advanced cases
pub async fn submit(problem: &Path, language: &str, source: &Path) -> Result<()> {
    let problem = load_problem(problem)?;
    println!("📤 Submitting {} ({})", problem.title, language);

    let workspace = open_workspace(problem, language).await?;
    workspace.edit(read_source(source)?)?;

    let delivery = workspace.submit().await?;
    print_delivery(delivery)
}

/// Print the assistant snapshot
pub async fn snapshot(problem: &Path, language: &str, source: Option<&Path>) -> Result<()> {
    let problem = load_problem(problem)?;
    let workspace = open_workspace(problem, language).await?;
    if let Some(path) = source {
        workspace.edit(read_source(path)?)?;
    }

    match workspace.assistant_snapshot()? {
        Some(text) => print!("{}", text),
        None => bail!("No problem is open"),
    }
    Ok(())
}

/// List templates served by the execution service
pub async fn templates() -> Result<()> {
    let config = WorkspaceConfig::from_env().map_err(anyhow::Error::msg)?;
    let collaborator = HttpCollaborator::new(&config)?;

    println!("📥 Fetching templates from {}", config.templates_url());
    let templates: BTreeMap<String, String> = collaborator
        .fetch_templates()
        .await
        .context("Failed to fetch templates")?
        .into_iter()
        .collect();

    if templates.is_empty() {
        println!("⚠️  No templates returned");
        return Ok(());
    }
    for (language, code) in &templates {
        println!("\n── {} ──", language);
        println!("{}", code);
    }
    println!("\n✅ {} template(s)", templates.len());
    Ok(())
}

fn print_delivery(delivery: Delivery) -> Result<()> {
    match delivery {
        Delivery::Applied(report) => {
            print_report(&report);
            if report.result.status == EvaluationStatus::Errored {
                bail!("{} did not complete", report.mode);
            }
            Ok(())
        }
        Delivery::Discarded { session_id } => {
            bail!("Result for session {} was discarded", session_id)
        }
    }
}

fn print_report(report: &EvaluationReport) {
    let result = &report.result;
    let verb = match report.mode {
        EvaluationMode::Run => "Run",
        EvaluationMode::Submit => "Submit",
    };

    if result.is_completed() {
        println!("✅ {} completed ({} case(s))", verb, report.case_count);
    } else {
        println!("❌ {} errored", verb);
    }
    if let Some(message) = &result.error_message {
        println!("   Error: {}", message);
    }
    if !result.output.is_empty() {
        println!("   Output: {}", result.output.trim_end());
    }
    if let Some(ms) = result.metrics.execution_time_ms {
        println!("   Time: {:.2} ms", ms);
    }
    if let Some(bytes) = result.metrics.memory_bytes {
        println!("   Memory: {} bytes", bytes);
    }
    if let Some(summary) = &result.test_results {
        for (index, case) in summary.results.iter().enumerate() {
            let mark = if case.passed { "✓" } else { "✗" };
            println!("   {} case {}: got {:?}, expected {:?}", mark, index + 1, case.actual_output, case.expected_output);
        }
    }
    if let Some(line) = result.score_line() {
        println!("   {}", line);
    }
    if let Some(discrepancy) = &result.discrepancy {
        println!(
            "   ⚠️  Reported {:?}/{:?} but counted {}/{}",
            discrepancy.reported_passed,
            discrepancy.reported_total,
            discrepancy.counted_passed,
            discrepancy.counted_total
        );
    }
}
