// CLI commands for grading solutions
use algolab_common::config::HarnessConfig;
use algolab_common::types::{Language, TestCase, TestResult};
use algolab_harness::{detect_entry_point, summarize, wrap_user_code, AnyEngine, TestRunner};
use anyhow::{Context, Result};
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::info;

fn read_code(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Load a JSON array of test cases
fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let test_cases: Vec<TestCase> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test cases in {}", path.display()))?;
    info!(path = %path.display(), count = test_cases.len(), "Loaded test cases");
    Ok(test_cases)
}

fn build_runner(config: &HarnessConfig) -> Result<TestRunner<AnyEngine>> {
    let engine = AnyEngine::from_config(config)?;
    Ok(TestRunner::new(engine, config.timeout_ms))
}

/// Grade a sumArray solution
pub async fn run(config: &HarnessConfig, code: &Path, tests: &Path, json: bool) -> Result<bool> {
    let source = read_code(code)?;
    let test_cases = load_test_cases(tests)?;
    let runner = build_runner(config)?;

    let results = runner.run_tests(&source, &test_cases).await;
    report(&results, json)
}

/// Grade a solution for a built-in problem
pub async fn problem(
    config: &HarnessConfig,
    code: &Path,
    problem_type: &str,
    tests: Option<&Path>,
    json: bool,
) -> Result<bool> {
    let source = read_code(code)?;
    let custom = tests.map(load_test_cases).transpose()?;
    let runner = build_runner(config)?;

    let results = runner
        .run_tests_for_problem(&source, problem_type, custom.as_deref())
        .await
        .with_context(|| format!("Cannot grade problem '{}'", problem_type))?;
    report(&results, json)
}

/// Grade arbitrary code through the generated harness
pub async fn exec(
    config: &HarnessConfig,
    code: &Path,
    language: Language,
    tests: &Path,
    json: bool,
) -> Result<bool> {
    let source = read_code(code)?;
    let test_cases = load_test_cases(tests)?;
    let runner = build_runner(config)?;

    let results = runner.run_wrapped(&source, language, &test_cases).await;
    report(&results, json)
}

pub fn wrap(code: &Path, language: &str) -> Result<()> {
    let source = read_code(code)?;
    print!("{}", wrap_user_code(&source, language));
    Ok(())
}

pub fn coerce(input: &str) -> Result<()> {
    let value = algolab_harness::coerce(input);
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}

pub fn detect(code: &Path, language: Language, json: bool) -> Result<()> {
    let source = read_code(code)?;
    let entry = detect_entry_point(&source, language);

    if json {
        let value = json!({ "name": entry.name, "source": entry.source.to_string() });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} ({})", entry.name, entry.source);
    }
    Ok(())
}

/// Print results and return whether every case passed
fn report(results: &[TestResult], json: bool) -> Result<bool> {
    let summary = summarize(results);

    if json {
        let value = json!({ "results": results, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(summary.all_passed());
    }

    for (idx, result) in results.iter().enumerate() {
        let mark = if result.passed { "✅" } else { "❌" };
        println!(
            "{} Test {}: input={} expected={} actual={} ({}ms)",
            mark,
            idx + 1,
            result.input,
            result.expected_output,
            result.actual_output,
            result.execution_time_ms
        );
    }

    println!(
        "\n📋 {}/{} passed, {} failed",
        summary.passed, summary.total, summary.failed
    );

    Ok(summary.all_passed())
}
