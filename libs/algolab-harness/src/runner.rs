/// Test Runner - High-Level Orchestration
///
/// **Responsibility:**
/// Synthesize a program for the submission, syntax-check it once, run it
/// once per test case through an `ExecutionEngine`, and judge each output
/// with the evaluator.
///
/// **Error Containment:**
/// - Syntax errors: a single aggregate failing result, nothing executes
/// - Bad input, runtime errors, timeouts, engine failures: a failing result
///   for that case only; the rest of the batch still runs
/// - Unknown problem type: the only error returned to the caller
///
/// The runner holds no state between calls; every call synthesizes and
/// checks its program from scratch.

use crate::coerce::{coerce, shape_of};
use crate::engine::ExecutionEngine;
use crate::error::Result;
use crate::evaluator::{self, NOT_APPLICABLE};
use crate::problems::{InputKind, ProblemType};
use crate::wrapper::{problem_program, wrap_user_code};
use algolab_common::types::{Language, RunSummary, TestCase, TestResult};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub struct TestRunner<E> {
    engine: E,
    timeout_ms: u64,
}

impl<E: ExecutionEngine> TestRunner<E> {
    pub fn new(engine: E, timeout_ms: u64) -> Self {
        Self { engine, timeout_ms }
    }

    /// Grade a `sumArray(arr)` submission against `test_cases`.
    ///
    /// Inputs must be JSON; results are stringified with `toString()`.
    #[instrument(skip_all, fields(test_cases = test_cases.len()))]
    pub async fn run_tests(&self, code: &str, test_cases: &[TestCase]) -> Vec<TestResult> {
        self.run_problem(code, ProblemType::SumArray, test_cases).await
    }

    /// Grade a submission for one of the built-in problems.
    ///
    /// `custom_test_cases` replaces the problem's default table when given.
    /// Fails only when `problem_type` is not a known problem.
    #[instrument(skip(self, code, custom_test_cases))]
    pub async fn run_tests_for_problem(
        &self,
        code: &str,
        problem_type: &str,
        custom_test_cases: Option<&[TestCase]>,
    ) -> Result<Vec<TestResult>> {
        let problem: ProblemType = problem_type.parse().map_err(|e| {
            warn!(problem_type = %problem_type, "Rejected unknown problem type");
            e
        })?;

        let results = match custom_test_cases {
            Some(test_cases) => self.run_problem(code, problem, test_cases).await,
            None => {
                let defaults = problem.default_test_cases();
                self.run_problem(code, problem, &defaults).await
            }
        };
        Ok(results)
    }

    /// Grade arbitrary JavaScript/TypeScript/Python code through the
    /// synthesized harness: entry point detected from the source, raw input
    /// piped to the program and coerced there.
    #[instrument(skip(self, code, language, test_cases), fields(language = %language, test_cases = test_cases.len()))]
    pub async fn run_wrapped(
        &self,
        code: &str,
        language: Language,
        test_cases: &[TestCase],
    ) -> Vec<TestResult> {
        let program = wrap_user_code(code, language.as_str());
        if let Some(failure) = self.check(language, &program).await {
            return vec![failure];
        }

        let start = Instant::now();
        let mut results = Vec::with_capacity(test_cases.len());
        for (idx, test_case) in test_cases.iter().enumerate() {
            debug!(
                test_num = idx + 1,
                input_shape = shape_of(&coerce(&test_case.input)),
                "Executing test case"
            );
            let result = self
                .execute_case(language, &program, test_case, &test_case.input)
                .await;
            results.push(result);
        }

        log_summary(&results, start);
        results
    }

    async fn run_problem(&self, code: &str, problem: ProblemType, test_cases: &[TestCase]) -> Vec<TestResult> {
        let program = problem_program(code, problem);
        if let Some(failure) = self.check(Language::JavaScript, &program).await {
            return vec![failure];
        }

        let start = Instant::now();
        let mut results = Vec::with_capacity(test_cases.len());
        for (idx, test_case) in test_cases.iter().enumerate() {
            let result = match parse_problem_input(problem, &test_case.input) {
                Ok(argument) => {
                    self.execute_case(Language::JavaScript, &program, test_case, &argument)
                        .await
                }
                Err(message) => {
                    debug!(test_num = idx + 1, problem = %problem, "Rejected test input");
                    evaluator::error_result(test_case, &message, 0)
                }
            };
            results.push(result);
        }

        log_summary(&results, start);
        results
    }

    /// Syntax-check a program; `Some` carries the aggregate failure result
    async fn check(&self, language: Language, program: &str) -> Option<TestResult> {
        match self.engine.check(language, program).await {
            Ok(compilation) if compilation.success => None,
            Ok(compilation) => {
                warn!(language = %language, "Compilation failed; no test case will run");
                Some(evaluator::compilation_failure(&compilation.stderr))
            }
            Err(e) => {
                error!(language = %language, error = %e, "Syntax check could not run");
                let placeholder = TestCase::new(NOT_APPLICABLE, NOT_APPLICABLE);
                Some(evaluator::error_result(&placeholder, &format!("{:#}", e), 0))
            }
        }
    }

    async fn execute_case(
        &self,
        language: Language,
        program: &str,
        test_case: &TestCase,
        stdin: &str,
    ) -> TestResult {
        match self
            .engine
            .execute(language, program, stdin, self.timeout_ms)
            .await
        {
            Ok(output) => {
                let result = evaluator::evaluate_test(test_case, &output, self.timeout_ms);
                debug!(
                    passed = result.passed,
                    execution_ms = result.execution_time_ms,
                    timed_out = output.timed_out,
                    runtime_error = output.runtime_error,
                    "Test result"
                );
                result
            }
            Err(e) => {
                error!(error = %e, "Execution engine failed");
                evaluator::error_result(test_case, &format!("{:#}", e), 0)
            }
        }
    }
}

/// Validate a test input for a problem and render it as the JSON literal
/// the generated program reads
fn parse_problem_input(problem: ProblemType, input: &str) -> std::result::Result<String, String> {
    match problem.input_kind() {
        InputKind::Json => serde_json::from_str::<serde_json::Value>(input)
            .map(|_| input.to_string())
            .map_err(|e| format!("Invalid JSON input: {}", e)),
        InputKind::Integer => input
            .trim()
            .parse::<i64>()
            .map(|n| n.to_string())
            .map_err(|e| format!("Invalid integer input '{}': {}", input.trim(), e)),
    }
}

/// Pass/fail counts for a result list
pub fn summarize(results: &[TestResult]) -> RunSummary {
    RunSummary::from_results(results)
}

fn log_summary(results: &[TestResult], start: Instant) {
    let summary = summarize(results);
    info!(
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        execution_ms = start.elapsed().as_millis() as u64,
        "Test run complete"
    );
}
