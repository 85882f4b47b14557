/// Test Evaluator - Output Comparison and Result Construction
///
/// **Core Responsibility:**
/// Turn raw execution outputs into `TestResult`s.
///
/// **Critical Properties:**
/// - Knows nothing about processes or containers
/// - Pure functions: (execution output, test case) -> result
/// - Comparison lives in exactly one place, `outputs_match`
///
/// **Comparison Rules:**
/// - Exact string equality between the stringified result and the expected
///   output; `6` and `6.0` are different answers
/// - The only normalization is dropping the line terminator(s) a program
///   prints after its result
///
/// **Error Text:**
/// Every failure that is not a plain wrong answer produces an
/// `actual_output` starting with `Error: `, copied into `error`.

use crate::engine::TestExecutionOutput;
use crate::wrapper::HARNESS_FAILURE_EXIT_CODE;
use algolab_common::types::{TestCase, TestResult};
use regex::Regex;
use std::sync::OnceLock;

/// Placeholder input/expected output for results not tied to a test case
pub const NOT_APPLICABLE: &str = "N/A";

const ERROR_PREFIX: &str = "Error: ";

/// The grading oracle: does the program's answer equal the expected one?
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    actual == expected
}

/// Strip trailing line terminators from captured stdout
pub fn normalize_stdout(stdout: &str) -> &str {
    stdout.trim_end_matches(['\r', '\n'])
}

fn diagnostic_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[\w.]+\.)?\w*(?:Error|Exception): (.*)$").expect("valid diagnostic regex")
    })
}

/// Pull the human-readable message out of interpreter diagnostics.
///
/// Takes the last `SomeError: message` line (Python tracebacks end with
/// it, Node prints it after the source excerpt), else the trimmed text.
pub fn extract_error_message(diagnostics: &str) -> String {
    diagnostics
        .lines()
        .rev()
        .find_map(|line| diagnostic_line().captures(line))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| diagnostics.trim().to_string())
}

/// Describe why an execution failed, without the `Error: ` prefix
pub fn failure_message(output: &TestExecutionOutput, timeout_ms: u64) -> String {
    if output.timed_out {
        return format!("Execution timed out after {}ms", timeout_ms);
    }

    match output.exit_code {
        // The harness caught an exception and printed only its message
        Some(code) if code == HARNESS_FAILURE_EXIT_CODE => {
            let message = output.stderr.trim();
            if message.is_empty() {
                "Program raised an exception".to_string()
            } else {
                message.to_string()
            }
        }
        Some(137) => "Process killed (exceeded memory limit or was terminated)".to_string(),
        Some(139) => "Process crashed (segmentation fault)".to_string(),
        Some(152) => "CPU time limit exceeded".to_string(),
        code => {
            let message = extract_error_message(&output.stderr);
            if !message.is_empty() {
                message
            } else {
                match code {
                    Some(code) => format!("Process exited with status {}", code),
                    None => "Process exited abnormally".to_string(),
                }
            }
        }
    }
}

/// Failing result carrying an error message
pub fn error_result(test_case: &TestCase, message: &str, execution_time_ms: u64) -> TestResult {
    let actual = format!("{}{}", ERROR_PREFIX, message);
    TestResult {
        input: test_case.input.clone(),
        expected_output: test_case.expected_output.clone(),
        actual_output: actual.clone(),
        passed: false,
        error: actual,
        execution_time_ms,
    }
}

/// The single aggregate result reported when the code does not compile
pub fn compilation_failure(diagnostics: &str) -> TestResult {
    let message = extract_error_message(diagnostics);
    let message = if message.is_empty() {
        "Code failed to compile".to_string()
    } else {
        message
    };
    error_result(&TestCase::new(NOT_APPLICABLE, NOT_APPLICABLE), &message, 0)
}

/// Judge one execution of one test case
pub fn evaluate_test(test_case: &TestCase, output: &TestExecutionOutput, timeout_ms: u64) -> TestResult {
    if output.timed_out || output.runtime_error {
        return error_result(test_case, &failure_message(output, timeout_ms), output.execution_time_ms);
    }

    let actual = normalize_stdout(&output.stdout).to_string();
    TestResult {
        input: test_case.input.clone(),
        expected_output: test_case.expected_output.clone(),
        passed: outputs_match(&actual, &test_case.expected_output),
        actual_output: actual,
        error: String::new(),
        execution_time_ms: output.execution_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_output(stdout: &str, exec_time: u64) -> TestExecutionOutput {
        TestExecutionOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
            execution_time_ms: exec_time,
            timed_out: false,
            runtime_error: false,
        }
    }

    fn failed_output(stderr: &str, exit_code: Option<i64>) -> TestExecutionOutput {
        TestExecutionOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
            execution_time_ms: 5,
            timed_out: false,
            runtime_error: true,
        }
    }

    #[test]
    fn test_outputs_match_is_exact() {
        assert!(outputs_match("6", "6"));
        assert!(!outputs_match("6.0", "6"));
        assert!(!outputs_match("[1, 2]", "[1,2]"));
        assert!(!outputs_match("Hello", "hello"));
        assert!(!outputs_match(" 6", "6"));
    }

    #[test]
    fn test_normalize_stdout() {
        assert_eq!(normalize_stdout("6\n"), "6");
        assert_eq!(normalize_stdout("6\r\n"), "6");
        assert_eq!(normalize_stdout("a\nb\n\n"), "a\nb");
        assert_eq!(normalize_stdout("  6  "), "  6  ");
        assert_eq!(normalize_stdout(""), "");
    }

    #[test]
    fn test_evaluate_exact_match() {
        let case = TestCase::new("[1,2,3]", "6");
        let result = evaluate_test(&case, &make_output("6", 42), 5000);

        assert!(result.passed);
        assert_eq!(result.actual_output, "6");
        assert_eq!(result.error, "");
        assert_eq!(result.input, "[1,2,3]");
        assert_eq!(result.execution_time_ms, 42);
    }

    #[test]
    fn test_evaluate_with_trailing_newline() {
        let case = TestCase::new("[1,2]", "[1,2]");
        assert!(evaluate_test(&case, &make_output("[1,2]\n", 1), 5000).passed);
    }

    #[test]
    fn test_evaluate_mismatch_is_not_an_error() {
        let case = TestCase::new("[1,2,3]", "6");
        let result = evaluate_test(&case, &make_output("3", 1), 5000);

        assert!(!result.passed);
        assert_eq!(result.actual_output, "3");
        assert_eq!(result.error, "");
    }

    #[test]
    fn test_evaluate_harness_caught_exception() {
        let case = TestCase::new("[1]", "1");
        let output = failed_output("boom\n", Some(HARNESS_FAILURE_EXIT_CODE));
        let result = evaluate_test(&case, &output, 5000);

        assert!(!result.passed);
        assert_eq!(result.actual_output, "Error: boom");
        assert_eq!(result.error, result.actual_output);
    }

    #[test]
    fn test_harness_message_is_verbatim() {
        // Messages that look like diagnostics are not reinterpreted
        let output = failed_output("Error: custom", Some(HARNESS_FAILURE_EXIT_CODE));
        assert_eq!(failure_message(&output, 5000), "Error: custom");
    }

    #[test]
    fn test_evaluate_uncaught_node_error() {
        let stderr = "/tmp/algolab-run-x/main.js:1\nthrow new Error('top level');\n^\n\nError: top level\n    at Object.<anonymous> (/tmp/main.js:1:7)\n\nNode.js v20.11.0\n";
        let result = evaluate_test(&TestCase::new("[]", "0"), &failed_output(stderr, Some(1)), 5000);
        assert_eq!(result.actual_output, "Error: top level");
    }

    #[test]
    fn test_evaluate_timeout() {
        let output = TestExecutionOutput {
            timed_out: true,
            execution_time_ms: 1001,
            ..TestExecutionOutput::default()
        };
        let result = evaluate_test(&TestCase::new("5", "5"), &output, 1000);

        assert!(!result.passed);
        assert_eq!(result.actual_output, "Error: Execution timed out after 1000ms");
        assert_eq!(result.execution_time_ms, 1001);
    }

    #[test]
    fn test_signal_exit_codes() {
        assert!(failure_message(&failed_output("", Some(137)), 1).contains("memory"));
        assert!(failure_message(&failed_output("", Some(139)), 1).contains("segmentation"));
        assert!(failure_message(&failed_output("", Some(152)), 1).contains("CPU"));
        assert_eq!(
            failure_message(&failed_output("", Some(2)), 1),
            "Process exited with status 2"
        );
        assert_eq!(failure_message(&failed_output("", None), 1), "Process exited abnormally");
    }

    #[test]
    fn test_extract_error_message() {
        let python = "Traceback (most recent call last):\n  File \"main.py\", line 3, in <module>\n    x = 1 / 0\nZeroDivisionError: division by zero\n";
        assert_eq!(extract_error_message(python), "division by zero");

        let node = "/tmp/main.js:2\nfunction (\n         ^\n\nSyntaxError: Function statements require a function name\n    at wrapSafe (node:internal/modules/cjs/loader:1281:20)\n";
        assert_eq!(extract_error_message(node), "Function statements require a function name");

        let dotted = "json.decoder.JSONDecodeError: Expecting value: line 1 column 1 (char 0)";
        assert_eq!(extract_error_message(dotted), "Expecting value: line 1 column 1 (char 0)");

        assert_eq!(extract_error_message("  plain failure \n"), "plain failure");
        assert_eq!(extract_error_message(""), "");
    }

    #[test]
    fn test_compilation_failure_result() {
        let result = compilation_failure("SyntaxError: Unexpected end of input");

        assert_eq!(result.input, NOT_APPLICABLE);
        assert_eq!(result.expected_output, NOT_APPLICABLE);
        assert_eq!(result.actual_output, "Error: Unexpected end of input");
        assert_eq!(result.error, result.actual_output);
        assert!(!result.passed);

        assert_eq!(compilation_failure("").actual_output, "Error: Code failed to compile");
    }
}
