use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the harness knows how to wrap and execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::JavaScript, Language::TypeScript, Language::Python];

    /// Lowercase name, matching the keys in languages.json
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "javascript" => Ok(Language::JavaScript),
            "typescript" => Ok(Language::TypeScript),
            "python" => Ok(Language::Python),
            other => Err(format!("Unsupported language: {}", other)),
        }
    }
}

/// A single (input, expected output) pair used to grade a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    /// Human label, never used in comparison
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            description: None,
        }
    }
}

/// Outcome of one test case
///
/// `actual_output` holds the stringified return value, or an error message
/// starting with `Error:`. `error` is empty unless the case failed because
/// something went wrong, in which case it equals `actual_output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    pub error: String,
    #[serde(default)]
    pub execution_time_ms: u64,
}

/// Pass/fail counts for a batch of results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
        }
    }

    /// True when at least one case ran and none failed
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.failed == 0
    }
}
