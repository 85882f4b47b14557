// Built-in exercises: entry-point names, input/output conventions and default tables

use crate::error::HarnessError;
use algolab_common::types::TestCase;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemType {
    SumArray,
    Fibonacci,
    SortArray,
}

/// How a test-case input is turned into the function argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Whole input is a JSON document
    Json,
    /// Whole input is a signed integer
    Integer,
}

/// How the function's return value is stringified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `value.toString()`
    Display,
    /// `JSON.stringify(value)`
    Json,
}

impl ProblemType {
    pub const ALL: [ProblemType; 3] = [
        ProblemType::SumArray,
        ProblemType::Fibonacci,
        ProblemType::SortArray,
    ];

    /// Name of the function the submission must define
    pub fn entry_point(&self) -> &'static str {
        match self {
            ProblemType::SumArray => "sumArray",
            ProblemType::Fibonacci => "fibonacci",
            ProblemType::SortArray => "sortArray",
        }
    }

    pub fn parameter(&self) -> &'static str {
        match self {
            ProblemType::Fibonacci => "n",
            ProblemType::SumArray | ProblemType::SortArray => "arr",
        }
    }

    pub fn input_kind(&self) -> InputKind {
        match self {
            ProblemType::Fibonacci => InputKind::Integer,
            ProblemType::SumArray | ProblemType::SortArray => InputKind::Json,
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        match self {
            ProblemType::SortArray => OutputFormat::Json,
            ProblemType::SumArray | ProblemType::Fibonacci => OutputFormat::Display,
        }
    }

    pub fn default_test_cases(&self) -> Vec<TestCase> {
        let table: &[(&str, &str)] = match self {
            ProblemType::SumArray => SUM_ARRAY_CASES,
            ProblemType::Fibonacci => FIBONACCI_CASES,
            ProblemType::SortArray => SORT_ARRAY_CASES,
        };
        table
            .iter()
            .map(|(input, expected)| TestCase::new(*input, *expected))
            .collect()
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

impl FromStr for ProblemType {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProblemType::ALL
            .into_iter()
            .find(|problem| problem.entry_point() == s)
            .ok_or_else(|| HarnessError::UnknownProblemType(s.to_string()))
    }
}

const SUM_ARRAY_CASES: &[(&str, &str)] = &[
    ("[1,2,3]", "6"),
    ("[]", "0"),
    ("[5]", "5"),
    ("[-1,-2,-3]", "-6"),
    ("[0,0,0]", "0"),
    ("[10,20,30,40]", "100"),
    ("[1.5,2.5,3]", "7"),
    ("[-5,5]", "0"),
    ("[100,200,300]", "600"),
    ("[1,-1,1,-1,1]", "1"),
];

const FIBONACCI_CASES: &[(&str, &str)] = &[
    ("0", "0"),
    ("1", "1"),
    ("2", "1"),
    ("5", "5"),
    ("10", "55"),
    ("20", "6765"),
];

const SORT_ARRAY_CASES: &[(&str, &str)] = &[
    ("[3,1,4,1,5,9]", "[1,1,3,4,5,9]"),
    ("[]", "[]"),
    ("[1]", "[1]"),
    ("[5,4,3,2,1]", "[1,2,3,4,5]"),
    ("[-2,0,-1]", "[-2,-1,0]"),
];

/// Default table for `sumArray`, also used by the single-problem runner
pub fn sum_array_test_cases() -> Vec<TestCase> {
    ProblemType::SumArray.default_test_cases()
}
