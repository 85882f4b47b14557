use thiserror::Error;

/// Errors surfaced to the integrator calling the harness.
///
/// Failures caused by submitted code never appear here; they are reported
/// as failing `TestResult`s instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HarnessError {
    /// The display text is part of the caller contract and must not change.
    #[error("Unknown problem type")]
    UnknownProblemType(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_problem_type_message_is_exact() {
        let err = HarnessError::UnknownProblemType("unknownProblem".to_string());
        assert_eq!(err.to_string(), "Unknown problem type");
    }
}
