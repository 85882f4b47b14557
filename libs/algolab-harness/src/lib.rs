//! Grading harness for submitted solutions.
//!
//! Submitted code is wrapped in a generated harness, executed once per test
//! case by an [`ExecutionEngine`], and judged by exact comparison of its
//! printed result against the expected output.

pub mod coerce;
pub mod config;
pub mod docker;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod problems;
pub mod runner;
pub mod wrapper;

pub use coerce::coerce;
pub use engine::{AnyEngine, ExecutionEngine, ProcessEngine};
pub use error::HarnessError;
pub use problems::ProblemType;
pub use runner::{summarize, TestRunner};
pub use wrapper::{detect_entry_point, wrap_user_code, EntryPoint, EntryPointSource};
