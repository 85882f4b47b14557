//! Types and configuration shared by the harness library and the CLI

pub mod config;
pub mod types;
