// Harness configuration
// Read from ALGOLAB_* environment variables, falling back to defaults

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CPU_SECONDS: u64 = 5;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;
pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";

/// Which backend runs submitted programs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Local child process with rlimits and a wall-clock deadline
    #[default]
    Process,
    /// Throwaway Docker container per execution
    Docker,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Process => write!(f, "process"),
            EngineKind::Docker => write!(f, "docker"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(EngineKind::Process),
            "docker" => Ok(EngineKind::Docker),
            other => Err(format!("Invalid engine '{}' (valid options: process, docker)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub engine: EngineKind,
    /// Wall-clock limit for a single test case
    pub timeout_ms: u64,
    /// RLIMIT_CPU applied to child processes
    pub cpu_seconds: u64,
    /// Address-space limit for child processes; unset by default because
    /// V8 reserves far more virtual memory than it uses
    pub memory_limit_mb: Option<u64>,
    pub max_output_bytes: usize,
    pub languages_path: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cpu_seconds: DEFAULT_CPU_SECONDS,
            memory_limit_mb: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            languages_path: DEFAULT_LANGUAGES_PATH.to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(engine) = lookup("ALGOLAB_ENGINE") {
            config.engine = engine.parse()?;
        }
        if let Some(timeout) = lookup("ALGOLAB_TIMEOUT_MS") {
            config.timeout_ms = parse_number("ALGOLAB_TIMEOUT_MS", &timeout)?;
        }
        if let Some(cpu) = lookup("ALGOLAB_CPU_SECONDS") {
            config.cpu_seconds = parse_number("ALGOLAB_CPU_SECONDS", &cpu)?;
        }
        if let Some(memory) = lookup("ALGOLAB_MEMORY_LIMIT_MB") {
            config.memory_limit_mb = Some(parse_number("ALGOLAB_MEMORY_LIMIT_MB", &memory)?);
        }
        if let Some(max_output) = lookup("ALGOLAB_MAX_OUTPUT_BYTES") {
            config.max_output_bytes = parse_number("ALGOLAB_MAX_OUTPUT_BYTES", &max_output)?;
        }
        if let Some(path) = lookup("ALGOLAB_LANGUAGES") {
            config.languages_path = path;
        }

        if config.timeout_ms == 0 {
            return Err("ALGOLAB_TIMEOUT_MS must be greater than zero".to_string());
        }

        Ok(config)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} must be a non-negative integer, got '{}'", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_empty() {
        let config = HarnessConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.engine, EngineKind::Process);
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.memory_limit_mb, None);
    }

    #[test]
    fn test_overrides() {
        let config = HarnessConfig::from_lookup(lookup_from(&[
            ("ALGOLAB_ENGINE", "Docker"),
            ("ALGOLAB_TIMEOUT_MS", "1500"),
            ("ALGOLAB_CPU_SECONDS", "2"),
            ("ALGOLAB_MEMORY_LIMIT_MB", "512"),
            ("ALGOLAB_MAX_OUTPUT_BYTES", "1024"),
            ("ALGOLAB_LANGUAGES", "/etc/algolab/languages.json"),
        ]))
        .unwrap();

        assert_eq!(config.engine, EngineKind::Docker);
        assert_eq!(config.timeout_ms, 1500);
        assert_eq!(config.cpu_seconds, 2);
        assert_eq!(config.memory_limit_mb, Some(512));
        assert_eq!(config.max_output_bytes, 1024);
        assert_eq!(config.languages_path, "/etc/algolab/languages.json");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = HarnessConfig::from_lookup(lookup_from(&[("ALGOLAB_ENGINE", "vm")])).unwrap_err();
        assert!(err.contains("Invalid engine"));

        let err = HarnessConfig::from_lookup(lookup_from(&[("ALGOLAB_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.contains("ALGOLAB_TIMEOUT_MS"));

        assert!(HarnessConfig::from_lookup(lookup_from(&[("ALGOLAB_TIMEOUT_MS", "0")])).is_err());
    }
}
