// Language configuration management for the execution engines
use algolab_common::types::Language;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Compiled-in copy of config/languages.json
const BUILTIN_LANGUAGES: &str = include_str!("../../../config/languages.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageExecution {
    pub command: String,
    pub args: Vec<String>,
    /// Arguments for a syntax-only check, placed before the source path.
    /// `None` skips the check for this language.
    #[serde(default)]
    pub check_args: Option<Vec<String>>,
    pub file_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    pub version: String,
    pub image: String,
    pub execution: LanguageExecution,
    pub memory_limit_mb: u32,
    pub cpu_limit: f32,
}

impl LanguageConfig {
    /// File name the source is written to, e.g. `main.py`
    pub fn source_file_name(&self) -> String {
        let ext = self.execution.file_extension.trim_start_matches('.');
        format!("main.{}", ext)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    configs: HashMap<String, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from a languages.json file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Invalid language config in {}", config_path.display()))
    }

    /// Load from a path if it exists, otherwise use the built-in configuration
    pub fn load_or_builtin(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            Self::builtin()
        }
    }

    /// Configuration shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_LANGUAGES).context("Built-in language config is invalid")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse languages.json")?;

        let mut configs = HashMap::new();
        for lang in languages_json.languages {
            if lang.name.parse::<Language>().is_err() {
                bail!("Unknown language '{}' in languages.json", lang.name);
            }
            if lang.execution.command.trim().is_empty() {
                bail!("Language '{}' has an empty execution command", lang.name);
            }
            configs.insert(lang.name.clone(), lang);
        }

        if configs.is_empty() {
            bail!("No languages configured in languages.json");
        }

        Ok(Self { configs })
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: &Language) -> Result<&LanguageConfig> {
        self.configs
            .get(language.as_str())
            .ok_or_else(|| anyhow::anyhow!("No configuration found for language: {}", language))
    }

    /// List all configured languages
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }
}
