//! Word Embedding
//!
//! Word → vector lookup backed by a trained embedding model:
//! - Vocabulary membership and unknown-token fallback
//! - Model inference through a pluggable runner (candle by default)
//! - Ordered, idempotent release of the model and its inference session

pub mod embeddings;

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub model: ModelYamlConfig,
}

/// Model configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelYamlConfig {
    /// Directory holding `model.yaml`, the weights and the vocabulary
    pub dir: String,
}

impl Default for ModelYamlConfig {
    fn default() -> Self {
        Self {
            dir: "./model".into(),
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub model_dir: PathBuf,
}

/// Environment variable overriding `model.dir`
pub const MODEL_DIR_ENV: &str = "WORD_EMBEDDING_MODEL_DIR";

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default. An empty env var counts as unset.
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path.unwrap_or(Path::new("config.yaml")));

        let model_dir = match std::env::var(MODEL_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => dir,
            _ => yaml.model.dir,
        };

        Ok(Self {
            model_dir: model_dir.into(),
        })
    }

    /// Parse the YAML file at `path`. A missing or malformed file yields defaults.
    fn load_yaml(path: &Path) -> YamlConfig {
        let Ok(contents) = std::fs::read_to_string(path) else {
            tracing::debug!(path = %path.display(), "No config file, using env vars / defaults");
            return YamlConfig::default();
        };

        serde_yaml::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
            YamlConfig::default()
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
model:
  dir: /opt/models/glove
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model.dir, "/opt/models/glove");
    }

    #[test]
    fn test_yaml_config_defaults() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.model.dir, "./model");
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model:\n  dir: /srv/embeddings").unwrap();

        let yaml = Config::load_yaml(file.path());
        assert_eq!(yaml.model.dir, "/srv/embeddings");
    }

    #[test]
    fn test_missing_yaml_falls_back_to_defaults() {
        let yaml = Config::load_yaml(Path::new("/nonexistent/config.yaml"));
        assert_eq!(yaml.model.dir, "./model");
    }

    #[test]
    fn test_invalid_yaml_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model: [not, a, map").unwrap();

        let yaml = Config::load_yaml(file.path());
        assert_eq!(yaml.model.dir, "./model");
    }

    /// YAML file, env override and empty env var in one test, so no other
    /// test can race on the environment variable.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        std::fs::write(&file_path, "model:\n  dir: /yaml/model\n").unwrap();

        // --- Phase 1: YAML wins over the default ---
        std::env::remove_var(MODEL_DIR_ENV);
        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/yaml/model"));

        // --- Phase 2: env var wins over YAML ---
        std::env::set_var(MODEL_DIR_ENV, "/env/model");
        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/env/model"));

        // --- Phase 3: empty env var is ignored ---
        std::env::set_var(MODEL_DIR_ENV, "");
        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/yaml/model"));

        // --- Phase 4: no YAML file, no env var → default ---
        std::env::remove_var(MODEL_DIR_ENV);
        let config =
            Config::from_yaml_and_env(Some(Path::new("/nonexistent/config.yaml"))).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("./model"));
    }
}
