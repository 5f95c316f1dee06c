//! Configuration loading and data folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the data folder
pub const DATA_DIR_ENV: &str = "WINGMAN_DATA_DIR";

/// Environment variable overriding `[inference] api_key`
pub const API_KEY_ENV: &str = "WINGMAN_API_KEY";

/// Store file name inside the data folder
pub const DATABASE_FILE: &str = "wingman.db";

/// Contents of `wingman.toml`
///
/// Every section is optional; a missing file yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Data folder holding the store (priority 3, below CLI and environment)
    pub data_dir: Option<PathBuf>,
    pub inference: InferenceConfig,
    pub pipeline: PipelineConfig,
}

/// `[inference]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8787/v1/infer".to_string(),
            model: "vision-large".to_string(),
            api_key: None,
        }
    }
}

/// `[pipeline]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds between extracted frames
    pub frame_interval_seconds: f64,
    /// Frames needed before the quick read starts
    pub quick_frame_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval_seconds: 1.0,
            quick_frame_count: 3,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration
    ///
    /// An explicit `path` must exist. Without one, the platform config file
    /// is used when present; otherwise defaults apply. `WINGMAN_API_KEY`
    /// overrides the file's key either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    warn!("No wingman.toml found, using defaults");
                    AppConfig::default()
                }
            },
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                config.inference.api_key = Some(key);
            }
        }
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        let interval = self.pipeline.frame_interval_seconds;
        if interval.is_nan() || interval <= 0.0 {
            return Err(Error::Config(
                "pipeline.frame_interval_seconds must be positive".to_string(),
            ));
        }
        if self.pipeline.quick_frame_count == 0 {
            return Err(Error::Config(
                "pipeline.quick_frame_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Data folder resolution, highest priority first:
    /// 1. Command-line argument
    /// 2. `WINGMAN_DATA_DIR`
    /// 3. `data_dir` from the TOML file
    /// 4. OS-dependent default
    pub fn resolve_data_dir(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(DATA_DIR_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.data_dir {
            return path.clone();
        }

        default_data_dir()
    }

    /// Store file for the resolved data folder
    pub fn database_path(&self, cli_arg: Option<&Path>) -> PathBuf {
        self.resolve_data_dir(cli_arg).join(DATABASE_FILE)
    }
}

/// Platform config file (`~/.config/wingman/wingman.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wingman").join("wingman.toml"))
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("wingman"))
        .unwrap_or_else(|| PathBuf::from("./wingman_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.pipeline.quick_frame_count, 3);
        assert_eq!(config.pipeline.frame_interval_seconds, 1.0);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            data_dir = "/srv/wingman"

            [inference]
            model = "vision-small"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/wingman")));
        assert_eq!(config.inference.model, "vision-small");
        assert_eq!(config.inference.endpoint, InferenceConfig::default().endpoint);
        assert!(config.inference.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = AppConfig::from_toml_str("[pipeline]\nquick_frame_count = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));

        let result = AppConfig::from_toml_str("[pipeline]\nframe_interval_seconds = -1.0\n");
        assert!(matches!(result, Err(Error::Config(_))));

        assert!(AppConfig::from_toml_str("data_dir = [").is_err());
    }

    #[test]
    fn test_cli_argument_wins() {
        let config = AppConfig {
            data_dir: Some(PathBuf::from("/from/toml")),
            ..AppConfig::default()
        };
        let resolved = config.resolve_data_dir(Some(Path::new("/from/cli")));
        assert_eq!(resolved, PathBuf::from("/from/cli"));
        assert_eq!(
            config.database_path(Some(Path::new("/from/cli"))),
            PathBuf::from("/from/cli/wingman.db")
        );
    }
}
