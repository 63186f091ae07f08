//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! validate_schema = true
//! explain = false
//! max_bindings = 100000
//! detect_dates = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Check query attribute paths against the catalog
    pub validate_schema: bool,
    /// Attach a plan to every query response
    pub explain: bool,
    /// Cap on live partial bindings during evaluation
    pub max_bindings: Option<usize>,
    /// Ingest date-shaped strings as dates
    pub detect_dates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validate_schema: false,
            explain: false,
            max_bindings: None,
            detect_dates: false,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_bindings == Some(0) {
            return Err(ConfigError::Invalid("max_bindings must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_config() {
        let config = EngineConfig::from_toml_str("explain = true\nmax_bindings = 50").unwrap();
        assert!(config.explain);
        assert_eq!(config.max_bindings, Some(50));
        assert!(!config.validate_schema);
    }

    #[test]
    fn zero_binding_cap_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_bindings = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_types_fail_to_parse() {
        assert!(matches!(
            EngineConfig::from_toml_str("explain = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
