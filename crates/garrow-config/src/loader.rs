//! Configuration file loading and error types.

use std::{fs, path::Path};

use crate::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config format: {0:?}")]
    UnsupportedFormat(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// On-disk config syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON, with `//` and `/* */` comments allowed.
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match ext {
            "json" | "jsonc" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Parse `data` in this format.
    pub fn parse(self, data: &str) -> Result<Config, ConfigError> {
        match self {
            Self::Json => {
                let stripped = json_comments::StripComments::new(data.as_bytes());
                Ok(serde_json::from_reader(stripped)?)
            }
            Self::Yaml => Ok(serde_yaml::from_str(data)?),
            Self::Toml => Ok(toml::from_str(data)?),
        }
    }
}

/// Load a config file, picking the parser from the file extension.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let data = fs::read_to_string(path)?;
    format.parse(&data)
}
