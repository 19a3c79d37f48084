use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("config value '{key}' is invalid at {path}: {source}")]
    Value {
        key: String,
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON settings document addressed by slash-separated keys such as
/// `graphics/frame_limit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    root: Value,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    pub fn parse(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let root = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Walks `key` one segment at a time through nested objects. An empty key
    /// returns the whole document.
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |value, segment| value.get(segment))
    }

    /// Typed lookup; `Ok(None)` when the key is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        serde_path_to_error::deserialize::<_, T>(value)
            .map(Some)
            .map_err(|error| {
                let path = error.path().to_string();
                ConfigError::Value {
                    key: key.to_string(),
                    path,
                    source: error.into_inner(),
                }
            })
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.get_as(key)?.unwrap_or(default))
    }
}
