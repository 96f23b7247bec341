//! Format-agnostic configuration loading

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::{Error, Result, io};

/// Format-agnostic configuration store.
///
/// Detects the format from the file extension and deserializes
/// transparently.
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file.
    ///
    /// Format is detected from file extension:
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for any other extension,
    /// [`Error::ConfigParse`] when the content does not deserialize into `T`,
    /// and the read error when the file cannot be opened.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let extension = extension_of(path);
        let content = io::read_text(path)?;

        match extension.as_str() {
            "toml" => toml::from_str(&content).map_err(|e| parse_error(path, "TOML", e)),
            "json" => serde_json::from_str(&content).map_err(|e| parse_error(path, "JSON", e)),
            "yaml" | "yml" => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(path, "YAML", e))
            }
            _ => Err(Error::UnsupportedFormat { extension }),
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn parse_error(path: &Path, format: &str, e: impl std::fmt::Display) -> Error {
    Error::ConfigParse {
        path: path.to_path_buf(),
        format: format.into(),
        message: e.to_string(),
    }
}
