//! The catalog of remote objects mirrored into the base root
//!
//! A [`Catalog`] is built once from configuration and passed by reference to
//! every run. Entries never change after construction; derived views (the
//! daily view, closure entries) are new values.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const COMPRESSED_SUFFIX: &str = ".gz";

/// A validated `scheme://bucket/path/name` locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteLocator(String);

impl RemoteLocator {
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocator`] naming the first rule `raw` breaks.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let invalid = |reason: &str| Error::InvalidLocator {
            locator: raw.clone(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("scheme must be alphanumeric"));
        }
        let (bucket, object) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing object path"))?;
        if bucket.is_empty() {
            return Err(invalid("empty bucket name"));
        }
        if object.is_empty() || object.ends_with('/') {
            return Err(invalid("locator must name an object, not a prefix"));
        }
        if raw.trim() != raw {
            return Err(invalid("surrounding whitespace"));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Object name after the last `/`.
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(&self.0, |(_, name)| name)
    }

    /// Everything before the last `/`.
    pub fn parent(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(parent, _)| parent)
    }

    pub fn with_file_name(&self, name: &str) -> Self {
        Self(format!("{}/{}", self.parent(), name))
    }

    pub fn is_compressed(&self) -> bool {
        self.file_name().ends_with(COMPRESSED_SUFFIX)
    }

    /// Swap every path segment equal to `from` for `to`.
    ///
    /// The bucket name and the object name are left alone.
    pub fn replace_segment(&self, from: &str, to: &str) -> Self {
        let Some((scheme, rest)) = self.0.split_once("://") else {
            return self.clone();
        };
        let mut segments: Vec<&str> = rest.split('/').collect();
        let last = segments.len() - 1;
        for segment in segments.iter_mut().take(last).skip(1) {
            if *segment == from {
                *segment = to;
            }
        }
        Self(format!("{}://{}", scheme, segments.join("/")))
    }
}

impl fmt::Display for RemoteLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RemoteLocator {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<RemoteLocator> for String {
    fn from(value: RemoteLocator) -> Self {
        value.0
    }
}

/// One remote object and where it lands locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    remote_locator: RemoteLocator,
    destination_dir: PathBuf,
    name_prefix: Option<String>,
}

impl CatalogEntry {
    pub fn new(remote_locator: RemoteLocator, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote_locator,
            destination_dir: destination_dir.into(),
            name_prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.name_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    pub fn remote_locator(&self) -> &RemoteLocator {
        &self.remote_locator
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    pub fn name_prefix(&self) -> Option<&str> {
        self.name_prefix.as_deref()
    }

    /// Name of the object as it appears in the remote listing.
    pub fn object_name(&self) -> &str {
        self.remote_locator.file_name()
    }

    pub fn is_compressed(&self) -> bool {
        self.remote_locator.is_compressed()
    }

    /// Local file name: compression suffix stripped, prefix applied once.
    pub fn destination_file_name(&self) -> String {
        let name = self.object_name();
        let name = name.strip_suffix(COMPRESSED_SUFFIX).unwrap_or(name);
        match &self.name_prefix {
            Some(prefix) if !name.starts_with(prefix.as_str()) => format!("{prefix}{name}"),
            _ => name.to_string(),
        }
    }

    pub fn destination_path(&self) -> PathBuf {
        self.destination_dir.join(self.destination_file_name())
    }

    pub(crate) fn derive(
        &self,
        remote_locator: RemoteLocator,
        destination_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            remote_locator,
            destination_dir: destination_dir.into(),
            name_prefix: self.name_prefix.clone(),
        }
    }
}

/// How the daily view is derived from the closure catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyProfile {
    pub source_segment: String,
    pub target_segment: String,
    pub name_prefix: String,
}

impl Default for DailyProfile {
    fn default() -> Self {
        Self {
            source_segment: "CIERRES".to_string(),
            target_segment: "DIARIOS".to_string(),
            name_prefix: "DIARIOS_".to_string(),
        }
    }
}

/// Ordered, immutable list of catalog entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// The catalog as seen by the daily run.
    pub fn daily_view(&self, profile: &DailyProfile) -> Catalog {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let locator = entry
                    .remote_locator
                    .replace_segment(&profile.source_segment, &profile.target_segment);
                CatalogEntry::new(locator, entry.destination_dir.clone())
                    .with_prefix(profile.name_prefix.clone())
            })
            .collect();
        Catalog { entries }
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
