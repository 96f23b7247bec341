//! User configuration: paths, transfer tuning, daily profile, catalog
//!
//! Loaded through [`ConfigStore`], so TOML, JSON and YAML files all work.

use std::path::{Path, PathBuf};
use std::time::Duration;

use blobmirror_fs::{ConfigStore, DirectoryLayout, RobustnessConfig};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CatalogEntry, DailyProfile, RemoteLocator};
use crate::remote::GsutilStore;
use crate::sync::SyncOptions;
use crate::{Error, Result};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "BLOBMIRROR_CONFIG";
const LOCAL_CONFIG: &str = "blobmirror.toml";
const APP_DIR: &str = "blobmirror";
const USER_CONFIG: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub paths: PathSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default)]
    pub daily: DailyProfile,
    #[serde(default)]
    pub catalog: Vec<CatalogEntrySettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSettings {
    pub base_root: PathBuf,
    pub backup_root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    pub tool: String,
    pub workers: usize,
    pub probe_timeout_secs: u64,
    pub transfer_timeout_secs: u64,
    pub lock_timeout_secs: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            tool: GsutilStore::DEFAULT_TOOL.to_string(),
            workers: 4,
            probe_timeout_secs: 60,
            transfer_timeout_secs: 3600,
            lock_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntrySettings {
    pub locator: RemoteLocator,
    /// Relative to `paths.base_root` unless absolute.
    pub destination: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,
}

impl Settings {
    /// Load and validate the settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// catalog entry is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = ConfigStore::new().load(path)?;
        settings.validate()?;
        tracing::debug!(
            path = %path.display(),
            entries = settings.catalog.len(),
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Pick the config file: `explicit`, then `$BLOBMIRROR_CONFIG`, then
    /// `./blobmirror.toml`, then the user config directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] listing every searched location
    /// when none exists. An explicit path is returned unchecked.
    pub fn discover(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let user = dirs::config_dir().map(|dir| dir.join(APP_DIR).join(USER_CONFIG));
        Self::discover_in(from_env, Path::new(LOCAL_CONFIG), user)
    }

    fn discover_in(
        from_env: Option<PathBuf>,
        local: &Path,
        user: Option<PathBuf>,
    ) -> Result<PathBuf> {
        if let Some(path) = from_env {
            return Ok(path);
        }
        let candidates: Vec<PathBuf> = std::iter::once(local.to_path_buf()).chain(user).collect();
        if let Some(found) = candidates.iter().find(|path| path.is_file()) {
            return Ok(found.clone());
        }
        Err(Error::ConfigNotFound {
            searched: candidates,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.transfer.workers == 0 {
            return Err(Error::invalid_input("transfer.workers must be at least 1"));
        }
        if self.transfer.tool.trim().is_empty() {
            return Err(Error::invalid_input("transfer.tool must not be empty"));
        }
        Ok(())
    }

    pub fn layout(&self) -> DirectoryLayout {
        let mut layout = DirectoryLayout::new(&self.paths.base_root, &self.paths.backup_root);
        if let Some(staging_root) = &self.paths.staging_root {
            layout = layout.with_staging_root(staging_root);
        }
        if let Some(log_dir) = &self.paths.log_dir {
            layout = layout.with_log_dir(log_dir);
        }
        layout
    }

    /// The configured catalog with destinations resolved against the base
    /// root.
    pub fn catalog(&self) -> Result<Catalog> {
        let layout = self.layout();
        let entries = self
            .catalog
            .iter()
            .map(|item| {
                let destination = layout.resolve_destination(&item.destination)?;
                let entry = CatalogEntry::new(item.locator.clone(), destination);
                Ok(match &item.name_prefix {
                    Some(prefix) => entry.with_prefix(prefix.clone()),
                    None => entry,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Catalog::new(entries))
    }

    pub fn robustness(&self) -> RobustnessConfig {
        RobustnessConfig {
            lock_timeout: Duration::from_secs(self.transfer.lock_timeout_secs),
            ..RobustnessConfig::default()
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            workers: self.transfer.workers,
            probe_timeout: Duration::from_secs(self.transfer.probe_timeout_secs),
            transfer_timeout: Duration::from_secs(self.transfer.transfer_timeout_secs),
            robustness: self.robustness(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[paths]
base_root = "/data/Bases Crudas"
backup_root = "/data/Backup Bases Crudas"

[transfer]
workers = 2

[[catalog]]
locator = "gs://bucket/CIERRES/FOO_MESACTUAL_000000000000.csv"
destination = "02 - RETENCION/FOO"

[[catalog]]
locator = "gs://bucket/CIERRES/BAR.csv.gz"
destination = "/elsewhere/BAR"
name_prefix = "X_"
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_toml_with_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&write(&dir, "blobmirror.toml", SAMPLE)).unwrap();

        assert_eq!(settings.transfer.workers, 2);
        assert_eq!(settings.transfer.tool, "gsutil");
        assert_eq!(settings.daily, DailyProfile::default());

        let layout = settings.layout();
        assert_eq!(
            layout.staging_root(),
            Path::new("/data/Backup Bases Crudas/Temp")
        );

        let catalog = settings.catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.entries()[0].destination_dir(),
            Path::new("/data/Bases Crudas/02 - RETENCION/FOO")
        );
        assert_eq!(catalog.entries()[1].destination_dir(), Path::new("/elsewhere/BAR"));
        assert_eq!(catalog.entries()[1].destination_file_name(), "X_BAR.csv");
    }

    #[test]
    fn loads_yaml_too() {
        let dir = TempDir::new().unwrap();
        let yaml = "paths:\n  base_root: /b\n  backup_root: /k\ncatalog:\n  - locator: gs://bucket/CIERRES/A.csv\n    destination: A\n";
        let settings = Settings::load(&write(&dir, "blobmirror.yaml", yaml)).unwrap();
        assert_eq!(settings.catalog.len(), 1);
    }

    #[test]
    fn rejects_bad_locator_and_zero_workers() {
        let dir = TempDir::new().unwrap();
        let bad_locator = SAMPLE.replace("gs://bucket/CIERRES/BAR.csv.gz", "BAR.csv.gz");
        assert!(Settings::load(&write(&dir, "a.toml", &bad_locator)).is_err());

        let zero = SAMPLE.replace("workers = 2", "workers = 0");
        assert!(matches!(
            Settings::load(&write(&dir, "b.toml", &zero)),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn escaping_destination_is_rejected() {
        let dir = TempDir::new().unwrap();
        let escaping = SAMPLE.replace("02 - RETENCION/FOO", "../outside");
        let settings = Settings::load(&write(&dir, "c.toml", &escaping)).unwrap();
        assert!(settings.catalog().is_err());
    }

    #[test]
    fn discovery_order() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("blobmirror.toml");
        let user = dir.path().join("user/config.toml");

        let env = PathBuf::from("/from/env.toml");
        assert_eq!(
            Settings::discover_in(Some(env.clone()), &local, Some(user.clone())).unwrap(),
            env
        );

        assert!(matches!(
            Settings::discover_in(None, &local, Some(user.clone())),
            Err(Error::ConfigNotFound { searched }) if searched.len() == 2
        ));

        std::fs::create_dir_all(user.parent().unwrap()).unwrap();
        std::fs::write(&user, "").unwrap();
        assert_eq!(Settings::discover_in(None, &local, Some(user.clone())).unwrap(), user);

        std::fs::write(&local, "").unwrap();
        assert_eq!(Settings::discover_in(None, &local, Some(user)).unwrap(), local);
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = Path::new("/etc/blobmirror.toml");
        assert_eq!(Settings::discover(Some(explicit)).unwrap(), explicit);
    }

    #[test]
    fn sample_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/blobmirror.toml");
        let settings = Settings::load(&path).expect("Should load the sample config");
        assert_eq!(settings.catalog.len(), 3);

        let catalog = settings.catalog().expect("Should resolve sample destinations");
        assert_eq!(
            catalog.entries()[2].destination_file_name(),
            "MOVIL_BAJAS_MESACTUAL.csv"
        );
        assert_eq!(
            catalog.entries()[1].destination_file_name(),
            "SOPORTE_7D_MESANTERIOR.csv"
        );
    }
}
