//! Per-vault configuration, stored in `.foldertag/config.json`.

use std::path::Path;

use clap::crate_version;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::{Error, Result, VaultFile};

pub const VAULT_CONFIG_FILENAME: &str = "config.json";

/// Contents of a vault's config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// A unique identifier for the vault.
    id: Uuid,
    /// Version of the config format.
    version: u32,
    /// Version of foldertag that initialized the vault.
    created_with: String,
    #[serde(default)]
    pub settings: Settings,
}

impl VaultConfig {
    pub fn new() -> Self {
        VaultConfig {
            id: Uuid::new_v4(),
            version: 1,
            created_with: crate_version!().to_string(),
            settings: Settings::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn created_with(&self) -> &str {
        &self.created_with
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// User-adjustable behaviour of the folder tag synchronizer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Files with these extensions are never tagged automatically. Compared
    /// case-insensitively.
    pub excluded_extensions: Vec<String>,
    /// Tag files with their folder name when they are created.
    pub sync_on_create: bool,
    /// Update the folder tag when files move between folders.
    pub sync_on_rename: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            excluded_extensions: vec!["pdf".to_string()],
            sync_on_create: true,
            sync_on_rename: true,
        }
    }
}

impl Settings {
    pub const KEYS: [&'static str; 3] = ["excluded_extensions", "sync_on_create", "sync_on_rename"];

    /// Whether automatic tagging skips this file.
    pub fn is_excluded(&self, file: &VaultFile) -> bool {
        let ext = file.extension();
        self.excluded_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Returns the value of a setting, formatted the way [`Settings::set`] accepts it.
    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "excluded_extensions" => Ok(self.excluded_extensions.join(",")),
            "sync_on_create" => Ok(self.sync_on_create.to_string()),
            "sync_on_rename" => Ok(self.sync_on_rename.to_string()),
            _ => Err(Error::UnknownSetting(key.to_string())),
        }
    }

    /// Sets a setting from its string form. Lists are comma-separated; a leading dot on
    /// an extension is ignored.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "excluded_extensions" => {
                self.excluded_extensions = value
                    .split(',')
                    .map(|e| e.trim().trim_start_matches('.'))
                    .filter(|e| !e.is_empty())
                    .map(String::from)
                    .collect();
            }
            "sync_on_create" => self.sync_on_create = parse_bool(key, value)?,
            "sync_on_rename" => self.sync_on_rename = parse_bool(key, value)?,
            _ => return Err(Error::UnknownSetting(key.to_string())),
        }
        Ok(())
    }

    /// All settings as key/value pairs.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        Self::KEYS
            .iter()
            .filter_map(|&key| self.get(key).ok().map(|v| (key, v)))
            .collect()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(Error::InvalidSettingValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Helper to read and deserialize a vault config file.
pub(crate) async fn read_vault_config(path: &Path) -> Result<VaultConfig> {
    let content = fs::read(path).await.map_err(|e| {
        warn!("Failed to read vault config file '{}': {}", path.display(), e);
        Error::InvalidVaultConfig(path.to_path_buf())
    })?;

    serde_json::from_slice(&content).map_err(|e| {
        warn!("Failed to parse vault config file '{}': {}", path.display(), e);
        Error::InvalidVaultConfig(path.to_path_buf())
    })
}

/// Helper to serialize and write a vault config file.
pub(crate) async fn write_vault_config(path: &Path, config: &VaultConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config).map_err(Error::Config)?;
    fs::write(path, content).await.map_err(Error::Io)?;
    debug!("Vault config written successfully to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pdf_excluded_by_default() {
        let settings = Settings::default();
        assert!(settings.is_excluded(&VaultFile::new("Inbox/report.pdf")));
        assert!(settings.is_excluded(&VaultFile::new("Inbox/report.PDF")));
        assert!(!settings.is_excluded(&VaultFile::new("Inbox/report.md")));
        assert!(!settings.is_excluded(&VaultFile::new("Inbox/pdf")));
    }

    #[test]
    fn test_set_and_get() {
        let mut settings = Settings::default();
        settings.set("excluded_extensions", ".pdf, png,,canvas").unwrap();
        assert_eq!(settings.excluded_extensions, vec!["pdf", "png", "canvas"]);
        assert_eq!(settings.get("excluded_extensions").unwrap(), "pdf,png,canvas");

        settings.set("sync_on_rename", "off").unwrap();
        assert!(!settings.sync_on_rename);
        assert_eq!(settings.get("sync_on_rename").unwrap(), "false");
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut settings = Settings::default();
        assert!(matches!(settings.set("colour", "red"), Err(Error::UnknownSetting(_))));
        assert!(matches!(
            settings.set("sync_on_create", "maybe"),
            Err(Error::InvalidSettingValue { .. })
        ));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_missing_settings_use_defaults() {
        let json = r#"{ "id": "5f0c7f3e-8a40-4d8c-9d3b-3c2b1f0e9a11", "version": 1, "created_with": "0.1.0",
                        "settings": { "sync_on_create": false } }"#;
        let config: VaultConfig = serde_json::from_str(json).unwrap();
        assert!(!config.settings.sync_on_create);
        assert!(config.settings.sync_on_rename);
        assert_eq!(config.settings.excluded_extensions, vec!["pdf"]);
    }

    #[tokio::test]
    async fn test_config_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(VAULT_CONFIG_FILENAME);
        let mut config = VaultConfig::new();
        config.settings.sync_on_create = false;

        write_vault_config(&path, &config).await.unwrap();
        let read = read_vault_config(&path).await.unwrap();
        assert_eq!(read, config);
    }

    #[tokio::test]
    async fn test_malformed_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(VAULT_CONFIG_FILENAME);
        fs::write(&path, "{ not json }").await.unwrap();
        assert!(matches!(read_vault_config(&path).await, Err(Error::InvalidVaultConfig(_))));
    }
}
