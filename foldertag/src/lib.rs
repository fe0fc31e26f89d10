use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use foldertag_core::storage::{normalize_path, Vault, VaultFile, VaultTree};
use foldertag_core::FolderTagSynchronizer;

pub mod cli;
pub mod commands;
mod prompt;

pub struct AppContext {
    pub vault: anyhow::Result<Arc<Vault>>,
    pub quiet: bool,
}

impl AppContext {
    pub fn vault(&self) -> Result<&Arc<Vault>> {
        self.vault.as_ref().map_err(|e| anyhow!("{:#}", e))
    }

    /// A synchronizer for the current vault, using the vault's settings.
    pub fn synchronizer(&self) -> Result<Arc<FolderTagSynchronizer<Vault>>> {
        let vault = self.vault()?;
        Ok(Arc::new(FolderTagSynchronizer::new(vault.clone(), vault.settings().clone())))
    }

    /// Prints a status message unless `--quiet` was given.
    pub fn report(&self, message: impl Display) {
        if !self.quiet {
            println!("{}", message);
        }
    }
}

/// Interprets a command line argument naming something in the vault. Existing paths on
/// disk are converted to vault paths; anything else is taken as a vault path already.
pub async fn resolve_vault_path(vault: &Vault, arg: &str) -> Result<String> {
    let on_disk = Path::new(arg);
    if tokio::fs::try_exists(on_disk).await.unwrap_or(false) {
        Ok(vault.vault_path_of(on_disk).await?)
    } else {
        Ok(normalize_path(arg)?)
    }
}

/// Like [`resolve_vault_path`], for files that must exist.
pub async fn resolve_file(vault: &Vault, arg: &str) -> Result<VaultFile> {
    let path = resolve_vault_path(vault, arg).await?;
    let is_file = tokio::fs::metadata(vault.path().join(&path))
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        anyhow::bail!("File not found in vault: {}", path);
    }
    Ok(VaultFile::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn resolves_disk_and_vault_paths() {
        let dir = tempdir().unwrap();
        let vault = Vault::init(dir.path()).await.unwrap();
        std::fs::create_dir_all(vault.path().join("Inbox")).unwrap();
        std::fs::write(vault.path().join("Inbox/a.md"), "").unwrap();

        let on_disk = vault.path().join("Inbox/a.md");
        let from_disk = resolve_file(&vault, on_disk.to_str().unwrap()).await.unwrap();
        assert_eq!(from_disk.path(), "Inbox/a.md");

        let from_vault = resolve_file(&vault, "Inbox/a.md").await.unwrap();
        assert_eq!(from_vault.path(), "Inbox/a.md");

        assert!(resolve_file(&vault, "Inbox/missing.md").await.is_err());
        assert!(resolve_file(&vault, "../outside.md").await.is_err());
    }
}
