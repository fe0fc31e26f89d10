use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::config::{read_vault_config, write_vault_config, Settings, VaultConfig, VAULT_CONFIG_FILENAME};
use crate::event::{FileCreated, FileOpened, FileRenamed, VaultEvents};
use crate::storage::{
    normalize_path, relative_vault_path, Error, Result, Storage, VaultFile, VaultTree, INTERNAL_DIR_NAME,
};

/// A vault backed by a directory on disk.
#[derive(Debug)]
pub struct Vault {
    // Canonical absolute path to the vault root
    pub(crate) absolute_path: PathBuf,
    internal_dir: PathBuf,
    config: VaultConfig,
    pub on: VaultEvents,
}

impl Vault {
    /// Returns the root path of the vault.
    pub fn path(&self) -> &Path {
        &self.absolute_path
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Path of the vault's config file (which may not exist yet).
    pub fn config_path(&self) -> PathBuf {
        self.internal_dir.join(VAULT_CONFIG_FILENAME)
    }

    /// Whether the vault has a `.foldertag` directory.
    pub async fn is_initialized(&self) -> bool {
        fs::metadata(&self.internal_dir).await.map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Opens a vault rooted at `path`.
    ///
    /// The config file is read if the vault has been initialized; otherwise default
    /// settings apply.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Arc<Vault>> {
        debug!("Attempting to open vault");

        // Check if the path exists (necessary prior to canonicalization)
        let meta = fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::DirectoryNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }

        let absolute_path = fs::canonicalize(path).await.map_err(Error::Io)?;
        let internal_dir = absolute_path.join(INTERNAL_DIR_NAME);
        let config_path = internal_dir.join(VAULT_CONFIG_FILENAME);

        let config = if fs::try_exists(&config_path).await.map_err(Error::Io)? {
            read_vault_config(&config_path).await?
        } else {
            debug!("No config file found, using default settings");
            VaultConfig::new()
        };

        debug!("Vault opened at {}", absolute_path.display());
        Ok(Arc::new(Vault {
            absolute_path,
            internal_dir,
            config,
            on: VaultEvents::new(),
        }))
    }

    /// Initializes a vault at `path`: creates the directory if needed, then the
    /// `.foldertag` directory and its config file. Existing notes are left alone.
    ///
    /// Fails if `path` is a file or the vault is already initialized.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub async fn init(path: &Path) -> Result<Arc<Vault>> {
        debug!("Attempting to initialize vault");
        match fs::metadata(path).await {
            Ok(meta) if !meta.is_dir() => return Err(Error::NotADirectory(path.to_path_buf())),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Path does not exist. Creating vault directory.");
                fs::create_dir_all(path).await.map_err(Error::Io)?;
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let internal_dir = path.join(INTERNAL_DIR_NAME);
        if fs::try_exists(&internal_dir).await.map_err(Error::Io)? {
            return Err(Error::AlreadyInitialized(path.to_path_buf()));
        }
        fs::create_dir(&internal_dir).await.map_err(Error::Io)?;
        write_vault_config(&internal_dir.join(VAULT_CONFIG_FILENAME), &VaultConfig::new()).await?;
        debug!("Vault initialized successfully");

        Vault::open(path).await
    }

    /// Writes `settings` to the config file. They take effect the next time the vault
    /// is opened.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        if !self.is_initialized().await {
            fs::create_dir_all(&self.internal_dir).await.map_err(Error::Io)?;
        }
        let mut config = self.config.clone();
        config.settings = settings.clone();
        write_vault_config(&self.config_path(), &config).await
    }

    /// Converts a filesystem path (absolute, or relative to the current directory) into
    /// a vault path.
    pub async fn vault_path_of(&self, path: &Path) -> Result<String> {
        let absolute = fs::canonicalize(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        relative_vault_path(&self.absolute_path, &absolute)
            .ok_or_else(|| Error::PathOutsideVault(path.to_path_buf()))
    }

    /// Absolute location of a vault path.
    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/').fold(self.absolute_path.clone(), |acc, segment| acc.join(segment))
    }

    /// Collects every file and folder below the root, skipping dot-entries.
    async fn walk(&self) -> Result<(Vec<VaultFile>, Vec<String>)> {
        let mut files = Vec::new();
        let mut folders = Vec::new();
        let mut pending = vec![self.absolute_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = fs::read_dir(&dir).await.map_err(Error::Io)?;
            while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
                let path = entry.path();
                let Some(relative) = relative_vault_path(&self.absolute_path, &path) else {
                    debug!("Skipping excluded entry: {}", path.display());
                    continue;
                };
                let file_type = entry.file_type().await.map_err(Error::Io)?;
                if file_type.is_dir() {
                    folders.push(relative);
                    pending.push(path);
                } else if file_type.is_file() {
                    files.push(VaultFile::new(relative));
                }
            }
        }

        files.sort();
        folders.sort();
        Ok((files, folders))
    }
}

fn not_found_as(path: &str) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_string())
        } else {
            Error::Io(e)
        }
    }
}

#[async_trait]
impl Storage for Vault {
    #[instrument(skip(self), fields(file = %file))]
    async fn read(&self, file: &VaultFile) -> Result<String> {
        fs::read_to_string(self.resolve(file.path()))
            .await
            .map_err(not_found_as(file.path()))
    }

    #[instrument(skip(self, content), fields(file = %file, len = content.len()))]
    async fn modify(&self, file: &VaultFile, content: &str) -> Result<()> {
        // Opening without `create` makes a vanished file an error instead of recreating it
        let mut handle = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.resolve(file.path()))
            .await
            .map_err(not_found_as(file.path()))?;
        handle.write_all(content.as_bytes()).await.map_err(Error::Io)?;
        handle.flush().await.map_err(Error::Io)?;
        debug!("File content replaced");
        Ok(())
    }
}

#[async_trait]
impl VaultTree for Vault {
    fn events(&self) -> &VaultEvents {
        &self.on
    }

    fn settings(&self) -> &Settings {
        &self.config.settings
    }

    async fn list_files(&self) -> Result<Vec<VaultFile>> {
        Ok(self.walk().await?.0)
    }

    async fn list_folders(&self) -> Result<Vec<String>> {
        Ok(self.walk().await?.1)
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let absolute = self.resolve(&path);
        match fs::metadata(&absolute).await {
            Ok(meta) if meta.is_dir() => Err(Error::FolderExists(path)),
            Ok(_) => Err(Error::CannotCreateDirNotAFile(path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(&absolute).await.map_err(Error::Io)?;
                debug!("Folder created");
                Ok(())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    #[instrument(skip(self, content))]
    async fn create_file(&self, path: &str, content: &str) -> Result<VaultFile> {
        let path = normalize_path(path)?;
        let absolute = self.resolve(&path);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await.map_err(Error::Io)?;
        }

        let mut handle = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&absolute)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::TargetExists(path.clone())
                } else {
                    Error::Io(e)
                }
            })?;
        handle.write_all(content.as_bytes()).await.map_err(Error::Io)?;
        handle.flush().await.map_err(Error::Io)?;
        drop(handle);

        let file = VaultFile::new(path);
        debug!("File created");
        self.on.file_created.dispatch(&FileCreated { file: file.clone() });
        Ok(file)
    }

    #[instrument(skip(self), fields(file = %file))]
    async fn rename_file(&self, file: &VaultFile, new_path: &str) -> Result<VaultFile> {
        let new_path = normalize_path(new_path)?;
        let from = self.resolve(file.path());
        let to = self.resolve(&new_path);

        if !fs::try_exists(&from).await.map_err(Error::Io)? {
            return Err(Error::FileNotFound(file.path().to_string()));
        }
        if fs::try_exists(&to).await.map_err(Error::Io)? {
            return Err(Error::TargetExists(new_path));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await.map_err(Error::Io)?;
        }
        fs::rename(&from, &to).await.map_err(Error::Io)?;

        let renamed = VaultFile::new(new_path);
        debug!("File moved to {}", renamed);
        self.on.file_renamed.dispatch(&FileRenamed {
            file: renamed.clone(),
            old_path: file.path().to_string(),
        });
        Ok(renamed)
    }

    #[instrument(skip(self))]
    async fn open_file(&self, path: &str) -> Result<VaultFile> {
        let path = normalize_path(path)?;
        let meta = fs::metadata(self.resolve(&path)).await.map_err(not_found_as(&path))?;
        if !meta.is_file() {
            return Err(Error::FileNotFound(path));
        }
        debug!(
            created = ?meta.created().ok(),
            modified = ?meta.modified().ok(),
            "File opened"
        );

        let file = VaultFile::new(path);
        self.on.file_opened.dispatch(&FileOpened { file: file.clone() });
        Ok(file)
    }
}
