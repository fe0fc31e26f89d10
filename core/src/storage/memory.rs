use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::Settings;
use crate::event::{FileCreated, FileOpened, FileRenamed, VaultEvents};
use crate::storage::{normalize_path, Error, Result, Storage, VaultFile, VaultTree};

/// A vault held entirely in memory. Folders are implied by file paths and can also be
/// created empty.
#[derive(Debug, Default)]
pub struct MemoryVault {
    files: Mutex<BTreeMap<String, String>>,
    folders: Mutex<BTreeSet<String>>,
    settings: Settings,
    writes: AtomicUsize,
    pub on: VaultEvents,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        MemoryVault {
            settings,
            ..Self::default()
        }
    }

    /// Adds a file without firing any event. Intended for setting up a vault's
    /// initial state.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    /// Adds an empty folder without firing any event.
    pub fn with_folder(self, path: &str) -> Self {
        self.add_folders(path, true);
        self
    }

    /// Current content of the file at `path`, if it exists.
    pub fn content(&self, path: &str) -> Option<String> {
        self.lock_files().get(path).cloned()
    }

    /// Number of successful [`Storage::modify`] calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn insert(&self, path: &str, content: &str) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_folders(parent, true);
        }
        self.lock_files().insert(path.to_string(), content.to_string());
    }

    // Registers `path` and every ancestor folder.
    fn add_folders(&self, path: &str, include_self: bool) {
        let mut folders = self.lock_folders();
        let mut end = if include_self { Some(path.len()) } else { path.rfind('/') };
        while let Some(idx) = end {
            folders.insert(path[..idx].to_string());
            end = path[..idx].rfind('/');
        }
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_folders(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.folders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Storage for MemoryVault {
    async fn read(&self, file: &VaultFile) -> Result<String> {
        self.content(file.path())
            .ok_or_else(|| Error::FileNotFound(file.path().to_string()))
    }

    async fn modify(&self, file: &VaultFile, content: &str) -> Result<()> {
        let mut files = self.lock_files();
        let slot = files
            .get_mut(file.path())
            .ok_or_else(|| Error::FileNotFound(file.path().to_string()))?;
        *slot = content.to_string();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl VaultTree for MemoryVault {
    fn events(&self) -> &VaultEvents {
        &self.on
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn list_files(&self) -> Result<Vec<VaultFile>> {
        Ok(self.lock_files().keys().map(VaultFile::new).collect())
    }

    async fn list_folders(&self) -> Result<Vec<String>> {
        Ok(self.lock_folders().iter().cloned().collect())
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        if self.lock_files().contains_key(&path) {
            return Err(Error::CannotCreateDirNotAFile(path));
        }
        if self.lock_folders().contains(&path) {
            return Err(Error::FolderExists(path));
        }
        self.add_folders(&path, true);
        Ok(())
    }

    async fn create_file(&self, path: &str, content: &str) -> Result<VaultFile> {
        let path = normalize_path(path)?;
        if self.lock_files().contains_key(&path) || self.lock_folders().contains(&path) {
            return Err(Error::TargetExists(path));
        }
        self.insert(&path, content);

        let file = VaultFile::new(path);
        self.on.file_created.dispatch(&FileCreated { file: file.clone() });
        Ok(file)
    }

    async fn rename_file(&self, file: &VaultFile, new_path: &str) -> Result<VaultFile> {
        let new_path = normalize_path(new_path)?;
        if self.lock_folders().contains(&new_path) {
            return Err(Error::TargetExists(new_path));
        }
        {
            let mut files = self.lock_files();
            if files.contains_key(&new_path) {
                return Err(Error::TargetExists(new_path));
            }
            let content = files
                .remove(file.path())
                .ok_or_else(|| Error::FileNotFound(file.path().to_string()))?;
            files.insert(new_path.clone(), content);
        }
        self.add_folders(&new_path, false);

        let renamed = VaultFile::new(new_path);
        self.on.file_renamed.dispatch(&FileRenamed {
            file: renamed.clone(),
            old_path: file.path().to_string(),
        });
        Ok(renamed)
    }

    async fn open_file(&self, path: &str) -> Result<VaultFile> {
        let path = normalize_path(path)?;
        if !self.lock_files().contains_key(&path) {
            return Err(Error::FileNotFound(path));
        }
        let file = VaultFile::new(path);
        self.on.file_opened.dispatch(&FileOpened { file: file.clone() });
        Ok(file)
    }
}
