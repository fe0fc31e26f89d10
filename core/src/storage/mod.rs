//! Storage abstractions for vaults: directories of notes organized into folders.
//!
//! The folder tag synchronizer only needs to read and replace file content, which is
//! what the [`Storage`] capability offers. Host-level operations (listing the tree,
//! creating folders, creating and moving files) live in [`VaultTree`], which also
//! exposes the [`VaultEvents`] fired by those operations.
//!
//! # Core Concepts
//!
//! *   **[`VaultFile`]:** A file identified by its slash-delimited path relative to the
//!     vault root. The file's folder tag is the name of its immediate parent folder.
//! *   **[`Vault`]:** A vault backed by a directory on disk. Internal configuration lives in
//!     a `.foldertag` subdirectory, which (like every other dot-directory, e.g. `.obsidian`)
//!     is invisible to listing and tagging.
//! *   **[`MemoryVault`]:** An in-memory vault with the same semantics, for embedding and
//!     tests.
//!
//! # Asynchronous API
//!
//! All I/O is `async` and, for [`Vault`], relies on the `tokio` runtime. Failures are
//! reported through [`Error`]; nothing is retried.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use foldertag_core::storage::{Storage, Vault, VaultTree};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vault = Vault::open(std::path::Path::new("notes")).await?;
//!     let file = vault.create_file("Inbox/todo.md", "Buy milk").await?;
//!     println!("{}", vault.read(&file).await?);
//!     for folder in vault.list_folders().await? {
//!         println!("{folder}");
//!     }
//!     Ok(())
//! }
//! ```

pub use self::file::{normalize_path, VaultFile};
pub use self::memory::MemoryVault;
pub use self::vault::Vault;

pub(crate) use self::file::{folder_name, relative_vault_path};

mod file;
mod memory;
mod vault;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Settings;
use crate::event::VaultEvents;

pub const INTERNAL_DIR_NAME: &str = ".foldertag";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid path provided: {0}")]
    InvalidPath(String),

    #[error("Path is outside the vault: {0}")]
    PathOutsideVault(PathBuf),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Folder already exists: {0}")]
    FolderExists(String),

    #[error("Cannot create folder: path already exists as a file: {0}")]
    CannotCreateDirNotAFile(String),

    #[error("Invalid tag (tags can't contain ',', '[' or ']'): {0}")]
    InvalidTag(String),

    #[error("Target path already exists: {0}")]
    TargetExists(String),

    #[error("Vault is already initialized: {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Vault configuration file is invalid: {0}")]
    InvalidVaultConfig(PathBuf),

    #[error("Config serialization/deserialization error")]
    Config(#[from] serde_json::Error),

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Invalid value for setting '{key}': {value}")]
    InvalidSettingValue { key: String, value: String },

    #[error("File watcher error")]
    Watch(#[from] notify::Error),
}

// Define a standard Result type for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Read/replace access to file content.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads the whole content of `file`.
    async fn read(&self, file: &VaultFile) -> Result<String>;

    /// Replaces the content of an existing `file`.
    async fn modify(&self, file: &VaultFile, content: &str) -> Result<()>;
}

/// Host-level operations on a vault. Operations that create, move or open files
/// dispatch the matching event on [`VaultTree::events`] once they have succeeded.
#[async_trait]
pub trait VaultTree: Storage {
    /// Event listener lists for this vault.
    fn events(&self) -> &VaultEvents;

    /// Settings in effect for this vault.
    fn settings(&self) -> &Settings;

    /// Every file in the vault, sorted by path.
    async fn list_files(&self) -> Result<Vec<VaultFile>>;

    /// Every folder in the vault, as vault paths sorted in path order.
    async fn list_folders(&self) -> Result<Vec<String>>;

    /// Creates a folder (and any missing parents).
    async fn create_folder(&self, path: &str) -> Result<()>;

    /// Creates a new file with the given content and fires `file_created`.
    async fn create_file(&self, path: &str, content: &str) -> Result<VaultFile>;

    /// Moves `file` to `new_path` and fires `file_renamed`.
    async fn rename_file(&self, file: &VaultFile, new_path: &str) -> Result<VaultFile>;

    /// Resolves an existing file, making it the active file, and fires `file_opened`.
    async fn open_file(&self, path: &str) -> Result<VaultFile>;
}
