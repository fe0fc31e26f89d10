//! Folder tags for markdown vaults.
//!
//! Notes get tagged with the name of the folder they live in, and the tag follows the
//! note when it moves. See [`sync::FolderTagSynchronizer`] for the core behaviour,
//! [`storage`] for the vault abstractions it runs against, and [`watcher`] for picking up
//! changes made by other programs.

pub mod config;
pub mod event;
pub mod frontmatter;
pub mod selection;
pub mod storage;
pub mod sync;
pub mod watcher;

pub use sync::{derive_folder_tag, ActiveFileOutcome, FolderTagReport, FolderTagSynchronizer, SyncHandle};
