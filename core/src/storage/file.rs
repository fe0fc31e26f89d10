use std::path::{Component, Path};

use crate::storage::{Error, Result, INTERNAL_DIR_NAME};

/// A file in a vault, identified by its slash-delimited path relative to the vault root
/// (e.g. `Inbox/todo.md`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VaultFile {
    path: String,
}

impl VaultFile {
    /// Wraps a vault-relative path. The path is taken as is; use [`normalize_path`] for
    /// user input.
    pub fn new(path: impl Into<String>) -> Self {
        VaultFile { path: path.into() }
    }

    /// The vault-relative path, e.g. `Inbox/todo.md`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The last path segment, e.g. `todo.md`.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// The extension without the dot, e.g. `md`. Empty if the name has none.
    pub fn extension(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[idx + 1..],
            _ => "",
        }
    }

    /// Path of the containing folder, or `None` for files at the vault root.
    pub fn parent(&self) -> Option<&str> {
        self.path.rfind('/').map(|idx| &self.path[..idx])
    }

    /// Name of the containing folder, or `None` for files at the vault root.
    pub fn parent_name(&self) -> Option<&str> {
        self.parent().map(|p| p.rsplit('/').next().unwrap_or(p))
    }
}

impl std::fmt::Display for VaultFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Cleans up a user-supplied vault path: backslashes become slashes and surrounding
/// slashes are dropped.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for empty paths, `.`/`..` segments, empty segments,
/// and paths into the internal `.foldertag` directory.
pub fn normalize_path(path: &str) -> Result<String> {
    let cleaned = path.replace('\\', "/");
    let trimmed = cleaned.trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidPath(path.to_string()));
    }
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment == INTERNAL_DIR_NAME {
            return Err(Error::InvalidPath(path.to_string()));
        }
    }
    Ok(trimmed.to_string())
}

/// Converts an absolute path below `root` into a vault path. Returns `None` for paths
/// outside the root, the root itself, and anything inside a dot-directory or dot-file.
pub(crate) fn relative_vault_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(s) => {
                let s = s.to_str()?;
                if s.starts_with('.') {
                    return None;
                }
                segments.push(s);
            }
            _ => return None,
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// The last segment of a folder path.
pub(crate) fn folder_name(folder: &str) -> &str {
    folder.rsplit('/').next().unwrap_or(folder)
}
