//! Filesystem access
//!
//! The index only needs two facts from the filesystem: what kind of thing a path
//! is, and the immediate children of a directory. [`OsFileSystem`] answers them
//! from disk; [`MemoryFileSystem`] answers them from an in-memory tree.

use crate::error::StorageError;
use crate::types::NodeKind;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Source of path kinds and directory listings
pub trait FileSystem: Send + Sync {
    /// Kind of `path`, or `None` if it does not exist
    fn kind(&self, path: &Path) -> Option<NodeKind>;

    /// Immediate children of the directory `dir`, sorted by name
    fn children(&self, dir: &Path) -> Result<Vec<PathBuf>, StorageError>;
}

/// Make `path` absolute against the current directory and drop `.` segments
pub fn normalize_path(path: &Path) -> Result<PathBuf, StorageError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut clean = PathBuf::new();
    for component in dunce::simplified(&absolute).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return Err(StorageError::InvalidPath(absolute.display().to_string()));
                }
            }
            other => clean.push(other.as_os_str()),
        }
    }
    Ok(clean)
}

/// Parent of `path` if it can be a row in the index.
///
/// Filesystem roots are never stored, so a path directly under a root has no
/// indexable parent.
pub fn indexable_parent(path: &Path) -> Option<&Path> {
    let parent = path.parent()?;
    parent.parent()?;
    Some(parent)
}

/// The real filesystem. Symlinks are reported as files, so they are never followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn kind(&self, path: &Path) -> Option<NodeKind> {
        let metadata = std::fs::symlink_metadata(path).ok()?;
        if metadata.is_dir() {
            Some(NodeKind::Folder)
        } else {
            Some(NodeKind::File)
        }
    }

    fn children(&self, dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
        let mut children = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| {
                let message = err.to_string();
                StorageError::IoError(
                    err.into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message)),
                )
            })?;
            children.push(entry.into_path());
        }
        Ok(children)
    }
}

/// In-memory directory tree
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    entries: RwLock<BTreeMap<PathBuf, NodeKind>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating its ancestor folders
    pub fn add_file(&self, path: impl AsRef<Path>) -> &Self {
        let path = path.as_ref();
        let mut entries = self.entries.write();
        for ancestor in path.ancestors().skip(1) {
            entries.insert(ancestor.to_path_buf(), NodeKind::Folder);
        }
        entries.insert(path.to_path_buf(), NodeKind::File);
        self
    }

    /// Add a folder, creating its ancestor folders
    pub fn add_folder(&self, path: impl AsRef<Path>) -> &Self {
        let mut entries = self.entries.write();
        for ancestor in path.as_ref().ancestors() {
            entries.insert(ancestor.to_path_buf(), NodeKind::Folder);
        }
        self
    }

    /// Remove a path and everything below it
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.entries.write().retain(|entry, _| !entry.starts_with(path));
    }
}

impl FileSystem for MemoryFileSystem {
    fn kind(&self, path: &Path) -> Option<NodeKind> {
        self.entries.read().get(path).copied()
    }

    fn children(&self, dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
        let entries = self.entries.read();
        match entries.get(dir) {
            Some(NodeKind::Folder) => {}
            _ => {
                return Err(StorageError::IoError(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("not a directory: {}", dir.display()),
                )))
            }
        }
        let mut children: Vec<PathBuf> = entries
            .keys()
            .filter(|entry| entry.parent() == Some(dir))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(children)
    }
}
