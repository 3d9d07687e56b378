//! Core types shared across the index.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Row id of a file or folder. Unique per kind, not across kinds.
pub type NodeId = i64;

/// Row id of a tag
pub type TagId = i64;

/// Which table a node lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    pub(crate) fn node_table(self) -> &'static str {
        match self {
            NodeKind::File => "files",
            NodeKind::Folder => "folders",
        }
    }

    pub(crate) fn metadata_table(self) -> &'static str {
        match self {
            NodeKind::File => "file_metadata",
            NodeKind::Folder => "folder_metadata",
        }
    }

    pub(crate) fn tag_table(self) -> &'static str {
        match self {
            NodeKind::File => "file_tags",
            NodeKind::Folder => "folder_tags",
        }
    }

    pub(crate) fn tag_column(self) -> &'static str {
        match self {
            NodeKind::File => "file_id",
            NodeKind::Folder => "folder_id",
        }
    }

    pub(crate) fn from_label(label: &str) -> Option<Self> {
        match label {
            "file" => Some(NodeKind::File),
            "folder" => Some(NodeKind::Folder),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => f.write_str("file"),
            NodeKind::Folder => f.write_str("folder"),
        }
    }
}

/// A node row as read from the store.
///
/// `kind` comes from the table the row was read from, so it reflects what the
/// path was at ingestion time rather than what it is on disk now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: NodeKind,
    pub path: PathBuf,
    pub parent: Option<NodeId>,
}

/// A tag row as read from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: TagId,
    pub name: String,
}

/// Row counts for the whole index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files: u64,
    pub folders: u64,
    pub tags: u64,
}

/// Stored form of a path. Paths that are not valid UTF-8 cannot be stored.
pub(crate) fn path_text(path: &std::path::Path) -> Option<&str> {
    path.to_str()
}
