//! Ingestion hooks
//!
//! Called once for every node the index creates, to supply its initial tags
//! and metadata. Every method defaults to "nothing".

use crate::metadata::MetadataMap;
use crate::types::NodeKind;
use std::collections::BTreeSet;
use std::path::Path;

pub trait IndexHooks: Send + Sync {
    fn initial_file_tags(&self, _path: &Path) -> Option<BTreeSet<String>> {
        None
    }

    fn initial_folder_tags(&self, _path: &Path) -> Option<BTreeSet<String>> {
        None
    }

    fn initial_file_metadata(&self, _path: &Path) -> Option<MetadataMap> {
        None
    }

    fn initial_folder_metadata(&self, _path: &Path) -> Option<MetadataMap> {
        None
    }
}

/// Hooks that never tag or annotate anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl IndexHooks for NoHooks {}

pub(crate) fn initial_tags(
    hooks: &dyn IndexHooks,
    kind: NodeKind,
    path: &Path,
) -> Option<BTreeSet<String>> {
    match kind {
        NodeKind::File => hooks.initial_file_tags(path),
        NodeKind::Folder => hooks.initial_folder_tags(path),
    }
}

pub(crate) fn initial_metadata(
    hooks: &dyn IndexHooks,
    kind: NodeKind,
    path: &Path,
) -> Option<MetadataMap> {
    match kind {
        NodeKind::File => hooks.initial_file_metadata(path),
        NodeKind::Folder => hooks.initial_folder_metadata(path),
    }
}
