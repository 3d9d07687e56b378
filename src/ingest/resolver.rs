//! Parent resolution
//!
//! Maps a path to the id of its parent folder row, inserting any missing
//! ancestors top-down first. Ids are cached per batch, so a directory with many
//! children costs one lookup.

use crate::error::Result;
use crate::fs::indexable_parent;
use crate::store::Session;
use crate::types::{path_text, NodeId, NodeKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ParentResolver {
    cache: HashMap<PathBuf, NodeId>,
    created: Vec<(PathBuf, NodeId)>,
}

impl ParentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the id of a folder inserted outside the resolver
    pub fn remember(&mut self, path: &Path, id: NodeId) {
        self.cache.insert(path.to_path_buf(), id);
    }

    /// Folders inserted by [`resolve`](Self::resolve) since the last call
    pub fn take_created(&mut self) -> Vec<(PathBuf, NodeId)> {
        std::mem::take(&mut self.created)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Id of the folder row for `path`'s parent, or `None` when the parent is a
    /// filesystem root
    pub fn resolve(&mut self, session: &Session<'_>, path: &Path) -> Result<Option<NodeId>> {
        let mut missing: Vec<&Path> = Vec::new();
        let mut anchor: Option<NodeId> = None;
        let mut cursor = indexable_parent(path);

        while let Some(folder) = cursor {
            if let Some(&id) = self.cache.get(folder) {
                anchor = Some(id);
                break;
            }
            if let Some(existing) = session.folder_by_path(folder)? {
                self.cache.insert(folder.to_path_buf(), existing.id);
                anchor = Some(existing.id);
                break;
            }
            missing.push(folder);
            cursor = indexable_parent(folder);
        }

        // Nearest existing ancestor is known; create the rest outermost first.
        while let Some(folder) = missing.pop() {
            let id = self.insert_folder(session, folder, anchor)?;
            self.cache.insert(folder.to_path_buf(), id);
            anchor = Some(id);
        }
        Ok(anchor)
    }

    fn insert_folder(
        &mut self,
        session: &Session<'_>,
        folder: &Path,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        // Ancestors of a stored path are valid UTF-8 as well.
        let text = path_text(folder).unwrap_or_default();
        match session.insert_node(NodeKind::Folder, text, parent)? {
            Some(id) => {
                debug!(path = %folder.display(), id, "Created ancestor folder");
                self.created.push((folder.to_path_buf(), id));
                Ok(id)
            }
            None => session
                .folder_by_path(folder)?
                .map(|existing| existing.id)
                .ok_or_else(|| crate::error::ApiError::NodeNotFound(folder.display().to_string())),
        }
    }
}
