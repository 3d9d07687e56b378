//! Node and tag handles
//!
//! Handles are snapshots of a row plus a clone of the index they came from.
//! Every method takes the store lock for its own duration.

use crate::error::Result;
use crate::index::FileIndex;
use crate::metadata::{MetadataMap, MetadataValue};
use crate::query::SearchOptions;
use crate::tags::TagRef;
use crate::types::{NodeId, NodeKind, NodeRecord, TagId, TagRecord};
use std::fmt;
use std::path::Path;

#[derive(Clone)]
pub struct Node {
    index: FileIndex,
    record: NodeRecord,
}

impl Node {
    pub(crate) fn new(index: FileIndex, record: NodeRecord) -> Self {
        Self { index, record }
    }

    fn wrap(&self, records: Vec<NodeRecord>) -> Vec<Node> {
        records
            .into_iter()
            .map(|record| Node::new(self.index.clone(), record))
            .collect()
    }

    pub fn id(&self) -> NodeId {
        self.record.id
    }

    /// Kind recorded when the node was indexed
    pub fn kind(&self) -> NodeKind {
        self.record.kind
    }

    pub fn is_file(&self) -> bool {
        self.record.kind == NodeKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.record.kind == NodeKind::Folder
    }

    pub fn path(&self) -> &Path {
        &self.record.path
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.record.parent
    }

    pub fn record(&self) -> &NodeRecord {
        &self.record
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    /// The parent folder, `None` for roots
    pub fn parent(&self) -> Result<Option<Node>> {
        match self.record.parent {
            Some(id) => self.index.folder_by_id(id),
            None => Ok(None),
        }
    }

    /// Immediate children, ordered by path. Always empty for files.
    pub fn children(&self) -> Result<Vec<Node>> {
        let records = self.index.session().children(Some(&self.record))?;
        Ok(self.wrap(records))
    }

    /// All descendants, ordered by path. Always empty for files.
    pub fn subtree(&self) -> Result<Vec<Node>> {
        let records = self.index.session().subtree(&self.record)?;
        Ok(self.wrap(records))
    }

    /// Descendants (or direct children) whose path contains `keyword`
    pub fn search(&self, keyword: &str, options: SearchOptions) -> Result<Vec<Node>> {
        let records = self
            .index
            .session()
            .search(Some(&self.record), keyword, options)?;
        Ok(self.wrap(records))
    }

    /// Metadata for this node, all columns when `columns` is `None`.
    ///
    /// `None` if no metadata was ever set for the node.
    pub fn get_metadata(&self, columns: Option<&[&str]>) -> Result<Option<MetadataMap>> {
        self.index.session().get_metadata(
            self.index.metadata_schema(),
            self.record.kind,
            self.record.id,
            columns,
        )
    }

    /// A single metadata column
    pub fn metadata_value(&self, column: &str) -> Result<Option<MetadataValue>> {
        let columns = [column];
        let values = self.get_metadata(Some(&columns[..]))?;
        Ok(values.and_then(|mut values| values.remove(column)))
    }

    /// Upsert metadata and commit
    pub fn set_metadata(&self, values: &MetadataMap) -> Result<()> {
        self.index.session().set_metadata(
            self.index.metadata_schema(),
            self.record.kind,
            self.record.id,
            values,
            true,
        )
    }

    /// Tag this node. Unknown tag names are logged and ignored.
    pub fn add_tag<'t>(&self, tag: impl Into<TagRef<'t>>, commit: bool) -> Result<bool> {
        self.index
            .session()
            .add_tag(self.record.kind, self.record.id, tag.into(), commit)
    }

    pub fn remove_tag<'t>(&self, tag: impl Into<TagRef<'t>>, commit: bool) -> Result<bool> {
        self.index
            .session()
            .remove_tag(self.record.kind, self.record.id, tag.into(), commit)
    }

    pub fn tags(&self) -> Result<Vec<Tag>> {
        let records = self.index.session().node_tags(self.record.kind, self.record.id)?;
        Ok(records
            .into_iter()
            .map(|record| Tag::new(self.index.clone(), record))
            .collect())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.record, f)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.record.kind, self.record.path.display())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

#[derive(Clone)]
pub struct Tag {
    index: FileIndex,
    record: TagRecord,
}

impl Tag {
    pub(crate) fn new(index: FileIndex, record: TagRecord) -> Self {
        Self { index, record }
    }

    pub fn id(&self) -> TagId {
        self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn record(&self) -> &TagRecord {
        &self.record
    }

    pub fn files_with_tag(&self) -> Result<Vec<Node>> {
        let records = self.index.session().files_with_tag(self.record.id)?;
        Ok(records
            .into_iter()
            .map(|record| Node::new(self.index.clone(), record))
            .collect())
    }

    pub fn folders_with_tag(&self) -> Result<Vec<Node>> {
        let records = self.index.session().folders_with_tag(self.record.id)?;
        Ok(records
            .into_iter()
            .map(|record| Node::new(self.index.clone(), record))
            .collect())
    }

    /// Delete the tag and all of its memberships
    pub fn delete(self) -> Result<bool> {
        let deleted = self.index.session().delete_tag(self.record.id, true)?;
        Ok(deleted)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.record, f)
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl<'a> From<&'a Tag> for TagRef<'a> {
    fn from(tag: &'a Tag) -> Self {
        TagRef::Id(tag.record.id)
    }
}
