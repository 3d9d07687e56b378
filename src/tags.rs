//! Tag Index
//!
//! Tag definitions and node membership. Membership is a unique (node, tag) pair
//! per kind, so adding twice or removing a non-member changes nothing.

use crate::error::{ApiError, Result};
use crate::store::Session;
use crate::types::{NodeId, NodeKind, NodeRecord, TagId, TagRecord};
use rusqlite::Row;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A tag given either by id or by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRef<'a> {
    Id(TagId),
    Name(&'a str),
}

impl<'a> From<&'a str> for TagRef<'a> {
    fn from(name: &'a str) -> Self {
        TagRef::Name(name)
    }
}

impl<'a> From<&'a String> for TagRef<'a> {
    fn from(name: &'a String) -> Self {
        TagRef::Name(name)
    }
}

impl From<&TagRecord> for TagRef<'_> {
    fn from(tag: &TagRecord) -> Self {
        TagRef::Id(tag.id)
    }
}

fn map_tag(row: &Row<'_>) -> rusqlite::Result<TagRecord> {
    Ok(TagRecord {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

impl Session<'_> {
    /// Create a tag, or return the existing one with the same name
    pub fn create_tag(&self, name: &str, commit: bool) -> Result<TagRecord> {
        let created = self.insert_unique("insert into tags (name) values (?1)", rusqlite::params![name])?;
        if commit {
            self.commit()?;
        }
        match created {
            Some(id) => {
                debug!(tag = name, id, "Created tag");
                Ok(TagRecord {
                    id,
                    name: name.to_string(),
                })
            }
            None => self.get_tag(name)?.ok_or_else(|| {
                ApiError::NodeNotFound(format!("tag {}", name))
            }),
        }
    }

    pub fn get_tag(&self, name: &str) -> Result<Option<TagRecord>> {
        Ok(self.query_optional(
            "select id, name from tags where name = ?1",
            rusqlite::params![name],
            map_tag,
        )?)
    }

    pub fn tag_by_id(&self, id: TagId) -> Result<Option<TagRecord>> {
        Ok(self.query_optional(
            "select id, name from tags where id = ?1",
            rusqlite::params![id],
            map_tag,
        )?)
    }

    /// All tags, by name
    pub fn tags(&self) -> Result<Vec<TagRecord>> {
        Ok(self.query_rows("select id, name from tags order by name", &[], map_tag)?)
    }

    /// Delete a tag and every membership of it
    pub fn delete_tag(&self, id: TagId, commit: bool) -> Result<bool> {
        let removed = self.execute("delete from tags where id = ?1", rusqlite::params![id], commit)?;
        Ok(removed > 0)
    }

    fn resolve_tag(&self, tag: TagRef<'_>) -> Result<Option<TagId>> {
        match tag {
            TagRef::Id(id) => Ok(self.tag_by_id(id)?.map(|tag| tag.id)),
            TagRef::Name(name) => Ok(self.get_tag(name)?.map(|tag| tag.id)),
        }
    }

    /// Tag a node. Returns whether a membership was added.
    pub fn add_tag(&self, kind: NodeKind, id: NodeId, tag: TagRef<'_>, commit: bool) -> Result<bool> {
        let Some(tag_id) = self.resolve_tag(tag)? else {
            warn!(tag = ?tag, node = id, kind = %kind, "Unknown tag, not added");
            return Ok(false);
        };
        let sql = format!(
            "insert or ignore into {} ({}, tag_id) values (?1, ?2)",
            kind.tag_table(),
            kind.tag_column()
        );
        let added = self.execute(&sql, rusqlite::params![id, tag_id], commit)?;
        Ok(added > 0)
    }

    /// Untag a node. Returns whether a membership was removed.
    pub fn remove_tag(&self, kind: NodeKind, id: NodeId, tag: TagRef<'_>, commit: bool) -> Result<bool> {
        let Some(tag_id) = self.resolve_tag(tag)? else {
            warn!(tag = ?tag, node = id, kind = %kind, "Unknown tag, not removed");
            return Ok(false);
        };
        let sql = format!(
            "delete from {} where {} = ?1 and tag_id = ?2",
            kind.tag_table(),
            kind.tag_column()
        );
        let removed = self.execute(&sql, rusqlite::params![id, tag_id], commit)?;
        Ok(removed > 0)
    }

    /// Tags attached to a node, by name
    pub fn node_tags(&self, kind: NodeKind, id: NodeId) -> Result<Vec<TagRecord>> {
        let sql = format!(
            "select tags.id, tags.name from tags
             join {table} on {table}.tag_id = tags.id
             where {table}.{column} = ?1
             order by tags.name",
            table = kind.tag_table(),
            column = kind.tag_column()
        );
        Ok(self.query_rows(&sql, rusqlite::params![id], map_tag)?)
    }

    fn members(&self, kind: NodeKind, tag_id: TagId) -> Result<Vec<NodeRecord>> {
        let sql = format!(
            "select n.id, n.path, n.parent from {nodes} n
             join {table} m on m.{column} = n.id
             where m.tag_id = ?1
             order by n.path collate nocase asc, n.path asc",
            nodes = kind.node_table(),
            table = kind.tag_table(),
            column = kind.tag_column()
        );
        Ok(self.query_rows(&sql, rusqlite::params![tag_id], |row| {
            Ok(NodeRecord {
                id: row.get(0)?,
                kind,
                path: PathBuf::from(row.get::<_, String>(1)?),
                parent: row.get(2)?,
            })
        })?)
    }

    pub fn files_with_tag(&self, tag_id: TagId) -> Result<Vec<NodeRecord>> {
        self.members(NodeKind::File, tag_id)
    }

    pub fn folders_with_tag(&self, tag_id: TagId) -> Result<Vec<NodeRecord>> {
        self.members(NodeKind::Folder, tag_id)
    }
}
