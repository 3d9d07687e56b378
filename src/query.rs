//! Hierarchical queries
//!
//! Listing and search over parent links. Descendant scopes are computed with a
//! recursive CTE over folder ids; files and folders are merged into one result
//! ordered by path, case-insensitively.
//!
//! Case folding is SQLite's built-in one and covers ASCII letters only:
//! `"É"` and `"é"` are different characters to both search and ordering.

use crate::error::Result;
use crate::store::Session;
use crate::types::{path_text, IndexStats, NodeId, NodeKind, NodeRecord};
use rusqlite::{Row, ToSql};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ORDER_BY: &str = "order by path collate nocase asc, path asc";

const SUBFOLDERS_CTE: &str = "with recursive subfolders(id) as (
        values(?2)
        union all
        select folders.id from folders join subfolders on folders.parent = subfolders.id
    )";

/// Options for [`Session::search`]
///
/// Matching ignores ASCII case only; non-ASCII letters must match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Search every descendant rather than direct children only
    pub recursive: bool,
    /// Include folders in the results, not just files
    pub include_folders: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            include_folders: true,
        }
    }
}

impl SearchOptions {
    pub fn files_only() -> Self {
        Self {
            include_folders: false,
            ..Self::default()
        }
    }

    pub fn direct_children() -> Self {
        Self {
            recursive: false,
            ..Self::default()
        }
    }
}

/// Which part of the index a listing covers
enum Scope {
    Everything,
    Roots,
    ChildrenOf(NodeId),
    DescendantsOf(NodeId),
}

impl Scope {
    fn filter(&self) -> &'static str {
        match self {
            Scope::Everything => "1 = 1",
            Scope::Roots => "parent is null",
            Scope::ChildrenOf(_) => "parent = ?2",
            Scope::DescendantsOf(_) => "parent in (select id from subfolders)",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Scope::DescendantsOf(_) => SUBFOLDERS_CTE,
            _ => "",
        }
    }

    fn folder_id(&self) -> Option<NodeId> {
        match self {
            Scope::ChildrenOf(id) | Scope::DescendantsOf(id) => Some(*id),
            _ => None,
        }
    }
}

fn map_node(row: &Row<'_>) -> rusqlite::Result<NodeRecord> {
    let label: String = row.get(3)?;
    let kind = NodeKind::from_label(&label).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, label, rusqlite::types::Type::Text)
    })?;
    Ok(NodeRecord {
        id: row.get(0)?,
        path: PathBuf::from(row.get::<_, String>(1)?),
        parent: row.get(2)?,
        kind,
    })
}

fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Session<'_> {
    fn list(
        &self,
        scope: Scope,
        keyword: Option<&str>,
        include_folders: bool,
    ) -> Result<Vec<NodeRecord>> {
        let mut filter = scope.filter().to_string();
        if keyword.is_some() {
            filter.push_str(r" and path like ?1 escape '\'");
        }

        let files = format!(
            "select id, path, parent, 'file' as kind from files where {}",
            filter
        );
        let sql = if include_folders {
            format!(
                "{} select id, path, parent, 'folder' as kind from folders where {} union all {} {}",
                scope.prefix(),
                filter,
                files,
                ORDER_BY
            )
        } else {
            format!("{} {} {}", scope.prefix(), files, ORDER_BY)
        };

        // ?1 is the keyword and ?2 the scoping folder. An unused ?1 is bound to null.
        let pattern = keyword.map(like_pattern);
        let folder_id = scope.folder_id();
        let params: Vec<&dyn ToSql> = match (&pattern, &folder_id) {
            (Some(p), Some(id)) => vec![p as &dyn ToSql, id],
            (Some(p), None) => vec![p as &dyn ToSql],
            (None, Some(id)) => vec![&rusqlite::types::Null as &dyn ToSql, id],
            (None, None) => Vec::new(),
        };

        Ok(self.query_rows(&sql, &params, map_node)?)
    }

    /// Immediate children of `node`, or the roots of the index when `None`
    pub fn children(&self, node: Option<&NodeRecord>) -> Result<Vec<NodeRecord>> {
        match node {
            None => self.list(Scope::Roots, None, true),
            Some(node) if node.kind == NodeKind::Folder => {
                self.list(Scope::ChildrenOf(node.id), None, true)
            }
            Some(_) => Ok(Vec::new()),
        }
    }

    /// Every descendant of `node` at any depth, `node` itself excluded
    pub fn subtree(&self, node: &NodeRecord) -> Result<Vec<NodeRecord>> {
        match node.kind {
            NodeKind::Folder => self.list(Scope::DescendantsOf(node.id), None, true),
            NodeKind::File => Ok(Vec::new()),
        }
    }

    /// Nodes whose path contains `keyword` (case-insensitive), below `node` or
    /// anywhere in the index
    pub fn search(
        &self,
        node: Option<&NodeRecord>,
        keyword: &str,
        options: SearchOptions,
    ) -> Result<Vec<NodeRecord>> {
        let scope = match (node, options.recursive) {
            (None, true) => Scope::Everything,
            (None, false) => Scope::Roots,
            (Some(node), _) if node.kind == NodeKind::File => return Ok(Vec::new()),
            (Some(node), true) => Scope::DescendantsOf(node.id),
            (Some(node), false) => Scope::ChildrenOf(node.id),
        };
        self.list(scope, Some(keyword), options.include_folders)
    }

    /// Every root followed by its subtree
    pub fn walk(&self) -> Result<Vec<NodeRecord>> {
        let mut nodes = Vec::new();
        for root in self.children(None)? {
            let below = self.subtree(&root)?;
            nodes.push(root);
            nodes.extend(below);
        }
        Ok(nodes)
    }

    pub fn node_by_id(&self, kind: NodeKind, id: NodeId) -> Result<Option<NodeRecord>> {
        let sql = format!(
            "select id, path, parent, '{}' as kind from {} where id = ?1",
            kind,
            kind.node_table()
        );
        Ok(self.query_optional(&sql, rusqlite::params![id], map_node)?)
    }

    pub fn file_by_id(&self, id: NodeId) -> Result<Option<NodeRecord>> {
        self.node_by_id(NodeKind::File, id)
    }

    pub fn folder_by_id(&self, id: NodeId) -> Result<Option<NodeRecord>> {
        self.node_by_id(NodeKind::Folder, id)
    }

    fn lookup_path(&self, kind: NodeKind, path: &Path) -> Result<Option<NodeRecord>> {
        let Some(text) = path_text(path) else {
            return Ok(None);
        };
        let sql = format!(
            "select id, path, parent, '{}' as kind from {} where path = ?1",
            kind,
            kind.node_table()
        );
        Ok(self.query_optional(&sql, rusqlite::params![text], map_node)?)
    }

    pub fn file_by_path(&self, path: &Path) -> Result<Option<NodeRecord>> {
        self.lookup_path(NodeKind::File, path)
    }

    pub fn folder_by_path(&self, path: &Path) -> Result<Option<NodeRecord>> {
        self.lookup_path(NodeKind::Folder, path)
    }

    /// Folder first, then file
    pub fn node_by_path(&self, path: &Path) -> Result<Option<NodeRecord>> {
        match self.folder_by_path(path)? {
            Some(folder) => Ok(Some(folder)),
            None => self.file_by_path(path),
        }
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let counts = self.query_optional(
            "select (select count(*) from files),
                    (select count(*) from folders),
                    (select count(*) from tags)",
            &[],
            |row| {
                Ok(IndexStats {
                    files: row.get::<_, i64>(0)? as u64,
                    folders: row.get::<_, i64>(1)? as u64,
                    tags: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;
        Ok(counts.unwrap_or_default())
    }
}
