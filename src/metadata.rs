//! Metadata Schema
//!
//! Typed side tables keyed 1:1 by node id. The set of columns is declared when a
//! store is created and read back from the tables themselves when it is reopened,
//! so stores created under different declarations stay loadable.
//!
//! Column names are validated once, then only names present in the resolved
//! schema are ever interpolated into statements.

use crate::error::{ApiError, Result};
use crate::store::Session;
use crate::types::{NodeId, NodeKind};
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Column name → value for one metadata row
pub type MetadataMap = BTreeMap<String, MetadataValue>;

/// Declared type of a metadata column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
    Numeric,
}

impl ColumnType {
    /// Interpret a declared type with SQLite's column affinity rules
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            ColumnType::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            ColumnType::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else {
            ColumnType::Numeric
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Text => "text",
            ColumnType::Blob => "blob",
            ColumnType::Numeric => "numeric",
        }
    }
}

impl From<String> for ColumnType {
    fn from(declared: String) -> Self {
        ColumnType::from_declared(&declared)
    }
}

/// A single metadata value, one variant per SQLite storage class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ToSql for MetadataValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            MetadataValue::Null => ToSqlOutput::Owned(Value::Null),
            MetadataValue::Integer(n) => ToSqlOutput::Owned(Value::Integer(*n)),
            MetadataValue::Real(x) => ToSqlOutput::Owned(Value::Real(*x)),
            MetadataValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            MetadataValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl FromSql for MetadataValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => MetadataValue::Null,
            ValueRef::Integer(n) => MetadataValue::Integer(n),
            ValueRef::Real(x) => MetadataValue::Real(x),
            ValueRef::Text(t) => MetadataValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => MetadataValue::Blob(b.to_vec()),
        })
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Integer(n)
    }
}

impl From<i32> for MetadataValue {
    fn from(n: i32) -> Self {
        MetadataValue::Integer(n.into())
    }
}

impl From<u32> for MetadataValue {
    fn from(n: u32) -> Self {
        MetadataValue::Integer(n.into())
    }
}

impl From<bool> for MetadataValue {
    fn from(flag: bool) -> Self {
        MetadataValue::Integer(flag.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(x: f64) -> Self {
        MetadataValue::Real(x)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Text(s)
    }
}

impl From<Vec<u8>> for MetadataValue {
    fn from(b: Vec<u8>) -> Self {
        MetadataValue::Blob(b)
    }
}

impl<T: Into<MetadataValue>> From<Option<T>> for MetadataValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(MetadataValue::Null)
    }
}

/// Metadata columns for both node kinds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSchema {
    #[serde(default)]
    pub file: BTreeMap<String, ColumnType>,
    #[serde(default)]
    pub folder: BTreeMap<String, ColumnType>,
}

impl MetadataSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.file.insert(name.into(), column_type);
        self
    }

    pub fn with_folder_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.folder.insert(name.into(), column_type);
        self
    }

    pub fn columns(&self, kind: NodeKind) -> &BTreeMap<String, ColumnType> {
        match kind {
            NodeKind::File => &self.file,
            NodeKind::Folder => &self.folder,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_empty() && self.folder.is_empty()
    }

    /// Reject declarations that cannot be used as column identifiers
    pub fn validate(&self) -> Result<()> {
        for columns in [&self.file, &self.folder] {
            // SQLite column names are case-insensitive.
            let mut seen = BTreeSet::new();
            for name in columns.keys() {
                if !is_identifier(name)
                    || name.eq_ignore_ascii_case("id")
                    || !seen.insert(name.to_ascii_lowercase())
                {
                    return Err(ApiError::InvalidColumn(name.clone()));
                }
            }
        }
        Ok(())
    }

    fn check_known<'n>(&self, kind: NodeKind, names: impl IntoIterator<Item = &'n str>) -> Result<()> {
        let known = self.columns(kind);
        for name in names {
            if !known.contains_key(name) {
                return Err(ApiError::UnknownColumn {
                    kind,
                    column: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quoted(name: &str) -> String {
    format!("\"{}\"", name)
}

impl Session<'_> {
    /// Add the declared columns to the metadata tables of a fresh store
    pub fn apply_metadata_schema(&self, schema: &MetadataSchema) -> Result<()> {
        schema.validate()?;
        for kind in [NodeKind::File, NodeKind::Folder] {
            for (name, column_type) in schema.columns(kind) {
                let sql = format!(
                    "alter table {} add column {} {}",
                    kind.metadata_table(),
                    quoted(name),
                    column_type.sql()
                );
                self.execute_script(&sql, false)?;
            }
        }
        Ok(())
    }

    /// Read the effective schema back from the metadata tables
    pub fn introspect_metadata_schema(&self) -> Result<MetadataSchema> {
        let mut schema = MetadataSchema::new();
        for kind in [NodeKind::File, NodeKind::Folder] {
            let columns = self.query_rows(
                "select name, type from pragma_table_info(?1)",
                rusqlite::params![kind.metadata_table()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )?;
            let target = match kind {
                NodeKind::File => &mut schema.file,
                NodeKind::Folder => &mut schema.folder,
            };
            for (name, declared) in columns {
                if name != "id" {
                    target.insert(name, ColumnType::from_declared(&declared));
                }
            }
        }
        debug!(
            file_columns = schema.file.len(),
            folder_columns = schema.folder.len(),
            "Introspected metadata schema"
        );
        Ok(schema)
    }

    /// Read metadata for a node; `None` when the node has no metadata row
    pub fn get_metadata(
        &self,
        schema: &MetadataSchema,
        kind: NodeKind,
        id: NodeId,
        columns: Option<&[&str]>,
    ) -> Result<Option<MetadataMap>> {
        let names: Vec<&str> = match columns {
            Some(requested) => {
                schema.check_known(kind, requested.iter().copied())?;
                requested.to_vec()
            }
            None => schema.columns(kind).keys().map(String::as_str).collect(),
        };

        let select_list = if names.is_empty() {
            "id".to_string()
        } else {
            names.iter().map(|name| quoted(name)).collect::<Vec<_>>().join(", ")
        };
        let sql = format!(
            "select {} from {} where id = ?1",
            select_list,
            kind.metadata_table()
        );

        let row = self.query_optional(&sql, rusqlite::params![id], |row| {
            let mut values = MetadataMap::new();
            for (index, name) in names.iter().enumerate() {
                values.insert(name.to_string(), row.get::<_, MetadataValue>(index)?);
            }
            Ok(values)
        })?;
        Ok(row)
    }

    /// Upsert metadata for a node: update in place, insert when no row exists
    pub fn set_metadata(
        &self,
        schema: &MetadataSchema,
        kind: NodeKind,
        id: NodeId,
        values: &MetadataMap,
        commit: bool,
    ) -> Result<()> {
        schema.check_known(kind, values.keys().map(String::as_str))?;
        if values.is_empty() {
            return Ok(());
        }

        let table = kind.metadata_table();
        let mut params: Vec<&dyn ToSql> = values.values().map(|v| v as &dyn ToSql).collect();
        params.push(&id);

        let assignments = values
            .keys()
            .enumerate()
            .map(|(index, name)| format!("{} = ?{}", quoted(name), index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let update = format!(
            "update {} set {} where id = ?{}",
            table,
            assignments,
            values.len() + 1
        );
        let updated = self.execute(&update, &params, false)?;

        if updated == 0 {
            let column_list = values.keys().map(|name| quoted(name)).collect::<Vec<_>>().join(", ");
            let placeholders = (1..=values.len())
                .map(|index| format!("?{}", index))
                .collect::<Vec<_>>()
                .join(", ");
            let insert = format!(
                "insert into {} ({}, id) values ({}, ?{})",
                table,
                column_list,
                placeholders,
                values.len() + 1
            );
            self.execute(&insert, &params, false)?;
        }

        if commit {
            self.commit()?;
        }
        Ok(())
    }
}
