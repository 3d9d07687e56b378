//! Store layout
//!
//! Folder and file rows reference their parent folder; deleting a folder
//! cascades through everything below it, including metadata and tag rows.

use super::Session;
use crate::error::StorageError;

pub(crate) const CREATE_TABLES_SQL: &str = "
    create table folders (
        id     integer primary key,
        path   text    not null unique,
        parent integer references folders (id) on delete cascade
    );
    create index folders_parent on folders (parent);

    create table files (
        id     integer primary key,
        path   text    not null unique,
        parent integer references folders (id) on delete cascade
    );
    create index files_parent on files (parent);

    create table folder_metadata (
        id integer primary key references folders (id) on delete cascade
    );

    create table file_metadata (
        id integer primary key references files (id) on delete cascade
    );

    create table tags (
        id   integer primary key,
        name text    not null unique
    );

    create table file_tags (
        file_id integer not null references files (id) on delete cascade,
        tag_id  integer not null references tags (id) on delete cascade,
        unique (file_id, tag_id)
    );

    create table folder_tags (
        folder_id integer not null references folders (id) on delete cascade,
        tag_id    integer not null references tags (id) on delete cascade,
        unique (folder_id, tag_id)
    );
";

const INDEX_TABLES: [&str; 7] = [
    "folders",
    "files",
    "folder_metadata",
    "file_metadata",
    "tags",
    "file_tags",
    "folder_tags",
];

/// Create every index table
pub(crate) fn create_tables(session: &Session<'_>) -> Result<(), StorageError> {
    session.execute_script(CREATE_TABLES_SQL, false)
}

/// Whether the connected database already holds an index
pub(crate) fn has_index_tables(session: &Session<'_>) -> Result<bool, StorageError> {
    let present = session.query_rows(
        "select name from sqlite_master where type = 'table'",
        &[],
        |row| row.get::<_, String>(0),
    )?;
    Ok(INDEX_TABLES
        .iter()
        .all(|table| present.iter().any(|name| name == table)))
}
