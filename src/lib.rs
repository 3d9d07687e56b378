//! fsindex: a persistent, queryable mirror of a filesystem hierarchy
//!
//! Files and folders are stored as SQLite rows linked by parent references that
//! reproduce the directory tree. On top of the tree sit typed per-node metadata
//! and many-to-many tags. One [`FileIndex`] can be shared by any number of
//! threads; they serialize on a single connection.
//!
//! ```no_run
//! use fsindex::{FileIndex, IngestOptions, SearchOptions};
//!
//! # fn main() -> fsindex::Result<()> {
//! let index = FileIndex::load_or_create("library.sqlite".as_ref())?;
//! index.add_paths(["/music"], IngestOptions::default())?;
//! for node in index.search("live", SearchOptions::files_only())? {
//!     println!("{}", node.path().display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod hooks;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod metadata;
pub mod node;
pub mod query;
pub mod stack;
pub mod store;
pub mod tags;
pub mod types;
pub mod worker;

pub use config::{ConfigLoader, IndexConfig, StoreConfig};
pub use error::{ApiError, Result, StorageError};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use hooks::{IndexHooks, NoHooks};
pub use index::{FileIndex, FileIndexBuilder};
pub use ingest::{IngestOptions, IngestReport, IngestStream, IngestTask, ParentResolver};
pub use logging::{init_logging, LoggingConfig};
pub use metadata::{ColumnType, MetadataMap, MetadataSchema, MetadataValue};
pub use node::{Node, Tag};
pub use query::SearchOptions;
pub use stack::IteratorStack;
pub use store::{RetryPolicy, Session, ThreadsafeStore};
pub use tags::TagRef;
pub use types::{IndexStats, NodeId, NodeKind, NodeRecord, TagId, TagRecord};
pub use worker::{PausableWorker, Task};
