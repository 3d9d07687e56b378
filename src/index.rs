//! File Index
//!
//! The public entry point. A `FileIndex` owns the store together with the
//! metadata schema, filesystem and hooks it was opened with. It is a cheap
//! `Clone` around shared state, so it can be handed to worker threads and
//! embedded in [`Node`] and [`Tag`] handles.

use crate::config::IndexConfig;
use crate::error::{ApiError, Result};
use crate::fs::{FileSystem, OsFileSystem};
use crate::hooks::{IndexHooks, NoHooks};
use crate::ingest::{IngestOptions, IngestReport, IngestStream, IngestTask, Ingestion};
use crate::metadata::MetadataSchema;
use crate::node::{Node, Tag};
use crate::query::SearchOptions;
use crate::store::{schema, RetryPolicy, Session, ThreadsafeStore};
use crate::types::{IndexStats, NodeId};
use crate::worker::PausableWorker;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

struct Shared {
    store: ThreadsafeStore,
    schema: MetadataSchema,
    filesystem: Arc<dyn FileSystem>,
    hooks: Arc<dyn IndexHooks>,
    ingest_defaults: IngestOptions,
}

#[derive(Clone)]
pub struct FileIndex {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for FileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIndex")
            .field("path", &self.path())
            .field("schema", &self.shared.schema)
            .finish()
    }
}

/// Options for opening or creating a [`FileIndex`]
pub struct FileIndexBuilder {
    config: IndexConfig,
    filesystem: Arc<dyn FileSystem>,
    hooks: Arc<dyn IndexHooks>,
    retry: Option<RetryPolicy>,
}

impl Default for FileIndexBuilder {
    fn default() -> Self {
        Self::from_config(IndexConfig::default())
    }
}

impl FileIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: IndexConfig) -> Self {
        Self {
            config,
            filesystem: Arc::new(OsFileSystem),
            hooks: Arc::new(NoHooks),
            retry: None,
        }
    }

    /// Metadata columns for a new store. Ignored when loading an existing one.
    pub fn metadata_schema(mut self, schema: MetadataSchema) -> Self {
        self.config.metadata = schema;
        self
    }

    /// Tags created with a new store
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn IndexHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn filesystem(mut self, filesystem: Arc<dyn FileSystem>) -> Self {
        self.filesystem = filesystem;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn ingest_defaults(mut self, options: IngestOptions) -> Self {
        self.config.ingest = options;
        self
    }

    fn policy(&self) -> RetryPolicy {
        self.retry.unwrap_or_else(|| self.config.store.retry_policy())
    }

    /// Create a new store file. Fails if `path` already holds an index.
    pub fn create_new(self, path: &Path) -> Result<FileIndex> {
        self.config.validate()?;
        if path.exists() && holds_index(path, self.policy())? {
            return Err(ApiError::StoreExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let existed = path.exists();
        let store = ThreadsafeStore::open(path, self.policy())?;
        match self.initialize(store) {
            Ok(index) => {
                info!(path = %path.display(), "Created index store");
                Ok(index)
            }
            Err(err) => {
                if !existed {
                    if let Err(remove) = std::fs::remove_file(path) {
                        warn!(path = %path.display(), error = %remove, "Could not remove unfinished store");
                    }
                }
                Err(err)
            }
        }
    }

    /// Create a private index that lives only as long as the returned handle
    pub fn create_in_memory(self) -> Result<FileIndex> {
        self.config.validate()?;
        let store = ThreadsafeStore::open_in_memory(self.policy())?;
        self.initialize(store)
    }

    /// Open an existing store, reading its metadata schema from the file
    pub fn load_existing(self, path: &Path) -> Result<FileIndex> {
        if !path.is_file() {
            return Err(ApiError::StoreNotFound(path.to_path_buf()));
        }
        let store = ThreadsafeStore::open(path, self.policy())?;
        let schema = {
            let session = store.lock();
            if !schema::has_index_tables(&session)? {
                return Err(ApiError::StoreNotFound(path.to_path_buf()));
            }
            session.introspect_metadata_schema()?
        };
        info!(path = %path.display(), "Loaded index store");
        Ok(self.finish(store, schema))
    }

    /// Load the store at `path`, creating it when there is none
    pub fn load_or_create(self, path: &Path) -> Result<FileIndex> {
        if path.is_file() && holds_index(path, self.policy())? {
            self.load_existing(path)
        } else {
            self.create_new(path)
        }
    }

    /// Load or create the store at the configured path
    pub fn open(self) -> Result<FileIndex> {
        let path = self.config.store.resolve_path()?;
        self.load_or_create(&path)
    }

    /// Lay out a fresh store in one transaction. Nothing is left behind on failure.
    fn initialize(self, store: ThreadsafeStore) -> Result<FileIndex> {
        {
            let session = store.lock();
            session.begin()?;
            if let Err(err) = self.create_schema(&session) {
                if let Err(rollback) = session.rollback() {
                    warn!(error = %rollback, "Could not roll back store creation");
                }
                return Err(err);
            }
            session.commit()?;
        }
        let schema = self.config.metadata.clone();
        Ok(self.finish(store, schema))
    }

    fn create_schema(&self, session: &Session<'_>) -> Result<()> {
        schema::create_tables(session)?;
        session.apply_metadata_schema(&self.config.metadata)?;
        for tag in &self.config.tags {
            session.create_tag(tag, false)?;
        }
        Ok(())
    }

    fn finish(self, store: ThreadsafeStore, schema: MetadataSchema) -> FileIndex {
        FileIndex {
            shared: Arc::new(Shared {
                store,
                schema,
                filesystem: self.filesystem,
                hooks: self.hooks,
                ingest_defaults: self.config.ingest,
            }),
        }
    }
}

fn holds_index(path: &Path, retry: RetryPolicy) -> Result<bool> {
    let store = ThreadsafeStore::open(path, retry)?;
    let present = schema::has_index_tables(&store.lock())?;
    Ok(present)
}

impl FileIndex {
    pub fn builder() -> FileIndexBuilder {
        FileIndexBuilder::new()
    }

    pub fn create_new(path: &Path) -> Result<Self> {
        FileIndexBuilder::new().create_new(path)
    }

    pub fn create_in_memory() -> Result<Self> {
        FileIndexBuilder::new().create_in_memory()
    }

    pub fn load_existing(path: &Path) -> Result<Self> {
        FileIndexBuilder::new().load_existing(path)
    }

    pub fn load_or_create(path: &Path) -> Result<Self> {
        FileIndexBuilder::new().load_or_create(path)
    }

    /// Load or create the store described by `config`
    pub fn open(config: &IndexConfig) -> Result<Self> {
        FileIndexBuilder::from_config(config.clone()).open()
    }

    pub(crate) fn store(&self) -> &ThreadsafeStore {
        &self.shared.store
    }

    pub(crate) fn filesystem(&self) -> &dyn FileSystem {
        self.shared.filesystem.as_ref()
    }

    pub(crate) fn hooks(&self) -> &dyn IndexHooks {
        self.shared.hooks.as_ref()
    }

    /// Take the store lock to run several operations as one unit.
    ///
    /// Do not call other `FileIndex`, `Node` or `Tag` methods while the session
    /// is alive; they take the same lock.
    pub fn session(&self) -> Session<'_> {
        self.shared.store.lock()
    }

    pub fn metadata_schema(&self) -> &MetadataSchema {
        &self.shared.schema
    }

    /// Store file, `None` for in-memory indexes
    pub fn path(&self) -> Option<&Path> {
        self.shared.store.path()
    }

    pub fn ingest_defaults(&self) -> IngestOptions {
        self.shared.ingest_defaults
    }

    /// Commit writes made with `commit = false`
    pub fn commit(&self) -> Result<()> {
        Ok(self.shared.store.commit()?)
    }

    /// Index `paths`, holding the store lock until the batch is committed
    pub fn add_paths<I, P>(&self, paths: I, options: IngestOptions) -> Result<IngestReport>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let session = self.session();
        let mut ingestion = Ingestion::new(paths, options);
        while let Some(visited) = ingestion.step(self, &session) {
            if let Err(err) = visited {
                ingestion.abandon(&session);
                return Err(err);
            }
        }
        ingestion.commit(&session)?;
        Ok(ingestion.report())
    }

    /// Index `paths` lazily, yielding each path as it is visited
    pub fn add_paths_streaming<I, P>(&self, paths: I, options: IngestOptions) -> IngestStream
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        IngestStream::new(self.clone(), Ingestion::new(paths, options))
    }

    /// Index `paths` on a background thread that can be paused between paths
    pub fn add_paths_in_background<I, P>(
        &self,
        paths: I,
        options: IngestOptions,
    ) -> Result<PausableWorker<IngestTask>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let stream = self.add_paths_streaming(paths, options);
        PausableWorker::spawn("fsindex-ingest", IngestTask::new(stream))
    }

    fn wrap_nodes(&self, records: Vec<crate::types::NodeRecord>) -> Vec<Node> {
        records
            .into_iter()
            .map(|record| Node::new(self.clone(), record))
            .collect()
    }

    /// Nodes without a parent, i.e. directly under a filesystem root
    pub fn roots(&self) -> Result<Vec<Node>> {
        let records = self.session().children(None)?;
        Ok(self.wrap_nodes(records))
    }

    /// Search the whole index for paths containing `keyword`
    pub fn search(&self, keyword: &str, options: SearchOptions) -> Result<Vec<Node>> {
        let records = self.session().search(None, keyword, options)?;
        Ok(self.wrap_nodes(records))
    }

    /// Every root followed by its subtree
    pub fn walk(&self) -> Result<Vec<Node>> {
        let records = self.session().walk()?;
        Ok(self.wrap_nodes(records))
    }

    pub fn file_by_id(&self, id: NodeId) -> Result<Option<Node>> {
        let record = self.session().file_by_id(id)?;
        Ok(record.map(|record| Node::new(self.clone(), record)))
    }

    pub fn folder_by_id(&self, id: NodeId) -> Result<Option<Node>> {
        let record = self.session().folder_by_id(id)?;
        Ok(record.map(|record| Node::new(self.clone(), record)))
    }

    pub fn file_by_path(&self, path: impl AsRef<Path>) -> Result<Option<Node>> {
        let record = self.session().file_by_path(path.as_ref())?;
        Ok(record.map(|record| Node::new(self.clone(), record)))
    }

    pub fn folder_by_path(&self, path: impl AsRef<Path>) -> Result<Option<Node>> {
        let record = self.session().folder_by_path(path.as_ref())?;
        Ok(record.map(|record| Node::new(self.clone(), record)))
    }

    /// Folder at `path`, else file at `path`
    pub fn node_by_path(&self, path: impl AsRef<Path>) -> Result<Option<Node>> {
        let record = self.session().node_by_path(path.as_ref())?;
        Ok(record.map(|record| Node::new(self.clone(), record)))
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.session().stats()
    }

    /// Create a tag, or return the existing tag with that name
    pub fn create_tag(&self, name: &str) -> Result<Tag> {
        let record = self.session().create_tag(name, true)?;
        Ok(Tag::new(self.clone(), record))
    }

    pub fn get_tag(&self, name: &str) -> Result<Option<Tag>> {
        let record = self.session().get_tag(name)?;
        Ok(record.map(|record| Tag::new(self.clone(), record)))
    }

    /// All tags, by name
    pub fn tags(&self) -> Result<Vec<Tag>> {
        let records = self.session().tags()?;
        Ok(records
            .into_iter()
            .map(|record| Tag::new(self.clone(), record))
            .collect())
    }

    /// Hot copy of the store to `destination`. Uncommitted writes are not copied.
    pub fn save_as(&self, destination: impl AsRef<Path>) -> Result<PathBuf> {
        let destination = destination.as_ref();
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.shared.store.backup_to(destination)?;
        Ok(destination.to_path_buf())
    }

    /// Commit, then compact the store file
    pub fn vacuum(&self) -> Result<()> {
        Ok(self.shared.store.vacuum()?)
    }
}
