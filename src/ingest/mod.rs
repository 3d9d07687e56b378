//! Ingestion Engine
//!
//! Walks input paths depth-first with an [`IteratorStack`], resolves each
//! path's parent folder, inserts the node and applies the initial tag and
//! metadata hooks to every freshly created row. A batch commits once, after the
//! last path has been visited.
//!
//! Two front ends share [`Ingestion`]: the blocking `FileIndex::add_paths`,
//! which holds the store lock for the whole batch, and [`IngestStream`], which
//! takes the lock once per visited path.

mod resolver;
mod task;

pub use resolver::ParentResolver;
pub use task::IngestTask;

use crate::error::Result;
use crate::fs::normalize_path;
use crate::hooks::{initial_metadata, initial_tags};
use crate::index::FileIndex;
use crate::stack::IteratorStack;
use crate::store::Session;
use crate::types::{path_text, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a batch treats folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Descend into newly created folders
    pub recursive: bool,
    /// Also descend into folders that are already indexed, to pick up new
    /// children. Only applies when `recursive` is set.
    pub rescan: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            rescan: false,
        }
    }
}

impl IngestOptions {
    pub fn shallow() -> Self {
        Self {
            recursive: false,
            rescan: false,
        }
    }

    pub fn rescan() -> Self {
        Self {
            recursive: true,
            rescan: true,
        }
    }
}

/// What a batch did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Paths taken off the traversal stack, including skipped ones
    pub visited: u64,
    pub files_added: u64,
    /// Folders inserted, ancestors created on the way included
    pub folders_added: u64,
    /// Paths that were already indexed
    pub duplicates: u64,
    /// Paths that could not be indexed or listed
    pub skipped: u64,
}

impl IngestReport {
    pub fn added(&self) -> u64 {
        self.files_added + self.folders_added
    }
}

impl Session<'_> {
    /// Insert a node row, returning `None` when the path is already indexed
    pub(crate) fn insert_node(
        &self,
        kind: NodeKind,
        path: &str,
        parent: Option<NodeId>,
    ) -> Result<Option<NodeId>> {
        let sql = format!(
            "insert into {} (path, parent) values (?1, ?2)",
            kind.node_table()
        );
        Ok(self.insert_unique(&sql, rusqlite::params![path, parent])?)
    }
}

/// Traversal state of one batch
pub(crate) struct Ingestion {
    pending: IteratorStack<'static, PathBuf>,
    resolver: ParentResolver,
    options: IngestOptions,
    report: IngestReport,
    finished: bool,
}

impl Ingestion {
    pub(crate) fn new<I, P>(paths: I, options: IngestOptions) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = IngestReport::default();
        let mut roots = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match normalize_path(path) {
                Ok(normalized) => roots.push(normalized),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unusable input path");
                    report.skipped += 1;
                }
            }
        }

        let mut pending = IteratorStack::new();
        pending.push(roots);
        Self {
            pending,
            resolver: ParentResolver::new(),
            options,
            report,
            finished: false,
        }
    }

    pub(crate) fn report(&self) -> IngestReport {
        self.report
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Visit the next path. `None` once the traversal is exhausted.
    pub(crate) fn step(
        &mut self,
        index: &FileIndex,
        session: &Session<'_>,
    ) -> Option<Result<PathBuf>> {
        let path = self.pending.next()?;
        Some(self.visit(index, session, &path).map(|()| path))
    }

    /// Commit the batch. Only attempted once.
    pub(crate) fn commit(&mut self, session: &Session<'_>) -> Result<()> {
        self.finished = true;
        session.commit()?;
        info!(
            visited = self.report.visited,
            files_added = self.report.files_added,
            folders_added = self.report.folders_added,
            duplicates = self.report.duplicates,
            skipped = self.report.skipped,
            "Ingestion committed"
        );
        Ok(())
    }

    /// Commit whatever a stopped batch wrote so far, releasing the write lock.
    ///
    /// A failed path leaves nothing behind, so the committed rows are the paths
    /// visited before it and running the batch again resumes it. No-op once the
    /// batch has finished.
    pub(crate) fn abandon(&mut self, session: &Session<'_>) {
        if self.finished {
            return;
        }
        self.finished = true;
        match session.commit() {
            Ok(()) => warn!(
                visited = self.report.visited,
                added = self.report.added(),
                "Ingestion stopped early, progress committed"
            ),
            Err(err) => {
                warn!(error = %err, "Could not commit stopped ingestion, rolling back");
                if let Err(err) = session.rollback() {
                    warn!(error = %err, "Rollback failed");
                }
            }
        }
    }

    fn visit(&mut self, index: &FileIndex, session: &Session<'_>, path: &Path) -> Result<()> {
        self.report.visited += 1;

        let Some(kind) = index.filesystem().kind(path) else {
            warn!(path = %path.display(), "Path vanished before it could be indexed");
            self.report.skipped += 1;
            return Ok(());
        };

        if path.parent().is_none() {
            // Filesystem roots are not rows; ingesting one means ingesting its contents.
            if kind == NodeKind::Folder {
                self.push_children(index, path);
            }
            return Ok(());
        }

        let Some(text) = path_text(path) else {
            warn!(path = %path.display(), "Skipping path that is not valid UTF-8");
            self.report.skipped += 1;
            return Ok(());
        };

        // A path's rows and hook writes land together or not at all.
        let before = self.report;
        let descend = session.savepoint("ingest_path", |session| {
            self.insert_path(index, session, path, text, kind)
        });
        match descend {
            Ok(true) => {
                self.push_children(index, path);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) => {
                self.report = before;
                // Cached ids may name rows that were just undone.
                self.resolver = ParentResolver::new();
                Err(err)
            }
        }
    }

    /// Insert one path and any missing ancestors. Returns whether to descend into it.
    fn insert_path(
        &mut self,
        index: &FileIndex,
        session: &Session<'_>,
        path: &Path,
        text: &str,
        kind: NodeKind,
    ) -> Result<bool> {
        let parent = self.resolver.resolve(session, path)?;
        for (folder, id) in self.resolver.take_created() {
            self.report.folders_added += 1;
            annotate(index, session, NodeKind::Folder, id, &folder)?;
        }

        let Some(id) = session.insert_node(kind, text, parent)? else {
            debug!(path = %path.display(), kind = %kind, "Already indexed");
            self.report.duplicates += 1;
            return Ok(kind == NodeKind::Folder && self.options.recursive && self.options.rescan);
        };

        debug!(path = %path.display(), id, kind = %kind, "Indexed");
        match kind {
            NodeKind::File => self.report.files_added += 1,
            NodeKind::Folder => {
                self.report.folders_added += 1;
                self.resolver.remember(path, id);
            }
        }
        annotate(index, session, kind, id, path)?;
        Ok(kind == NodeKind::Folder && self.options.recursive)
    }

    fn push_children(&mut self, index: &FileIndex, dir: &Path) {
        match index.filesystem().children(dir) {
            Ok(children) => self.pending.push(children),
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "Could not list directory");
                self.report.skipped += 1;
            }
        }
    }
}

/// Apply the initial metadata and tag hooks to a new row
fn annotate(
    index: &FileIndex,
    session: &Session<'_>,
    kind: NodeKind,
    id: NodeId,
    path: &Path,
) -> Result<()> {
    let hooks = index.hooks();
    if let Some(metadata) = initial_metadata(hooks, kind, path) {
        session.set_metadata(index.metadata_schema(), kind, id, &metadata, false)?;
    }
    if let Some(tags) = initial_tags(hooks, kind, path) {
        for tag in &tags {
            session.add_tag(kind, id, tag.into(), false)?;
        }
    }
    Ok(())
}

/// A batch that runs as it is iterated.
///
/// Each call to `next` visits one path under its own lock acquisition and
/// yields that path. The batch commits when the stream is drained. A stream
/// that is closed or dropped early commits what it has done so far.
///
/// Dropping a stream takes the store lock, so do not drop one while holding a
/// [`Session`] on the same thread.
pub struct IngestStream {
    index: FileIndex,
    ingestion: Ingestion,
}

impl IngestStream {
    pub(crate) fn new(index: FileIndex, ingestion: Ingestion) -> Self {
        Self { index, ingestion }
    }

    /// Counts so far
    pub fn report(&self) -> IngestReport {
        self.ingestion.report()
    }

    /// Stop early, committing the progress so far
    pub fn close(&mut self) {
        if self.ingestion.is_finished() {
            return;
        }
        let session = self.index.store().lock();
        self.ingestion.abandon(&session);
    }

    /// Drain the rest of the stream and return the final report
    pub fn finish(mut self) -> Result<IngestReport> {
        for visited in &mut self {
            visited?;
        }
        Ok(self.ingestion.report())
    }
}

impl Iterator for IngestStream {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ingestion.is_finished() {
            return None;
        }
        let session = self.index.store().lock();
        match self.ingestion.step(&self.index, &session) {
            Some(visited) => Some(visited),
            None => self.ingestion.commit(&session).err().map(Err),
        }
    }
}

impl Drop for IngestStream {
    fn drop(&mut self) {
        self.close();
    }
}
