use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fsindex::{FileIndex, FileIndexBuilder, MemoryFileSystem, Node, RetryPolicy};

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(5))
}

/// Builder over an in-memory filesystem with a short retry delay
pub fn builder(fs: &Arc<MemoryFileSystem>) -> FileIndexBuilder {
    FileIndex::builder()
        .filesystem(fs.clone())
        .retry_policy(fast_retry())
}

pub fn memory_index(fs: &Arc<MemoryFileSystem>) -> FileIndex {
    builder(fs).create_in_memory().unwrap()
}

/// /music/{Live/{encore.flac, intro.flac}, album/track01.mp3, notes.txt} and /docs/readme.md
pub fn sample_tree() -> Arc<MemoryFileSystem> {
    let fs = MemoryFileSystem::new();
    fs.add_file("/music/Live/encore.flac")
        .add_file("/music/Live/intro.flac")
        .add_file("/music/album/track01.mp3")
        .add_file("/music/notes.txt")
        .add_file("/docs/readme.md");
    Arc::new(fs)
}

pub fn paths(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| node.path().to_string_lossy().into_owned())
        .collect()
}

pub fn node(index: &FileIndex, path: &str) -> Node {
    index
        .node_by_path(Path::new(path))
        .unwrap()
        .unwrap_or_else(|| panic!("{} is not indexed", path))
}
