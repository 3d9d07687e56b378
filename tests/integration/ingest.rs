use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use fsindex::{
    ApiError, ColumnType, IndexHooks, IngestOptions, MemoryFileSystem, MetadataMap,
    MetadataSchema, MetadataValue, NodeKind,
};
use tempfile::TempDir;

use crate::support::{builder, memory_index, node, paths, sample_tree};

#[test]
fn single_file_creates_exactly_its_ancestors() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.add_file("/a/b/c.txt");
    let index = memory_index(&fs);

    let report = index
        .add_paths(["/a/b/c.txt"], IngestOptions::default())
        .unwrap();
    assert_eq!(report.files_added, 1);
    assert_eq!(report.folders_added, 2);

    let stats = index.stats().unwrap();
    assert_eq!((stats.files, stats.folders), (1, 2));

    let a = node(&index, "/a");
    let b = node(&index, "/a/b");
    let c = node(&index, "/a/b/c.txt");
    assert_eq!(a.kind(), NodeKind::Folder);
    assert_eq!(a.parent_id(), None);
    assert_eq!(b.parent_id(), Some(a.id()));
    assert_eq!(c.kind(), NodeKind::File);
    assert_eq!(c.parent_id(), Some(b.id()));
}

#[test]
fn reingesting_adds_nothing() {
    let fs = sample_tree();
    let index = memory_index(&fs);

    let first = index.add_paths(["/music", "/docs"], IngestOptions::default()).unwrap();
    assert_eq!(first.files_added, 5);
    let before = index.stats().unwrap();

    let second = index.add_paths(["/music", "/docs"], IngestOptions::default()).unwrap();
    assert_eq!(second.added(), 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(index.stats().unwrap(), before);
}

#[test]
fn rescan_discovers_new_children_of_indexed_folders() {
    let fs = sample_tree();
    let index = memory_index(&fs);
    index.add_paths(["/music"], IngestOptions::default()).unwrap();

    fs.add_file("/music/Live/bonus.flac");
    fs.add_file("/music/new/demo.wav");

    let plain = index.add_paths(["/music"], IngestOptions::default()).unwrap();
    assert_eq!(plain.added(), 0);
    assert!(index.file_by_path("/music/Live/bonus.flac").unwrap().is_none());

    let rescan = index.add_paths(["/music"], IngestOptions::rescan()).unwrap();
    assert_eq!(rescan.files_added, 2);
    assert_eq!(rescan.folders_added, 1);
    assert!(index.file_by_path("/music/Live/bonus.flac").unwrap().is_some());
    assert!(index.file_by_path("/music/new/demo.wav").unwrap().is_some());
}

#[test]
fn shallow_ingest_does_not_descend() {
    let fs = sample_tree();
    let index = memory_index(&fs);

    index.add_paths(["/music"], IngestOptions::shallow()).unwrap();
    let stats = index.stats().unwrap();
    assert_eq!((stats.files, stats.folders), (0, 1));
}

#[test]
fn missing_paths_are_skipped_not_fatal() {
    let fs = sample_tree();
    let index = memory_index(&fs);

    let report = index
        .add_paths(["/nowhere", "/docs"], IngestOptions::default())
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.files_added, 1);
}

#[test]
fn filesystem_root_is_traversed_but_not_stored() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.add_file("/top/file.txt");
    let index = memory_index(&fs);

    index.add_paths(["/"], IngestOptions::default()).unwrap();
    assert!(index.folder_by_path("/").unwrap().is_none());
    let roots = index.roots().unwrap();
    assert_eq!(paths(&roots), vec!["/top"]);
    assert_eq!(paths(&roots[0].children().unwrap()), vec!["/top/file.txt"]);
}

#[test]
fn streaming_yields_depth_first_and_commits_when_drained() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.add_file("/r/a/1.txt").add_file("/r/b.txt");
    let index = memory_index(&fs);

    let mut stream = index.add_paths_streaming(["/r"], IngestOptions::default());
    let mut visited = Vec::new();
    for path in &mut stream {
        visited.push(path.unwrap().to_string_lossy().into_owned());
    }
    assert_eq!(visited, vec!["/r", "/r/a", "/r/a/1.txt", "/r/b.txt"]);
    assert_eq!(stream.report().files_added, 2);
    assert!(stream.next().is_none());
    assert!(!index.session().in_transaction());
}

#[test]
fn streaming_and_blocking_have_the_same_effect() {
    let fs = sample_tree();
    let blocking = memory_index(&fs);
    let streaming = memory_index(&fs);

    let expected = blocking.add_paths(["/music"], IngestOptions::default()).unwrap();
    let report = streaming
        .add_paths_streaming(["/music"], IngestOptions::default())
        .finish()
        .unwrap();

    assert_eq!(report, expected);
    assert_eq!(paths(&blocking.walk().unwrap()), paths(&streaming.walk().unwrap()));
}

struct ExtensionHooks;

impl IndexHooks for ExtensionHooks {
    fn initial_file_tags(&self, path: &Path) -> Option<BTreeSet<String>> {
        let ext = path.extension()?.to_str()?.to_string();
        Some(BTreeSet::from([ext, "unknown-tag".to_string()]))
    }

    fn initial_file_metadata(&self, path: &Path) -> Option<MetadataMap> {
        let name = path.file_name()?.to_str()?;
        Some(MetadataMap::from([(
            "name_length".to_string(),
            MetadataValue::from(name.len() as i64),
        )]))
    }

    fn initial_folder_metadata(&self, path: &Path) -> Option<MetadataMap> {
        Some(MetadataMap::from([(
            "depth".to_string(),
            MetadataValue::from(path.components().count() as i64 - 1),
        )]))
    }
}

#[test]
fn hooks_annotate_new_rows_including_created_ancestors() {
    let fs = sample_tree();
    let index = builder(&fs)
        .metadata_schema(
            MetadataSchema::new()
                .with_file_column("name_length", ColumnType::Integer)
                .with_folder_column("depth", ColumnType::Integer),
        )
        .tags(["flac", "mp3"])
        .hooks(Arc::new(ExtensionHooks))
        .create_in_memory()
        .unwrap();

    index
        .add_paths(["/music/Live/encore.flac", "/music/album"], IngestOptions::default())
        .unwrap();

    let flac = index.get_tag("flac").unwrap().unwrap();
    assert_eq!(paths(&flac.files_with_tag().unwrap()), vec!["/music/Live/encore.flac"]);
    let mp3 = index.get_tag("mp3").unwrap().unwrap();
    assert_eq!(paths(&mp3.files_with_tag().unwrap()), vec!["/music/album/track01.mp3"]);
    assert!(index.get_tag("unknown-tag").unwrap().is_none());

    let encore = node(&index, "/music/Live/encore.flac");
    assert_eq!(
        encore.metadata_value("name_length").unwrap(),
        Some(MetadataValue::Integer(11))
    );

    // Created by parent resolution, still annotated
    let live = node(&index, "/music/Live");
    assert_eq!(live.metadata_value("depth").unwrap(), Some(MetadataValue::Integer(2)));
    let music = node(&index, "/music");
    assert_eq!(music.metadata_value("depth").unwrap(), Some(MetadataValue::Integer(1)));
}

#[test]
fn hooks_do_not_rerun_on_rescan() {
    let fs = sample_tree();
    let index = builder(&fs)
        .metadata_schema(
            MetadataSchema::new()
                .with_file_column("name_length", ColumnType::Integer)
                .with_folder_column("depth", ColumnType::Integer),
        )
        .hooks(Arc::new(ExtensionHooks))
        .create_in_memory()
        .unwrap();
    index.add_paths(["/docs"], IngestOptions::default()).unwrap();

    let readme = node(&index, "/docs/readme.md");
    let mut values = MetadataMap::new();
    values.insert("name_length".into(), MetadataValue::Integer(-1));
    readme.set_metadata(&values).unwrap();

    index.add_paths(["/docs"], IngestOptions::rescan()).unwrap();
    assert_eq!(
        readme.metadata_value("name_length").unwrap(),
        Some(MetadataValue::Integer(-1))
    );
}

/// Hooks that set a file column no schema declares
struct UndeclaredColumnHooks;

impl IndexHooks for UndeclaredColumnHooks {
    fn initial_file_metadata(&self, _path: &Path) -> Option<MetadataMap> {
        Some(MetadataMap::from([("nope".to_string(), MetadataValue::Integer(1))]))
    }
}

fn count_rows(path: &Path, sql: &str) -> i64 {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn failed_batch_commits_earlier_paths_and_releases_the_store() {
    let temp = TempDir::new().unwrap();
    let store_path = temp.path().join("index.sqlite");
    let fs = Arc::new(MemoryFileSystem::new());
    fs.add_file("/a/x.txt");
    let index = builder(&fs)
        .hooks(Arc::new(UndeclaredColumnHooks))
        .create_new(&store_path)
        .unwrap();

    let err = index.add_paths(["/a"], IngestOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnknownColumn { kind: NodeKind::File, .. }
    ));
    assert!(!index.session().in_transaction());

    // The folder made it; the file whose hook failed left no row behind.
    assert!(index.folder_by_path("/a").unwrap().is_some());
    assert!(index.file_by_path("/a/x.txt").unwrap().is_none());
    assert_eq!(count_rows(&store_path, "select count(*) from folders"), 1);

    let other = rusqlite::Connection::open(&store_path).unwrap();
    other
        .execute("insert into tags (name) values ('external')", [])
        .unwrap();
    assert!(index.get_tag("external").unwrap().is_some());
}

#[test]
fn dropping_a_stream_early_commits_what_it_visited() {
    let temp = TempDir::new().unwrap();
    let store_path = temp.path().join("index.sqlite");
    let fs = sample_tree();
    let index = builder(&fs).create_new(&store_path).unwrap();

    let mut stream = index.add_paths_streaming(["/music"], IngestOptions::default());
    let first = stream.next().unwrap().unwrap();
    assert_eq!(first, Path::new("/music"));
    assert!(index.session().in_transaction());

    drop(stream);
    assert!(!index.session().in_transaction());
    assert_eq!(
        count_rows(&store_path, "select count(*) from folders where path = '/music'"),
        1
    );
    assert_eq!(count_rows(&store_path, "select count(*) from files"), 0);
}
