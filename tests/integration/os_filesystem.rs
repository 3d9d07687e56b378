use std::fs;

use fsindex::{FileIndex, IngestOptions, NodeKind, SearchOptions};
use tempfile::TempDir;

use crate::support::{fast_retry, paths};

fn populate(root: &std::path::Path) {
    fs::create_dir_all(root.join("src").join("nested")).unwrap();
    fs::create_dir_all(root.join("empty")).unwrap();
    fs::write(root.join("Cargo.toml"), "[package]").unwrap();
    fs::write(root.join("src").join("lib.rs"), "").unwrap();
    fs::write(root.join("src").join("nested").join("deep.rs"), "").unwrap();
}

#[test]
fn indexes_a_real_directory_tree() {
    let temp = TempDir::new().unwrap();
    let tree = temp.path().join("project");
    populate(&tree);
    let index = FileIndex::builder()
        .retry_policy(fast_retry())
        .create_new(&temp.path().join("index.sqlite"))
        .unwrap();

    let report = index.add_paths([&tree], IngestOptions::default()).unwrap();
    assert_eq!(report.files_added, 3);
    assert_eq!(report.skipped, 0);

    let project = index.folder_by_path(&tree).unwrap().unwrap();
    let subtree = project.subtree().unwrap();
    let relative: Vec<String> = subtree
        .iter()
        .map(|node| {
            node.path()
                .strip_prefix(&tree)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    assert_eq!(
        relative,
        vec!["Cargo.toml", "empty", "src", "src/lib.rs", "src/nested", "src/nested/deep.rs"]
    );

    // Every ancestor of the ingested directory exists as a folder row.
    let mut cursor = project.parent().unwrap();
    while let Some(folder) = cursor {
        assert_eq!(folder.kind(), NodeKind::Folder);
        cursor = folder.parent().unwrap();
    }

    let rust_files = project.search(".rs", SearchOptions::files_only()).unwrap();
    assert_eq!(rust_files.len(), 2);
}

#[cfg(unix)]
#[test]
fn relative_input_paths_are_made_absolute() {
    let temp = TempDir::new().unwrap();
    populate(&temp.path().join("project"));
    let index = FileIndex::builder()
        .retry_policy(fast_retry())
        .create_in_memory()
        .unwrap();

    let relative = pathdiff(&temp.path().join("project"));
    index.add_paths([relative], IngestOptions::shallow()).unwrap();
    let project = index
        .folder_by_path(temp.path().join("project"))
        .unwrap();
    assert!(project.is_some());
}

/// `path` relative to the current directory, via enough `..` segments
#[cfg(unix)]
fn pathdiff(path: &std::path::Path) -> std::path::PathBuf {
    let cwd = std::env::current_dir().unwrap();
    let depth = cwd.components().count() - 1;
    let mut relative = std::path::PathBuf::new();
    for _ in 0..depth {
        relative.push("..");
    }
    relative.join(path.strip_prefix("/").unwrap_or(path))
}

#[cfg(unix)]
#[test]
fn symlinks_are_files_and_never_followed() {
    let temp = TempDir::new().unwrap();
    let tree = temp.path().join("project");
    populate(&tree);
    std::os::unix::fs::symlink(&tree, tree.join("loop")).unwrap();

    let index = FileIndex::builder()
        .retry_policy(fast_retry())
        .create_in_memory()
        .unwrap();
    index.add_paths([&tree], IngestOptions::default()).unwrap();

    let link = index.node_by_path(tree.join("loop")).unwrap().unwrap();
    assert_eq!(link.kind(), NodeKind::File);
    assert_eq!(
        paths(&index.search("loop", SearchOptions::default()).unwrap()).len(),
        1
    );
}
