use fsindex::{FileIndex, IngestOptions};

use crate::support::{builder, memory_index, node, paths, sample_tree};

fn indexed() -> FileIndex {
    let fs = sample_tree();
    let index = builder(&fs).tags(["favorite", "live"]).create_in_memory().unwrap();
    index.add_paths(["/music", "/docs"], IngestOptions::default()).unwrap();
    index
}

#[test]
fn configured_vocabulary_exists_in_a_new_store() {
    let index = indexed();
    let names: Vec<_> = index
        .tags()
        .unwrap()
        .iter()
        .map(|tag| tag.name().to_string())
        .collect();
    assert_eq!(names, vec!["favorite", "live"]);
}

#[test]
fn adding_twice_leaves_one_membership() {
    let index = indexed();
    let encore = node(&index, "/music/Live/encore.flac");

    assert!(encore.add_tag("favorite", true).unwrap());
    assert!(!encore.add_tag("favorite", true).unwrap());

    let favorite = index.get_tag("favorite").unwrap().unwrap();
    assert_eq!(paths(&favorite.files_with_tag().unwrap()), vec!["/music/Live/encore.flac"]);
    assert_eq!(encore.tags().unwrap().len(), 1);
}

#[test]
fn removing_a_non_member_is_a_no_op() {
    let index = indexed();
    let intro = node(&index, "/music/Live/intro.flac");
    assert!(!intro.remove_tag("favorite", true).unwrap());

    intro.add_tag("favorite", true).unwrap();
    assert!(intro.remove_tag("favorite", true).unwrap());
    let favorite = index.get_tag("favorite").unwrap().unwrap();
    assert!(favorite.files_with_tag().unwrap().is_empty());
}

#[test]
fn unknown_tag_names_are_ignored() {
    let index = indexed();
    let readme = node(&index, "/docs/readme.md");
    assert!(!readme.add_tag("never-created", true).unwrap());
    assert!(readme.tags().unwrap().is_empty());
}

#[test]
fn files_and_folders_have_separate_memberships() {
    let index = indexed();
    let live = index.get_tag("live").unwrap().unwrap();
    node(&index, "/music/Live").add_tag(&live, true).unwrap();
    node(&index, "/music/Live/intro.flac").add_tag(&live, true).unwrap();

    assert_eq!(paths(&live.folders_with_tag().unwrap()), vec!["/music/Live"]);
    assert_eq!(paths(&live.files_with_tag().unwrap()), vec!["/music/Live/intro.flac"]);
}

#[test]
fn uncommitted_memberships_commit_together() {
    let index = indexed();
    let favorite = index.get_tag("favorite").unwrap().unwrap();
    for path in ["/music/Live/encore.flac", "/music/notes.txt", "/docs/readme.md"] {
        node(&index, path).add_tag(&favorite, false).unwrap();
    }
    assert!(index.session().in_transaction());

    index.commit().unwrap();
    assert!(!index.session().in_transaction());
    assert_eq!(favorite.files_with_tag().unwrap().len(), 3);
}

#[test]
fn create_tag_is_idempotent_and_delete_cascades() {
    let fs = sample_tree();
    let index = memory_index(&fs);
    index.add_paths(["/docs"], IngestOptions::default()).unwrap();

    let draft = index.create_tag("draft").unwrap();
    assert_eq!(index.create_tag("draft").unwrap(), draft);

    let readme = node(&index, "/docs/readme.md");
    readme.add_tag(&draft, true).unwrap();
    assert!(draft.clone().delete().unwrap());

    assert!(index.get_tag("draft").unwrap().is_none());
    assert!(readme.tags().unwrap().is_empty());
    assert_eq!(index.stats().unwrap().tags, 0);
}

#[test]
fn stale_tag_handle_cannot_tag_after_delete() {
    let index = indexed();
    let live = index.get_tag("live").unwrap().unwrap();
    let stale = live.clone();
    assert!(live.delete().unwrap());

    let notes = node(&index, "/music/notes.txt");
    assert!(!notes.add_tag(&stale, true).unwrap());
    assert!(notes.tags().unwrap().is_empty());
}
