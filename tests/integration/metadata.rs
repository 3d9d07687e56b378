use std::sync::Arc;

use fsindex::{
    ApiError, ColumnType, FileIndex, IngestOptions, MemoryFileSystem, MetadataMap, MetadataSchema,
    MetadataValue, NodeKind,
};

use crate::support::{builder, node};

fn annotated_index() -> FileIndex {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.add_file("/photos/beach.jpg").add_file("/photos/city.jpg");
    let index = builder(&fs)
        .metadata_schema(
            MetadataSchema::new()
                .with_file_column("rating", ColumnType::Integer)
                .with_file_column("caption", ColumnType::Text)
                .with_file_column("thumbnail", ColumnType::Blob)
                .with_folder_column("cover", ColumnType::Text),
        )
        .create_in_memory()
        .unwrap();
    index.add_paths(["/photos"], IngestOptions::default()).unwrap();
    index
}

fn values<const N: usize>(pairs: [(&str, MetadataValue); N]) -> MetadataMap {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[test]
fn set_then_set_again_updates_in_place() {
    let index = annotated_index();
    let beach = node(&index, "/photos/beach.jpg");

    beach.set_metadata(&values([("rating", 1.into())])).unwrap();
    beach.set_metadata(&values([("rating", 2.into())])).unwrap();

    assert_eq!(beach.metadata_value("rating").unwrap(), Some(MetadataValue::Integer(2)));
    let rows = index
        .session()
        .query_optional("select count(*) from file_metadata", &[], |row| row.get::<_, i64>(0))
        .unwrap();
    assert_eq!(rows, Some(1));
}

#[test]
fn get_round_trips_every_storage_class() {
    let index = annotated_index();
    let beach = node(&index, "/photos/beach.jpg");
    let written = values([
        ("rating", 5.into()),
        ("caption", "sunset".into()),
        ("thumbnail", vec![0u8, 1, 2].into()),
    ]);
    beach.set_metadata(&written).unwrap();

    assert_eq!(beach.get_metadata(None).unwrap(), Some(written));
    let partial = beach.get_metadata(Some(&["caption"][..])).unwrap().unwrap();
    assert_eq!(partial.len(), 1);
    assert_eq!(partial["caption"], MetadataValue::Text("sunset".into()));
}

#[test]
fn unset_columns_read_back_as_null() {
    let index = annotated_index();
    let city = node(&index, "/photos/city.jpg");
    city.set_metadata(&values([("caption", "night".into())])).unwrap();

    let stored = city.get_metadata(None).unwrap().unwrap();
    assert_eq!(stored["rating"], MetadataValue::Null);
    assert_eq!(stored["caption"], MetadataValue::Text("night".into()));
}

#[test]
fn nodes_without_metadata_return_none() {
    let index = annotated_index();
    let city = node(&index, "/photos/city.jpg");
    assert_eq!(city.get_metadata(None).unwrap(), None);
    assert_eq!(city.metadata_value("rating").unwrap(), None);
}

#[test]
fn table_follows_the_node_kind() {
    let index = annotated_index();
    let folder = node(&index, "/photos");
    assert_eq!(folder.kind(), NodeKind::Folder);

    folder.set_metadata(&values([("cover", "beach.jpg".into())])).unwrap();
    assert_eq!(
        folder.metadata_value("cover").unwrap(),
        Some(MetadataValue::Text("beach.jpg".into()))
    );

    let err = folder
        .set_metadata(&values([("rating", 3.into())]))
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::UnknownColumn { kind: NodeKind::Folder, ref column } if column == "rating"
    ));
}

#[test]
fn unknown_columns_are_rejected_before_touching_the_store() {
    let index = annotated_index();
    let beach = node(&index, "/photos/beach.jpg");

    assert!(matches!(
        beach.get_metadata(Some(&["nope"][..])),
        Err(ApiError::UnknownColumn { .. })
    ));
    assert!(matches!(
        beach.set_metadata(&values([("rating; drop table files", 1.into())])),
        Err(ApiError::UnknownColumn { .. })
    ));
    assert!(!index.session().in_transaction());
}

#[test]
fn empty_update_is_a_no_op() {
    let index = annotated_index();
    let beach = node(&index, "/photos/beach.jpg");
    beach.set_metadata(&MetadataMap::new()).unwrap();
    assert_eq!(beach.get_metadata(None).unwrap(), None);
}

#[test]
fn invalid_declarations_fail_store_creation() {
    let fs = Arc::new(MemoryFileSystem::new());
    let err = builder(&fs)
        .metadata_schema(MetadataSchema::new().with_file_column("has space", ColumnType::Text))
        .create_in_memory()
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidColumn(_)));
}
