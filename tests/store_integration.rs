//! Store Integration Tests
//!
//! End-to-end checks of the public `Database` API against both backends,
//! including reopening a store from disk.
//!
//! Run with:
//! ```bash
//! cargo test --test store_integration
//! ```

use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;
use verso_db::{
    AttachmentSource, BlobBackend, Clause, Database, MemoryBlobStore, MemoryVersionStore,
    ObjectId, ObjectVersion, Props, Query, VersionBackend,
};

fn props(value: Value) -> Option<Props> {
    value.as_object().cloned()
}

async fn create(db: &Database, value: Value) -> ObjectVersion {
    let reply = db.new_object(props(value)).await.unwrap();
    assert!(reply.success);
    reply.into_first().unwrap()
}

// ============================================================================
// Version Chain Tests
// ============================================================================

#[tokio::test]
async fn test_versions_are_gapless_from_zero() {
    let db = Database::in_memory().await.unwrap();
    let id = create(&db, json!({"n": 0})).await.uuid;

    let mut seen = vec![0];
    for n in 1..=5 {
        let reply = db.update_object_props(&id, props(json!({ "n": n }))).await.unwrap();
        seen.push(reply.data[0].version);
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_every_listed_version_is_reproducible() {
    let db = Database::in_memory().await.unwrap();
    let id = create(&db, json!({"title": "draft"})).await.uuid;
    let att = db
        .new_attachment(None, AttachmentSource::named_bytes("a.txt", b"hello".to_vec()))
        .await
        .unwrap()
        .into_first()
        .unwrap();

    db.update_object_props(&id, props(json!({"title": "final"}))).await.unwrap();
    db.add_attachment(&id, "readme", &att).await.unwrap();
    db.delete_object(&id).await.unwrap();

    let history = db.get_object_versions(&id).await.unwrap();
    assert_eq!(history.len(), 4);
    for version in &history.data {
        let fetched = db
            .get_object_by_version(&id, version.version)
            .await
            .unwrap()
            .into_first()
            .unwrap();
        assert_eq!(&fetched, version);
    }

    let latest = history.data.iter().max_by_key(|v| v.version).unwrap();
    let current = db.get_object(&id).await.unwrap().into_first().unwrap();
    assert_eq!(&current, latest);
    assert!(current.deleted);
    assert_eq!(current.attachments["readme"].mime, "text/plain");
}

#[tokio::test]
async fn test_shallow_additive_merge() {
    let db = Database::in_memory().await.unwrap();

    let id = create(&db, json!({})).await.uuid;
    db.update_object_props(&id, props(json!({"a": 1}))).await.unwrap();
    db.update_object_props(&id, props(json!({"b": 2}))).await.unwrap();
    let current = db.get_object(&id).await.unwrap().into_first().unwrap();
    assert_eq!(Value::Object(current.props), json!({"a": 1, "b": 2}));

    let id = create(&db, json!({})).await.uuid;
    db.update_object_props(&id, props(json!({"a": 1}))).await.unwrap();
    db.update_object_props(&id, props(json!({"a": 2}))).await.unwrap();
    let current = db.get_object(&id).await.unwrap().into_first().unwrap();
    assert_eq!(Value::Object(current.props), json!({"a": 2}));
}

// ============================================================================
// Attachment Tests
// ============================================================================

#[tokio::test]
async fn test_removal_detaches_reference_not_blob() {
    let db = Database::in_memory().await.unwrap();
    let id = create(&db, json!({"name": "doc"})).await.uuid;
    let att = db
        .new_attachment(None, AttachmentSource::bytes(b"original bytes".to_vec()))
        .await
        .unwrap()
        .into_first()
        .unwrap();

    db.add_attachment(&id, "file", &att).await.unwrap();
    assert!(db.get_attachment(&id, "file").await.unwrap().success);

    db.remove_attachment(&id, "file").await.unwrap();
    let reference = db.get_attachment(&id, "file").await.unwrap();
    assert!(!reference.success);
    assert!(reference.data.is_empty());

    let data = db.get_attachment_data(&att.uuid).await.unwrap();
    assert!(data.success);
    assert_eq!(&data.data[0][..], b"original bytes");
}

#[tokio::test]
async fn test_attachment_shared_between_objects() {
    let db = Database::in_memory().await.unwrap();
    let a = create(&db, json!({"name": "a"})).await.uuid;
    let b = create(&db, json!({"name": "b"})).await.uuid;
    let att = db
        .new_attachment(None, AttachmentSource::named_bytes("logo.png", vec![1u8, 2, 3]))
        .await
        .unwrap()
        .into_first()
        .unwrap();

    db.add_attachment(&a, "logo", &att).await.unwrap();
    db.add_attachment(&b, "icon", &att).await.unwrap();
    db.add_attachment(&b, "logo", &att).await.unwrap();

    let on_a = db.get_attachment(&a, "logo").await.unwrap().into_first().unwrap();
    let on_b = db.get_attachment(&b, "icon").await.unwrap().into_first().unwrap();
    assert_eq!(on_a, on_b);
    assert_eq!(on_a.uuid, att.uuid);
}

#[tokio::test]
async fn test_attachment_from_file() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("report.pdf");
    std::fs::write(&file, b"%PDF-1.7").unwrap();

    let db = Database::open_dir(dir.path().join("store")).await.unwrap();
    let att = db
        .new_attachment(props(json!({"label": "q3"})), AttachmentSource::path(&file))
        .await
        .unwrap()
        .into_first()
        .unwrap();

    assert_eq!(att.mime, "application/pdf");
    assert_eq!(att.size, 8);
    assert_eq!(att.props["label"], json!("q3"));

    let on_disk = dir
        .path()
        .join("store")
        .join("attachments")
        .join(att.uuid.as_str());
    assert_eq!(std::fs::read(on_disk.join("blob")).unwrap(), b"%PDF-1.7");
    assert!(on_disk.join("attr.json").exists());
}

#[tokio::test]
async fn test_tampered_blob_is_reported() {
    let dir = tempdir().unwrap();
    let db = Database::open_dir(dir.path()).await.unwrap();
    let att = db
        .new_attachment(None, AttachmentSource::bytes(b"trusted".to_vec()))
        .await
        .unwrap()
        .into_first()
        .unwrap();

    let blob = dir
        .path()
        .join("attachments")
        .join(att.uuid.as_str())
        .join("blob");
    std::fs::write(&blob, b"tampere").unwrap();

    let err = db.get_attachment_data(&att.uuid).await.unwrap_err();
    assert!(matches!(err, verso_db::Error::Corruption(_)));
}

// ============================================================================
// Search Tests
// ============================================================================

#[tokio::test]
async fn test_search_equals() {
    let db = Database::in_memory().await.unwrap();
    create(&db, json!({"name": "doc1"})).await;
    let doc2 = create(&db, json!({"name": "doc2"})).await;

    let query = Query::from_json(&json!({
        "and": [{"prop": "name", "op": "equals", "value": "doc2"}]
    }))
    .unwrap();
    let found = db.search(&query).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found.data[0].uuid, doc2.uuid);
}

#[tokio::test]
async fn test_search_substring_case_insensitive() {
    let db = Database::in_memory().await.unwrap();
    create(&db, json!({"contents": "some cool java is here"})).await;
    let js = create(&db, json!({"contents": "some cool Javascript is here"})).await;

    let query = Query::new().and(Clause::substring("contents", "javascript").case_insensitive());
    let found = db.search(&query).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found.data[0].uuid, js.uuid);
}

#[tokio::test]
async fn test_search_skips_objects_without_prop() {
    let db = Database::in_memory().await.unwrap();
    create(&db, json!({"kind": "document"})).await;
    create(&db, json!({"name": ""})).await;

    let query = Query::new().and(Clause::substring("name", ""));
    assert_eq!(db.search(&query).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_includes_tombstones_for_caller_filtering() {
    let db = Database::in_memory().await.unwrap();
    let keep = create(&db, json!({"kind": "note"})).await;
    let gone = create(&db, json!({"kind": "note"})).await;
    db.delete_object(&gone.uuid).await.unwrap();

    let notes = db
        .search(&Query::new().and(Clause::equals("kind", "note")))
        .await
        .unwrap();
    assert_eq!(notes.len(), 2);

    let live: Vec<&ObjectVersion> = notes.data.iter().filter(|o| !o.deleted).collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].uuid, keep.uuid);
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_filesystem_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    let (before_all, before_history, att_id) = {
        let db = Database::open_dir(&path).await.unwrap();
        let doc = create(&db, json!({"name": "doc1"})).await.uuid;
        create(&db, json!({"name": "doc2"})).await;
        db.update_object_props(&doc, props(json!({"tags": ["a", "b"]}))).await.unwrap();
        let att = db
            .new_attachment(None, AttachmentSource::named_bytes("n.md", b"# notes".to_vec()))
            .await
            .unwrap()
            .into_first()
            .unwrap();
        db.add_attachment(&doc, "notes", &att).await.unwrap();

        let all = db.get_all_objects().await.unwrap();
        let history = db.get_object_versions(&doc).await.unwrap();
        db.close().await.unwrap();
        (all, history, att.uuid)
    };

    let db = Database::open_dir(&path).await.unwrap();
    let after_all = db.get_all_objects().await.unwrap();
    assert_eq!(after_all, before_all);

    let doc = &before_history.data[0].uuid;
    assert_eq!(db.get_object_versions(doc).await.unwrap(), before_history);

    let data = db.get_attachment_data(&att_id).await.unwrap();
    assert_eq!(&data.data[0][..], b"# notes");
    assert_eq!(db.object_count(), 2);
}

#[tokio::test]
async fn test_version_files_on_disk() {
    let dir = tempdir().unwrap();
    let db = Database::open_dir(dir.path()).await.unwrap();
    let id = create(&db, json!({"name": "doc"})).await.uuid;
    db.update_object_props(&id, props(json!({"name": "doc v1"}))).await.unwrap();

    let obj_dir = dir.path().join("objects").join(id.as_str());
    let v1: Value = serde_json::from_slice(&std::fs::read(obj_dir.join("1.json")).unwrap()).unwrap();
    assert_eq!(v1["version"], json!(1));
    assert_eq!(v1["props"]["name"], json!("doc v1"));
    assert_eq!(v1["deleted"], json!(false));
    assert!(obj_dir.join("0.json").exists());
}

#[tokio::test]
async fn test_memory_backends_survive_reopen() {
    let versions = Arc::new(MemoryVersionStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());

    let id = {
        let db = Database::with_backends(versions.clone(), blobs.clone())
            .await
            .unwrap();
        let id = create(&db, json!({"name": "kept"})).await.uuid;
        db.update_object_props(&id, props(json!({"v": 2}))).await.unwrap();
        db.close().await.unwrap();
        id
    };

    let db = Database::with_backends(versions.clone(), blobs).await.unwrap();
    let current = db.get_object(&id).await.unwrap().into_first().unwrap();
    assert_eq!(current.version, 1);
    assert_eq!(versions.len(), 2);
}

#[tokio::test]
async fn test_external_writes_are_rejected_not_overwritten() {
    let versions = Arc::new(MemoryVersionStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let db = Database::with_backends(versions.clone(), blobs.clone())
        .await
        .unwrap();
    let obj = create(&db, json!({"name": "raced"})).await;

    // Another writer sneaks version 1 in behind the store's back
    let mut rival = obj.next();
    rival.props.insert("name".into(), json!("rival"));
    versions.append_version(&rival).await.unwrap();

    let err = db
        .update_object_props(&obj.uuid, props(json!({"name": "mine"})))
        .await
        .unwrap_err();
    assert!(matches!(err, verso_db::Error::VersionConflict { version: 1, .. }));

    let stored = versions.get_versions_by_object(&obj.uuid).await.unwrap();
    assert_eq!(stored[1].props["name"], json!("rival"));
    assert!(blobs.list_attachment_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_ids_fail_softly() {
    let db = Database::in_memory().await.unwrap();
    let id = ObjectId::from("does-not-exist");
    let reply = db.get_object(&id).await.unwrap();
    assert!(!reply.success);
    assert!(reply.data.is_empty());
}
