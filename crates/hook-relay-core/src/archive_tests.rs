//! Tests for the filesystem payload archive.

use super::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_store_writes_compact_json_and_creates_parents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("samples").join("payload.json");
    let archive = FilesystemPayloadArchive::new(&path);

    archive
        .store(&json!({ "action": "closed", "number": 1 }))
        .await
        .unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(!written.contains('\n'));
    assert!(!written.contains(": "));
    let parsed: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed, json!({ "action": "closed", "number": 1 }));
}

#[tokio::test]
async fn test_store_overwrites_previous_payload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("payload.json");
    let archive = FilesystemPayloadArchive::new(&path);

    archive.store(&json!({ "seq": 1 })).await.unwrap();
    archive.store(&json!({ "seq": 2 })).await.unwrap();

    let parsed: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(parsed, json!({ "seq": 2 }));
}

#[tokio::test]
async fn test_store_leaves_no_temp_files_behind() {
    let dir = TempDir::new().unwrap();
    let archive = FilesystemPayloadArchive::new(dir.path().join("payload.json"));

    archive.store(&json!([1, 2, 3])).await.unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["payload.json".to_string()]);
}

#[tokio::test]
async fn test_concurrent_stores_never_tear_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("payload.json");
    let archive = Arc::new(FilesystemPayloadArchive::new(&path));

    let mut handles = Vec::new();
    for seq in 0..16 {
        let archive = Arc::clone(&archive);
        handles.push(tokio::spawn(async move {
            let filler = "x".repeat(4096);
            archive
                .store(&json!({ "seq": seq, "filler": filler }))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let parsed: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert!(parsed["seq"].as_u64().unwrap() < 16);
}

#[tokio::test]
async fn test_store_fails_when_parent_is_a_file() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let archive = FilesystemPayloadArchive::new(blocker.join("payload.json"));

    let err = archive.store(&json!({})).await.unwrap_err();

    assert!(matches!(err, ArchiveError::Io { .. }));
}
