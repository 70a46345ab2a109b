//! Full-stack tests: the engine's write pipeline against real files.

use logtree_engine::{DataKind, Label, Log, Props, RecordKind, SessionKind};
use logtree_fs::{FsConfig, FsStore};
use std::path::Path;
use tempfile::TempDir;

async fn fs_log(root: &Path) -> Log {
    let store = FsStore::open(FsConfig {
        root: root.to_path_buf(),
        fsync: true,
    })
    .await
    .unwrap();
    Log::new(store)
}

#[tokio::test]
async fn test_text_write_lands_in_a_txt_file() {
    let temp_dir = TempDir::new().unwrap();
    let log = fs_log(temp_dir.path()).await;
    let session = log
        .open_session(Props::for_session(SessionKind::AppRun))
        .await
        .unwrap();

    let record = session.write("hello", None).await.unwrap();
    assert!(record.uri().ends_with(".txt"));
    assert_eq!(std::fs::read_to_string(record.uri()).unwrap(), "hello");

    session.close().await.unwrap();
    assert_eq!(session.logged_records().len(), 1);
}

#[tokio::test]
async fn test_structured_write_lands_as_json() {
    let temp_dir = TempDir::new().unwrap();
    let log = fs_log(temp_dir.path()).await;
    let session = log
        .open_session(Props::for_session(SessionKind::Generic))
        .await
        .unwrap();

    let record = session
        .write(serde_json::json!({ "status": 200, "path": "/health" }), None)
        .await
        .unwrap();
    assert!(record.uri().ends_with(".json"));

    let body: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(record.uri()).unwrap()).unwrap();
    assert_eq!(body["status"], 200);
    assert_eq!(body["path"], "/health");

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_request_session_directory_holds_its_records() {
    let temp_dir = TempDir::new().unwrap();
    let log = fs_log(temp_dir.path()).await;

    let root = log
        .open_session(Props::for_session(SessionKind::AppRun))
        .await
        .unwrap();
    let request = root
        .open_child(Props::for_session(SessionKind::ServerRequest))
        .await
        .unwrap();

    request
        .write(
            "GET /health",
            Some(&[
                Label::Record(RecordKind::ServerRequest),
                Label::Data(DataKind::Text),
            ]),
        )
        .await
        .unwrap();
    request.write("stdout line", None).await.unwrap();

    // Both records live in the request session's own directory.
    let names: Vec<String> = std::fs::read_dir(request.storage_uri())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n == "1-request.txt"));
    assert!(names.iter().any(|n| n == "2-generic.txt"));
    assert_ne!(request.storage_uri(), root.storage_uri());

    request.close().await.unwrap();
    root.close().await.unwrap();
}

#[tokio::test]
async fn test_sessions_survive_log_handle_drop() {
    let temp_dir = TempDir::new().unwrap();
    let uri;
    {
        let log = fs_log(temp_dir.path()).await;
        let session = log
            .open_session(Props::for_session(SessionKind::Generic))
            .await
            .unwrap();
        let record = session.write("persisted", None).await.unwrap();
        uri = record.uri().to_string();
        session.close().await.unwrap();
    }

    // Everything flushed to disk outlives the in-process handles.
    assert_eq!(std::fs::read_to_string(&uri).unwrap(), "persisted");
}
