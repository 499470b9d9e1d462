mod common;

use std::fs;
use std::path::Path;

use anyhow::Result;
use rorsync::changelog::ChangeLog;
use rorsync::model::{ProjectStatusChange, SegmentStatusChange, Status, SyncSettings};
use rorsync::remote::{FILES_CONTAINER, RemoteClient};
use rorsync::store::LocalStore;
use rorsync::upload::BatchUploader;
use rorsync::worker::CancelFlag;

fn make_batch(parent: &Path, name: &str) -> std::path::PathBuf {
    let batch = parent.join(name);
    for (category, subdir) in [
        ("data.db3", "DB"),
        ("report.pdf", "Misc/Docu"),
        ("frame.jpg", "Picture/Sec"),
        ("run.mp4", "Video/Sec"),
    ] {
        let dir = batch.join(subdir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(category), format!("{} payload", category)).unwrap();
    }
    batch
}

#[test]
fn second_upload_of_same_batch_is_a_no_op() -> Result<()> {
    let server = common::spawn_store();
    let remote = RemoteClient::new(server.storage_config())?;
    let cancel = CancelFlag::default();
    let uploader = BatchUploader::new(&remote, &cancel);

    let dir = tempfile::tempdir()?;
    let batch = make_batch(dir.path(), "Batch-2026-08");

    let mut obs = common::RecordingObserver::default();
    uploader.upload_batch(&batch, &mut obs)?;

    assert_eq!(server.ledger_rows().len(), 1);
    assert_eq!(server.ledger_rows()[0]["dir_name"], "Batch-2026-08");
    assert_eq!(server.ledger_rows()[0]["partition_key"], "prod");
    let stages_after_first = server.stage_calls();
    assert_eq!(stages_after_first, 4);
    assert_eq!(
        server
            .blob(FILES_CONTAINER, "prod/new/Batch-2026-08/Video/run.mp4")
            .as_deref(),
        Some(b"run.mp4 payload".as_slice())
    );

    let mut obs = common::RecordingObserver::default();
    uploader.upload_batch(&batch, &mut obs)?;

    assert_eq!(server.ledger_rows().len(), 1);
    assert_eq!(server.stage_calls(), stages_after_first);
    assert!(obs.infos.iter().any(|m| m.contains("already been uploaded")));
    Ok(())
}

#[test]
fn missing_video_subdir_rejected_before_any_network_call() {
    let server = common::spawn_store();
    let remote = RemoteClient::new(server.storage_config()).unwrap();
    let cancel = CancelFlag::default();
    let uploader = BatchUploader::new(&remote, &cancel);

    let dir = tempfile::tempdir().unwrap();
    let batch = dir.path().join("Broken");
    for subdir in ["DB", "Misc/Docu", "Picture/Sec"] {
        fs::create_dir_all(batch.join(subdir)).unwrap();
    }

    let mut obs = common::RecordingObserver::default();
    let result = uploader.upload_batch(&batch, &mut obs);

    assert!(result.is_err());
    assert!(obs.warnings.iter().any(|w| w.contains("Video/Sec")));
    assert_eq!(server.request_count(), 0);
    assert!(server.ledger_rows().is_empty());
}

#[test]
fn status_changes_uploaded_as_json_and_logs_rotated() -> Result<()> {
    let server = common::spawn_store();
    let remote = RemoteClient::new(server.storage_config())?;
    let cancel = CancelFlag::default();
    let uploader = BatchUploader::new(&remote, &cancel);

    let dir = tempfile::tempdir()?;
    let settings = SyncSettings::default();
    let store = LocalStore::open(dir.path(), &settings.db_name, "bg.gpkg")?;

    let segment_log = ChangeLog::new(&store.changelog_path(&settings.changed_status_filename));
    segment_log.append(&SegmentStatusChange {
        lsid: 42,
        new_status: Status::Completed,
        comment: "inspected".into(),
        project_area_id: "P-1".into(),
        changed_at: "2026-08-27T09:00:00Z".into(),
    })?;
    let project_log =
        ChangeLog::new(&store.changelog_path(&settings.changed_project_status_filename));
    project_log.append(&ProjectStatusChange {
        global_id: "G-9".into(),
        new_status: Status::InProgress,
        comments_inspector: "started".into(),
        changed_at: "2026-08-27T09:05:00Z".into(),
    })?;

    let mut obs = common::RecordingObserver::default();
    uploader.upload_status_changes(&store, &settings, &mut obs)?;

    let seg = server
        .blob(FILES_CONTAINER, "prod/changed_status/42_status_change.json")
        .expect("segment change blob");
    let seg: serde_json::Value = serde_json::from_slice(&seg)?;
    assert_eq!(seg["lsid"], 42);
    assert_eq!(seg["new_status"], 4);

    let proj = server
        .blob(
            FILES_CONTAINER,
            "prod/changed_project_status/G-9_status_change.json",
        )
        .expect("project change blob");
    let proj: serde_json::Value = serde_json::from_slice(&proj)?;
    assert_eq!(proj["GlobalID"], "G-9");

    assert!(!segment_log.exists());
    assert!(!project_log.exists());
    Ok(())
}

#[test]
fn absent_change_logs_upload_nothing() -> Result<()> {
    let server = common::spawn_store();
    let remote = RemoteClient::new(server.storage_config())?;
    let cancel = CancelFlag::default();
    let uploader = BatchUploader::new(&remote, &cancel);

    let dir = tempfile::tempdir()?;
    let settings = SyncSettings::default();
    let store = LocalStore::open(dir.path(), &settings.db_name, "bg.gpkg")?;

    let mut obs = common::RecordingObserver::default();
    uploader.upload_status_changes(&store, &settings, &mut obs)?;
    assert_eq!(server.request_count(), 0);
    Ok(())
}
