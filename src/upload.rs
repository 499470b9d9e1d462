use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;

use crate::changelog::ChangeLog;
use crate::model::{ProjectStatusChange, SegmentStatusChange, SyncSettings};
use crate::remote::{FILES_CONTAINER, RemoteClient};
use crate::store::LocalStore;
use crate::sync::{SyncObserver, report_progress};
use crate::worker::CancelFlag;

// Upload category -> subdirectory the field equipment writes it under.
// Every one of these must exist for a batch to be valid.
pub const BATCH_CATEGORIES: [(&str, &str); 4] = [
    ("DB", "DB"),
    ("Document", "Misc/Docu"),
    ("Image", "Picture/Sec"),
    ("Video", "Video/Sec"),
];

// Subdirectories that qualify a directory as a candidate batch when listing.
const LISTING_MARKERS: [&str; 2] = ["DB", "Video/Sec"];

pub struct BatchUploader<'a> {
    remote: &'a RemoteClient,
    cancel: &'a CancelFlag,
}

impl<'a> BatchUploader<'a> {
    pub fn new(remote: &'a RemoteClient, cancel: &'a CancelFlag) -> Self {
        Self { remote, cancel }
    }

    // Precondition check, run before any network traffic.
    pub fn validate_batch(dir: &Path) -> Result<()> {
        for (_, subdir) in BATCH_CATEGORIES {
            if !dir.join(subdir).is_dir() {
                bail!("'{}' does not exist in {}", subdir, dir.display());
            }
        }
        Ok(())
    }

    // A batch is recorded in the ledger only after every file committed, so
    // a crashed run is restarted, not resumed.
    pub fn upload_batch(&self, dir: &Path, obs: &mut dyn SyncObserver) -> Result<()> {
        let batch_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("batch path {} has no directory name", dir.display()))?;

        obs.on_info(&format!("Batch: {}", batch_name));

        if let Err(err) = Self::validate_batch(dir) {
            obs.on_warning(&format!("{:#}", err));
            obs.on_warning(
                "The selected directory does not have the expected batch structure; \
                 check that the right directory was chosen",
            );
            return Err(err);
        }

        if self.remote.has_been_uploaded(&batch_name)? {
            obs.on_info(&format!("{} has already been uploaded; skipping", batch_name));
            return Ok(());
        }

        for (category, subdir) in BATCH_CATEGORIES {
            let mut files = Vec::new();
            collect_files(&dir.join(subdir), &mut files)
                .with_context(|| format!("scan {}", dir.join(subdir).display()))?;
            for file in files {
                self.cancel.check()?;
                let file_name = file
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                obs.on_process_name(&format!("{}/{}/{}", batch_name, category, file_name));
                report_progress(obs, 0);

                let key = format!(
                    "{}/new/{}/{}/{}",
                    self.remote.environment(),
                    batch_name,
                    category,
                    file_name
                );
                self.remote.upload_file(
                    &file,
                    FILES_CONTAINER,
                    &key,
                    &mut |p| report_progress(obs, p),
                    self.cancel,
                )?;
                obs.on_info(&format!(
                    " - uploaded {}/{}/{}",
                    batch_name, category, file_name
                ));
            }
        }

        self.remote.record_upload(&batch_name)?;
        Ok(())
    }

    // One JSON blob per record; the consumed change-log files are rotated
    // after.
    pub fn upload_status_changes(
        &self,
        store: &LocalStore,
        settings: &SyncSettings,
        obs: &mut dyn SyncObserver,
    ) -> Result<()> {
        let mut warnings = Vec::new();

        let segment_log =
            ChangeLog::new(&store.changelog_path(&settings.changed_status_filename));
        let segment_changes: Vec<SegmentStatusChange> =
            segment_log.read(&mut |w| warnings.push(w))?;
        for w in warnings.drain(..) {
            obs.on_warning(&w);
        }
        if segment_log.exists() {
            for change in &segment_changes {
                self.cancel.check()?;
                let key = format!(
                    "{}/changed_status/{}_status_change.json",
                    self.remote.environment(),
                    change.lsid
                );
                self.upload_change(change, &key)?;
            }
            segment_log.clear()?;
            obs.on_info(&format!(
                "Uploaded {} segment status changes",
                segment_changes.len()
            ));
        }

        let project_log =
            ChangeLog::new(&store.changelog_path(&settings.changed_project_status_filename));
        let project_changes: Vec<ProjectStatusChange> =
            project_log.read(&mut |w| warnings.push(w))?;
        for w in warnings.drain(..) {
            obs.on_warning(&w);
        }
        if project_log.exists() {
            for change in &project_changes {
                self.cancel.check()?;
                let key = format!(
                    "{}/changed_project_status/{}_status_change.json",
                    self.remote.environment(),
                    change.global_id
                );
                self.upload_change(change, &key)?;
            }
            project_log.clear()?;
            obs.on_info(&format!(
                "Uploaded {} project status changes",
                project_changes.len()
            ));
        }
        Ok(())
    }

    fn upload_change<T: Serialize>(&self, change: &T, key: &str) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(change).context("serialize status change")?;
        self.remote.upload_bytes(&bytes, FILES_CONTAINER, key)
    }
}

// Newest-modified first; the equipment's "Trash" directory never qualifies.
pub fn list_batches(parent: &Path) -> Result<Vec<String>> {
    let mut candidates: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    for entry in fs::read_dir(parent).with_context(|| format!("read {}", parent.display()))? {
        let entry = entry.context("read directory entry")?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name == "Trash" {
            continue;
        }
        if LISTING_MARKERS.iter().any(|m| !path.join(m).is_dir()) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        candidates.push((path, modified));
    }
    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(candidates
        .into_iter()
        .filter_map(|(p, _)| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read directory entry")?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
