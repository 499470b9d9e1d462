use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::SyncObserver;
use crate::dataset::{Dataset, FieldValue};
use crate::model::{ProjectStatusChange, SegmentStatusChange};

const STATUS_INTERNAL: &str = "status_internal";
const PROJECT_AREA_ID: &str = "project_area_id";
const GLOBAL_ID: &str = "GlobalID";
const STATUS: &str = "status";

// Merge policy: full replace with change replay. Each local table is rebuilt
// from the delta's rows after pending status edits are replayed onto them.
pub struct MergeEngine {
    baseline: PathBuf,
    delta: PathBuf,
    segment_changes: Vec<SegmentStatusChange>,
    project_changes: Vec<ProjectStatusChange>,
}

impl MergeEngine {
    pub fn new(
        baseline: PathBuf,
        delta: PathBuf,
        segment_changes: Vec<SegmentStatusChange>,
        project_changes: Vec<ProjectStatusChange>,
    ) -> Self {
        Self {
            baseline,
            delta,
            segment_changes,
            project_changes,
        }
    }

    // Equal bytes mean the working copy is already current.
    pub fn needs_merge(&self) -> Result<bool> {
        Ok(file_digest(&self.baseline)? != file_digest(&self.delta)?)
    }

    // Change records apply sequentially in file order, so the last record
    // for a subject wins.
    pub fn merge_table(
        &self,
        local: &mut Dataset,
        delta: &Dataset,
        table: &str,
        id_column: &str,
        obs: &mut dyn SyncObserver,
    ) -> Result<()> {
        let mut rows = delta.rows(table).to_vec();
        let mut replayed = 0usize;

        // Order rows carry `status_internal`; plain segment rows do not.
        if rows.iter().any(|r| r.has_field(STATUS_INTERNAL)) {
            for change in &self.segment_changes {
                for row in rows.iter_mut() {
                    if row.int(id_column) == Some(change.lsid)
                        && row.text(PROJECT_AREA_ID) == Some(change.project_area_id.as_str())
                    {
                        row.set(
                            STATUS_INTERNAL,
                            FieldValue::Int(change.new_status.code() as i64),
                        );
                        replayed += 1;
                    }
                }
            }
        } else if rows.iter().any(|r| r.has_field(GLOBAL_ID) && r.has_field(STATUS)) {
            for change in &self.project_changes {
                for row in rows.iter_mut() {
                    if row.text(GLOBAL_ID) == Some(change.global_id.as_str()) {
                        row.set(STATUS, FieldValue::Int(change.new_status.code() as i64));
                        replayed += 1;
                    }
                }
            }
        }

        let expected = rows.len();
        let mut edit = local.edit(table);
        edit.replace_all(rows);
        edit.commit()
            .with_context(|| format!("commit merged table {}", table))?;

        if expected == 0 {
            obs.on_info(&format!("{}: no data in remote update", table));
        } else if replayed > 0 {
            obs.on_info(&format!(
                "{}: {} rows ({} status edits reapplied)",
                table, expected, replayed
            ));
        } else {
            obs.on_info(&format!("{}: {} rows", table, expected));
        }

        // Post-commit consistency check against the file on disk.
        let on_disk = Dataset::open(local.path())
            .with_context(|| format!("reopen {} after merge", local.path().display()))?
            .row_count(table);
        if on_disk != expected {
            obs.on_warning(&format!(
                "sync mismatch in {}: {} rows on disk, expected {}",
                table, on_disk, expected
            ));
        }
        Ok(())
    }
}

fn file_digest(path: &Path) -> Result<blake3::Hash> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("hash {}", path.display()))?;
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_need_no_merge() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.db");
        let b = dir.path().join("b.db");
        std::fs::write(&a, b"same content").unwrap();
        std::fs::write(&b, b"same content").unwrap();

        let engine = MergeEngine::new(a.clone(), b.clone(), Vec::new(), Vec::new());
        assert!(!engine.needs_merge().unwrap());

        std::fs::write(&b, b"same content!").unwrap();
        assert!(engine.needs_merge().unwrap());
    }
}
