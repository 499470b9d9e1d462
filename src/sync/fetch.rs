use std::path::Path;

use anyhow::Result;

use super::{SyncObserver, report_progress};
use crate::remote::{RemoteClient, SECURE_CONTAINER};
use crate::store::LocalStore;
use crate::worker::CancelFlag;

// Snapshot failures abort the sync; a failed background-map download only
// degrades to a warning (a stale map is usable).
pub struct SnapshotFetcher<'a> {
    store: &'a LocalStore,
    remote: &'a RemoteClient,
    background_url: &'a str,
    app_version: &'a str,
    cancel: &'a CancelFlag,
}

impl<'a> SnapshotFetcher<'a> {
    pub fn new(
        store: &'a LocalStore,
        remote: &'a RemoteClient,
        background_url: &'a str,
        app_version: &'a str,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            store,
            remote,
            background_url,
            app_version,
            cancel,
        }
    }

    pub fn fetch(&self, obs: &mut dyn SyncObserver) -> Result<()> {
        let baseline = self.store.baseline_path();
        if baseline.exists() {
            // The delta is always re-fetched, overwriting any stale copy.
            self.download_snapshot(&self.store.delta_blob_key(), &self.store.delta_path(), obs)?;
        } else {
            // First run: the working copy itself must be fetched too.
            self.download_snapshot(&self.store.baseline_blob_key(), &baseline, obs)?;
            self.download_snapshot(&self.store.delta_blob_key(), &self.store.delta_path(), obs)?;
        }
        self.refresh_background(obs)
    }

    fn download_snapshot(
        &self,
        key: &str,
        dest: &Path,
        obs: &mut dyn SyncObserver,
    ) -> Result<()> {
        let name = dest.file_name().unwrap_or_default().to_string_lossy().to_string();
        obs.on_process_name(&format!("Downloading {}...", name));
        self.remote.download_blob(
            SECURE_CONTAINER,
            key,
            dest,
            &mut |p| report_progress(obs, p),
            self.cancel,
        )
    }

    fn refresh_background(&self, obs: &mut dyn SyncObserver) -> Result<()> {
        let dest = self.store.background_path();
        let installed = self.store.read_background_version()?;
        if dest.exists() && installed.as_deref() == Some(self.app_version) {
            return Ok(());
        }

        let name = dest.file_name().unwrap_or_default().to_string_lossy().to_string();
        obs.on_process_name(&format!("Downloading {}...", name));
        let result = self.remote.download_url(
            self.background_url,
            &dest,
            &mut |p| report_progress(obs, p),
            self.cancel,
        );
        match result {
            Ok(()) => self.store.write_background_version(self.app_version)?,
            Err(err) => obs.on_warning(&format!(
                "failed to download background map from {}: {:#}",
                self.background_url, err
            )),
        }
        // A cancelled download surfaces as an error above; re-raise it here
        // instead of letting it pass as a background-map warning.
        self.cancel.check()?;
        Ok(())
    }
}
