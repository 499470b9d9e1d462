use anyhow::Result;

mod fetch;
mod merge;
pub use self::fetch::SnapshotFetcher;
pub use self::merge::MergeEngine;

use crate::changelog::ChangeLog;
use crate::dataset::Dataset;
use crate::model::{
    ProjectStatusChange, SegmentStatusChange, SyncSettings, UserSettings, current_year,
};
use crate::remote::RemoteClient;
use crate::store::LocalStore;
use crate::worker::CancelFlag;

// Signal ordering is the pipeline's execution order; the terminal outcome is
// the returned `Result`, reported exactly once by the worker layer.
pub trait SyncObserver {
    fn on_progress(&mut self, pct: u8);
    fn on_process_name(&mut self, name: &str);
    fn on_info(&mut self, msg: &str);
    fn on_warning(&mut self, msg: &str);
}

// A progress value outside 0..=100 is reported as a warning and dropped.
pub fn report_progress(obs: &mut dyn SyncObserver, pct: u8) {
    if pct > 100 {
        obs.on_warning(&format!("progress outside legal range: {}", pct));
        return;
    }
    obs.on_progress(pct);
}

pub struct SyncOrchestrator<'a> {
    store: &'a LocalStore,
    remote: &'a RemoteClient,
    settings: &'a SyncSettings,
    background_url: String,
    app_version: String,
    cancel: &'a CancelFlag,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        store: &'a LocalStore,
        remote: &'a RemoteClient,
        settings: &'a SyncSettings,
        user: &UserSettings,
        app_version: &str,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            store,
            remote,
            settings,
            background_url: user.background_url_for_year(current_year()),
            app_version: app_version.to_string(),
            cancel,
        }
    }

    pub fn sync_now(&self, obs: &mut dyn SyncObserver) -> Result<()> {
        let fetcher = SnapshotFetcher::new(
            self.store,
            self.remote,
            &self.background_url,
            &self.app_version,
            self.cancel,
        );
        fetcher.fetch(obs)?;

        let (segment_changes, project_changes) = self.pending_changes(obs)?;
        let engine = MergeEngine::new(
            self.store.baseline_path(),
            self.store.delta_path(),
            segment_changes,
            project_changes,
        );

        if !engine.needs_merge()? {
            obs.on_info("Dataset is unchanged; nothing to merge");
            return Ok(());
        }

        let mut local = Dataset::open(&self.store.baseline_path())?;
        let delta = Dataset::open(&self.store.delta_path())?;
        for def in &self.settings.layer_definitions {
            self.cancel.check()?;
            obs.on_process_name(&format!("Updating layer {}...", def.table));
            report_progress(obs, 0);
            engine.merge_table(&mut local, &delta, &def.table, &def.id_column, obs)?;
            report_progress(obs, 100);
        }
        Ok(())
    }

    fn pending_changes(
        &self,
        obs: &mut dyn SyncObserver,
    ) -> Result<(Vec<SegmentStatusChange>, Vec<ProjectStatusChange>)> {
        let mut warnings = Vec::new();
        let segment_log = ChangeLog::new(
            &self
                .store
                .changelog_path(&self.settings.changed_status_filename),
        );
        let segment_changes = segment_log.read(&mut |w| warnings.push(w))?;
        let project_log = ChangeLog::new(
            &self
                .store
                .changelog_path(&self.settings.changed_project_status_filename),
        );
        let project_changes = project_log.read(&mut |w| warnings.push(w))?;
        for w in warnings {
            obs.on_warning(&w);
        }
        Ok((segment_changes, project_changes))
    }
}
