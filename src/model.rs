use anyhow::{Context, Result};

mod change;
mod settings;

pub use self::change::{ProjectStatusChange, SegmentStatusChange, Status};
pub use self::settings::{LayerDefinition, SyncSettings, UserSettings};

pub fn now_rfc3339() -> Result<String> {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("format timestamp")
}

pub fn current_year() -> i32 {
    time::OffsetDateTime::now_utc().year()
}
