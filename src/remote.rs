use std::time::Duration;

use anyhow::{Context, Result};

mod http_client;
mod ledger;
mod transfer;
mod types;
pub use self::types::*;

/// Container holding the authoritative snapshot files (read-only).
pub const SECURE_CONTAINER: &str = "offline-secure";
/// Container inspection batches and status-change files are uploaded to.
pub const FILES_CONTAINER: &str = "inspection-files";

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub base_url: String,
    pub account_key: String,
    /// Ledger partition and upload path prefix ("prod" / "test").
    pub environment: String,
}

// Transport failures propagate to the caller; retry policy lives there.
pub struct RemoteClient {
    config: StorageConfig,
    client: reqwest::blocking::Client,
}

impl RemoteClient {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("rorsync")
            .timeout(Duration::from_secs(120))
            .build()
            .context("build http client")?;
        Ok(Self { config, client })
    }

    pub fn environment(&self) -> &str {
        &self.config.environment
    }
}
