use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

// One CSV file per change kind; the header row is written once.
pub struct ChangeLog {
    path: PathBuf,
}

impl ChangeLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let has_content = fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false);
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open change log {}", self.path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(!has_content)
            .from_writer(file);
        writer.serialize(record).context("serialize change record")?;
        writer.flush().context("flush change log")?;
        Ok(())
    }

    // Malformed rows are skipped and reported through `warn`; the rest of
    // the file still applies.
    pub fn read<T: DeserializeOwned>(&self, warn: &mut dyn FnMut(String)) -> Result<Vec<T>> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("open change log {}", self.path.display()))?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            match row {
                Ok(record) => records.push(record),
                Err(err) => warn(format!(
                    "skipping malformed row in {}: {}",
                    self.path.display(),
                    err
                )),
            }
        }
        Ok(records)
    }

    pub fn clear(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("remove change log {}", self.path.display()))?;
        }
        Ok(())
    }
}
