use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const METADATA_FILE: &str = "metadata.json";
const BACKGROUND_VERSION_KEY: &str = "installed_background_version";

#[derive(Clone)]
pub struct LocalStore {
    folder: PathBuf,
    db_name: String,
    background_file: String,
}

impl LocalStore {
    pub fn open(folder: &Path, db_name: &str, background_file: &str) -> Result<Self> {
        fs::create_dir_all(folder)
            .with_context(|| format!("create working folder {}", folder.display()))?;
        Ok(Self {
            folder: folder.to_path_buf(),
            db_name: db_name.to_string(),
            background_file: background_file.to_string(),
        })
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.folder.join(&self.db_name)
    }

    // The downloaded remote snapshot lands at `<stem>_update.<ext>`.
    pub fn delta_path(&self) -> PathBuf {
        let base = self.baseline_path();
        match (base.file_stem(), base.extension()) {
            (Some(stem), Some(ext)) => self.folder.join(format!(
                "{}_update.{}",
                stem.to_string_lossy(),
                ext.to_string_lossy()
            )),
            _ => self.folder.join(format!("{}_update", self.db_name)),
        }
    }

    pub fn delta_blob_key(&self) -> String {
        let delta = self.delta_path();
        format!("latest/{}", delta.file_name().unwrap_or_default().to_string_lossy())
    }

    pub fn baseline_blob_key(&self) -> String {
        format!("latest/{}", self.db_name)
    }

    pub fn background_path(&self) -> PathBuf {
        self.folder.join(&self.background_file)
    }

    pub fn changelog_path(&self, file_name: &str) -> PathBuf {
        self.folder.join(file_name)
    }

    fn metadata_path(&self) -> PathBuf {
        self.folder.join(METADATA_FILE)
    }

    // A missing or empty metadata file means "never recorded", not an error.
    pub fn read_background_version(&self) -> Result<Option<String>> {
        let path = self.metadata_path();
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        let doc: serde_json::Value =
            serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))?;
        Ok(doc
            .get(BACKGROUND_VERSION_KEY)
            .and_then(|v| v.as_str())
            .map(|v| v.to_string()))
    }

    // Unrelated fields already in the metadata file are preserved.
    pub fn write_background_version(&self, version: &str) -> Result<()> {
        let path = self.metadata_path();
        let mut doc = if path.exists() {
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            if bytes.is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))?
            }
        } else {
            serde_json::Value::Object(serde_json::Map::new())
        };
        doc[BACKGROUND_VERSION_KEY] = serde_json::Value::String(version.to_string());
        let bytes = serde_json::to_vec_pretty(&doc).context("serialize metadata")?;
        write_atomic(&path, &bytes).context("write metadata.json")
    }
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create parent directories")?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, bytes).with_context(|| format!("write temp file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
