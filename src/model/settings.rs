use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserSettings {
    pub operator: String,
    pub storage_url: String,
    pub storage_key: String,
    /// URL template for the background map. May contain `{year}`.
    pub background_url: String,
    pub file_folder: PathBuf,
    pub output_folder: PathBuf,
}

impl UserSettings {
    // Missing user settings are a precondition failure: no run starts
    // without them.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("missing user settings: no file at {}", path.display()));
        }
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
    }

    pub fn background_url_for_year(&self, year: i32) -> String {
        self.background_url.replace("{year}", &year.to_string())
    }

    pub fn background_file_name(&self) -> String {
        self.background_url
            .rsplit('/')
            .next()
            .unwrap_or(self.background_url.as_str())
            .trim()
            .to_string()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub table: String,
    pub id_column: String,
}

// Table order matters: merges run and report in declaration order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncSettings {
    pub db_name: String,
    pub environment: String,
    pub layer_definitions: Vec<LayerDefinition>,
    pub changed_status_filename: String,
    pub changed_project_status_filename: String,
}

impl SyncSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        let layer = |table: &str, id_column: &str| LayerDefinition {
            table: table.to_string(),
            id_column: id_column.to_string(),
        };
        Self {
            db_name: "oslo_offline.db".to_string(),
            environment: "prod".to_string(),
            layer_definitions: vec![
                layer("Bestillinger", "lsid"),
                layer("Prosjekt", "GlobalID"),
                layer("Kum", "psid"),
                layer("Vannledning", "lsid"),
                layer("Avløpsledning", "lsid"),
            ],
            changed_status_filename: "changed_status.csv".to_string(),
            changed_project_status_filename: "changed_project_status.csv".to_string(),
        }
    }
}
