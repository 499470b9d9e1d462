use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

mod row;
pub use self::row::{FieldValue, Row};

use crate::store::write_atomic;

// Row ids are dense, reassigned on every replace, and carry no remote meaning.
pub struct Dataset {
    path: PathBuf,
    doc: DatasetDoc,
}

#[derive(Default, Serialize, Deserialize)]
struct DatasetDoc {
    version: u32,
    tables: BTreeMap<String, Vec<Row>>,
}

impl Dataset {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read dataset {}", path.display()))?;
        let doc: DatasetDoc = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse dataset {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    pub fn init(path: &Path) -> Result<Self> {
        let doc = DatasetDoc {
            version: 1,
            tables: BTreeMap::new(),
        };
        let ds = Self {
            path: path.to_path_buf(),
            doc,
        };
        ds.flush()?;
        Ok(ds)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // An unknown table reads as empty.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.doc.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    // `&mut self` enforces the single-writer rule: one session at a time.
    pub fn edit<'a>(&'a mut self, table: &str) -> TableEdit<'a> {
        TableEdit {
            dataset: self,
            table: table.to_string(),
            staged: None,
        }
    }

    fn flush(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.doc).context("serialize dataset")?;
        write_atomic(&self.path, &bytes)
            .with_context(|| format!("write dataset {}", self.path.display()))
    }
}

// Nothing touches the file until `commit`; dropping the session rolls back.
pub struct TableEdit<'a> {
    dataset: &'a mut Dataset,
    table: String,
    staged: Option<Vec<Row>>,
}

impl<'a> TableEdit<'a> {
    pub fn replace_all(&mut self, rows: Vec<Row>) {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                row.id = i as u64;
                row
            })
            .collect();
        self.staged = Some(rows);
    }

    pub fn commit(self) -> Result<()> {
        if let Some(rows) = self.staged {
            self.dataset.doc.tables.insert(self.table.clone(), rows);
        }
        self.dataset.flush()
    }
}
