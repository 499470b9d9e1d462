use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

// Mapped field names and values, in output order (the consumer is
// line-order sensitive).
#[derive(Clone, Debug, Default)]
pub struct InspectionRecord {
    pub fields: Vec<(String, String)>,
}

impl InspectionRecord {
    pub fn push(&mut self, key: &str, value: &str) {
        self.fields.push((key.to_string(), value.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// Writes `<code>-<id>.txt` with an `[Inspection1]` section of `key=value`
// lines, no spaces around `=`.
pub fn write_inspection_file(output_folder: &Path, record: &InspectionRecord) -> Result<PathBuf> {
    let id = record
        .get("PipeID")
        .ok_or_else(|| anyhow!("inspection record is missing PipeID"))?;
    let code = record
        .get("PipeFeature")
        .ok_or_else(|| anyhow!("inspection record is missing PipeFeature"))?;

    fs::create_dir_all(output_folder)
        .with_context(|| format!("create output folder {}", output_folder.display()))?;

    let mut out = String::from("[Inspection1]\n");
    for (key, value) in &record.fields {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }

    let path = output_folder.join(format!("{}-{}.txt", code, id));
    fs::write(&path, out).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
