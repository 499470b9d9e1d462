use serde::{Deserialize, Serialize};

/// One ledger row recording a fully committed batch upload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerRow {
    pub partition_key: String,
    pub row_key: String,
    pub dir_name: String,
    pub upload_time: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerRows {
    pub rows: Vec<LedgerRow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitBlockList {
    pub block_ids: Vec<String>,
}
