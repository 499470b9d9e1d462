use super::http_client::KEY_HEADER;
use super::*;
use crate::model::now_rfc3339;

impl RemoteClient {
    // The ledger is small; fetching the partition and filtering client-side
    // is the intended access pattern.
    pub fn has_been_uploaded(&self, batch_name: &str) -> Result<bool> {
        let resp = self
            .client
            .get(self.url(&format!("/tables/uploads/{}", self.config.environment)))
            .header(KEY_HEADER, self.key())
            .send()
            .context("query upload ledger")?;
        let resp = self.ensure_ok(resp, "query upload ledger")?;
        let rows: LedgerRows = resp.json().context("parse upload ledger")?;
        Ok(rows.rows.iter().any(|r| r.dir_name == batch_name))
    }

    // Append-only: once recorded, every later membership check returns true.
    pub fn record_upload(&self, batch_name: &str) -> Result<()> {
        let row = LedgerRow {
            partition_key: self.config.environment.clone(),
            row_key: uuid::Uuid::new_v4().to_string(),
            dir_name: batch_name.to_string(),
            upload_time: now_rfc3339()?,
        };
        let resp = self
            .client
            .post(self.url("/tables/uploads"))
            .header(KEY_HEADER, self.key())
            .json(&row)
            .send()
            .context("append upload ledger row")?;
        self.ensure_ok(resp, "append upload ledger row")?;
        Ok(())
    }
}
