use super::*;

pub(super) const KEY_HEADER: &str = "x-storage-key";

impl RemoteClient {
    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub(super) fn blob_url(&self, container: &str, key: &str) -> String {
        self.url(&format!("/containers/{}/blobs/{}", container, key))
    }

    pub(super) fn key(&self) -> &str {
        &self.config.account_key
    }

    pub(super) fn ensure_ok(
        &self,
        resp: reqwest::blocking::Response,
        label: &str,
    ) -> Result<reqwest::blocking::Response> {
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED
            || resp.status() == reqwest::StatusCode::FORBIDDEN
        {
            anyhow::bail!(
                "storage rejected the account key ({}); check the key in the user settings",
                label
            );
        }
        resp.error_for_status()
            .with_context(|| format!("{} status", label))
    }
}
