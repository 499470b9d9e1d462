use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use super::http_client::KEY_HEADER;
use super::*;
use crate::worker::CancelFlag;

pub const UPLOAD_CHUNK_SIZE: usize = 4 * 1024 * 1024;

// Floor on the download chunk size so tiny files never degenerate to
// zero-byte reads.
const MIN_DOWNLOAD_CHUNK: u64 = 64 * 1024;

impl RemoteClient {
    // Streams in ~1% chunks; progress is monotone and ends at exactly 100.
    pub fn download_blob(
        &self,
        container: &str,
        key: &str,
        dest: &Path,
        progress: &mut dyn FnMut(u8),
        cancel: &CancelFlag,
    ) -> Result<()> {
        let resp = self
            .client
            .get(self.blob_url(container, key))
            .header(KEY_HEADER, self.key())
            .send()
            .with_context(|| format!("request blob {}", key))?;
        let resp = self.ensure_ok(resp, "download blob")?;
        stream_to_file(resp, dest, progress, cancel)
    }

    // Same streaming loop against a plain HTTP URL (the background map).
    pub fn download_url(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn FnMut(u8),
        cancel: &CancelFlag,
    ) -> Result<()> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request {}", url))?;
        let resp = resp
            .error_for_status()
            .with_context(|| format!("download {}", url))?;
        stream_to_file(resp, dest, progress, cancel)
    }

    // Commits the accumulated block list after every chunk, so a crash
    // mid-upload leaves a committed truncated object and the next run
    // rewrites it from scratch.
    pub fn upload_file(
        &self,
        src: &Path,
        container: &str,
        key: &str,
        progress: &mut dyn FnMut(u8),
        cancel: &CancelFlag,
    ) -> Result<()> {
        let size = fs::metadata(src)
            .with_context(|| format!("stat {}", src.display()))?
            .len();
        let mut file =
            File::open(src).with_context(|| format!("open {}", src.display()))?;
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut block_ids: Vec<String> = Vec::new();
        let mut sent: u64 = 0;

        loop {
            cancel.check()?;
            let n = read_full(&mut file, &mut buf)
                .with_context(|| format!("read {}", src.display()))?;
            if n == 0 {
                break;
            }
            let block_id = uuid::Uuid::new_v4().to_string();
            let resp = self
                .client
                .put(format!("{}/blocks/{}", self.blob_url(container, key), block_id))
                .header(KEY_HEADER, self.key())
                .body(buf[..n].to_vec())
                .send()
                .with_context(|| format!("stage block for {}", key))?;
            self.ensure_ok(resp, "stage block")?;
            block_ids.push(block_id);
            self.commit_blocks(container, key, &block_ids)?;

            sent += n as u64;
            let pct = ((sent * 100) / size).min(100) as u8;
            progress(pct);
        }

        if block_ids.is_empty() {
            // Zero-byte file: still commit so the blob exists remotely.
            self.commit_blocks(container, key, &block_ids)?;
            progress(100);
        }
        Ok(())
    }

    pub fn upload_bytes(&self, bytes: &[u8], container: &str, key: &str) -> Result<()> {
        let block_id = uuid::Uuid::new_v4().to_string();
        let resp = self
            .client
            .put(format!("{}/blocks/{}", self.blob_url(container, key), block_id))
            .header(KEY_HEADER, self.key())
            .body(bytes.to_vec())
            .send()
            .with_context(|| format!("stage block for {}", key))?;
        self.ensure_ok(resp, "stage block")?;
        self.commit_blocks(container, key, &[block_id])
    }

    fn commit_blocks(&self, container: &str, key: &str, block_ids: &[String]) -> Result<()> {
        let resp = self
            .client
            .put(format!("{}/blocklist", self.blob_url(container, key)))
            .header(KEY_HEADER, self.key())
            .json(&CommitBlockList {
                block_ids: block_ids.to_vec(),
            })
            .send()
            .with_context(|| format!("commit block list for {}", key))?;
        self.ensure_ok(resp, "commit block list")?;
        Ok(())
    }
}

// The final path only ever holds a complete download. An interrupted or
// cancelled stream leaves nothing behind, so the next run re-fetches instead
// of tripping over a truncated file.
fn stream_to_file(
    resp: reqwest::blocking::Response,
    dest: &Path,
    progress: &mut dyn FnMut(u8),
    cancel: &CancelFlag,
) -> Result<()> {
    let tmp = dest.with_extension(format!("tmp.{}", std::process::id()));
    if let Err(err) = stream_to_path(resp, &tmp, progress, cancel) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, dest)
        .with_context(|| format!("rename {} -> {}", tmp.display(), dest.display()))?;
    progress(100);
    Ok(())
}

fn stream_to_path(
    mut resp: reqwest::blocking::Response,
    dest: &Path,
    progress: &mut dyn FnMut(u8),
    cancel: &CancelFlag,
) -> Result<()> {
    let total = resp.content_length().unwrap_or(0);
    let chunk = (total / 100).max(MIN_DOWNLOAD_CHUNK) as usize;

    let mut file =
        File::create(dest).with_context(|| format!("create {}", dest.display()))?;
    let mut buf = vec![0u8; chunk];
    let mut written: u64 = 0;
    let mut last_pct: u8 = 0;

    loop {
        cancel.check()?;
        let n = read_full(&mut resp, &mut buf).context("read response chunk")?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .with_context(|| format!("write {}", dest.display()))?;
        written += n as u64;
        if total > 0 {
            let pct = ((written * 100) / total).min(99) as u8;
            if pct > last_pct {
                last_pct = pct;
                progress(pct);
            }
        }
    }
    file.flush()
        .with_context(|| format!("flush {}", dest.display()))
}

// Reads until `buf` is full or the stream ends.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
