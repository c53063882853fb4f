//! Keeps the raw bytes of each downloaded export on disk, one file per run,
//! so a bad run can be replayed or inspected without re-exporting.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

/// Hex characters of the content digest kept in the file name. Enough to
/// tell payloads apart; the archive is not a content-addressed store.
const DIGEST_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct ExportArchive {
    root: PathBuf,
}

impl ExportArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(
        fetched_at: DateTime<Utc>,
        job_id: &str,
        digest: &str,
        extension: &str,
    ) -> String {
        let stamp = fetched_at.format("%Y%m%dT%H%M%SZ");
        let ext = extension.trim_start_matches('.');
        let ext = if ext.is_empty() { "bin" } else { ext };
        format!("{stamp}_{job_id}.{digest}.{ext}")
    }

    /// Write one run's payload under the archive root. The file name carries
    /// the run timestamp, the job id and a short content digest, so saving
    /// the same bytes again finds the file already present and leaves it
    /// alone.
    pub async fn save(
        &self,
        fetched_at: DateTime<Utc>,
        job_id: &str,
        extension: &str,
        bytes: &[u8],
    ) -> anyhow::Result<PathBuf> {
        let digest = hex::encode(&Sha256::digest(bytes)[..DIGEST_LEN / 2]);
        let path = self
            .root
            .join(Self::file_name(fetched_at, job_id, &digest, extension));

        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating archive root {}", self.root.display()))?;

        if fs::try_exists(&path)
            .await
            .with_context(|| format!("probing {}", path.display()))?
        {
            debug!(path = %path.display(), "export payload already archived");
            return Ok(path);
        }

        fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}
