//! Append-only spool files, one per property.
//!
//! A spool file is a concatenation of records, each a little-endian `u32`
//! payload length followed by the payload. Readers keep every complete
//! record and stop at a truncated tail.

use std::path::{Path, PathBuf};

use engine_core::{Error, Result};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub const SPOOL_EXTENSION: &str = "spool";

const HEADER_LEN: usize = 4;

pub struct Spool {
    dir: PathBuf,
}

impl Spool {
    /// Uses `dir`, creating it when missing.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            Error::config(format!(
                "Failed to create spool directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, property_id: &str) -> Result<PathBuf> {
        // Separators and NUL cannot appear in a file name
        if property_id.is_empty() || property_id.contains(['/', '\\', '\0']) {
            return Err(Error::internal(format!(
                "Property id {:?} cannot name a spool file",
                property_id
            )));
        }
        Ok(self
            .dir
            .join(format!("property_{}.{}", property_id, SPOOL_EXTENSION)))
    }

    /// Appends one framed record to the property's spool file and syncs it.
    pub async fn append(&self, property_id: &str, payload: &[u8]) -> Result<PathBuf> {
        let len = u32::try_from(payload.len()).map_err(|_| {
            Error::encoding(format!(
                "Payload of {} bytes does not fit a spool record",
                payload.len()
            ))
        })?;
        let path = self.path_for(property_id)?;

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o644);
        let mut file = options.open(&path).await?;

        file.write_all(&len.to_le_bytes()).await?;
        file.write_all(payload).await?;
        file.sync_all().await?;
        Ok(path)
    }

    /// Spool files currently on disk, sorted by path.
    pub async fn files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_spool = path
                .extension()
                .is_some_and(|ext| ext == SPOOL_EXTENSION);
            if is_spool && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Reads every complete record of the spool file at `path`.
pub async fn read_records(path: &Path) -> Result<Vec<Vec<u8>>> {
    let bytes = fs::read(path).await?;
    Ok(parse_records(&bytes, path))
}

fn parse_records(bytes: &[u8], path: &Path) -> Vec<Vec<u8>> {
    let mut records = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let Some((header, body)) = rest.split_first_chunk::<HEADER_LEN>() else {
            warn!(path = %path.display(), "Truncated spool record header, stopping read");
            break;
        };
        let len = u32::from_le_bytes(*header) as usize;
        if body.len() < len {
            warn!(
                path = %path.display(),
                expected = len,
                available = body.len(),
                "Truncated spool record payload, stopping read"
            );
            break;
        }
        let (payload, tail) = body.split_at(len);
        records.push(payload.to_vec());
        rest = tail;
    }
    records
}
