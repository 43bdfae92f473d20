//! File-backed adapter.
//!
//! Each key is stored as its own file in the data directory. Keys are
//! percent-encoded into file names so any key is a valid, flat file name.
//! Encoded names longer than [`MAX_FILE_STEM`] bytes are replaced by the
//! SHA-256 of the encoded key, and the encoded key is written as the first
//! line of the file so [`FileAdapter::list_keys`] can still recover it.
//!
//! Storage layout:
//! ```text
//! ~/.local/share/calai/
//! ├── meals.kv
//! ├── profile.kv
//! ├── settings.kv
//! ├── sync_queue.kv
//! ├── cache%3Afoods.kv
//! └── 3f1c...e9.kvh
//! ```

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::KvAdapter;
use crate::error::KvError;

/// File extension for stored values.
const VALUE_EXTENSION: &str = "kv";

/// File extension for values stored under a hashed name.
const HASHED_EXTENSION: &str = "kvh";

/// Longest encoded key used as a file name as is. Leaves room for the
/// temporary file suffix within the usual 255 byte name limit.
const MAX_FILE_STEM: usize = 180;

/// `ENOSPC` on Linux and macOS.
const ENOSPC: i32 = 28;

/// Adapter storing one file per key.
///
/// Writes go to a uniquely named temporary file that is flushed to disk and
/// then renamed over the target. On Unix the directory is synced after the
/// rename, so once `set` returns the new value survives a power loss, and a
/// crash before that leaves the old value.
#[derive(Clone, Debug)]
pub struct FileAdapter {
    data_dir: PathBuf,
}

enum FileName {
    Plain(PathBuf),
    /// Hashed path plus the encoded key stored as its header line.
    Hashed(PathBuf, String),
}

impl FileName {
    fn path(&self) -> &Path {
        match self {
            FileName::Plain(path) | FileName::Hashed(path, _) => path.as_path(),
        }
    }
}

impl FileAdapter {
    /// Creates an adapter rooted at `data_dir`. The directory is created on
    /// first write.
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the file path holding `key`.
    pub fn path(&self, key: &str) -> PathBuf {
        self.file_name(key).path().to_path_buf()
    }

    fn file_name(&self, key: &str) -> FileName {
        let encoded = urlencoding::encode(key);
        if encoded.len() <= MAX_FILE_STEM {
            return FileName::Plain(
                self.data_dir
                    .join(format!("{}.{}", encoded, VALUE_EXTENSION)),
            );
        }

        let digest = Sha256::digest(encoded.as_bytes());
        FileName::Hashed(
            self.data_dir
                .join(format!("{:x}.{}", digest, HASHED_EXTENSION)),
            encoded.into_owned(),
        )
    }
}

fn io_error(path: &Path, e: io::Error) -> KvError {
    if e.raw_os_error() == Some(ENOSPC) {
        KvError::Full
    } else {
        KvError::Unavailable(format!("{}: {}", path.display(), e))
    }
}

/// Splits a hashed file into its header line and the value.
fn split_header(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let newline = bytes.iter().position(|b| *b == b'\n')?;
    Some((&bytes[..newline], &bytes[newline + 1..]))
}

async fn write_synced(path: &Path, chunks: &[&[u8]]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    for chunk in chunks {
        file.write_all(chunk).await?;
    }
    file.sync_all().await
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[async_trait]
impl KvAdapter for FileAdapter {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let name = self.file_name(key);
        let path = name.path();

        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, e)),
        };

        match &name {
            FileName::Plain(_) => Ok(Some(bytes)),
            FileName::Hashed(_, encoded) => match split_header(&bytes) {
                Some((header, value)) if header == encoded.as_bytes() => Ok(Some(value.to_vec())),
                _ => {
                    tracing::warn!(path = %path.display(), "hashed file belongs to another key");
                    Ok(None)
                }
            },
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| io_error(&self.data_dir, e))?;

        let name = self.file_name(key);
        let path = name.path();
        let tmp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4()));

        let written = match &name {
            FileName::Plain(_) => write_synced(&tmp_path, &[value]).await,
            FileName::Hashed(_, encoded) => {
                write_synced(&tmp_path, &[encoded.as_bytes(), b"\n", value]).await
            }
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(io_error(&tmp_path, e));
        }

        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(io_error(path, e));
        }

        sync_dir(&self.data_dir)
            .await
            .map_err(|e| io_error(&self.data_dir, e))
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        let path = self.path(key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let mut entries = match fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.data_dir, e)),
        };

        let mut keys = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.data_dir, e))?
        {
            let path = entry.path();

            // Skips temp files and anything else not written by this adapter
            let encoded = match path.extension().and_then(|s| s.to_str()) {
                Some(VALUE_EXTENSION) => match path.file_stem().and_then(|s| s.to_str()) {
                    Some(stem) => stem.to_string(),
                    None => continue,
                },
                Some(HASHED_EXTENSION) => {
                    let bytes = match fs::read(&path).await {
                        Ok(bytes) => bytes,
                        // Removed since the directory was read
                        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(io_error(&path, e)),
                    };
                    match split_header(&bytes).map(|(header, _)| String::from_utf8_lossy(header)) {
                        Some(header) => header.into_owned(),
                        None => continue,
                    }
                }
                _ => continue,
            };

            if let Ok(key) = urlencoding::decode(&encoded) {
                if key.starts_with(prefix) {
                    keys.push(key.into_owned());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
