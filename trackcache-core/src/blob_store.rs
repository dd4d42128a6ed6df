//! Persistent key → bytes storage backing the disk tier.
//!
//! The disk tier only needs five operations from its storage; [`BlobStore`]
//! captures them so the LRU metadata logic can run against the filesystem
//! ([`FsBlobStore`]) or an in-process map ([`MemoryBlobStore`]).
//!
//! Stores report plain `io::Error`s. A missing key is not an error: `get`
//! returns `Ok(None)` and `delete` succeeds.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Size and modification time of one stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub key: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// One blob per key. Implementations are used under the owning tier's lock
/// and therefore need no internal synchronization of their own.
pub trait BlobStore: Send {
    /// Stores `bytes` under `key`, replacing any previous blob, and returns
    /// the stored size.
    fn put(&mut self, key: &str, bytes: &[u8]) -> io::Result<u64>;

    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>>;

    /// Deletes the blob; deleting a missing key succeeds.
    fn delete(&mut self, key: &str) -> io::Result<()>;

    fn list(&self) -> io::Result<Vec<BlobMeta>>;

    fn delete_all(&mut self) -> io::Result<()>;
}

const TEMP_SUFFIX: &str = ".tmp";

// Hex doubles the key length; stay under the common 255 byte name limit.
const MAX_PLAIN_KEY_BYTES: usize = 120;

const HASHED_PREFIX: &str = "sha256-";

// Little-endian key length in front of the key in hashed blobs.
const KEY_LEN_BYTES: usize = 8;

/// How a key maps onto a file in the store directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// File name is the hex key; the file holds only the blob.
    Plain,
    /// File name is the key's digest; the file starts with the key itself.
    Hashed,
}

/// Filesystem store keeping one file per key in a single directory.
///
/// Keys of 1 to 120 bytes are stored under the lowercase hex encoding of
/// their UTF-8 bytes, so any such key (including ones containing `/`, `..` or
/// NUL) maps to a safe, reversible name. The empty key and longer keys are
/// stored under `sha256-<digest>` with the key written in front of the blob,
/// which keeps them listable after a restart.
///
/// Writes land in a temporary file that is renamed over the target, so
/// readers never observe a partial blob. Files the store did not name are
/// left alone by every operation, including `delete_all`.
#[derive(Debug)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Opens (creating if needed) the store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn layout_of(key: &str) -> Layout {
        if key.is_empty() || key.len() > MAX_PLAIN_KEY_BYTES {
            Layout::Hashed
        } else {
            Layout::Plain
        }
    }

    fn file_name(key: &str) -> String {
        match Self::layout_of(key) {
            Layout::Plain => hex::encode(key.as_bytes()),
            Layout::Hashed => {
                let digest = Sha256::digest(key.as_bytes());
                format!("{HASHED_PREFIX}{}", hex::encode(digest))
            }
        }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }

    /// Recovers the key behind a plain file name.
    fn plain_key(name: &str) -> Option<String> {
        let key = String::from_utf8(hex::decode(name).ok()?).ok()?;
        (Self::layout_of(&key) == Layout::Plain).then_some(key)
    }

    fn is_hashed_name(name: &str) -> bool {
        name.strip_prefix(HASHED_PREFIX).map_or(false, |digest| {
            digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit())
        })
    }

    /// Whether `name` is a blob or temporary file written by this store.
    fn is_store_file(name: &str) -> bool {
        let blob = name.strip_suffix(TEMP_SUFFIX).unwrap_or(name);
        Self::is_hashed_name(blob) || Self::plain_key(blob).is_some()
    }

    fn key_header(key: &str) -> Vec<u8> {
        let mut header = Vec::with_capacity(KEY_LEN_BYTES + key.len());
        header.extend_from_slice(&(key.len() as u64).to_le_bytes());
        header.extend_from_slice(key.as_bytes());
        header
    }

    /// Splits a hashed blob into its stored key and payload.
    fn split_key_header(bytes: &[u8]) -> io::Result<(&str, &[u8])> {
        if bytes.len() < KEY_LEN_BYTES {
            return Err(malformed_header());
        }
        let (len, rest) = bytes.split_at(KEY_LEN_BYTES);
        let mut len_bytes = [0u8; KEY_LEN_BYTES];
        len_bytes.copy_from_slice(len);
        let key_len = usize::try_from(u64::from_le_bytes(len_bytes))
            .map_err(|_| malformed_header())?;
        if key_len > rest.len() {
            return Err(malformed_header());
        }
        let (key, payload) = rest.split_at(key_len);
        let key = std::str::from_utf8(key).map_err(|_| malformed_header())?;
        Ok((key, payload))
    }

    /// Reads only the key header of a hashed blob of `file_len` bytes.
    fn read_key_header(path: &Path, file_len: u64) -> io::Result<(String, u64)> {
        let mut file = fs::File::open(path)?;
        let mut len_bytes = [0u8; KEY_LEN_BYTES];
        file.read_exact(&mut len_bytes)?;
        let key_len = u64::from_le_bytes(len_bytes);
        let header_len = key_len
            .checked_add(KEY_LEN_BYTES as u64)
            .filter(|header_len| *header_len <= file_len)
            .ok_or_else(malformed_header)?;
        let mut key = vec![0u8; usize::try_from(key_len).map_err(|_| malformed_header())?];
        file.read_exact(&mut key)?;
        let key = String::from_utf8(key).map_err(|_| malformed_header())?;
        Ok((key, header_len))
    }
}

fn malformed_header() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "malformed blob key header")
}

impl BlobStore for FsBlobStore {
    fn put(&mut self, key: &str, bytes: &[u8]) -> io::Result<u64> {
        let path = self.blob_path(key);
        let mut temp = path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        let written = (|| {
            let mut file = fs::File::create(&temp)?;
            if Self::layout_of(key) == Layout::Hashed {
                file.write_all(&Self::key_header(key))?;
            }
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp, &path)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        Ok(bytes.len() as u64)
    }

    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let bytes = match fs::read(self.blob_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        match Self::layout_of(key) {
            Layout::Plain => Ok(Some(bytes)),
            Layout::Hashed => {
                let (stored_key, payload) = Self::split_key_header(&bytes)?;
                // A different key under the same digest is not this key's blob.
                Ok((stored_key == key).then(|| payload.to_vec()))
            }
        }
    }

    fn delete(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.blob_path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn list(&self) -> io::Result<Vec<BlobMeta>> {
        let mut blobs = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            let metadata = dir_entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let file_name = dir_entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            let (key, size) = if Self::is_hashed_name(name) {
                match Self::read_key_header(&dir_entry.path(), metadata.len()) {
                    Ok((key, header_len)) => (key, metadata.len() - header_len),
                    Err(e) => {
                        warn!(file = name, error = %e, "skipping blob with unreadable key header");
                        continue;
                    }
                }
            } else if let Some(key) = Self::plain_key(name) {
                (key, metadata.len())
            } else {
                continue;
            };

            blobs.push(BlobMeta {
                key,
                size,
                modified: metadata.modified()?,
            });
        }
        Ok(blobs)
    }

    fn delete_all(&mut self) -> io::Result<()> {
        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            let owned = dir_entry
                .file_name()
                .to_str()
                .map_or(false, Self::is_store_file);
            if !owned || !dir_entry.file_type()?.is_file() {
                continue;
            }
            match fs::remove_file(dir_entry.path()) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryBlobs {
    blobs: HashMap<String, (Vec<u8>, SystemTime)>,
    failing_deletes: HashSet<String>,
    fail_all_deletes: bool,
    fail_reads: bool,
}

/// In-process [`BlobStore`] with controllable modification times and
/// injectable failures.
///
/// Clones share the same contents, so a handle kept outside a
/// [`DiskTier`](crate::DiskTier) can inspect or sabotage its storage, and a
/// second tier opened on a clone behaves like a process restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<MemoryBlobs>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a blob with an explicit modification time.
    pub fn insert_with_mtime(&self, key: &str, bytes: &[u8], modified: SystemTime) {
        self.inner
            .lock()
            .blobs
            .insert(key.to_string(), (bytes.to_vec(), modified));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().blobs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes a blob behind the owning tier's back.
    pub fn remove_externally(&self, key: &str) {
        self.inner.lock().blobs.remove(key);
    }

    /// Makes every `delete` of `key` fail until cleared.
    pub fn fail_delete_of(&self, key: &str) {
        self.inner.lock().failing_deletes.insert(key.to_string());
    }

    /// Makes `delete` and `delete_all` fail for every key.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.inner.lock().fail_all_deletes = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.failing_deletes.clear();
        inner.fail_all_deletes = false;
        inner.fail_reads = false;
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {what} failure"))
}

impl BlobStore for MemoryBlobStore {
    fn put(&mut self, key: &str, bytes: &[u8]) -> io::Result<u64> {
        self.insert_with_mtime(key, bytes, SystemTime::now());
        Ok(bytes.len() as u64)
    }

    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let inner = self.inner.lock();
        if inner.fail_reads {
            return Err(injected("read"));
        }
        Ok(inner.blobs.get(key).map(|(bytes, _)| bytes.clone()))
    }

    fn delete(&mut self, key: &str) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_all_deletes || inner.failing_deletes.contains(key) {
            return Err(injected("delete"));
        }
        inner.blobs.remove(key);
        Ok(())
    }

    fn list(&self) -> io::Result<Vec<BlobMeta>> {
        let inner = self.inner.lock();
        Ok(inner
            .blobs
            .iter()
            .map(|(key, (bytes, modified))| BlobMeta {
                key: key.clone(),
                size: bytes.len() as u64,
                modified: *modified,
            })
            .collect())
    }

    fn delete_all(&mut self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_all_deletes {
            return Err(injected("delete_all"));
        }
        inner.blobs.clear();
        Ok(())
    }
}
