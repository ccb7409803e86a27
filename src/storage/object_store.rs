//! On-disk blob store for logged artifacts.

use crate::error::{RegflowError, Result};
use crate::storage::ContentAddress;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Content-addressed object store.
///
/// Blobs are sharded by the first byte of their BLAKE3 hash:
/// ```text
/// objects/
/// ├── d7/
/// │   └── d74981ef...
/// └── ...
/// ```
#[derive(Debug)]
pub struct ObjectStore {
    base_path: PathBuf,
}

impl ObjectStore {
    /// Create (or reuse) an object store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Open an existing object store.
    ///
    /// # Errors
    ///
    /// Returns [`RegflowError::NotInitialized`] if the path doesn't exist.
    pub fn open<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        if !base_path.is_dir() {
            return Err(RegflowError::NotInitialized(base_path));
        }
        Ok(Self { base_path })
    }

    /// Store bytes and return their content address. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn put(&self, data: &[u8]) -> Result<ContentAddress> {
        let addr = ContentAddress::from_bytes(data);
        let path = self.object_path(&addr);
        if path.exists() {
            debug!(hash = %addr.hash_hex(), "object already stored");
            return Ok(addr);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write via temp file so a crash never leaves a truncated blob under its hash
        let temp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            writer.write_all(data)?;
            writer.flush()?;
        }
        fs::rename(&temp_path, &path)?;

        debug!(hash = %addr.hash_hex(), size = addr.size(), "stored object");
        Ok(addr)
    }

    /// Read a blob back, verifying its hash.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent and `HashMismatch` if the blob was altered on disk.
    pub fn get(&self, addr: &ContentAddress) -> Result<Vec<u8>> {
        let path = self.object_path(addr);
        if !path.exists() {
            return Err(RegflowError::not_found("object", addr.hash_hex()));
        }

        let data = fs::read(&path)?;
        if !addr.verify(&data) {
            return Err(RegflowError::HashMismatch {
                expected: addr.hash_hex(),
                actual: ContentAddress::from_bytes(&data).hash_hex(),
            });
        }
        Ok(data)
    }

    /// Check if an object exists.
    #[must_use]
    pub fn exists(&self, addr: &ContentAddress) -> bool {
        self.object_path(addr).exists()
    }

    /// Number of stored objects and their total size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn usage(&self) -> Result<(usize, u64)> {
        let mut count = 0;
        let mut total = 0u64;

        for shard in fs::read_dir(&self.base_path)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                let is_temp = entry.path().extension().is_some_and(|ext| ext == "tmp");
                if entry.file_type()?.is_file() && !is_temp {
                    count += 1;
                    total += entry.metadata()?.len();
                }
            }
        }

        Ok((count, total))
    }

    fn object_path(&self, addr: &ContentAddress) -> PathBuf {
        self.base_path
            .join(addr.storage_prefix())
            .join(addr.hash_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_and_get() {
        let (_dir, store) = setup();
        let addr = store.put(b"hello world").unwrap();
        assert_eq!(addr.size(), 11);
        assert!(store.exists(&addr));
        assert_eq!(store.get(&addr).unwrap(), b"hello world");
    }

    #[test]
    fn test_get_not_found() {
        let (_dir, store) = setup();
        let addr = ContentAddress::from_bytes(b"nonexistent");
        assert!(matches!(
            store.get(&addr),
            Err(RegflowError::NotFound { .. })
        ));
    }

    #[test]
    fn test_tampered_object_detected() {
        let (dir, store) = setup();
        let addr = store.put(b"weights").unwrap();
        let path = dir
            .path()
            .join("objects")
            .join(addr.storage_prefix())
            .join(addr.hash_hex());
        std::fs::write(path, b"WEIGHTS").unwrap();

        assert!(matches!(
            store.get(&addr),
            Err(RegflowError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_usage() {
        let (_dir, store) = setup();
        store.put(b"12345").unwrap();
        store.put(b"67890").unwrap();
        store.put(b"12345").unwrap();

        assert_eq!(store.usage().unwrap(), (2, 10));
    }

    #[test]
    fn test_open_nonexistent() {
        let dir = TempDir::new().unwrap();
        let result = ObjectStore::open(dir.path().join("missing"));
        assert!(matches!(result, Err(RegflowError::NotInitialized(_))));
    }

    proptest! {
        #[test]
        fn prop_put_is_idempotent(data: Vec<u8>) {
            let (_dir, store) = setup();
            let addr1 = store.put(&data).unwrap();
            let addr2 = store.put(&data).unwrap();
            prop_assert_eq!(&addr1, &addr2);
            prop_assert_eq!(store.usage().unwrap().0, 1);
            prop_assert_eq!(store.get(&addr1).unwrap(), data);
        }
    }
}
