//! JSON file-per-key store with atomic writes.

use super::{Store, StoreKey};
use crate::error::GridResult;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> GridResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &StoreKey) -> PathBuf {
        // Symbols contain '/', which cannot appear in a file name.
        let symbol = key.symbol.replace('/', "_");
        self.root
            .join(format!("{}.{}.{}.json", key.exchange, key.label, symbol))
    }
}

impl Store for FileStore {
    fn get(&self, key: &StoreKey) -> GridResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &StoreKey, value: &[u8]) -> GridResult<()> {
        // Write to a temp file first, then rename, so a crash mid-write never
        // leaves a truncated record behind.
        let path = self.path_for(key);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> GridResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
