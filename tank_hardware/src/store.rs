//! Record stores: in-memory for simulation and tests, one-file-per-record on
//! disk for real installs.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tank_traits::{BoxError, RecordStore};

use crate::error::HwError;

/// Write `bytes` to `path` through a temp file and rename, so a crash leaves
/// either the old or the new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// Shared in-memory store. Clones see the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Rc<RefCell<BTreeMap<String, String>>>,
    fail_writes: Rc<Cell<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save` fail (and leave records untouched).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.records.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(self.records.borrow().get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), BoxError> {
        if self.fail_writes.get() {
            return Err(Box::new(HwError::Io(std::io::Error::other(
                "simulated write failure",
            ))));
        }
        self.records
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per record under `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl RecordStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, BoxError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Box::new(HwError::Io(e))),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), BoxError> {
        fs::create_dir_all(&self.dir).map_err(HwError::Io)?;
        write_atomic(&self.path_for(key), value.as_bytes()).map_err(HwError::Io)?;
        tracing::debug!(key, dir = %self.dir.display(), "record written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clones_share_records() {
        let a = MemoryStore::new();
        let mut b = a.clone();
        b.save("k", "1").unwrap();
        assert_eq!(a.load("k").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn failed_write_keeps_old_value() {
        let mut s = MemoryStore::new();
        s.save("k", "old").unwrap();
        s.fail_writes(true);
        assert!(s.save("k", "new").is_err());
        assert_eq!(s.get_raw("k").as_deref(), Some("old"));
    }
}
