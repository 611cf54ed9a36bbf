//! On-disk inventory of already-downloaded artifacts.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::error::StorageResult;

/// File names currently present in a stream's raw directory.
#[derive(Debug, Clone, Default)]
pub struct LocalInventory {
    names: HashSet<String>,
}

impl LocalInventory {
    /// Scan `dir` (non-recursive). A missing directory is an empty inventory.
    pub fn scan(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref();
        let mut names = HashSet::new();

        if dir.exists() {
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    // interrupted downloads are not inventory
                    if !name.ends_with(".partial") {
                        names.insert(name.to_string());
                    }
                }
            }
        }

        debug!(dir = %dir.display(), count = names.len(), "Scanned local inventory");
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_skips_partials_and_dirs() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("20183192334541_C13.nc"), b"x").unwrap();
        std::fs::write(tmp.path().join("20183192339541_C13.nc.partial"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();

        let inv = LocalInventory::scan(tmp.path()).unwrap();
        assert_eq!(inv.len(), 1);
        assert!(inv.contains("20183192334541_C13.nc"));
        assert!(!inv.contains("nested"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let inv = LocalInventory::scan(tmp.path().join("raws")).unwrap();
        assert!(inv.is_empty());
    }
}
