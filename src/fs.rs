//! Virtual filesystem seam for snapshot files.
//!
//! Snapshot extraction and application go through this narrow interface, so
//! the storage layer can be pointed at an in-memory or instrumented
//! filesystem in tests. Readers and writers are plain blocking [`Read`] /
//! [`Write`] handles; short reads and writes are handled by the callers.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Filesystem operations required by the snapshot engine.
pub trait Vfs {
    /// Recursively create `path` with mode `0755`. Creating a directory
    /// that already exists is not an error.
    fn mkdir_all(&self, path: &Path) -> Result<()>;

    /// Create a file for writing, truncating any existing file.
    fn create(&self, path: &Path) -> Result<Box<dyn Write>>;

    /// Open a file for reading.
    fn open(&self, path: &Path) -> Result<Box<dyn Read>>;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Join a file name onto a directory path.
    fn path_join(&self, base: &Path, name: &str) -> PathBuf {
        base.join(name)
    }
}

/// [`Vfs`] backed by the operating-system filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFs;

impl Vfs for SystemFs {
    fn mkdir_all(&self, path: &Path) -> Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        Ok(builder.create(path)?)
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write>> {
        Ok(Box::new(File::create(path)?))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read>> {
        Ok(Box::new(File::open(path)?))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        Ok(fs::remove_file(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_mkdir_all_is_idempotent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        SystemFs.mkdir_all(&nested).unwrap();
        SystemFs.mkdir_all(&nested).unwrap();

        assert!(nested.is_dir());
    }

    #[test]
    fn test_create_write_open_read() {
        let dir = tempdir().unwrap();
        let path = SystemFs.path_join(dir.path(), "data.bin");

        let mut writer = SystemFs.create(&path).unwrap();
        writer.write_all(b"payload").unwrap();
        drop(writer);

        let mut reader = SystemFs.open(&path).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"payload");

        SystemFs.remove_file(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(SystemFs.open(&dir.path().join("absent")).is_err());
    }
}
