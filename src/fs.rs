//! Read-only filesystem abstraction used by the scanner and input layer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The kind of entry a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

/// Read-only view of a filesystem.
///
/// `stat` must report `io::ErrorKind::NotFound` for missing paths, so callers
/// can tell "does not exist" apart from other I/O failures.
pub trait Filesystem: Send + Sync {
    /// Classify a path as a file or a directory.
    fn stat(&self, path: &Path) -> io::Result<PathKind>;

    /// Read the full contents of a file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// List the entries of a directory, sorted by name.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// `Filesystem` backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn stat(&self, path: &Path) -> io::Result<PathKind> {
        let metadata = fs::metadata(path)?;

        Ok(if metadata.is_dir() {
            PathKind::Directory
        } else {
            PathKind::File
        })
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;

        entries.sort();

        Ok(entries)
    }
}
