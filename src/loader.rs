//! Filesystem access used by the router
//!
//! Reads are synchronous: the router calls them from a blocking task while it
//! may be holding the cache lock.

use crate::request::ByteRange;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Failure to read a file into memory.
#[derive(Debug)]
pub enum LoadError {
    /// The file does not exist (anymore).
    NotFound(PathBuf),
    /// Any other I/O failure while opening or reading.
    Io { path: PathBuf, source: io::Error },
}

impl LoadError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Source of file bytes for the router.
pub trait FileLoader: Send + Sync + 'static {
    /// Whether `path` names a regular file that can be opened for reading.
    fn is_accessible(&self, path: &Path) -> bool;

    /// Whole file contents.
    fn load(&self, path: &Path) -> Result<Vec<u8>, LoadError>;

    /// The inclusive byte span `range` of the file. Bytes past the end of the
    /// file are simply not returned.
    fn load_range(&self, path: &Path, range: ByteRange) -> Result<Vec<u8>, LoadError>;
}

/// [`FileLoader`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl FileLoader for FsLoader {
    fn is_accessible(&self, path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => File::open(path).is_ok(),
            _ => false,
        }
    }

    fn load(&self, path: &Path) -> Result<Vec<u8>, LoadError> {
        fs::read(path).map_err(|e| LoadError::from_io(path, e))
    }

    fn load_range(&self, path: &Path, range: ByteRange) -> Result<Vec<u8>, LoadError> {
        read_span(path, range).map_err(|e| LoadError::from_io(path, e))
    }
}

fn read_span(path: &Path, range: ByteRange) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    // Seeking past i64::MAX fails, and past the end reads nothing anyway.
    let size = file.metadata()?.len();
    file.seek(SeekFrom::Start(range.start.min(size)))?;

    let mut buffer = Vec::new();
    match range.len() {
        Some(len) => {
            file.take(len).read_to_end(&mut buffer)?;
        }
        None => {
            file.read_to_end(&mut buffer)?;
        }
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hello_file() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, "Hello").unwrap();
        (dir, path)
    }

    #[test]
    fn load_reads_whole_file() {
        let (_dir, path) = hello_file();
        assert_eq!(FsLoader.load(&path).unwrap(), b"Hello");
    }

    #[test]
    fn load_range_is_inclusive() {
        let (_dir, path) = hello_file();
        let body = FsLoader
            .load_range(&path, ByteRange::new(0, Some(3)))
            .unwrap();
        assert_eq!(body, b"Hell");
    }

    #[test]
    fn open_ended_range_reads_to_eof() {
        let (_dir, path) = hello_file();
        let body = FsLoader.load_range(&path, ByteRange::new(2, None)).unwrap();
        assert_eq!(body, b"llo");
    }

    #[test]
    fn range_past_eof_is_truncated() {
        let (_dir, path) = hello_file();
        assert_eq!(
            FsLoader
                .load_range(&path, ByteRange::new(3, Some(100)))
                .unwrap(),
            b"lo"
        );
        assert!(FsLoader
            .load_range(&path, ByteRange::new(10, None))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn huge_start_is_empty_not_an_error() {
        let (_dir, path) = hello_file();
        for start in [u64::MAX, 18_446_744_073_709_551_000, i64::MAX as u64 + 1] {
            let body = FsLoader.load_range(&path, ByteRange::new(start, None)).unwrap();
            assert!(body.is_empty(), "start {start}");
        }
        let body = FsLoader
            .load_range(&path, ByteRange::new(u64::MAX, Some(u64::MAX)))
            .unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn inverted_range_is_empty() {
        let (_dir, path) = hello_file();
        let body = FsLoader
            .load_range(&path, ByteRange::new(4, Some(1)))
            .unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = FsLoader.load(&dir.path().join("nope.html")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn directories_are_not_accessible() {
        let (dir, path) = hello_file();
        assert!(FsLoader.is_accessible(&path));
        assert!(!FsLoader.is_accessible(dir.path()));
        assert!(!FsLoader.is_accessible(&dir.path().join("missing")));
    }
}
