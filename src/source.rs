//! Byte sources: anything a document can be read from.
//!
//! An upload buffer, a file on disk and a payload fetched elsewhere all look the
//! same to the pipeline.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Capability to read a whole document into memory.
pub trait ByteSource {
    /// Read every remaining byte.
    fn read_all(self) -> io::Result<Vec<u8>>;
}

impl ByteSource for Vec<u8> {
    fn read_all(self) -> io::Result<Vec<u8>> {
        Ok(self)
    }
}

impl ByteSource for &[u8] {
    fn read_all(self) -> io::Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl ByteSource for File {
    fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

/// A document on the local filesystem, read lazily.
#[derive(Debug, Clone)]
pub struct PathSource(PathBuf);

impl PathSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_path_buf())
    }
}

impl ByteSource for PathSource {
    fn read_all(self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_in_memory_sources() {
        assert_eq!(vec![1u8, 2, 3].read_all().unwrap(), vec![1, 2, 3]);
        let slice: &[u8] = b"%PDF";
        assert_eq!(slice.read_all().unwrap(), b"%PDF".to_vec());
    }

    #[test]
    fn test_file_and_path_sources_read_same_bytes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello pdf").unwrap();

        let from_path = PathSource::new(tmp.path()).read_all().unwrap();
        let from_file = File::open(tmp.path()).unwrap().read_all().unwrap();
        assert_eq!(from_path, b"hello pdf");
        assert_eq!(from_file, from_path);
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let err = PathSource::new("/nonexistent/doc.pdf").read_all().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
