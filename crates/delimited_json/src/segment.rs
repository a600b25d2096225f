use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ReaderError;

/// A contiguous byte range of one file (or of one directory tree) assigned as
/// a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    path: PathBuf,
    start: u64,
    length: u64,
}

impl Segment {
    pub fn new(path: impl Into<PathBuf>, start: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            start,
            length,
        }
    }

    /// Covers all of `path`. For a directory the length is the total size of
    /// the files a [`crate::DirectorySegmentQueue`] would visit below it.
    pub fn for_path(path: impl Into<PathBuf>) -> Result<Self, ReaderError> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|source| ReaderError::Metadata {
            path: path.clone(),
            source,
        })?;
        let length = if metadata.is_dir() {
            let mut total = 0u64;
            for entry in visible_files(&path) {
                let entry = entry.map_err(|source| ReaderError::List {
                    path: path.clone(),
                    source,
                })?;
                let len = entry
                    .metadata()
                    .map_err(|source| ReaderError::List {
                        path: entry.path().to_path_buf(),
                        source,
                    })?
                    .len();
                total = total.saturating_add(len);
            }
            total
        } else {
            metadata.len()
        };
        Ok(Self::new(path, 0, length))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn length(&self) -> u64 {
        self.length
    }
}

/// Files below `root` in file-name order, skipping hidden (`.`) and
/// bookkeeping (`_`) entries along with everything beneath them.
pub(crate) fn visible_files(
    root: &Path,
) -> impl Iterator<Item = Result<walkdir::DirEntry, walkdir::Error>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        .filter(|entry| match entry {
            Ok(entry) => entry.file_type().is_file(),
            Err(_) => true,
        })
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_length_sums_visible_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "12345").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/b.json"), "123").unwrap();
        std::fs::write(dir.path().join(".crc"), "ignored").unwrap();
        std::fs::write(dir.path().join("_SUCCESS"), "ignored").unwrap();

        let segment = Segment::for_path(dir.path()).unwrap();
        assert_eq!(segment.start(), 0);
        assert_eq!(segment.length(), 8);
    }

    #[test]
    fn missing_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = Segment::for_path(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, ReaderError::Metadata { .. }));
    }
}
