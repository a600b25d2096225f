use std::path::PathBuf;

use tracing::debug;

use crate::error::ReaderError;
use crate::segment::{visible_files, Segment};

type DirEntries = Box<dyn Iterator<Item = Result<walkdir::DirEntry, walkdir::Error>>>;

/// Lazily enumerates one whole-file segment per visible file below a root
/// directory.
pub struct DirectorySegmentQueue {
    root: PathBuf,
    entries: Option<DirEntries>,
}

impl DirectorySegmentQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let entries: DirEntries = Box::new(visible_files(&root));
        Self {
            root,
            entries: Some(entries),
        }
    }

    /// Pops the next pending segment. Once this returns `Ok(None)` the queue
    /// is drained and stays drained.
    pub fn pop(&mut self) -> Result<Option<Segment>, ReaderError> {
        let Some(entries) = self.entries.as_mut() else {
            return Ok(None);
        };
        let Some(entry) = entries.next() else {
            debug!(root = %self.root.display(), "directory exhausted");
            self.entries = None;
            return Ok(None);
        };
        let entry = entry.map_err(|source| ReaderError::List {
            path: self.root.clone(),
            source,
        })?;
        let length = entry
            .metadata()
            .map_err(|source| ReaderError::List {
                path: entry.path().to_path_buf(),
                source,
            })?
            .len();
        Ok(Some(Segment::new(entry.into_path(), 0, length)))
    }

    pub fn is_exhausted(&self) -> bool {
        self.entries.is_none()
    }
}

/// Decides whether the assigned segment is a single file or a directory and,
/// for directories, hands out the contained files one at a time.
#[derive(Default)]
pub struct SegmentSequencer {
    queue: Option<DirectorySegmentQueue>,
}

impl SegmentSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `segment` names a directory. In that case the
    /// caller pulls the files to read through [`SegmentSequencer::advance`];
    /// otherwise `segment` itself is the only unit of work.
    pub fn initialize(&mut self, segment: &Segment) -> Result<bool, ReaderError> {
        let metadata =
            std::fs::metadata(segment.path()).map_err(|source| ReaderError::Metadata {
                path: segment.path().to_path_buf(),
                source,
            })?;
        if metadata.is_dir() {
            self.queue = Some(DirectorySegmentQueue::new(segment.path()));
            Ok(true)
        } else {
            self.queue = None;
            Ok(false)
        }
    }

    /// Next pending file segment, or `None` when there is nothing left (always
    /// the case for a single-file segment).
    pub fn advance(&mut self) -> Result<Option<Segment>, ReaderError> {
        let Some(queue) = self.queue.as_mut() else {
            return Ok(None);
        };
        let next = queue.pop()?;
        if next.is_none() {
            self.queue = None;
        }
        Ok(next)
    }

    pub fn is_directory(&self) -> bool {
        self.queue.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_has_no_further_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.json");
        std::fs::write(&path, "{}\n").unwrap();

        let mut sequencer = SegmentSequencer::new();
        assert!(!sequencer.initialize(&Segment::for_path(&path).unwrap()).unwrap());
        assert!(sequencer.advance().unwrap().is_none());
    }

    #[test]
    fn directory_yields_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}\n").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}\n{}\n").unwrap();
        std::fs::create_dir(dir.path().join("c")).unwrap();
        std::fs::write(dir.path().join("c/d.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("_logs")).unwrap();
        std::fs::write(dir.path().join("_logs/skip.json"), "{}").unwrap();
        std::fs::write(dir.path().join(".a.json.crc"), "crc").unwrap();

        let mut sequencer = SegmentSequencer::new();
        assert!(sequencer.initialize(&Segment::new(dir.path(), 0, 0)).unwrap());

        let mut seen = Vec::new();
        while let Some(segment) = sequencer.advance().unwrap() {
            let name = segment
                .path()
                .strip_prefix(dir.path())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            seen.push((name, segment.start(), segment.length()));
        }
        assert_eq!(
            seen,
            vec![
                ("a.json".to_string(), 0, 6),
                ("b.json".to_string(), 0, 3),
                ("c/d.json".to_string(), 0, 2),
            ]
        );
        assert!(sequencer.advance().unwrap().is_none());
        assert!(!sequencer.is_directory());
    }

    #[test]
    fn missing_path_is_fatal() {
        let mut sequencer = SegmentSequencer::new();
        let err = sequencer
            .initialize(&Segment::new("/definitely/not/here", 0, 0))
            .unwrap_err();
        assert!(matches!(err, ReaderError::Metadata { .. }));
    }
}
