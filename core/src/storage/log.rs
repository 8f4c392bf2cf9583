//! Append-only log file.
//!
//! [`LogStore`] names the single log file and hands out readers. Writing goes through a
//! [`LogAppender`], which only the offset allocator ever holds, so every frame is written
//! inside the allocator's critical section.

use super::frame::{read_frame_within, FrameError, Record};
use crate::protocol::Offset;
use crate::{Result, SolomqError};
use bytes::{Bytes, BytesMut};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Take, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Where a scan starts reading and how far it may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBound {
    /// Byte position of a frame boundary at or before the first wanted record.
    pub start_position: u64,
    /// Upper bound on bytes read, usually the durable length captured at scan start.
    /// `None` reads to the end of the file as it was when the scan opened it.
    pub end_position: Option<u64>,
}

impl ScanBound {
    pub fn unbounded() -> Self {
        Self {
            start_position: 0,
            end_position: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full linear scan from the start of the file.
    ///
    /// Cost is proportional to every record in the log no matter what `from_offset` is;
    /// [`super::CommitLog::fetch`] uses the offset index to skip ahead instead.
    pub fn scan(&self, from_offset: Offset) -> Result<LogScanner> {
        self.scan_from(from_offset, ScanBound::unbounded())
    }

    /// Scan starting at `bound.start_position`, never reading past `bound.end_position`.
    ///
    /// A missing log file scans as empty.
    pub fn scan_from(&self, from_offset: Offset, bound: ScanBound) -> Result<LogScanner> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(LogScanner::empty(from_offset));
            }
            Err(e) => return Err(e.into()),
        };

        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(bound.start_position))?;
        let available = file_len.saturating_sub(bound.start_position);
        let limit = match bound.end_position {
            Some(end) => end.saturating_sub(bound.start_position).min(available),
            None => available,
        };

        Ok(LogScanner {
            reader: Some(BufReader::new(file.take(limit))),
            from_offset,
            position: bound.start_position,
            remaining: limit,
            end: ScanEnd::Running,
        })
    }

    /// Open the file for appending, creating it and its parent directory if needed.
    ///
    /// `committed_len` is the length recovery validated; the file must already have
    /// been cut back to it.
    pub(crate) fn open_appender(&self, committed_len: u64) -> Result<LogAppender> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let on_disk = file.metadata()?.len();
        if on_disk != committed_len {
            return Err(SolomqError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "log {} is {} bytes but {} bytes were recovered",
                    self.path.display(),
                    on_disk,
                    committed_len
                ),
            )));
        }

        Ok(LogAppender {
            path: self.path.clone(),
            file,
            committed_len,
            buf: BytesMut::with_capacity(4096),
            poisoned: false,
        })
    }
}

/// How a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    Running,
    /// The stream ended on a frame boundary.
    Clean,
    /// Bytes after `position` do not form a complete frame.
    Truncated { position: u64 },
    /// An I/O error was returned to the caller.
    Failed,
}

/// Lazy iterator over the records of a log scan.
///
/// Yields every record whose offset is at least `from_offset`, in file order, and stops
/// at the first truncated frame. Dropping the iterator closes the file; scanning again
/// means calling [`LogStore::scan`] again.
pub struct LogScanner {
    reader: Option<BufReader<Take<File>>>,
    from_offset: Offset,
    position: u64,
    // bytes left under the limit; frames claiming more are truncated without being read
    remaining: u64,
    end: ScanEnd,
}

impl LogScanner {
    fn empty(from_offset: Offset) -> Self {
        Self {
            reader: None,
            from_offset,
            position: 0,
            remaining: 0,
            end: ScanEnd::Clean,
        }
    }

    /// Byte position just past the last complete frame read so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn end(&self) -> ScanEnd {
        self.end
    }

    /// Next complete frame regardless of `from_offset`.
    pub(crate) fn next_frame(&mut self) -> Option<Result<Record>> {
        let reader = self.reader.as_mut()?;
        match read_frame_within(reader, self.remaining) {
            Ok(Some(record)) => {
                let len = record.encoded_len() as u64;
                self.position += len;
                self.remaining = self.remaining.saturating_sub(len);
                Some(Ok(record))
            }
            Ok(None) => {
                self.finish(ScanEnd::Clean);
                None
            }
            Err(FrameError::Truncated { needed, available }) => {
                debug!(
                    position = self.position,
                    needed, available, "scan stopped at truncated frame"
                );
                self.finish(ScanEnd::Truncated {
                    position: self.position,
                });
                None
            }
            Err(e) => {
                self.finish(ScanEnd::Failed);
                Some(Err(e.into()))
            }
        }
    }

    fn finish(&mut self, end: ScanEnd) {
        self.reader = None;
        self.end = end;
    }
}

impl Iterator for LogScanner {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_frame()? {
                Ok(record) if record.offset < self.from_offset => continue,
                other => return Some(other),
            }
        }
    }
}

/// Exclusive write handle on the log file.
#[derive(Debug)]
pub struct LogAppender {
    path: PathBuf,
    file: File,
    committed_len: u64,
    buf: BytesMut,
    // set when a partial frame could not be cut off; nothing more may be written after it
    poisoned: bool,
}

impl LogAppender {
    /// Write one frame at the end of the log and sync it before returning.
    ///
    /// On failure the file is cut back to its previous length so the next append
    /// starts on a frame boundary. If that cut fails too, the appender refuses every
    /// later append, since new frames would land behind bytes recovery will discard.
    pub fn append(&mut self, offset: Offset, payload: Bytes) -> Result<()> {
        if self.poisoned {
            return Err(SolomqError::Io(io::Error::other(format!(
                "log {} is disabled after a partial frame could not be rolled back",
                self.path.display()
            ))));
        }

        let record = Record::new(offset, payload)?;

        self.buf.clear();
        record.encode(&mut self.buf);

        if let Err(e) = write_durable(&mut self.file, &self.buf) {
            warn!(
                offset,
                path = %self.path.display(),
                error = %e,
                "append failed, rolling back to last committed frame"
            );
            self.rollback();
            return Err(e.into());
        }

        self.committed_len += self.buf.len() as u64;
        Ok(())
    }

    /// Length of the file through the last durable frame.
    pub fn committed_len(&self) -> u64 {
        self.committed_len
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn rollback(&mut self) {
        let truncated = self
            .file
            .set_len(self.committed_len)
            .and_then(|()| self.file.sync_data());
        if let Err(e) = truncated {
            self.poisoned = true;
            error!(
                path = %self.path.display(),
                committed_len = self.committed_len,
                error = %e,
                "failed to roll back partial frame"
            );
        }
    }
}

fn write_durable(file: &mut File, frame: &[u8]) -> io::Result<()> {
    file.write_all(frame)?;
    file.flush()?;
    file.sync_data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn offsets(scanner: LogScanner) -> Vec<Offset> {
        scanner.map(|r| r.unwrap().offset).collect()
    }

    #[test]
    fn test_scan_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("absent.log"));

        let mut scanner = store.scan(0).unwrap();
        assert!(scanner.next().is_none());
        assert_eq!(scanner.end(), ScanEnd::Clean);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_append_creates_parent_dir_and_file() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("nested").join("orders.log"));

        let mut appender = store.open_appender(0).unwrap();
        appender.append(0, Bytes::from_static(b"first")).unwrap();

        assert!(store.path().exists());
        assert_eq!(appender.committed_len(), 12 + 5);
    }

    #[test]
    fn test_scan_filters_by_offset() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("orders.log"));
        let mut appender = store.open_appender(0).unwrap();
        for offset in 0..5 {
            appender
                .append(offset, Bytes::from(format!("message {}", offset)))
                .unwrap();
        }

        assert_eq!(offsets(store.scan(0).unwrap()), vec![0, 1, 2, 3, 4]);
        assert_eq!(offsets(store.scan(3).unwrap()), vec![3, 4]);
        assert!(offsets(store.scan(5).unwrap()).is_empty());

        let records: Vec<Record> = store.scan(4).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records[0].payload, Bytes::from("message 4"));
    }

    #[test]
    fn test_scan_is_restartable() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("orders.log"));
        let mut appender = store.open_appender(0).unwrap();
        appender.append(0, Bytes::from_static(b"a")).unwrap();

        assert_eq!(offsets(store.scan(0).unwrap()), vec![0]);
        appender.append(1, Bytes::from_static(b"b")).unwrap();
        assert_eq!(offsets(store.scan(0).unwrap()), vec![0, 1]);
    }

    #[test]
    fn test_scan_stops_at_torn_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.log");
        let store = LogStore::new(&path);
        let mut appender = store.open_appender(0).unwrap();
        appender.append(0, Bytes::from_static(b"complete")).unwrap();
        let good_len = appender.committed_len();
        drop(appender);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0, 0, 0, 9, 0, 0]).unwrap();

        let mut scanner = store.scan(0).unwrap();
        assert_eq!(scanner.next().unwrap().unwrap().offset, 0);
        assert!(scanner.next().is_none());
        assert_eq!(
            scanner.end(),
            ScanEnd::Truncated {
                position: good_len
            }
        );
    }

    #[test]
    fn test_bound_hides_bytes_past_end_position() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("orders.log"));
        let mut appender = store.open_appender(0).unwrap();
        appender.append(0, Bytes::from_static(b"visible")).unwrap();
        let bound = ScanBound {
            start_position: 0,
            end_position: Some(appender.committed_len()),
        };
        appender.append(1, Bytes::from_static(b"written after the bound")).unwrap();

        let mut scanner = store.scan_from(0, bound).unwrap();
        assert_eq!(scanner.next().unwrap().unwrap().offset, 0);
        assert!(scanner.next().is_none());
        assert_eq!(scanner.end(), ScanEnd::Clean);
    }

    #[test]
    fn test_bound_start_position_skips_frames() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("orders.log"));
        let mut appender = store.open_appender(0).unwrap();
        appender.append(0, Bytes::from_static(b"zero")).unwrap();
        let second_frame = appender.committed_len();
        appender.append(1, Bytes::from_static(b"one")).unwrap();
        appender.append(2, Bytes::from_static(b"two")).unwrap();

        let bound = ScanBound {
            start_position: second_frame,
            end_position: Some(appender.committed_len()),
        };
        assert_eq!(offsets(store.scan_from(0, bound).unwrap()), vec![1, 2]);
        assert_eq!(offsets(store.scan_from(2, bound).unwrap()), vec![2]);
    }

    #[test]
    fn test_scan_does_not_buffer_corrupt_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.log");
        let store = LogStore::new(&path);
        let mut appender = store.open_appender(0).unwrap();
        appender.append(0, Bytes::from_static(b"good")).unwrap();
        let good_len = appender.committed_len();
        drop(appender);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0, 0, 0, 0, 1])
            .unwrap();
        file.write_all(&vec![0u8; 256 * 1024]).unwrap();
        drop(file);

        let mut scanner = store.scan(0).unwrap();
        assert_eq!(scanner.next().unwrap().unwrap().offset, 0);
        assert!(scanner.next().is_none());
        assert_eq!(
            scanner.end(),
            ScanEnd::Truncated {
                position: good_len
            }
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_rollback_disables_appender() {
        // writes fail with ENOSPC and a character device cannot be truncated
        let store = LogStore::new("/dev/full");
        let mut appender = store.open_appender(0).unwrap();

        assert!(appender.append(0, Bytes::from_static(b"lost")).is_err());
        assert!(appender.is_poisoned());
        assert_eq!(appender.committed_len(), 0);

        let err = appender.append(0, Bytes::from_static(b"again")).unwrap_err();
        assert!(err.to_string().contains("disabled"), "unexpected error: {}", err);
    }

    #[test]
    fn test_open_appender_rejects_unrecovered_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.log");
        std::fs::write(&path, b"garbage").unwrap();

        let store = LogStore::new(&path);
        assert!(store.open_appender(0).is_err());
    }
}
