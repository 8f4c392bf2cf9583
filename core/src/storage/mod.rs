//! # SoloMQ Storage Module
//!
//! Durable storage for the single log: one append-only file of record frames.
//!
//! ## Architecture
//!
//! - [`frame`] - on-disk encoding of one record
//! - [`log`] - the log file: appending handle and bounded sequential scans
//! - [`allocator`] - offset assignment fused with the append, under one mutex
//! - [`recovery`] - startup pass that re-derives the next offset from the file
//! - [`index`] - sparse in-memory offset index plus the durable length readers honor
//!
//! [`CommitLog`] ties these together and is the only type the broker uses. Producers
//! serialize on the allocator's mutex; fetches never take it. A fetch captures the
//! durable length under a short read lock and reads no further than that, so it never
//! sees a frame that is still being written.

pub mod allocator;
pub mod frame;
pub mod index;
pub mod log;
pub mod recovery;

pub use allocator::OffsetAllocator;
pub use frame::{FrameError, Record, FRAME_HEADER_SIZE};
pub use index::OffsetIndex;
pub use log::{LogScanner, LogStore, ScanBound, ScanEnd};
pub use recovery::RecoveryReport;

use crate::config::BrokerConfig;
use crate::protocol::Offset;
use crate::Result;
use bytes::Bytes;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct CommitLog {
    store: LogStore,
    allocator: OffsetAllocator,
    index: Arc<RwLock<OffsetIndex>>,
    recovery: RecoveryReport,
}

impl CommitLog {
    /// Open the log at `path`, running recovery before anything can be appended.
    pub fn open<P: AsRef<Path>>(path: P, index_interval_bytes: u64) -> Result<Self> {
        let store = LogStore::new(path);
        let mut index = OffsetIndex::new(index_interval_bytes);
        let recovery = recovery::recover(&store, &mut index)?;

        let appender = store.open_appender(recovery.valid_len)?;
        let index = Arc::new(RwLock::new(index));
        let allocator = OffsetAllocator::new(recovery.next_offset, appender, Arc::clone(&index));

        Ok(Self {
            store,
            allocator,
            index,
            recovery,
        })
    }

    pub fn open_with_config(config: &BrokerConfig) -> Result<Self> {
        Self::open(config.log_path(), config.index_interval_bytes)
    }

    /// Durably append `payload` and return its offset.
    pub fn produce(&self, payload: Bytes) -> Result<Offset> {
        self.allocator.allocate_and_append(payload)
    }

    /// Records with `offset >= from_offset`, read up to the durable length at call time.
    pub fn scan(&self, from_offset: Offset) -> Result<LogScanner> {
        let bound = self.index.read().scan_bound(from_offset);
        debug!(
            from_offset,
            start = bound.start_position,
            end = ?bound.end_position,
            "scanning log"
        );
        self.store.scan_from(from_offset, bound)
    }

    /// Materialize [`CommitLog::scan`] in offset order.
    pub fn fetch(&self, from_offset: Offset) -> Result<Vec<Record>> {
        self.scan(from_offset)?.collect()
    }

    pub fn next_offset(&self) -> Offset {
        self.allocator.next_offset()
    }

    /// Byte length of the log through its last durable frame.
    pub fn durable_len(&self) -> u64 {
        self.index.read().durable_len()
    }

    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    fn payloads(records: &[Record]) -> Vec<&[u8]> {
        records.iter().map(|r| r.payload.as_ref()).collect()
    }

    #[test]
    fn test_produce_and_fetch() {
        let dir = tempdir().unwrap();
        let log = CommitLog::open(dir.path().join("orders.log"), 4096).unwrap();

        assert_eq!(log.produce(Bytes::from("hello")).unwrap(), 0);
        assert_eq!(log.produce(Bytes::from("world")).unwrap(), 1);

        let all = log.fetch(0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(payloads(&all), vec![&b"hello"[..], &b"world"[..]]);

        let tail = log.fetch(1).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].offset, 1);
        assert!(log.fetch(2).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_log_is_empty() {
        let dir = tempdir().unwrap();
        let log = CommitLog::open(dir.path().join("data").join("orders.log"), 4096).unwrap();

        assert_eq!(log.next_offset(), 0);
        assert!(log.fetch(0).unwrap().is_empty());
        assert_eq!(log.durable_len(), 0);
    }

    #[test]
    fn test_reopen_continues_offsets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.log");
        {
            let log = CommitLog::open(&path, 4096).unwrap();
            log.produce(Bytes::from("hello")).unwrap();
            log.produce(Bytes::from("world")).unwrap();
        }

        let log = CommitLog::open(&path, 4096).unwrap();
        assert_eq!(log.recovery_report().next_offset, 2);
        assert_eq!(log.fetch(0).unwrap().len(), 2);
        assert_eq!(log.produce(Bytes::from("foo")).unwrap(), 2);
    }

    #[test]
    fn test_indexed_fetch_matches_linear_scan() {
        let dir = tempdir().unwrap();
        let log = CommitLog::open(dir.path().join("orders.log"), 64).unwrap();
        for i in 0..50u64 {
            log.produce(Bytes::from(vec![b'x'; (i % 7) as usize * 10])).unwrap();
        }

        for from in [0u64, 1, 7, 23, 49, 50, 1000] {
            let indexed = log.fetch(from).unwrap();
            let linear: Vec<Record> = log
                .store()
                .scan(from)
                .unwrap()
                .map(|r| r.unwrap())
                .collect();
            assert_eq!(indexed, linear, "mismatch fetching from {}", from);
        }
    }

    #[test]
    fn test_fetch_ignores_bytes_past_durable_len() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.log");
        let log = CommitLog::open(&path, 4096).unwrap();
        log.produce(Bytes::from("durable")).unwrap();

        // a frame header whose body has not arrived yet
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 1]).unwrap();

        let records = log.fetch(0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(log.scan(0).unwrap().count(), 1);
    }
}
