//! Startup recovery.
//!
//! One sequential pass over the log re-derives the next offset to assign, rebuilds the
//! offset index and repairs a torn tail left by an interrupted write.

use super::frame::FRAME_HEADER_SIZE;
use super::index::OffsetIndex;
use super::log::{LogStore, ScanEnd};
use crate::protocol::Offset;
use crate::Result;
use std::fs::OpenOptions;
use std::io;
use tracing::{error, info, warn};

/// No single torn write can leave more than this behind.
const MAX_FRAME_LEN: u64 = FRAME_HEADER_SIZE as u64 + u32::MAX as u64;

/// Outcome of a recovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// `highest recovered offset + 1`, or 0 for an absent or empty log.
    pub next_offset: Offset,
    /// Complete frames found.
    pub record_count: u64,
    /// Length of the log through its last complete frame.
    pub valid_len: u64,
    /// Bytes cut from the end of the file because they did not form a complete frame.
    pub torn_bytes: u64,
}

/// Scan `store` from the beginning and seed allocator and index state from it.
///
/// A missing file recovers as an empty log. If the file ends inside a frame, the partial
/// frame is removed so the next append lands on a frame boundary. The partial frame was
/// never acknowledged, since acknowledgement waits for the sync.
pub fn recover(store: &LogStore, index: &mut OffsetIndex) -> Result<RecoveryReport> {
    let mut scanner = store.scan(0)?;
    let mut highest: Option<Offset> = None;
    let mut record_count = 0u64;

    loop {
        let position = scanner.position();
        let record = match scanner.next_frame() {
            Some(record) => record?,
            None => break,
        };
        index.maybe_append(record.offset, position);
        highest = Some(highest.map_or(record.offset, |h| h.max(record.offset)));
        record_count += 1;
    }

    let valid_len = scanner.position();
    let torn_bytes = match scanner.end() {
        ScanEnd::Truncated { position } => truncate_torn_tail(store, position)?,
        _ => 0,
    };
    index.set_durable_len(valid_len);

    let report = RecoveryReport {
        next_offset: highest.map_or(0, |h| h + 1),
        record_count,
        valid_len,
        torn_bytes,
    };

    info!(
        path = %store.path().display(),
        next_offset = report.next_offset,
        records = report.record_count,
        bytes = report.valid_len,
        "recovered log"
    );
    Ok(report)
}

fn truncate_torn_tail(store: &LogStore, valid_len: u64) -> Result<u64> {
    let file = OpenOptions::new().write(true).open(store.path())?;
    let file_len = file.metadata()?.len();
    let torn = file_len.checked_sub(valid_len).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            "log shrank while it was being recovered",
        )
    })?;

    // A frame that fails to decode in the middle of the file looks identical to a torn
    // tail, so everything after it goes too.
    if torn > MAX_FRAME_LEN {
        error!(
            path = %store.path().display(),
            position = valid_len,
            torn_bytes = torn,
            "corrupt frame inside the log, deleting everything after it"
        );
    } else {
        warn!(
            path = %store.path().display(),
            position = valid_len,
            torn_bytes = torn,
            "log ends inside a frame, truncating to last complete frame"
        );
    }
    file.set_len(valid_len)?;
    file.sync_all()?;
    Ok(torn)
}
