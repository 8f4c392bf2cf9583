use super::log::ScanBound;
use crate::protocol::Offset;

/// Offset -> file position mapping for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: Offset,
    /// File position where the frame for `offset` starts
    pub position: u64,
}

/// Sparse in-memory index for seeking into the log.
///
/// An entry is kept for the first frame and then for the first frame at least
/// `index_interval` bytes past the previous entry. The index also carries the durable
/// length of the log, which bounds every scan started from it. Nothing here is persisted;
/// recovery rebuilds it on every start.
#[derive(Debug)]
pub struct OffsetIndex {
    entries: Vec<IndexEntry>,
    index_interval: u64,
    last_indexed_position: u64,
    durable_len: u64,
}

impl OffsetIndex {
    pub fn new(index_interval: u64) -> Self {
        Self {
            entries: Vec::new(),
            index_interval: index_interval.max(1),
            last_indexed_position: 0,
            durable_len: 0,
        }
    }

    /// Record the frame at `position` if the interval has been reached.
    pub fn maybe_append(&mut self, offset: Offset, position: u64) -> bool {
        if self.entries.is_empty()
            || position >= self.last_indexed_position + self.index_interval
        {
            self.entries.push(IndexEntry { offset, position });
            self.last_indexed_position = position;
            true
        } else {
            false
        }
    }

    /// Largest entry with `offset <= target_offset`.
    pub fn lookup(&self, target_offset: Offset) -> Option<IndexEntry> {
        let idx = self
            .entries
            .partition_point(|entry| entry.offset <= target_offset);
        idx.checked_sub(1).map(|i| self.entries[i])
    }

    /// Publish the length of the log through its last durable frame.
    pub fn set_durable_len(&mut self, len: u64) {
        self.durable_len = len;
    }

    pub fn durable_len(&self) -> u64 {
        self.durable_len
    }

    /// Where a scan for `from_offset` should start and stop right now.
    pub fn scan_bound(&self, from_offset: Offset) -> ScanBound {
        ScanBound {
            start_position: self.lookup(from_offset).map_or(0, |entry| entry.position),
            end_position: Some(self.durable_len),
        }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
