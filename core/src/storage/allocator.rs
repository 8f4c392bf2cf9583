use super::index::OffsetIndex;
use super::log::LogAppender;
use crate::protocol::Offset;
use crate::Result;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

struct AllocatorState {
    next_offset: Offset,
    appender: LogAppender,
}

/// Assigns offsets and appends frames as one indivisible step.
///
/// The counter and the append handle live behind the same mutex and neither is
/// reachable on its own, so on-disk frame order always matches offset order.
pub struct OffsetAllocator {
    state: Mutex<AllocatorState>,
    index: Arc<RwLock<OffsetIndex>>,
}

impl OffsetAllocator {
    /// `next_offset` must come from recovery of the log behind `appender`.
    pub(crate) fn new(
        next_offset: Offset,
        appender: LogAppender,
        index: Arc<RwLock<OffsetIndex>>,
    ) -> Self {
        Self {
            state: Mutex::new(AllocatorState {
                next_offset,
                appender,
            }),
            index,
        }
    }

    /// Append `payload` at the next offset and return that offset once it is durable.
    ///
    /// If the append fails the offset is not consumed and the error is returned.
    pub fn allocate_and_append(&self, payload: Bytes) -> Result<Offset> {
        let mut state = self.state.lock();

        let offset = state.next_offset;
        let position = state.appender.committed_len();
        state.appender.append(offset, payload)?;
        state.next_offset += 1;

        // Readers only see the frame once it is synced.
        let mut index = self.index.write();
        index.maybe_append(offset, position);
        index.set_durable_len(state.appender.committed_len());

        Ok(offset)
    }

    /// Offset the next successful append will receive.
    pub fn next_offset(&self) -> Offset {
        self.state.lock().next_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::log::LogStore;
    use std::collections::HashSet;
    use std::thread;
    use tempfile::tempdir;

    fn allocator(
        store: &LogStore,
        next_offset: Offset,
    ) -> (OffsetAllocator, Arc<RwLock<OffsetIndex>>) {
        let index = Arc::new(RwLock::new(OffsetIndex::new(1)));
        let appender = store.open_appender(0).unwrap();
        (
            OffsetAllocator::new(next_offset, appender, Arc::clone(&index)),
            index,
        )
    }

    #[test]
    fn test_offsets_start_at_recovered_value() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("orders.log"));
        let (allocator, _) = allocator(&store, 0);

        assert_eq!(allocator.allocate_and_append(Bytes::from("hello")).unwrap(), 0);
        assert_eq!(allocator.allocate_and_append(Bytes::from("world")).unwrap(), 1);
        assert_eq!(allocator.next_offset(), 2);
    }

    #[test]
    fn test_append_publishes_durable_len() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("orders.log"));
        let (allocator, index) = allocator(&store, 0);

        allocator.allocate_and_append(Bytes::from("abc")).unwrap();
        assert_eq!(index.read().durable_len(), 15);
        assert_eq!(index.read().lookup(0).map(|e| e.position), Some(0));

        allocator.allocate_and_append(Bytes::from("de")).unwrap();
        assert_eq!(index.read().durable_len(), 29);
        assert_eq!(index.read().lookup(1).map(|e| e.position), Some(15));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_append_does_not_consume_offset() {
        let store = LogStore::new("/dev/full");
        let (allocator, index) = allocator(&store, 5);

        assert!(allocator.allocate_and_append(Bytes::from("full")).is_err());
        assert_eq!(allocator.next_offset(), 5);
        assert_eq!(index.read().durable_len(), 0);
        assert!(index.read().is_empty());

        assert!(allocator.allocate_and_append(Bytes::from("still full")).is_err());
        assert_eq!(allocator.next_offset(), 5);
    }

    #[test]
    fn test_concurrent_appends_match_file_order() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("orders.log"));
        let (allocator, _) = allocator(&store, 0);
        let allocator = Arc::new(allocator);

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let allocator = Arc::clone(&allocator);
                thread::spawn(move || {
                    (0..25)
                        .map(|i| {
                            allocator
                                .allocate_and_append(Bytes::from(format!("{}-{}", writer, i)))
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut assigned = HashSet::new();
        for handle in handles {
            for offset in handle.join().unwrap() {
                assert!(assigned.insert(offset), "offset {} assigned twice", offset);
            }
        }
        assert_eq!(assigned, (0..200).collect::<HashSet<_>>());

        let on_disk: Vec<Offset> = store.scan(0).unwrap().map(|r| r.unwrap().offset).collect();
        assert_eq!(on_disk, (0..200).collect::<Vec<_>>());
    }
}
