//! The dual-buffer event table.
//!
//! Events enqueued during frame N land in the write buffer; [`EventTable::swap`]
//! promotes it to the read buffer for frame N+1 and clears the old read buffer
//! so it can receive frame N+1's writes. This replaces the teacher's
//! `ArcSwap<BufferStorage>` byte-buffer swap with a pair of locked `Vec`s, since
//! events here are typed payloads rather than row bytes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::event::{EventKey, StampedEvent};

pub struct EventTable {
    buffers: [Mutex<Vec<StampedEvent>>; 2],
    current: AtomicUsize,
}

impl EventTable {
    pub fn new() -> Self {
        Self {
            buffers: [Mutex::new(Vec::new()), Mutex::new(Vec::new())],
            current: AtomicUsize::new(0),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffers: [
                Mutex::new(Vec::with_capacity(capacity)),
                Mutex::new(Vec::with_capacity(capacity)),
            ],
            current: AtomicUsize::new(0),
        }
    }

    /// Enqueues an event for delivery in the *next* frame's batch.
    pub fn enqueue(&self, event: StampedEvent) {
        let write_idx = 1 - self.current.load(Ordering::Acquire);
        self.buffers[write_idx].lock().push(event);
    }

    /// Drains this frame's readable events, grouped into ordered event-batches
    /// per invariant E1: within a batch each `(event_type, batch_key)` pair is
    /// unique; a same-keyed event carries over into the next batch instead of
    /// being dropped. Events beyond `max_events` are requeued into the write
    /// buffer rather than dropped.
    pub fn drain_current(&self, max_events: usize) -> Vec<Vec<StampedEvent>> {
        let idx = self.current.load(Ordering::Acquire);
        let mut buf = self.buffers[idx].lock();

        let drained = if buf.len() <= max_events {
            std::mem::take(&mut *buf)
        } else {
            let overflow = buf.split_off(max_events);
            let drained = std::mem::take(&mut *buf);
            drop(buf);
            let write_idx = 1 - idx;
            let mut write_buf = self.buffers[write_idx].lock();
            write_buf.splice(0..0, overflow);
            drained
        };

        pack_into_batches(drained)
    }

    /// Promotes the write buffer to the read buffer and clears the old read
    /// buffer (which becomes the new write target).
    pub fn swap(&self) {
        let old_current = self.current.fetch_xor(1, Ordering::AcqRel);
        self.buffers[old_current].lock().clear();
    }

    pub fn pending_len(&self) -> usize {
        let idx = self.current.load(Ordering::Acquire);
        self.buffers[idx].lock().len()
    }
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Greedily packs events, ordered by `inserted_at`, into batches: each event
/// lands in the earliest batch whose key set doesn't already hold its
/// `(event_type, batch_key)`, else starts a new batch. Mirrors the
/// scheduler's own earliest-disjoint-batch placement for systems; no event is
/// ever dropped, only deferred to a later batch.
fn pack_into_batches(mut events: Vec<StampedEvent>) -> Vec<Vec<StampedEvent>> {
    events.sort_by_key(|e| e.inserted_at);

    let mut batches: Vec<Vec<StampedEvent>> = Vec::new();
    let mut batch_keys: Vec<HashSet<EventKey>> = Vec::new();

    for event in events {
        let key = event.key();
        let target = batch_keys.iter().position(|keys| !keys.contains(&key));
        match target {
            Some(i) => {
                batch_keys[i].insert(key);
                batches[i].push(event);
            }
            None => {
                let mut keys = HashSet::new();
                keys.insert(key);
                batch_keys.push(keys);
                batches.push(vec![event]);
            }
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{BatchKey, ComponentCreated};
    use crate::entity::EntityId;
    use std::any::TypeId;
    use std::sync::Arc;

    fn stamp(batch_key: BatchKey, inserted_at: u64) -> StampedEvent {
        StampedEvent {
            event_type: TypeId::of::<ComponentCreated>(),
            type_name: "ComponentCreated",
            batch_key,
            inserted_at,
            payload: Arc::new(ComponentCreated {
                entity: EntityId::new(),
                component_type: "Test",
            }),
        }
    }

    #[test]
    fn events_enqueued_this_frame_are_not_readable_until_swap() {
        let table = EventTable::new();
        table.enqueue(stamp(BatchKey::Default, 0));
        assert_eq!(table.drain_current(100).len(), 0);
        table.swap();
        assert_eq!(table.pending_len(), 1);
    }

    #[test]
    fn events_become_readable_after_swap() {
        let table = EventTable::new();
        table.enqueue(stamp(BatchKey::Default, 0));
        table.swap();
        let batches = table.drain_current(100);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
    }

    #[test]
    fn same_key_events_spill_into_separate_batches_with_carry_over() {
        let table = EventTable::new();
        table.enqueue(stamp(BatchKey::Keyed("a".into()), 0));
        table.enqueue(stamp(BatchKey::Keyed("a".into()), 1));
        table.enqueue(stamp(BatchKey::Keyed("b".into()), 2));
        table.swap();
        let batches = table.drain_current(100);

        // Both "a" events survive, but never share a batch.
        let total: usize = batches.iter().map(|b| b.len()).sum();
        assert_eq!(total, 3);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert!(batches[0]
            .iter()
            .any(|e| e.batch_key == BatchKey::Keyed("a".into()) && e.inserted_at == 0));
        assert!(batches[0]
            .iter()
            .any(|e| e.batch_key == BatchKey::Keyed("b".into()) && e.inserted_at == 2));
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1][0].batch_key, BatchKey::Keyed("a".into()));
        assert_eq!(batches[1][0].inserted_at, 1);
    }

    #[test]
    fn overflow_beyond_max_events_is_requeued_for_next_frame() {
        let table = EventTable::new();
        table.enqueue(stamp(BatchKey::Keyed("a".into()), 0));
        table.enqueue(stamp(BatchKey::Keyed("b".into()), 1));
        table.swap();
        let batches = table.drain_current(1);
        let total: usize = batches.iter().map(|b| b.len()).sum();
        assert_eq!(total, 1);
        table.swap();
        let next_batches = table.drain_current(100);
        let next_total: usize = next_batches.iter().map(|b| b.len()).sum();
        assert_eq!(next_total, 1);
    }
}
