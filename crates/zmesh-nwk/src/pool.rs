//! Fixed-capacity arena of outbound frame records.
//!
//! The pool replaces the classic intrusive linked list of raw next-pointers
//! with a slot arena plus free-list: removal is O(1), the working set is
//! bounded at construction time, and a record's payload is freed exactly
//! once because releasing a slot moves the [`FrameRecord`] out by value.

use log::debug;

use crate::{AddError, AddReason, FrameKind, FrameRecord, FrameState};

/// Fixed-capacity pool owning every in-flight outbound frame.
///
/// Handles are unique among live records; lookups are bounded O(capacity)
/// scans, which is the right trade at embedded scale (tens of entries).
#[derive(Debug)]
pub struct FrameBufferPool {
    slots: Vec<Option<FrameRecord>>,
    free: Vec<usize>,
    /// Monotonic insertion counter for FIFO ordering.
    next_seq: u64,
}

impl FrameBufferPool {
    /// Create a pool with a fixed number of slots.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        // Pop order makes low indices fill first; order is irrelevant to
        // correctness, FIFO comes from the seq counter.
        let free = (0..capacity).rev().collect();
        FrameBufferPool {
            slots,
            free,
            next_seq: 0,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether no records are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Insert a record into the live set.
    ///
    /// The record enters state `Waiting` (or `Hold` for indirect frames
    /// with a hold timeout). On failure the record is handed back inside
    /// the [`AddError`] so the caller keeps payload ownership.
    pub fn add(
        &mut self,
        mut record: FrameRecord,
        kind: FrameKind,
        hold_ticks: u8,
    ) -> Result<(), AddError> {
        if self.find_by_handle(record.handle).is_some() {
            return Err(AddError {
                reason: AddReason::DuplicateHandle(record.handle),
                record,
            });
        }
        let Some(idx) = self.free.pop() else {
            return Err(AddError {
                reason: AddReason::PoolExhausted,
                record,
            });
        };

        record.kind = kind;
        record.seq = self.next_seq;
        self.next_seq += 1;
        if kind == FrameKind::Indirect && hold_ticks > 0 {
            record.state = FrameState::Hold;
            record.hold_ticks = hold_ticks;
            record.options.indirect_hold = true;
        } else {
            record.state = FrameState::Waiting;
        }
        self.slots[idx] = Some(record);
        Ok(())
    }

    /// Count live records of one scheduling class.
    pub fn count_by_kind(&self, kind: FrameKind) -> usize {
        self.iter().filter(|r| r.kind == kind).count()
    }

    /// The oldest `Waiting` record of one class, if any (FIFO order).
    pub fn next_waiting(&self, kind: FrameKind) -> Option<&FrameRecord> {
        self.iter()
            .filter(|r| r.kind == kind && r.is_waiting())
            .min_by_key(|r| r.seq)
    }

    /// Look up a live record by handle.
    pub fn find_by_handle(&self, handle: u8) -> Option<&FrameRecord> {
        self.iter().find(|r| r.handle == handle)
    }

    /// Mutable lookup by handle.
    pub fn find_by_handle_mut(&mut self, handle: u8) -> Option<&mut FrameRecord> {
        self.iter_mut().find(|r| r.handle == handle)
    }

    /// The first live record addressed to `destination`.
    pub fn find_by_destination(
        &self,
        destination: zmesh_wire::ShortAddress,
    ) -> Option<&FrameRecord> {
        self.iter().find(|r| r.destination == destination)
    }

    /// Unlink a record without dropping it; ownership moves to the caller.
    ///
    /// Used when a frame migrates to a side list (e.g. an
    /// application-managed indirect queue).
    pub fn remove(&mut self, handle: u8) -> Option<FrameRecord> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|r| r.handle == handle))?;
        let record = self.slots[idx].take();
        self.free.push(idx);
        record
    }

    /// Unlink a record and drop it, payload included.
    ///
    /// This is the only payload-freeing path; returns `false` for a handle
    /// with no live record.
    pub fn release(&mut self, handle: u8) -> bool {
        match self.remove(handle) {
            Some(_) => true,
            None => {
                debug!("release for unknown handle 0x{:02X} ignored", handle);
                false
            }
        }
    }

    /// Park a waiting record for a sleeping destination.
    ///
    /// Starts the hold countdown; the record leaves `Hold` either when the
    /// destination polls (`TransmitScheduler::destination_available`) or
    /// when the countdown expires.
    pub fn hold(&mut self, handle: u8, hold_ticks: u8) -> bool {
        match self.find_by_handle_mut(handle) {
            Some(rec) if rec.state == FrameState::Waiting => {
                rec.state = FrameState::Hold;
                rec.hold_ticks = hold_ticks;
                rec.options.indirect_hold = true;
                true
            }
            _ => false,
        }
    }

    /// Advance hold countdowns by one tick.
    ///
    /// Records whose countdown reaches zero are unlinked and returned so
    /// the scheduler can report them as expired.
    pub fn tick(&mut self) -> Vec<FrameRecord> {
        let mut expired = Vec::new();
        for idx in 0..self.slots.len() {
            let timed_out = match &mut self.slots[idx] {
                Some(rec) if rec.state == FrameState::Hold => {
                    rec.hold_ticks = rec.hold_ticks.saturating_sub(1);
                    rec.hold_ticks == 0
                }
                _ => false,
            };
            if timed_out {
                if let Some(rec) = self.slots[idx].take() {
                    self.free.push(idx);
                    expired.push(rec);
                }
            }
        }
        expired
    }

    /// Drop every live record (network-layer reset).
    pub fn reset(&mut self) {
        for idx in 0..self.slots.len() {
            if self.slots[idx].take().is_some() {
                self.free.push(idx);
            }
        }
    }

    /// Iterate over live records.
    pub fn iter(&self) -> impl Iterator<Item = &FrameRecord> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Iterate mutably over live records.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FrameRecord> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TxOptions;
    use zmesh_wire::ShortAddress;

    fn record(handle: u8, dest: u16) -> FrameRecord {
        FrameRecord::new(
            ShortAddress(dest),
            vec![handle, 0xBB],
            handle,
            TxOptions::default(),
        )
    }

    #[test]
    fn test_add_and_find() {
        let mut pool = FrameBufferPool::new(4);
        pool.add(record(7, 0x1234), FrameKind::Direct, 0).unwrap();

        let rec = pool.find_by_handle(7).expect("record should be live");
        assert_eq!(rec.state, FrameState::Waiting);
        assert_eq!(rec.destination, ShortAddress(0x1234));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_duplicate_handle_rejected() {
        let mut pool = FrameBufferPool::new(4);
        pool.add(record(7, 0x1000), FrameKind::Direct, 0).unwrap();

        let err = pool
            .add(record(7, 0x2000), FrameKind::Direct, 0)
            .unwrap_err();
        assert_eq!(err.reason, AddReason::DuplicateHandle(7));
        // The rejected record comes back intact, payload and all.
        assert_eq!(err.record.payload, vec![7, 0xBB]);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pool_exhaustion_leaves_pool_unchanged() {
        let mut pool = FrameBufferPool::new(2);
        pool.add(record(1, 1), FrameKind::Direct, 0).unwrap();
        pool.add(record(2, 2), FrameKind::Direct, 0).unwrap();

        let err = pool.add(record(3, 3), FrameKind::Direct, 0).unwrap_err();
        assert_eq!(err.reason, AddReason::PoolExhausted);
        assert_eq!(err.record.handle, 3);
        assert_eq!(pool.len(), 2);
        // Nothing was evicted.
        assert!(pool.find_by_handle(1).is_some());
        assert!(pool.find_by_handle(2).is_some());
    }

    #[test]
    fn test_release_exactly_once() {
        let mut pool = FrameBufferPool::new(2);
        pool.add(record(9, 0x42), FrameKind::Direct, 0).unwrap();

        assert!(pool.release(9));
        assert!(pool.find_by_handle(9).is_none());
        // Second release of the same handle is a no-op, not a double free.
        assert!(!pool.release(9));
    }

    #[test]
    fn test_handle_reusable_after_release() {
        let mut pool = FrameBufferPool::new(2);
        pool.add(record(5, 1), FrameKind::Direct, 0).unwrap();
        assert!(pool.release(5));
        pool.add(record(5, 2), FrameKind::Direct, 0).unwrap();
        assert_eq!(
            pool.find_by_handle(5).unwrap().destination,
            ShortAddress(2)
        );
    }

    #[test]
    fn test_fifo_order_survives_slot_reuse() {
        let mut pool = FrameBufferPool::new(3);
        pool.add(record(1, 1), FrameKind::Direct, 0).unwrap();
        pool.add(record(2, 2), FrameKind::Direct, 0).unwrap();
        pool.release(1);
        pool.add(record(3, 3), FrameKind::Direct, 0).unwrap();

        // Record 2 was inserted before record 3, even though 3 may occupy
        // the lower slot index freed by 1.
        assert_eq!(pool.next_waiting(FrameKind::Direct).unwrap().handle, 2);
    }

    #[test]
    fn test_indirect_add_enters_hold() {
        let mut pool = FrameBufferPool::new(2);
        pool.add(record(4, 0x99), FrameKind::Indirect, 3).unwrap();
        let rec = pool.find_by_handle(4).unwrap();
        assert_eq!(rec.state, FrameState::Hold);
        assert_eq!(rec.hold_ticks, 3);
        assert!(rec.options.indirect_hold);
    }

    #[test]
    fn test_hold_expiry_returns_record() {
        let mut pool = FrameBufferPool::new(2);
        pool.add(record(4, 0x99), FrameKind::Indirect, 2).unwrap();

        assert!(pool.tick().is_empty());
        let expired = pool.tick();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].handle, 4);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_count_by_kind() {
        let mut pool = FrameBufferPool::new(4);
        pool.add(record(1, 1), FrameKind::Direct, 0).unwrap();
        pool.add(record(2, 2), FrameKind::Broadcast, 0).unwrap();
        pool.add(record(3, 3), FrameKind::Direct, 0).unwrap();
        assert_eq!(pool.count_by_kind(FrameKind::Direct), 2);
        assert_eq!(pool.count_by_kind(FrameKind::Broadcast), 1);
        assert_eq!(pool.count_by_kind(FrameKind::Indirect), 0);
    }

    #[test]
    fn test_reset_empties_pool() {
        let mut pool = FrameBufferPool::new(4);
        pool.add(record(1, 1), FrameKind::Direct, 0).unwrap();
        pool.add(record(2, 2), FrameKind::Indirect, 5).unwrap();
        pool.reset();
        assert!(pool.is_empty());
        // All slots usable again.
        for h in 0..4 {
            pool.add(record(h, h as u16), FrameKind::Direct, 0).unwrap();
        }
    }

    #[test]
    fn test_remove_transfers_ownership() {
        let mut pool = FrameBufferPool::new(2);
        pool.add(record(8, 0x11), FrameKind::Direct, 0).unwrap();
        let rec = pool.remove(8).expect("record should be removable");
        assert_eq!(rec.payload, vec![8, 0xBB]);
        assert!(pool.find_by_handle(8).is_none());
    }
}
