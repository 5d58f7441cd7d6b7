//! # Ack Ring
//!
//! Bounded single-producer/single-consumer ring of 32-bit framed-byte
//! lengths. Two instances track every outbound frame under independent
//! completion criteria: one drained by the transport flush path, one drained
//! by the rate pacer.
//!
//! The write side belongs to the producer (`forward`), the read side to the
//! I/O worker. Reservation and commit are split so the producer can check
//! **both** rings for space before publishing to either:
//!
//! ```text
//! producer:  try_reserve_write → store_len → commit_write
//! worker:    try_acquire_read  → load_len  → commit_read
//! ```
//!
//! A reservation that is never committed publishes nothing — the next
//! `try_reserve_write` hands out the same slot again.
//!
//! Cursors are monotonic and wrap modulo `usize`; the occupancy is always
//! `tail - head`, so the ring holds exactly `capacity` entries when full.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Bounded SPSC ring of framed-byte lengths.
///
/// `commit_write` publishes with Release so the matching `try_acquire_read`
/// (Acquire on the tail) observes the slot contents; `commit_read` frees with
/// Release so a later `try_reserve_write` (Acquire on the head) may reuse the
/// slot. Both operations are non-blocking: a full ring fails the producer via
/// `None` rather than waiting.
#[derive(Debug)]
pub struct AckRing {
    slots: Box<[AtomicU32]>,
    /// Read cursor, advanced only by the consumer.
    head: AtomicUsize,
    /// Write cursor, advanced only by the producer.
    tail: AtomicUsize,
}

impl AckRing {
    /// Create a ring holding up to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        let slots = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        AckRing {
            slots,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Next write index, or `None` if the ring is full. Does not advance the
    /// write cursor; call [`commit_write`](Self::commit_write) to publish.
    pub fn try_reserve_write(&self) -> Option<u32> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.slots.len() {
            return None;
        }
        Some((tail % self.slots.len()) as u32)
    }

    /// Publish the most recent reservation to the consumer.
    pub fn commit_write(&self) {
        let tail = self.tail.load(Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
    }

    /// Next read index, or `None` if the ring is empty. Does not advance the
    /// read cursor; call [`commit_read`](Self::commit_read) to free the slot.
    pub fn try_acquire_read(&self) -> Option<u32> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        Some((head % self.slots.len()) as u32)
    }

    /// Advance the read cursor past the most recent acquisition.
    pub fn commit_read(&self) {
        let head = self.head.load(Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Release);
    }

    /// Store the framed length into a reserved slot, before `commit_write`.
    pub fn store_len(&self, index: u32, framed_len: u32) {
        self.slots[index as usize].store(framed_len, Ordering::Relaxed);
    }

    /// Load the framed length from an acquired slot, before `commit_read`.
    pub fn load_len(&self, index: u32) -> u32 {
        self.slots[index as usize].load(Ordering::Relaxed)
    }

    /// Number of committed entries not yet released.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    /// Whether the ring currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries the ring can hold.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
