//! Bounded multi-producer single-consumer channel.
//!
//! `BoundedChannel` is a fixed ring of slots guarded by per-slot stamps, in the
//! style of Dmitry Vyukov's bounded queue:
//!
//! - Producers reserve a position with a CAS on `head`, write the slot, then
//!   publish it by advancing the slot stamp to "ready".
//! - The single consumer reads the slot at `tail` once its stamp says "ready",
//!   then releases it to the producer that will reach it one lap later.
//!
//! Stamps are `2 * pos` (free for the producer at `pos`) and `2 * pos + 1`
//! (ready for the consumer at `pos`). Keeping the two encodings disjoint lets a
//! ring of a single slot tell "full" from "free".
//!
//! The slot payload sits behind a `parking_lot::Mutex`. The stamp protocol
//! hands each slot to exactly one party at a time, so that lock is never
//! contended and `insert` never waits on another thread.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// One ring slot. Aligned to a cache line so neighbouring producers do not
/// false-share.
#[repr(align(64))]
struct Slot<T> {
    stamp: AtomicUsize,
    value: Mutex<Option<T>>,
}

impl<T> Slot<T> {
    fn new(index: usize) -> Self {
        Self {
            stamp: AtomicUsize::new(free_stamp(index)),
            value: Mutex::new(None),
        }
    }
}

#[inline]
const fn free_stamp(pos: usize) -> usize {
    pos.wrapping_mul(2)
}

#[inline]
const fn ready_stamp(pos: usize) -> usize {
    pos.wrapping_mul(2).wrapping_add(1)
}

/// Fixed-capacity queue with concurrent `insert` and single-consumer `remove`.
///
/// Capacity is set at construction and never grows. A full channel rejects
/// inserts and hands the item back; an empty channel returns `None`. Neither
/// operation blocks or allocates.
///
/// # Ordering
///
/// Inserts that do not overlap in time are delivered in the order they
/// completed. Overlapping inserts from different threads may be delivered in
/// either order; every accepted item is delivered exactly once.
///
/// # Examples
///
/// ```
/// use prometheus_workload::infra::BoundedChannel;
///
/// let channel = BoundedChannel::new(2);
/// assert!(channel.insert(1).is_ok());
/// assert!(channel.insert(2).is_ok());
/// assert_eq!(channel.insert(3), Err(3));
/// assert_eq!(channel.remove(), Some(1));
/// assert!(channel.insert(3).is_ok());
/// ```
pub struct BoundedChannel<T> {
    /// Next position a producer will reserve.
    head: AtomicUsize,
    /// Next position the consumer will read.
    tail: AtomicUsize,
    slots: Box<[Slot<T>]>,
}

impl<T> BoundedChannel<T> {
    /// Create a channel holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedChannel capacity must be greater than 0");
        let slots = (0..capacity).map(Slot::new).collect();
        Self {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            slots,
        }
    }

    /// Try to append `item`.
    ///
    /// Safe to call from any number of threads at once, including the
    /// consumer thread.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` when the channel is at capacity.
    pub fn insert(&self, item: T) -> Result<(), T> {
        let capacity = self.slots.len();
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos % capacity];
            let stamp = slot.stamp.load(Ordering::Acquire);
            #[allow(clippy::cast_possible_wrap)]
            let diff = stamp.wrapping_sub(free_stamp(pos)) as isize;

            if diff == 0 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        *slot.value.lock() = Some(item);
                        slot.stamp.store(ready_stamp(pos), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // The consumer has not released this slot from the previous lap.
                return Err(item);
            } else {
                // Another producer claimed `pos`.
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Take the oldest published item, or `None` if nothing is ready.
    ///
    /// Must only be called from the single consumer thread. Concurrent
    /// callers would race on `tail` and may observe or skip the same slot;
    /// this is not checked at runtime.
    pub fn remove(&self) -> Option<T> {
        let capacity = self.slots.len();
        let tail = self.tail.load(Ordering::Relaxed);
        let slot = &self.slots[tail % capacity];

        if slot.stamp.load(Ordering::Acquire) != ready_stamp(tail) {
            return None;
        }

        let item = slot.value.lock().take();
        slot.stamp
            .store(free_stamp(tail.wrapping_add(capacity)), Ordering::Release);
        self.tail.store(tail.wrapping_add(1), Ordering::Relaxed);
        item
    }

    /// Maximum number of items the channel can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Approximate number of reserved-but-unconsumed items.
    ///
    /// Exact when no insert or remove is in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(self.slots.len())
    }

    /// Whether the channel currently appears empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedChannel")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
