//! Lock-free bounded channel for real-time audio processing
//!
//! Fixed-capacity single-producer/single-consumer ring used to hand
//! parameter sets and coefficient sets between the audio thread and a
//! band's coefficient worker.
//!
//! Performance characteristics:
//! - Lock-free (no mutex contention)
//! - Wait-free for single producer/consumer
//! - No allocations after construction
//!
//! Transfer is swap-based: slots are pre-filled with `T::default()` and
//! values move in and out via `mem::swap`/`mem::replace`. For
//! shared-ownership payloads (`Arc`s inside `Option`s) this means the
//! channel itself never drops an occupant's last reference: the displaced
//! value is always retained by whichever side performed the swap, and the
//! consumer decides on its own thread when storage actually dies.

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free single-producer single-consumer bounded channel
///
/// The two roles may run on different threads; no other concurrency
/// pattern is supported. Positions grow monotonically and are masked into
/// the slot array, with cache-padded counters to prevent false sharing
/// between cores.
pub struct BoundedChannel<T> {
    /// Slot storage, pre-initialized with defaults (must be power-of-2 len)
    slots: Box<[UnsafeCell<T>]>,

    /// Write position (cache-padded to prevent false sharing)
    write_pos: CachePadded<AtomicUsize>,

    /// Read position (cache-padded to prevent false sharing)
    read_pos: CachePadded<AtomicUsize>,

    capacity: usize,

    /// Mask for fast modulo operation (capacity - 1)
    mask: usize,
}

// SAFETY: slot access is partitioned by the SPSC protocol. The producer
// only touches the slot at `write_pos` before publishing it with a Release
// store; the consumer only touches the slot at `read_pos` after an Acquire
// load of `write_pos` has made that publication visible. With exactly one
// producer and one consumer, no slot is ever reachable from two threads at
// once.
unsafe impl<T: Send> Send for BoundedChannel<T> {}
unsafe impl<T: Send> Sync for BoundedChannel<T> {}

impl<T: Default> BoundedChannel<T> {
    /// Create a new channel
    ///
    /// Capacity will be rounded up to the next power of 2 for efficiency.
    pub fn with_capacity(mut capacity: usize) -> Self {
        if !capacity.is_power_of_two() {
            capacity = capacity.next_power_of_two();
        }

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            write_pos: CachePadded::new(AtomicUsize::new(0)),
            read_pos: CachePadded::new(AtomicUsize::new(0)),
            capacity,
            mask: capacity - 1,
        }
    }

    /// Push a value (producer side)
    ///
    /// Fails when no slot is free, handing the value back so the caller
    /// decides whether to drop or retain it; the channel never destroys a
    /// caller's value. Never blocks, never allocates.
    pub fn push(&self, value: T) -> Result<(), T> {
        let write_pos = self.write_pos.load(Ordering::Relaxed);
        let read_pos = self.read_pos.load(Ordering::Acquire);

        if write_pos.wrapping_sub(read_pos) == self.capacity {
            return Err(value);
        }

        // SAFETY: this slot was either never written or already consumed
        // (read_pos has passed it); the consumer cannot observe it until
        // the Release store below.
        let displaced = unsafe {
            let slot = self.slots[write_pos & self.mask].get();
            mem::replace(&mut *slot, value)
        };

        self.write_pos
            .store(write_pos.wrapping_add(1), Ordering::Release);

        // The displaced occupant is whatever the consumer left behind: a
        // default after `try_pop`, or donated storage after `exchange`.
        drop(displaced);

        Ok(())
    }

    /// Pop a value into caller-provided storage (consumer side)
    ///
    /// Moves the slot value into `*out`, leaving `T::default()` in the
    /// slot; `*out`'s previous content is dropped on the calling thread.
    /// Fails when the channel is empty. Real-time consumers that must not
    /// drop should use [`exchange`](Self::exchange) instead.
    pub fn try_pop(&self, out: &mut T) -> bool {
        let read_pos = self.read_pos.load(Ordering::Relaxed);
        let write_pos = self.write_pos.load(Ordering::Acquire);

        if write_pos == read_pos {
            return false;
        }

        // SAFETY: write_pos > read_pos, so the producer has published this
        // slot and will not touch it again until read_pos passes it.
        unsafe {
            let slot = self.slots[read_pos & self.mask].get();
            *out = mem::take(&mut *slot);
        }

        self.read_pos
            .store(read_pos.wrapping_add(1), Ordering::Release);

        true
    }

    /// Swap caller-owned storage with the next buffered value (consumer side)
    ///
    /// On success the buffered value ends up in `*out` and the freed slot
    /// receives the caller's old value, so nothing is dropped on either
    /// side and no reference count can reach zero inside the channel. Fails
    /// without modifying `*out` when the channel is empty.
    pub fn exchange(&self, out: &mut T) -> bool {
        let read_pos = self.read_pos.load(Ordering::Relaxed);
        let write_pos = self.write_pos.load(Ordering::Acquire);

        if write_pos == read_pos {
            return false;
        }

        // SAFETY: same slot-ownership argument as `try_pop`.
        unsafe {
            let slot = self.slots[read_pos & self.mask].get();
            mem::swap(&mut *slot, out);
        }

        self.read_pos
            .store(read_pos.wrapping_add(1), Ordering::Release);

        true
    }

    /// Number of buffered values ready to read
    pub fn available_for_read(&self) -> usize {
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let write_pos = self.write_pos.load(Ordering::Acquire);
        write_pos.wrapping_sub(read_pos)
    }

    /// Number of free slots
    pub fn free_space(&self) -> usize {
        self.capacity - self.available_for_read()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.available_for_read() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_push_pop_basic() {
        let channel = BoundedChannel::with_capacity(8);

        assert!(channel.push(1_u32).is_ok());
        assert!(channel.push(2).is_ok());
        assert_eq!(channel.available_for_read(), 2);

        let mut out = 0;
        assert!(channel.try_pop(&mut out));
        assert_eq!(out, 1);
        assert!(channel.try_pop(&mut out));
        assert_eq!(out, 2);
        assert!(!channel.try_pop(&mut out));
    }

    #[test]
    fn test_fifo_order_through_wraparound() {
        let channel = BoundedChannel::with_capacity(4);
        let mut out = 0_u32;

        for round in 0..10_u32 {
            assert!(channel.push(round * 2).is_ok());
            assert!(channel.push(round * 2 + 1).is_ok());
            assert!(channel.try_pop(&mut out));
            assert_eq!(out, round * 2);
            assert!(channel.try_pop(&mut out));
            assert_eq!(out, round * 2 + 1);
        }
    }

    #[test]
    fn test_push_fails_when_full_and_returns_value() {
        let channel = BoundedChannel::with_capacity(2);
        assert!(channel.push(1_u32).is_ok());
        assert!(channel.push(2).is_ok());

        match channel.push(3) {
            Err(value) => assert_eq!(value, 3),
            Ok(()) => panic!("push into a full channel must fail"),
        }
        assert_eq!(channel.free_space(), 0);
    }

    #[test]
    fn test_counts_invariant() {
        let channel = BoundedChannel::with_capacity(8);
        let mut out = 0_u32;

        assert_eq!(
            channel.available_for_read() + channel.free_space(),
            channel.capacity()
        );

        for i in 0..5 {
            channel.push(i).unwrap();
            assert_eq!(
                channel.available_for_read() + channel.free_space(),
                channel.capacity()
            );
        }
        while channel.try_pop(&mut out) {
            assert_eq!(
                channel.available_for_read() + channel.free_space(),
                channel.capacity()
            );
        }
    }

    #[test]
    fn test_capacity_rounding() {
        let channel = BoundedChannel::<u32>::with_capacity(10);
        assert_eq!(channel.capacity(), 16);
    }

    #[test]
    fn test_exchange_swaps_storage() {
        let channel = BoundedChannel::with_capacity(4);
        channel.push(Some(7_u32)).unwrap();

        let mut storage = Some(99_u32);
        assert!(channel.exchange(&mut storage));
        assert_eq!(storage, Some(7));

        // The caller's old value now occupies the freed slot and comes back
        // out on the next push/pop cycle's displaced path; nothing was lost
        channel.push(Some(8)).unwrap();
        let mut out = None;
        assert!(channel.try_pop(&mut out));
        assert_eq!(out, Some(8));
    }

    #[test]
    fn test_exchange_on_empty_leaves_storage_untouched() {
        let channel = BoundedChannel::<Option<u32>>::with_capacity(4);
        let mut storage = Some(42);
        assert!(!channel.exchange(&mut storage));
        assert_eq!(storage, Some(42));
    }

    #[test]
    fn test_exchange_preserves_arc_refcounts() {
        let channel = BoundedChannel::with_capacity(4);
        let payload = Arc::new(123_u32);
        let observer = Arc::clone(&payload);

        channel.push(Some(payload)).unwrap();
        assert_eq!(Arc::strong_count(&observer), 2);

        let mut storage: Option<Arc<u32>> = None;
        assert!(channel.exchange(&mut storage));

        // The swap moved the Arc without touching its count
        assert_eq!(Arc::strong_count(&observer), 2);
        assert!(Arc::ptr_eq(&observer, storage.as_ref().unwrap()));
    }

    #[test]
    fn test_spsc_threaded_transfer_in_order() {
        let channel = Arc::new(BoundedChannel::with_capacity(64));
        let producer_channel = Arc::clone(&channel);

        const COUNT: u64 = 100_000;

        let producer = std::thread::spawn(move || {
            let mut next = 0_u64;
            while next < COUNT {
                match producer_channel.push(next) {
                    Ok(()) => next += 1,
                    Err(_) => std::thread::yield_now(),
                }
            }
        });

        let mut expected = 0_u64;
        let mut out = 0_u64;
        while expected < COUNT {
            if channel.try_pop(&mut out) {
                assert_eq!(out, expected);
                expected += 1;
            } else {
                std::thread::yield_now();
            }
        }

        producer.join().unwrap();
        assert!(channel.is_empty());
    }

    #[test]
    fn prop_counts_and_fifo_under_arbitrary_interleavings() {
        use proptest::collection::vec;
        use proptest::prelude::*;

        proptest!(|(ops in vec(any::<bool>(), 1..200), capacity in 1_usize..32)| {
            let channel = BoundedChannel::with_capacity(capacity);
            let mut model = std::collections::VecDeque::new();
            let mut next = 0_u32;
            let mut out = 0_u32;

            for push in ops {
                if push {
                    match channel.push(next) {
                        Ok(()) => model.push_back(next),
                        Err(rejected) => {
                            prop_assert_eq!(rejected, next);
                            prop_assert_eq!(model.len(), channel.capacity());
                        }
                    }
                    next += 1;
                } else {
                    let popped = channel.try_pop(&mut out);
                    match model.pop_front() {
                        Some(expected) => {
                            prop_assert!(popped);
                            prop_assert_eq!(out, expected);
                        }
                        None => prop_assert!(!popped),
                    }
                }

                prop_assert_eq!(channel.available_for_read(), model.len());
                prop_assert_eq!(
                    channel.available_for_read() + channel.free_space(),
                    channel.capacity()
                );
            }
        });
    }

    #[test]
    fn test_drop_only_happens_off_the_swap_path() {
        // A consumer that drains with exchange + take leaves defaults in
        // the slots, so a later producer push displaces only trivial values
        let channel = BoundedChannel::with_capacity(2);
        channel.push(Some(Arc::new(1_u32))).unwrap();
        channel.push(Some(Arc::new(2_u32))).unwrap();

        let mut storage: Option<Arc<u32>> = None;
        while channel.exchange(&mut storage) {
            let taken = storage.take().unwrap();
            assert_eq!(Arc::strong_count(&taken), 1);
        }

        // Slots now hold None; refill works and values arrive intact
        channel.push(Some(Arc::new(3_u32))).unwrap();
        assert!(channel.exchange(&mut storage));
        assert_eq!(*storage.take().unwrap(), 3);
    }
}
