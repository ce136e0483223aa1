//! Gated bounded single-producer/single-consumer ring.
//!
//! The producer is a vendor-SDK callback thread, the consumer a broker
//! worker; the two coordinate solely through atomic head/tail counters
//! with release/acquire publication. A gate in front of the producer
//! path lets the owning manager arm the ring at `start` and drop
//! in-flight enqueues cleanly at `stop`. Neither path blocks.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Called on the producer thread each time a full ring rejects a
/// value. Must not block.
pub type OverflowHook = Box<dyn Fn() + Send + Sync>;

/// Bounded SPSC ring with a producer-side gate.
///
/// Head and tail are monotonic 64-bit counters; the slot for a counter
/// value `c` is `c % capacity`. Invariants: `head <= tail` and
/// `tail - head <= capacity` at all times.
///
/// Exactly one producer thread and one consumer thread are permitted;
/// enforcing this is the owner's responsibility. Methods take `&self`
/// so both sides can share the ring behind an `Arc`.
pub struct SpscRing<T> {
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,

    /// Closed until the consumer is armed; enqueues are rejected
    /// without mutating the ring while closed.
    gate: AtomicBool,

    overflow_hook: Option<OverflowHook>,
}

// The ring hands each slot to at most one side at a time, mediated by
// the release/acquire pair on tail (producer -> consumer) and head
// (consumer -> producer).
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Create a ring with the given capacity. The gate starts closed.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            slots,
            gate: AtomicBool::new(false),
            overflow_hook: None,
        }
    }

    /// Attach the hook invoked on each rejected-full enqueue.
    pub fn with_overflow_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.overflow_hook = Some(Box::new(hook));
        self
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Arm the ring: subsequent enqueues are accepted.
    pub fn open(&self) {
        self.gate.store(true, Ordering::Release);
    }

    /// Close the gate: subsequent enqueues are rejected without
    /// touching the ring.
    pub fn close(&self) {
        self.gate.store(false, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.gate.load(Ordering::Acquire)
    }

    /// Producer side. Returns `false` if the gate is closed or the
    /// ring is full (invoking the overflow hook); otherwise moves the
    /// value in and publishes it. Never blocks, never overwrites.
    pub fn enqueue(&self, value: T) -> bool {
        if !self.gate.load(Ordering::Acquire) {
            return false;
        }

        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail - head >= self.slots.len() as u64 {
            if let Some(hook) = &self.overflow_hook {
                hook();
            }
            return false;
        }

        let slot = &self.slots[(tail % self.slots.len() as u64) as usize];
        // Safety: tail - head < capacity, so the consumer has not been
        // granted this slot; we are the only producer.
        unsafe { (*slot.get()).write(value) };

        self.tail.store(tail + 1, Ordering::Release);
        true
    }

    /// Consumer side. Returns `None` when empty; otherwise moves the
    /// oldest value out and advances head. Never blocks.
    pub fn dequeue(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Relaxed);

        if head == tail {
            return None;
        }

        let slot = &self.slots[(head % self.slots.len() as u64) as usize];
        // Safety: head < tail, so the producer has published this slot
        // and will not touch it again until head advances past it.
        let value = unsafe { (*slot.get()).assume_init_read() };

        self.head.store(head + 1, Ordering::Release);
        Some(value)
    }

    /// Advisory occupancy under acquire loads.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        (tail - head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        // Sole owner at this point; drain unconsumed slots.
        let tail = self.tail.load(Ordering::Acquire);
        let mut head = self.head.load(Ordering::Acquire);
        while head < tail {
            let slot = &self.slots[(head % self.slots.len() as u64) as usize];
            unsafe { (*slot.get()).assume_init_drop() };
            head += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_gate_closed_rejects() {
        let ring: SpscRing<u32> = SpscRing::new(4);
        assert!(!ring.enqueue(1));
        assert_eq!(ring.len(), 0);

        ring.open();
        assert!(ring.enqueue(1));
        assert_eq!(ring.len(), 1);

        ring.close();
        assert!(!ring.enqueue(2));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_fifo_order() {
        let ring = SpscRing::new(8);
        ring.open();

        for i in 0..5u32 {
            assert!(ring.enqueue(i));
        }
        for i in 0..5u32 {
            assert_eq!(ring.dequeue(), Some(i));
        }
        assert_eq!(ring.dequeue(), None);
    }

    #[test]
    fn test_full_rejects_and_fires_hook() {
        let overflows = Arc::new(AtomicU64::new(0));
        let counter = overflows.clone();
        let ring = SpscRing::new(4).with_overflow_hook(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        ring.open();

        for i in 0..4u32 {
            assert!(ring.enqueue(i));
        }
        assert!(!ring.enqueue(99));
        assert!(!ring.enqueue(100));

        assert_eq!(overflows.load(Ordering::Relaxed), 2);
        assert_eq!(ring.len(), 4);

        // Oldest value survives; the rejected ones never entered.
        assert_eq!(ring.dequeue(), Some(0));
    }

    #[test]
    fn test_wraparound() {
        let ring = SpscRing::new(4);
        ring.open();

        for round in 0..10u32 {
            for i in 0..4 {
                assert!(ring.enqueue(round * 4 + i));
            }
            for i in 0..4 {
                assert_eq!(ring.dequeue(), Some(round * 4 + i));
            }
        }
    }

    #[test]
    fn test_open_after_empty_accepts_capacity() {
        let ring: SpscRing<u32> = SpscRing::new(16);
        ring.open();
        for i in 0..16 {
            assert!(ring.enqueue(i), "enqueue {i} should succeed on empty ring");
        }
        assert!(!ring.enqueue(16));
    }

    #[test]
    fn test_spsc_threads_preserve_order_and_bound() {
        const COUNT: u64 = 100_000;
        const CAP: usize = 64;

        let ring = Arc::new(SpscRing::new(CAP));
        ring.open();

        let producer_ring = ring.clone();
        let producer = thread::spawn(move || {
            let mut sent = Vec::new();
            for i in 0..COUNT {
                if producer_ring.enqueue(i) {
                    sent.push(i);
                }
                if i % 512 == 0 {
                    thread::yield_now();
                }
            }
            sent
        });

        let consumer_ring = ring.clone();
        let consumer = thread::spawn(move || {
            let mut received = Vec::new();
            let mut idle = 0;
            loop {
                assert!(consumer_ring.len() <= CAP);
                match consumer_ring.dequeue() {
                    Some(v) => {
                        received.push(v);
                        idle = 0;
                    }
                    None => {
                        idle += 1;
                        if idle > 10_000 {
                            break;
                        }
                        thread::yield_now();
                    }
                }
            }
            received
        });

        let sent = producer.join().unwrap();
        let received = consumer.join().unwrap();

        // Everything received is a prefix-preserving subsequence of
        // what was successfully enqueued, in order.
        assert_eq!(received, sent[..received.len()]);
    }

    #[test]
    fn test_drop_drains_pending_values() {
        let ring = SpscRing::new(8);
        ring.open();
        for i in 0..5 {
            assert!(ring.enqueue(Box::new(i)));
        }
        drop(ring); // must not leak the five boxes
    }
}
