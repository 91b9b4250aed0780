//! Ring bit buffer: a fixed-capacity circular bitset of call outcomes.
//!
//! Each recorded outcome occupies one bit (1 = failure, 0 = success), packed
//! into 64-bit words so a window of 1024 calls costs 16 words. Recording and
//! the returned counters form one atomic step with respect to concurrent
//! callers; a mutex around the small state is sufficient because both record
//! and read are O(1).

use parking_lot::Mutex;

/// Post-write view of the ring contents, returned by [`RingBitBuffer::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSnapshot {
    /// Number of occupied slots, `min(records, capacity)`.
    pub buffered_calls: usize,
    /// Number of occupied slots holding a failure bit.
    pub failed_calls: usize,
}

#[derive(Debug)]
struct RingState {
    words: Box<[u64]>,
    head: usize,
    buffered: usize,
    failed: usize,
}

/// Fixed-size FIFO of 1-bit outcomes with O(1) record and popcount-based
/// failure accounting.
#[derive(Debug)]
pub struct RingBitBuffer {
    capacity: usize,
    state: Mutex<RingState>,
}

impl RingBitBuffer {
    /// Creates a buffer holding the outcomes of the last `capacity` calls.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            capacity,
            state: Mutex::new(RingState {
                words: vec![0u64; capacity.div_ceil(64)].into_boxed_slice(),
                head: 0,
                buffered: 0,
                failed: 0,
            }),
        }
    }

    /// Writes one outcome at the head, advances it, and returns the post-write
    /// counters.
    ///
    /// The first `capacity` records grow `buffered_calls` from 0 to capacity;
    /// afterwards the oldest bit is overwritten and its contribution removed
    /// from `failed_calls`.
    pub fn record(&self, failure: bool) -> RingSnapshot {
        let mut state = self.state.lock();
        let word = state.head / 64;
        let mask = 1u64 << (state.head % 64);

        if state.buffered == self.capacity {
            if state.words[word] & mask != 0 {
                state.failed -= 1;
            }
        } else {
            state.buffered += 1;
        }

        if failure {
            state.words[word] |= mask;
            state.failed += 1;
        } else {
            state.words[word] &= !mask;
        }
        state.head = (state.head + 1) % self.capacity;

        RingSnapshot {
            buffered_calls: state.buffered,
            failed_calls: state.failed,
        }
    }

    /// Failure percentage over the window, or `-1.0` while the buffer is not
    /// yet full (not enough samples to decide).
    pub fn failure_rate(&self) -> f32 {
        let state = self.state.lock();
        if state.buffered < self.capacity {
            -1.0
        } else {
            state.failed as f32 * 100.0 / state.buffered as f32
        }
    }

    /// Clears all bits and counters.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        for word in state.words.iter_mut() {
            *word = 0;
        }
        state.head = 0;
        state.buffered = 0;
        state.failed = 0;
    }

    /// Window size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub fn buffered_calls(&self) -> usize {
        self.state.lock().buffered
    }

    /// Number of occupied slots holding a failure.
    pub fn failed_calls(&self) -> usize {
        self.state.lock().failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn grows_until_full_then_overwrites_oldest() {
        let ring = RingBitBuffer::new(3);

        assert_eq!(
            ring.record(true),
            RingSnapshot {
                buffered_calls: 1,
                failed_calls: 1
            }
        );
        assert_eq!(
            ring.record(false),
            RingSnapshot {
                buffered_calls: 2,
                failed_calls: 1
            }
        );
        assert_eq!(
            ring.record(true),
            RingSnapshot {
                buffered_calls: 3,
                failed_calls: 2
            }
        );

        // Overwrites the first record (a failure).
        assert_eq!(
            ring.record(false),
            RingSnapshot {
                buffered_calls: 3,
                failed_calls: 1
            }
        );
    }

    #[test]
    fn failure_rate_is_undecidable_until_full() {
        let ring = RingBitBuffer::new(4);
        ring.record(true);
        ring.record(true);
        ring.record(true);
        assert_eq!(ring.failure_rate(), -1.0);

        ring.record(false);
        assert_eq!(ring.failure_rate(), 75.0);
    }

    #[test]
    fn reset_clears_bits_and_counters() {
        let ring = RingBitBuffer::new(2);
        ring.record(true);
        ring.record(true);
        assert_eq!(ring.failure_rate(), 100.0);

        ring.reset();
        assert_eq!(ring.buffered_calls(), 0);
        assert_eq!(ring.failed_calls(), 0);
        assert_eq!(ring.failure_rate(), -1.0);

        // Slots cleared, not just counters: a fresh window sees no stale bits.
        ring.record(false);
        ring.record(false);
        assert_eq!(ring.failure_rate(), 0.0);
    }

    #[test]
    fn spans_multiple_words() {
        let ring = RingBitBuffer::new(100);
        for i in 0..100 {
            ring.record(i % 2 == 0);
        }
        assert_eq!(ring.buffered_calls(), 100);
        assert_eq!(ring.failed_calls(), 50);
        assert_eq!(ring.failure_rate(), 50.0);

        // Another full lap of successes flushes every failure bit out.
        for _ in 0..100 {
            ring.record(false);
        }
        assert_eq!(ring.failed_calls(), 0);
        assert_eq!(ring.failure_rate(), 0.0);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let ring = Arc::new(RingBitBuffer::new(64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ring = Arc::clone(&ring);
            handles.push(std::thread::spawn(move || {
                for _ in 0..8 {
                    ring.record(true);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ring.buffered_calls(), 64);
        assert_eq!(ring.failed_calls(), 64);
        assert_eq!(ring.failure_rate(), 100.0);
    }
}
