//! Lock-free cycle/permission accounting.
//!
//! Time since the limiter was created is divided into cycles of
//! `limit_refresh_period` nanoseconds; the cycle for instant `t` is
//! `t / period`. The mutable state is a single word packing
//! `(active_cycle, active_permissions)` and is only ever replaced by
//! compare-and-swap, so any number of concurrent acquirers contend on one
//! atomic cell. Negative permissions encode reservations already handed to
//! callers that are still waiting for their cycle to start.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

// State layout: cycle in the high 32 bits, permissions (i32) in the low 32.
fn pack(cycle: u32, permissions: i32) -> u64 {
    ((cycle as u64) << 32) | (permissions as u32 as u64)
}

fn unpack(word: u64) -> (u32, i32) {
    ((word >> 32) as u32, word as u32 as i32)
}

pub(crate) struct AtomicCycleCore {
    start: Instant,
    period_nanos: u64,
    limit: AtomicU32,
    state: AtomicU64,
    last_nanos_to_wait: AtomicU64,
}

impl AtomicCycleCore {
    pub(crate) fn new(period_nanos: u64, limit: u32) -> Self {
        Self {
            start: Instant::now(),
            period_nanos,
            limit: AtomicU32::new(limit),
            state: AtomicU64::new(pack(0, limit as i32)),
            last_nanos_to_wait: AtomicU64::new(0),
        }
    }

    fn now_nanos(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    /// Reserves one permission.
    ///
    /// `Ok(wait)` means the permission was reserved and becomes valid after
    /// `wait` nanoseconds (0 = immediately). `Err(wait)` means the required
    /// wait exceeds `timeout_nanos`; the state is left untouched.
    pub(crate) fn try_reserve(&self, timeout_nanos: u64) -> Result<u64, u64> {
        loop {
            let observed = self.state.load(Ordering::Acquire);
            let (active_cycle, active_permissions) = unpack(observed);
            let limit = self.limit.load(Ordering::Relaxed) as i64;

            let now = self.now_nanos();
            let cycle = now / self.period_nanos;
            let cycle_tag = cycle as u32;

            // Lazy refresh: skipped cycles each grant `limit` permissions,
            // capped at `limit` so idle periods cannot bank a burst. The
            // cycle is stored mod 2^32; an idle gap of over 2^32 cycles can
            // alias to "same cycle" for one acquire and heals on the next.
            let elapsed_cycles = cycle_tag.wrapping_sub(active_cycle) as u64;
            let permissions = if elapsed_cycles > 0 {
                (active_permissions as i64)
                    .saturating_add((elapsed_cycles as i64).saturating_mul(limit))
                    .min(limit)
            } else {
                active_permissions as i64
            };

            // Wait until the cycle where the reservation becomes valid: the
            // remainder of the current cycle plus one full cycle for each
            // `limit` reservations already queued ahead of this caller.
            let nanos_to_wait = if permissions > 0 {
                0
            } else {
                let nanos_to_next_cycle = (cycle + 1) * self.period_nanos - now;
                ((-permissions) as u64 / limit as u64) * self.period_nanos + nanos_to_next_cycle
            };

            if nanos_to_wait > timeout_nanos {
                return Err(nanos_to_wait);
            }

            let reserved = (permissions - 1).max(i32::MIN as i64) as i32;
            if self
                .state
                .compare_exchange_weak(
                    observed,
                    pack(cycle_tag, reserved),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.last_nanos_to_wait
                    .store(nanos_to_wait, Ordering::Relaxed);
                return Ok(nanos_to_wait);
            }
            // CAS lost against another acquirer, retry with fresh state.
        }
    }

    /// Permissions available right now, after accounting for elapsed cycles.
    /// Negative values are outstanding reservations.
    pub(crate) fn available_permissions(&self) -> i64 {
        let (active_cycle, active_permissions) = unpack(self.state.load(Ordering::Acquire));
        let limit = self.limit.load(Ordering::Relaxed) as i64;
        let cycle_tag = (self.now_nanos() / self.period_nanos) as u32;
        let elapsed_cycles = cycle_tag.wrapping_sub(active_cycle) as u64;
        if elapsed_cycles > 0 {
            (active_permissions as i64)
                .saturating_add((elapsed_cycles as i64).saturating_mul(limit))
                .min(limit)
        } else {
            active_permissions as i64
        }
    }

    pub(crate) fn last_nanos_to_wait(&self) -> u64 {
        self.last_nanos_to_wait.load(Ordering::Relaxed)
    }

    pub(crate) fn limit(&self) -> u32 {
        self.limit.load(Ordering::Relaxed)
    }

    /// Replaces the per-cycle limit. Takes full effect at the next refresh.
    pub(crate) fn set_limit(&self, limit: u32) {
        self.limit.store(limit, Ordering::Relaxed);
    }

    pub(crate) fn period_nanos(&self) -> u64 {
        self.period_nanos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    const HOUR: u64 = 3_600_000_000_000;

    #[test]
    fn pack_round_trips_negative_permissions() {
        for (cycle, permissions) in [(0, 50), (7, 0), (u32::MAX, -1), (123, i32::MIN)] {
            assert_eq!(unpack(pack(cycle, permissions)), (cycle, permissions));
        }
    }

    #[test]
    fn grants_limit_permissions_per_cycle() {
        // One-hour cycle so the test stays in cycle zero.
        let core = AtomicCycleCore::new(HOUR, 3);
        assert_eq!(core.try_reserve(0), Ok(0));
        assert_eq!(core.try_reserve(0), Ok(0));
        assert_eq!(core.try_reserve(0), Ok(0));

        let err = core.try_reserve(0).unwrap_err();
        assert!(err > 0);
        // The rejected attempt must not consume state.
        assert_eq!(core.available_permissions(), 0);
    }

    #[test]
    fn reservations_queue_into_future_cycles() {
        let core = AtomicCycleCore::new(HOUR, 1);
        assert_eq!(core.try_reserve(0), Ok(0));

        // Next permit belongs to the following cycle.
        let first_wait = core.try_reserve(u64::MAX).unwrap();
        assert!(first_wait <= HOUR);

        // The one after that is a full cycle later.
        let second_wait = core.try_reserve(u64::MAX).unwrap();
        assert!(second_wait > HOUR && second_wait <= 2 * HOUR);
        assert_eq!(core.available_permissions(), -2);
    }

    #[test]
    fn refresh_restores_permissions() {
        let core = AtomicCycleCore::new(20_000_000, 2); // 20 ms cycles
        assert_eq!(core.try_reserve(0), Ok(0));
        assert_eq!(core.try_reserve(0), Ok(0));
        assert!(core.try_reserve(0).is_err());

        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(core.try_reserve(0), Ok(0));
    }

    #[test]
    fn refresh_carries_reservations_forward() {
        let core = AtomicCycleCore::new(20_000_000, 1);
        assert_eq!(core.try_reserve(0), Ok(0));
        // Reserve the whole next cycle.
        let wait = core.try_reserve(u64::MAX).unwrap();
        assert!(wait > 0);

        std::thread::sleep(Duration::from_millis(25));
        // The refreshed cycle's permit already belongs to the reservation.
        assert!(core.try_reserve(0).is_err());
    }

    #[test]
    fn limit_change_applies_on_refresh() {
        let core = AtomicCycleCore::new(20_000_000, 1);
        assert_eq!(core.try_reserve(0), Ok(0));
        assert!(core.try_reserve(0).is_err());

        core.set_limit(3);
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(core.try_reserve(0), Ok(0));
        assert_eq!(core.try_reserve(0), Ok(0));
        assert_eq!(core.try_reserve(0), Ok(0));
        assert!(core.try_reserve(0).is_err());
    }

    #[test]
    fn concurrent_acquirers_never_exceed_the_limit() {
        let core = Arc::new(AtomicCycleCore::new(HOUR, 100));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let core = Arc::clone(&core);
            handles.push(std::thread::spawn(move || {
                let mut acquired = 0u32;
                for _ in 0..50 {
                    if core.try_reserve(0).is_ok() {
                        acquired += 1;
                    }
                }
                acquired
            }));
        }
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 100);
    }
}
