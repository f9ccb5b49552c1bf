//! Monotonic absolute timestamps and the absolute-sleep primitive the
//! periodic clock depends on to stay drift-free.
//!
//! `std::time::Instant` can be added to and compared, but nothing in std
//! exposes an *absolute* sleep deadline to the kernel — `thread::sleep`
//! only takes a relative `Duration`, so naively sleeping `period` each
//! iteration accumulates drift equal to the body's own execution time.
//! We go straight to `clock_nanosleep(CLOCK_MONOTONIC, TIMER_ABSTIME, ..)`
//! instead, mirroring `periodic.c`'s `wait_for_period`.

use std::fmt;
use std::time::Duration;

/// A point in time on `CLOCK_MONOTONIC`, represented the way the kernel
/// represents it so it can be handed straight to `clock_nanosleep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: i64,
}

const NSEC_PER_SEC: i64 = 1_000_000_000;

impl Timestamp {
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid, appropriately sized out-parameter.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &raw mut ts) };
        assert_eq!(rc, 0, "clock_gettime(CLOCK_MONOTONIC) failed");
        Self {
            sec: ts.tv_sec,
            nsec: ts.tv_nsec,
        }
    }

    pub const ZERO: Timestamp = Timestamp { sec: 0, nsec: 0 };

    #[must_use]
    pub fn add_ms(self, ms: i64) -> Self {
        self.add_nanos(ms * 1_000_000)
    }

    #[must_use]
    pub fn add_nanos(self, nanos: i64) -> Self {
        let total = self.sec * NSEC_PER_SEC + self.nsec + nanos;
        Self {
            sec: total.div_euclid(NSEC_PER_SEC),
            nsec: total.rem_euclid(NSEC_PER_SEC),
        }
    }

    /// Signed difference `self - other` in milliseconds.
    pub fn diff_ms(self, other: Timestamp) -> i64 {
        let self_ns = self.sec * NSEC_PER_SEC + self.nsec;
        let other_ns = other.sec * NSEC_PER_SEC + other.nsec;
        (self_ns - other_ns) / 1_000_000
    }

    pub fn is_after(self, other: Timestamp) -> bool {
        self > other
    }

    fn to_timespec(self) -> libc::timespec {
        libc::timespec {
            tv_sec: self.sec,
            tv_nsec: self.nsec,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// Sleep until the absolute instant `at` on `CLOCK_MONOTONIC`. A no-op
/// (returns immediately) if `at` is already in the past.
pub fn sleep_until(at: Timestamp) {
    let ts = at.to_timespec();
    // SAFETY: `ts` is a valid timespec; clock_nanosleep with TIMER_ABSTIME
    // does not mutate it. EINTR is retried by looping, matching the
    // behavior expected of `periodic.c`'s `wait_for_period`.
    #[allow(unsafe_code)]
    loop {
        let rc = unsafe {
            libc::clock_nanosleep(libc::CLOCK_MONOTONIC, libc::TIMER_ABSTIME, &raw const ts, std::ptr::null_mut())
        };
        if rc == 0 || rc != libc::EINTR {
            break;
        }
    }
}

/// Sleep for a short relative duration — used by the idle body's
/// `idle_sleep` option, which only ever requests ~1ns.
pub fn sleep_for(d: Duration) {
    std::thread::sleep(d);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_ms_carries_into_seconds() {
        let t = Timestamp { sec: 1, nsec: 900_000_000 };
        let t2 = t.add_ms(200);
        assert_eq!(t2, Timestamp { sec: 2, nsec: 100_000_000 });
    }

    #[test]
    fn diff_ms_is_signed() {
        let a = Timestamp { sec: 10, nsec: 0 };
        let b = Timestamp { sec: 9, nsec: 500_000_000 };
        assert_eq!(a.diff_ms(b), 500);
        assert_eq!(b.diff_ms(a), -500);
    }

    #[test]
    fn ordering_matches_time() {
        let a = Timestamp { sec: 1, nsec: 0 };
        let b = Timestamp { sec: 1, nsec: 1 };
        assert!(b.is_after(a));
    }
}
