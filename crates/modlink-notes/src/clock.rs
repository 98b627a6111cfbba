//! Endpoint clock.
//!
//! History timestamps are seconds since the epoch. Their only job is to be
//! a defensible tie-break input for ordering two updates, so the hand-out is
//! monotonized: each call returns `max(now, last + 1)` against a
//! process-wide counter and therefore never repeats a value.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_ISSUED: AtomicI64 = AtomicI64::new(0);

/// Current wall-clock time in whole seconds since the epoch.
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Hand out the next history timestamp: wall-clock time, bumped past any
/// previously issued value.
pub fn next_timestamp() -> i64 {
    let now = now();
    let mut last = LAST_ISSUED.load(Ordering::Relaxed);
    loop {
        let issued = now.max(last + 1);
        match LAST_ISSUED.compare_exchange_weak(last, issued, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return issued,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_repeats() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(next_timestamp()));
        }
    }

    #[test]
    fn test_strictly_increasing() {
        let a = next_timestamp();
        let b = next_timestamp();
        assert!(b > a);
    }

    #[test]
    fn test_tracks_wall_clock() {
        let t = next_timestamp();
        assert!(t >= now() - 1);
    }
}
