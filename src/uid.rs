//! Identifier Service
//!
//! Monotone-unique 64-bit identifiers: a millisecond timestamp scaled by
//! 1000 plus three random decimal digits. Consecutive calls always return
//! distinct values; ordering is roughly chronological within a process but
//! not strict across restarts.

use crate::error::LedgerError;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel for "unassigned" (an unspent output's spender field).
pub const UID_SENTINEL: i64 = -1;

/// How far the clock may run backwards before the generator gives up,
/// in milliseconds.
const BACKWARDS_TOLERANCE_MS: i64 = 2_000;

/// Anything that can issue fresh identifiers. The process-wide generator
/// implements this; tests substitute fixed sequences to pin record
/// contents.
pub trait UidSource {
    fn next_uid(&self) -> Result<i64, LedgerError>;
}

/// Thread-safe identifier generator.
///
/// The last-issued value is kept in an atomic and replaced with a
/// compare-and-swap; a candidate at or below the last value is bumped past
/// it, so issued identifiers are strictly increasing within a process.
#[derive(Debug, Default)]
pub struct UidGenerator {
    last: AtomicI64,
}

impl UidGenerator {
    pub fn new() -> Self {
        UidGenerator {
            last: AtomicI64::new(0),
        }
    }

    /// Next identifier, strictly greater than the previously issued one.
    pub fn next(&self) -> Result<i64, LedgerError> {
        let mut rng = rand::thread_rng();
        loop {
            let now = now_millis();
            let last = self.last.load(Ordering::Acquire);
            if now + BACKWARDS_TOLERANCE_MS < last / 1000 {
                return Err(LedgerError::IdExhausted);
            }
            // Three random decimal digits, as in the wire-visible uid shape.
            let mut candidate = now * 1000 + rng.gen_range(100..1000);
            if candidate <= last {
                candidate = last + 1;
            }
            if self
                .last
                .compare_exchange(last, candidate, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(candidate);
            }
        }
    }
}

impl UidSource for UidGenerator {
    fn next_uid(&self) -> Result<i64, LedgerError> {
        self.next()
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

/// Unix seconds, used for block timestamps.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_consecutive_uids_are_distinct() {
        let gen = UidGenerator::new();
        let mut prev = 0;
        for _ in 0..1000 {
            let uid = gen.next().unwrap();
            assert!(uid > prev);
            prev = uid;
        }
    }

    #[test]
    fn test_concurrent_uids_are_unique() {
        let gen = Arc::new(UidGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = Arc::clone(&gen);
                std::thread::spawn(move || {
                    (0..250).map(|_| gen.next().unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for uid in handle.join().unwrap() {
                assert!(seen.insert(uid), "uid {uid} issued twice");
            }
        }
    }
}
