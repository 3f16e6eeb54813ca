//! Sortable message identifiers.
//!
//! Identifiers are ULIDs: 128 bits, a 48-bit millisecond timestamp in the
//! high bits and an 80-bit random tail. Sorting by identifier sorts by
//! production time, with ties broken by the tail. The canonical 26-character
//! text form is itself lexicographically sortable and is used as the id
//! literal in checkpoints.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ulid::Ulid;

use crate::error::BrokerError;

const RANDOM_MASK: u128 = (1 << 80) - 1;

/// The identifier that represents the beginning of the given millisecond.
///
/// These are range probes, not unique ids: the tail is all zero, below any
/// identifier the generator will ever issue for that millisecond.
pub fn beginning_of(timestamp_ms: u64) -> Ulid {
    Ulid::from_parts(timestamp_ms, 0)
}

/// The identifier that represents the beginning of all time.
pub fn beginning_of_time() -> Ulid {
    Ulid::nil()
}

pub(crate) fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Generator of strictly increasing identifiers.
///
/// Successive calls to [`next`](UlidGenerator::next) return strictly
/// increasing values even when called faster than the clock ticks: within
/// one millisecond the random tail is incremented instead of redrawn. If
/// the previous identifier's timestamp is ahead of the wall clock, `next`
/// sleeps until the clock catches up, or fails with
/// [`BrokerError::ClockSkew`] when the gap exceeds the configured maximum.
#[derive(Debug)]
pub struct UlidGenerator {
    prev: Ulid,
    max_skew: Duration,
}

impl UlidGenerator {
    pub fn new(max_skew: Duration) -> Self {
        UlidGenerator {
            prev: Ulid::new(),
            max_skew,
        }
    }

    /// Create a generator that continues the sequence after a known
    /// identifier.
    pub fn seeded(prev: Ulid, max_skew: Duration) -> Self {
        UlidGenerator { prev, max_skew }
    }

    /// Reseed the sequence from a caller-supplied identifier.
    pub fn observe(&mut self, id: Ulid) {
        self.prev = id;
    }

    /// Generate the next identifier in the monotonic sequence.
    pub fn next(&mut self) -> Result<Ulid, BrokerError> {
        // Spins until the clock ticks if the tail overflows within one
        // millisecond. Theoretically possible, practically never.
        loop {
            let now = current_millis();
            let prev_ts = self.prev.timestamp_ms();
            if now < prev_ts {
                let ahead = Duration::from_millis(prev_ts - now);
                if ahead > self.max_skew {
                    return Err(BrokerError::ClockSkew(ahead));
                }
                log::debug!(
                    "previous identifier timestamp is {} ms ahead, waiting for clock to catch up",
                    ahead.as_millis()
                );
                thread::sleep(ahead);
                continue;
            }
            let value = if now == prev_ts {
                let tail = self.prev.random();
                if tail >= RANDOM_MASK {
                    continue;
                }
                Ulid::from_parts(now, tail + 1)
            } else {
                // Keep the all-zero tail reserved so beginning-of-millisecond
                // probes stay strictly below every issued identifier.
                let mut tail = rand::random::<u128>() & RANDOM_MASK;
                if tail == 0 {
                    tail = 1;
                }
                Ulid::from_parts(now, tail)
            };
            self.prev = value;
            return Ok(value);
        }
    }
}
