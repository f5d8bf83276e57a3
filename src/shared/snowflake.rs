//! Snowflake ID Generator
//!
//! Time-ordered 63-bit identifiers for user accounts. Chats and messages get
//! their ids from the store instead, because message ordering depends on the
//! store assigning them inside the insert transaction.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::config::SnowflakeSettings;

const MACHINE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct Clock {
    last_timestamp: u64,
    sequence: u64,
}

/// Snowflake ID generator
#[derive(Debug)]
pub struct SnowflakeGenerator {
    epoch: u64,
    machine_id: u64,
    clock: Mutex<Clock>,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator
    pub fn new(machine_id: u64, epoch: u64) -> Self {
        Self {
            epoch,
            machine_id: machine_id & ((1 << MACHINE_BITS) - 1),
            clock: Mutex::new(Clock::default()),
        }
    }

    pub fn from_settings(settings: &SnowflakeSettings) -> Self {
        Self::new(settings.machine_id as u64, settings.epoch)
    }

    /// Generate a new snowflake ID
    ///
    /// Never returns the same value twice: when the sequence for the current
    /// millisecond is exhausted, or the wall clock steps backwards, the
    /// generator borrows from the next millisecond.
    pub fn generate(&self) -> i64 {
        let mut clock = self.clock.lock();
        let now = current_millis().max(self.epoch);

        if now > clock.last_timestamp {
            clock.last_timestamp = now;
            clock.sequence = 0;
        } else if clock.sequence == MAX_SEQUENCE {
            clock.last_timestamp += 1;
            clock.sequence = 0;
        } else {
            clock.sequence += 1;
        }

        let id = ((clock.last_timestamp - self.epoch) << (MACHINE_BITS + SEQUENCE_BITS))
            | (self.machine_id << SEQUENCE_BITS)
            | clock.sequence;

        id as i64
    }

    /// Extract the creation timestamp (ms since UNIX epoch) from an id
    pub fn timestamp_of(&self, snowflake: i64) -> u64 {
        ((snowflake as u64) >> (MACHINE_BITS + SEQUENCE_BITS)) + self.epoch
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
