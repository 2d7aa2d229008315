//! Timestamp units.
//!
//! Short-form timestamps are 90 kHz ticks truncated to 32 bits, as carried in
//! the PES header. The extended form is microseconds in 64 bits.

use serde::{Deserialize, Serialize};

/// Ticks per second of the short-form timestamp clock.
pub const TICKS_PER_SECOND: u64 = 90_000;

/// Convert 90 kHz ticks to microseconds.
pub fn ticks_to_micros(ticks: u32) -> u64 {
    u64::from(ticks) * 100 / 9
}

/// Convert microseconds to 90 kHz ticks, wrapping at 32 bits.
pub fn micros_to_ticks(micros: u64) -> u32 {
    // Split to keep `micros * 9` from overflowing for large inputs.
    let ticks = (micros / 100) * 9 + (micros % 100) * 9 / 100;
    ticks as u32
}

/// A short-form and extended timestamp pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    /// 90 kHz ticks.
    pub ticks: u32,
    /// Microseconds.
    pub micros: u64,
}

impl Timestamp {
    pub fn new(ticks: u32, micros: u64) -> Self {
        Self { ticks, micros }
    }

    /// Build a timestamp from ticks, deriving the microsecond form.
    pub fn from_ticks(ticks: u32) -> Self {
        Self::new(ticks, ticks_to_micros(ticks))
    }

    /// Build a timestamp from microseconds, deriving the tick form.
    pub fn from_micros(micros: u64) -> Self {
        Self::new(micros_to_ticks(micros), micros)
    }
}
