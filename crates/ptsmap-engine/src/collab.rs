//! Narrow interfaces to the engine's collaborators.
//!
//! The engine never calls any of these while its lock is held.

use std::sync::atomic::{AtomicU64, Ordering};

use ptsmap_common::{StreamClass, Timestamp};

use crate::offset::diff;
use crate::table::LookupOutcome;

/// Receives "first timestamp observed" events for the A/V sync controller.
pub trait SyncSink: Send + Sync {
    /// First accepted checkin of a session.
    fn first_checkin(&self, class: StreamClass, ts: Timestamp);

    /// First answered lookup of a session. `fallback` is set when the answer
    /// came from the bootstrap fallback rather than a real match.
    fn first_lookup(&self, class: StreamClass, ts: Timestamp, fallback: bool);

    /// The table left `loading`; `ts` becomes the class's current timestamp.
    fn seed_current(&self, class: StreamClass, ts: Timestamp) {
        let _ = (class, ts);
    }
}

/// A sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SyncSink for NullSink {
    fn first_checkin(&self, _class: StreamClass, _ts: Timestamp) {}

    fn first_lookup(&self, _class: StreamClass, _ts: Timestamp, _fallback: bool) {}
}

/// Producer and consumer positions within the circular bitstream buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPositions {
    /// Where the stream parser is writing.
    pub write: u32,
    /// Where the decoder is reading.
    pub read: u32,
}

impl BufferPositions {
    /// Bytes between the read and write positions (0 if the reader is ahead).
    pub fn buffered(&self) -> u32 {
        diff(self.write, self.read).max(0) as u32
    }
}

/// Reports the current buffer positions for a class.
pub trait PositionProvider: Send + Sync {
    fn positions(&self, class: StreamClass) -> Option<BufferPositions>;
}

/// Monotonic microsecond clock.
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> u64;
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_micros: u64) -> Self {
        Self {
            now: AtomicU64::new(start_micros),
        }
    }

    pub fn advance(&self, micros: u64) {
        self.now.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn set(&self, micros: u64) {
        self.now.store(micros, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Optional diagnostics hook, called after each successful checkin and each
/// answered lookup.
pub trait LookupObserver: Send + Sync {
    fn on_checkin(&self, class: StreamClass, offset: u32, ts: Timestamp);

    fn on_lookup(&self, class: StreamClass, offset: u32, outcome: &LookupOutcome);

    /// Current bitrate estimate in bits per second, if one is available.
    fn bitrate(&self, class: StreamClass) -> Option<u64> {
        let _ = class;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_across_wrap() {
        let positions = BufferPositions {
            write: 0x0000_0100,
            read: 0xFFFF_FF00,
        };
        assert_eq!(positions.buffered(), 0x200);
    }

    #[test]
    fn test_buffered_reader_ahead() {
        let positions = BufferPositions { write: 10, read: 20 };
        assert_eq!(positions.buffered(), 0);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(5);
        clock.advance(10);
        assert_eq!(clock.now_micros(), 15);
        clock.set(1);
        assert_eq!(clock.now_micros(), 1);
    }
}
