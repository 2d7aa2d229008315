//! Optional diagnostics: stream bitrate and arrival-rate estimation.

mod clock;

pub use clock::SystemClock;

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use ptsmap_common::units::TICKS_PER_SECOND;
use ptsmap_engine::offset::diff;
use ptsmap_engine::{Clock, LookupObserver, LookupOutcome, StreamClass, Timestamp};
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
struct Sample {
    offset: u32,
    ticks: u32,
    arrival_micros: u64,
}

#[derive(Debug, Default)]
struct ClassWindow {
    samples: VecDeque<Sample>,
    last_lookup: Option<Timestamp>,
}

/// Point-in-time view of one class's estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub samples: usize,
    pub bitrate_bps: Option<u64>,
    pub arrival_rate_hz: Option<f64>,
    pub lag_ticks: Option<i64>,
}

/// Sliding-window bitrate estimator fed by engine checkins.
///
/// Bitrate is byte distance over timestamp distance across the window, both
/// measured wraparound-safe, so it tracks the stream's own rate regardless
/// of how fast data is being delivered. Arrival rate is the delivery side:
/// checkins per second of wall time.
pub struct BitrateEstimator {
    window: usize,
    clock: Arc<dyn Clock>,
    classes: Mutex<[ClassWindow; 2]>,
}

impl BitrateEstimator {
    pub fn new(window: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: window.max(2),
            clock,
            classes: Mutex::new(Default::default()),
        }
    }

    fn slot(class: StreamClass) -> usize {
        match class {
            StreamClass::Audio => 1,
            StreamClass::Video | StreamClass::HwVideo => 0,
        }
    }

    /// Checkins delivered per second of wall time across the window.
    pub fn arrival_rate(&self, class: StreamClass) -> Option<f64> {
        let classes = self.classes.lock();
        let samples = &classes[Self::slot(class)].samples;
        let (first, last) = (samples.front()?, samples.back()?);
        let elapsed = last.arrival_micros.checked_sub(first.arrival_micros)?;
        if elapsed == 0 {
            return None;
        }
        Some((samples.len() - 1) as f64 * 1_000_000.0 / elapsed as f64)
    }

    /// Ticks between the newest checkin and the newest answered lookup.
    pub fn lag_ticks(&self, class: StreamClass) -> Option<i64> {
        let classes = self.classes.lock();
        let window = &classes[Self::slot(class)];
        let newest = window.samples.back()?;
        let looked_up = window.last_lookup?;
        Some(i64::from(newest.ticks.wrapping_sub(looked_up.ticks) as i32))
    }

    pub fn snapshot(&self, class: StreamClass) -> DiagnosticsSnapshot {
        let samples = self.classes.lock()[Self::slot(class)].samples.len();
        DiagnosticsSnapshot {
            samples,
            bitrate_bps: self.bitrate(class),
            arrival_rate_hz: self.arrival_rate(class),
            lag_ticks: self.lag_ticks(class),
        }
    }

    /// Forget everything seen for a class, e.g. when its table restarts.
    pub fn reset(&self, class: StreamClass) {
        self.classes.lock()[Self::slot(class)] = ClassWindow::default();
    }
}

impl LookupObserver for BitrateEstimator {
    fn on_checkin(&self, class: StreamClass, offset: u32, ts: Timestamp) {
        let sample = Sample {
            offset,
            ticks: ts.ticks,
            arrival_micros: self.clock.now_micros(),
        };
        let mut classes = self.classes.lock();
        let samples = &mut classes[Self::slot(class)].samples;
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    fn on_lookup(&self, class: StreamClass, _offset: u32, outcome: &LookupOutcome) {
        self.classes.lock()[Self::slot(class)].last_lookup = Some(outcome.ts);
    }

    fn bitrate(&self, class: StreamClass) -> Option<u64> {
        let classes = self.classes.lock();
        let samples = &classes[Self::slot(class)].samples;
        let (first, last) = (samples.front()?, samples.back()?);

        let bytes = diff(last.offset, first.offset);
        let ticks = last.ticks.wrapping_sub(first.ticks) as i32;
        if bytes <= 0 || ticks <= 0 {
            return None;
        }
        Some(bytes as u64 * 8 * TICKS_PER_SECOND / ticks as u64)
    }
}

impl std::fmt::Debug for BitrateEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitrateEstimator")
            .field("window", &self.window)
            .finish()
    }
}
