//! Sync sink that logs and keeps every "first timestamp" notification.

use parking_lot::Mutex;
use ptsmap_engine::{StreamClass, SyncSink, Timestamp};
use serde::Serialize;

/// One notification delivered to the sync controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    FirstCheckin {
        class: StreamClass,
        ts: Timestamp,
    },
    FirstLookup {
        class: StreamClass,
        ts: Timestamp,
        fallback: bool,
    },
    SeedCurrent {
        class: StreamClass,
        ts: Timestamp,
    },
}

/// Records sync notifications in arrival order.
#[derive(Debug, Default)]
pub struct SyncRecorder {
    events: Mutex<Vec<SyncEvent>>,
}

impl SyncRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().clone()
    }

    /// Take the recorded events, leaving the recorder empty.
    pub fn drain(&self) -> Vec<SyncEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn push(&self, event: SyncEvent) {
        self.events.lock().push(event);
    }
}

impl SyncSink for SyncRecorder {
    fn first_checkin(&self, class: StreamClass, ts: Timestamp) {
        tracing::info!("First {} checkin: pts {} ({} us)", class, ts.ticks, ts.micros);
        self.push(SyncEvent::FirstCheckin { class, ts });
    }

    fn first_lookup(&self, class: StreamClass, ts: Timestamp, fallback: bool) {
        if fallback {
            tracing::warn!(
                "First {} lookup fell back to first checkin: pts {}",
                class,
                ts.ticks
            );
        } else {
            tracing::info!("First {} lookup: pts {} ({} us)", class, ts.ticks, ts.micros);
        }
        self.push(SyncEvent::FirstLookup { class, ts, fallback });
    }

    fn seed_current(&self, class: StreamClass, ts: Timestamp) {
        tracing::debug!("Seeding current {} pts {}", class, ts.ticks);
        self.push(SyncEvent::SeedCurrent { class, ts });
    }
}
