//! Shared helpers for engine integration tests.
//!
//! [`RecordingSink`] captures every sync notification so tests can assert
//! on exactly which "first timestamp" events fired.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use ptsmap_engine::{EngineConfig, PtsEngine, StreamClass, SyncSink, TableConfig, Timestamp};

/// One captured sync notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    FirstCheckin(StreamClass, u32),
    SeedCurrent(StreamClass, u32),
    FirstLookup(StreamClass, u32, bool),
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl SyncSink for RecordingSink {
    fn first_checkin(&self, class: StreamClass, ts: Timestamp) {
        self.notices.lock().push(Notice::FirstCheckin(class, ts.ticks));
    }

    fn first_lookup(&self, class: StreamClass, ts: Timestamp, fallback: bool) {
        self.notices
            .lock()
            .push(Notice::FirstLookup(class, ts.ticks, fallback));
    }

    fn seed_current(&self, class: StreamClass, ts: Timestamp) {
        self.notices.lock().push(Notice::SeedCurrent(class, ts.ticks));
    }
}

/// An engine with the given per-table capacity, wired to a recording sink.
pub fn engine_with_capacity(capacity: usize) -> (PtsEngine, Arc<RecordingSink>) {
    let config = EngineConfig {
        video: TableConfig::video().with_capacity(capacity),
        audio: TableConfig::audio().with_capacity(capacity),
        hw_video_alias: true,
    };
    let sink = Arc::new(RecordingSink::default());
    let engine = PtsEngine::new(config, sink.clone()).expect("valid config");
    (engine, sink)
}

/// A default-sized engine wired to a recording sink.
pub fn engine() -> (PtsEngine, Arc<RecordingSink>) {
    engine_with_capacity(64)
}
