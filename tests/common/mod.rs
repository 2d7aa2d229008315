//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a replay session from inline TOML
//! and runs inline JSON-lines traces against it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ptsmap::config::{parse_config, Config};
use ptsmap::replay::{build_session, parse_trace, ReplayReport, Session};

pub struct TestHarness {
    pub config: Config,
    pub session: Session,
}

impl TestHarness {
    /// Default configuration, replay clock driven by the trace.
    pub fn new() -> Self {
        Self::with_toml("")
    }

    pub fn with_toml(toml: &str) -> Self {
        let config = parse_config(toml).unwrap();
        let session = build_session(&config, false).unwrap();
        Self { config, session }
    }

    /// Diagnostics enabled with a small window.
    pub fn with_diagnostics() -> Self {
        Self::with_toml("[diagnostics]\nenabled = true\nwindow = 4\n")
    }

    pub fn run(&self, trace: &str) -> ReplayReport {
        let events = parse_trace(trace).unwrap();
        self.session.run(&events)
    }
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
