//! JSON-lines trace format.
//!
//! One event per line, tagged by `"op"`. Blank lines and lines starting with
//! `#` are skipped.
//!
//! ```text
//! {"op": "start", "class": "video"}
//! {"op": "checkin", "class": "video", "offset": 0, "pts": 90000}
//! {"op": "lookup", "class": 0, "offset": 0}
//! ```

use std::fmt;

use ptsmap_engine::{Error, StreamClass};
use serde::{Deserialize, Serialize};

/// A class as written in a trace: a name or a raw numeric selector.
///
/// Resolution is deferred to replay time so an unknown selector becomes an
/// `InvalidStreamClass` outcome for that event instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ClassSelector {
    Raw(u32),
    Name(String),
}

impl ClassSelector {
    pub fn resolve(&self) -> Result<StreamClass, Error> {
        match self {
            Self::Raw(raw) => StreamClass::from_raw(*raw),
            Self::Name(name) => name.parse(),
        }
    }
}

impl fmt::Display for ClassSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(raw) => write!(f, "{}", raw),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<StreamClass> for ClassSelector {
    fn from(class: StreamClass) -> Self {
        Self::Name(class.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceEvent {
    Start {
        class: ClassSelector,
    },
    Stop {
        class: ClassSelector,
    },
    Checkin {
        class: ClassSelector,
        offset: u32,
        pts: u32,
    },
    CheckinMicros {
        class: ClassSelector,
        offset: u32,
        micros: u64,
    },
    Lookup {
        class: ClassSelector,
        offset: u32,
        #[serde(default)]
        margin: u32,
    },
    Pick {
        class: ClassSelector,
        offset: u32,
        #[serde(default)]
        margin: u32,
    },
    SetResolution {
        class: ClassSelector,
        threshold: u32,
    },
    SetCapacity {
        class: ClassSelector,
        capacity: usize,
    },
    Positions {
        class: ClassSelector,
        write: u32,
        read: u32,
    },
    Delay {
        class: ClassSelector,
    },
    Advance {
        micros: u64,
    },
}

impl TraceEvent {
    /// The op tag as it appears in the trace.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Checkin { .. } => "checkin",
            Self::CheckinMicros { .. } => "checkin_micros",
            Self::Lookup { .. } => "lookup",
            Self::Pick { .. } => "pick",
            Self::SetResolution { .. } => "set_resolution",
            Self::SetCapacity { .. } => "set_capacity",
            Self::Positions { .. } => "positions",
            Self::Delay { .. } => "delay",
            Self::Advance { .. } => "advance",
        }
    }

    pub fn class(&self) -> Option<&ClassSelector> {
        match self {
            Self::Start { class }
            | Self::Stop { class }
            | Self::Checkin { class, .. }
            | Self::CheckinMicros { class, .. }
            | Self::Lookup { class, .. }
            | Self::Pick { class, .. }
            | Self::SetResolution { class, .. }
            | Self::SetCapacity { class, .. }
            | Self::Positions { class, .. }
            | Self::Delay { class } => Some(class),
            Self::Advance { .. } => None,
        }
    }
}

/// A trace line that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {source}")]
pub struct TraceError {
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Parse a whole trace. Stops at the first malformed line.
pub fn parse_trace(content: &str) -> Result<Vec<TraceEvent>, TraceError> {
    let mut events = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_text = line.trim();
        if line_text.is_empty() || line_text.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(line_text).map_err(|source| TraceError {
            line: idx + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}
