//! Stream classes and table lifecycle states.
//!
//! Both enums serialize in snake_case so they read the same in TOML
//! configuration, replay traces and log output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Which elementary stream a correspondence table serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamClass {
    /// Video elementary stream.
    Video,
    /// Audio elementary stream.
    Audio,
    /// Hardware-assisted video. Normally resolves to the video table.
    HwVideo,
}

impl StreamClass {
    /// All classes, in selector order.
    pub const ALL: [StreamClass; 3] = [Self::Video, Self::Audio, Self::HwVideo];

    /// Decode a raw numeric selector (0 = video, 1 = audio, 2 = hw video).
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Self::Video),
            1 => Ok(Self::Audio),
            2 => Ok(Self::HwVideo),
            other => Err(Error::invalid_class(other.to_string())),
        }
    }

    /// The raw numeric selector for this class.
    pub fn raw(self) -> u32 {
        match self {
            Self::Video => 0,
            Self::Audio => 1,
            Self::HwVideo => 2,
        }
    }
}

impl fmt::Display for StreamClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::HwVideo => write!(f, "hw_video"),
        }
    }
}

impl FromStr for StreamClass {
    type Err = Error;

    /// Accepts the class name (case-insensitive) or its numeric selector.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(raw) = trimmed.parse::<u32>() {
            return Self::from_raw(raw);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "hw_video" | "hwvideo" | "hw-video" => Ok(Self::HwVideo),
            _ => Err(Error::invalid_class(trimmed)),
        }
    }
}

/// Lifecycle state of a correspondence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Constructed or stopped; no pool storage held.
    #[default]
    Idle,
    /// Pool storage is being acquired.
    Init,
    /// Started, waiting for the first checkin.
    Loading,
    /// At least one checkin accepted; lookups are legal.
    Running,
    /// Pool storage is being released.
    Deinit,
}

impl TableStatus {
    /// Whether checkins are accepted in this state.
    pub fn accepts_checkin(self) -> bool {
        matches!(self, Self::Loading | Self::Running)
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Init => write!(f, "init"),
            Self::Loading => write!(f, "loading"),
            Self::Running => write!(f, "running"),
            Self::Deinit => write!(f, "deinit"),
        }
    }
}
