use ptsmap_engine::{EngineConfig, TableConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub video: TableSection,

    #[serde(default)]
    pub audio: TableSection,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Engine settings with every unset field filled from the class defaults.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            video: self.video.resolve(TableConfig::video()),
            audio: self.audio.resolve(TableConfig::audio()),
            hw_video_alias: self.engine.hw_video_alias,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSection {
    /// Route the hardware-assisted video class to the video table
    #[serde(default = "default_hw_video_alias")]
    pub hw_video_alias: bool,
}

fn default_hw_video_alias() -> bool {
    true
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            hw_video_alias: default_hw_video_alias(),
        }
    }
}

/// Per-table overrides. Unset fields keep the class default, since video and
/// audio use different resolutions.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TableSection {
    /// Records reserved when the table starts
    #[serde(default)]
    pub capacity: Option<usize>,

    /// Maximum offset distance accepted as a match
    #[serde(default)]
    pub resolution: Option<u32>,

    /// Offset distance behind a video query past which records are dropped
    #[serde(default)]
    pub gc_distance: Option<u32>,

    /// Largest tick delta between audio records that is interpolated
    #[serde(default)]
    pub interpolation_bound: Option<u32>,
}

impl TableSection {
    pub fn resolve(&self, base: TableConfig) -> TableConfig {
        TableConfig {
            capacity: self.capacity.unwrap_or(base.capacity),
            resolution: self.resolution.unwrap_or(base.resolution),
            gc_distance: self.gc_distance.unwrap_or(base.gc_distance),
            interpolation_bound: self
                .interpolation_bound
                .unwrap_or(base.interpolation_bound),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiagnosticsConfig {
    /// Attach the bitrate / cached-delay estimator
    #[serde(default)]
    pub enabled: bool,

    /// Number of recent checkins the bitrate estimate spans
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_window() -> usize {
    32
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: default_window(),
        }
    }
}
