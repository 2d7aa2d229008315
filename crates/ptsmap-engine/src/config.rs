//! Per-table tuning and engine-wide routing settings.
//!
//! The GC distance and interpolation bound are empirically tuned for MPEG-TS
//! playback and are kept configurable rather than derived.

use ptsmap_common::{Error, Result, StreamClass};

/// Default number of records per table.
pub const DEFAULT_CAPACITY: usize = 16_384;
/// Default video lookup resolution, in offset units.
pub const VIDEO_RESOLUTION: u32 = 2_500;
/// Default audio lookup resolution, in offset units. Kept tight so a query
/// between two audio records interpolates instead of snapping to the lower one.
pub const AUDIO_RESOLUTION: u32 = 16;
/// Records further than this behind a video query are garbage collected.
pub const GC_DISTANCE: u32 = 0x0800_0000;
/// Largest tick delta between two audio records that is still interpolated.
pub const INTERPOLATION_BOUND: u32 = 9_000;

/// Settings for one correspondence table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Records reserved at start.
    pub capacity: usize,

    /// Maximum offset distance accepted as a match.
    pub resolution: u32,

    /// Offset distance behind the query past which video records are retired.
    pub gc_distance: u32,

    /// Largest tick delta between bracketing audio records that is interpolated.
    pub interpolation_bound: u32,
}

impl TableConfig {
    pub fn video() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            resolution: VIDEO_RESOLUTION,
            gc_distance: GC_DISTANCE,
            interpolation_bound: INTERPOLATION_BOUND,
        }
    }

    pub fn audio() -> Self {
        Self {
            resolution: AUDIO_RESOLUTION,
            ..Self::video()
        }
    }

    /// Same settings with a different capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Same settings with a different resolution.
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn validate(&self, class: StreamClass) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::invalid_config(format!("{class}.capacity cannot be 0")));
        }
        if self.resolution == 0 {
            return Err(Error::invalid_config(format!("{class}.resolution cannot be 0")));
        }
        if self.gc_distance == 0 {
            return Err(Error::invalid_config(format!("{class}.gc_distance cannot be 0")));
        }
        Ok(())
    }
}

/// Settings for a whole engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub video: TableConfig,
    pub audio: TableConfig,

    /// Route the hardware-assisted video class to the video table.
    pub hw_video_alias: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            video: TableConfig::video(),
            audio: TableConfig::audio(),
            hw_video_alias: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.video.validate(StreamClass::Video)?;
        self.audio.validate(StreamClass::Audio)?;
        Ok(())
    }
}
