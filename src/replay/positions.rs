use parking_lot::RwLock;
use ptsmap_engine::{BufferPositions, PositionProvider, StreamClass};

/// Buffer positions as last reported by the trace.
#[derive(Debug, Default)]
pub struct TracePositions {
    video: RwLock<Option<BufferPositions>>,
    audio: RwLock<Option<BufferPositions>>,
}

impl TracePositions {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, class: StreamClass) -> &RwLock<Option<BufferPositions>> {
        match class {
            StreamClass::Audio => &self.audio,
            StreamClass::Video | StreamClass::HwVideo => &self.video,
        }
    }

    pub fn update(&self, class: StreamClass, positions: BufferPositions) {
        *self.slot(class).write() = Some(positions);
    }
}

impl PositionProvider for TracePositions {
    fn positions(&self, class: StreamClass) -> Option<BufferPositions> {
        *self.slot(class).read()
    }
}
