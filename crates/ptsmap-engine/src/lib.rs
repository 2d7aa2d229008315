//! Ptsmap-Engine: bitstream offset to presentation timestamp correspondence.
//!
//! A decoder's circular bitstream buffer is filled by a stream parser that
//! knows, for each coded unit it writes, the unit's byte offset and its PTS.
//! Playback later reads units back out and needs to know which PTS belongs
//! to the unit starting at the current read offset. This crate keeps that
//! mapping.
//!
//! # Modules
//!
//! - `offset` - Wraparound-safe comparison over 32-bit offsets
//! - `pool` - Fixed-capacity record arena with intrusive free/valid lists
//! - `config` - Per-table tuning and class routing
//! - `collab` - Sync sink, position provider, clock and observer traits
//! - `engine` - [`PtsEngine`], the lock domain embedding both tables
//!
//! # Example
//!
//! ```
//! use ptsmap_common::StreamClass;
//! use ptsmap_engine::PtsEngine;
//!
//! let engine = PtsEngine::with_defaults();
//! engine.start(StreamClass::Video).unwrap();
//! engine.checkin(StreamClass::Video, 0, 1000).unwrap();
//! engine.checkin(StreamClass::Video, 100, 2000).unwrap();
//!
//! let ts = engine.lookup(StreamClass::Video, 100, 0).unwrap();
//! assert_eq!(ts.ticks, 2000);
//! ```

pub mod collab;
pub mod config;
pub mod engine;
pub mod offset;
pub mod pool;
mod table;

pub use collab::{
    BufferPositions, Clock, LookupObserver, ManualClock, NullSink, PositionProvider, SyncSink,
};
pub use config::{EngineConfig, TableConfig};
pub use engine::{PtsEngine, TableHandle};
pub use table::{LookupOutcome, MatchSource, TableStats};

pub use ptsmap_common::{Error, Result, StreamClass, TableStatus, Timestamp};
