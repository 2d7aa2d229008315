//! The engine: both correspondence tables behind one lock.
//!
//! [`PtsEngine`] is owned by whatever embeds it for the length of a playback
//! session and shared by reference (typically `Arc<PtsEngine>`) between the
//! stream-parsing side that checks timestamps in and the playback side that
//! looks them up. Every operation runs under a single [`parking_lot::Mutex`];
//! critical sections are bounded and never allocate on the checkin/lookup
//! path. Collaborator callbacks run after the lock is released.

use std::sync::Arc;

use parking_lot::Mutex;
use ptsmap_common::{Error, Result, StreamClass, TableStatus, Timestamp};

use crate::collab::{LookupObserver, NullSink, PositionProvider, SyncSink};
use crate::config::{EngineConfig, TableConfig};
use crate::table::{Effects, LookupOutcome, Table, TableStats};

/// Which table a stream class resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableHandle {
    Video,
    Audio,
}

struct Tables {
    video: Table,
    audio: Table,
}

impl Tables {
    fn get(&self, handle: TableHandle) -> &Table {
        match handle {
            TableHandle::Video => &self.video,
            TableHandle::Audio => &self.audio,
        }
    }

    fn get_mut(&mut self, handle: TableHandle) -> &mut Table {
        match handle {
            TableHandle::Video => &mut self.video,
            TableHandle::Audio => &mut self.audio,
        }
    }
}

/// Offset to timestamp correspondence service for one playback session.
pub struct PtsEngine {
    tables: Mutex<Tables>,
    hw_video_alias: bool,
    sink: Arc<dyn SyncSink>,
    observer: Option<Arc<dyn LookupObserver>>,
    positions: Option<Arc<dyn PositionProvider>>,
}

impl PtsEngine {
    /// Build an engine with both tables idle.
    pub fn new(config: EngineConfig, sink: Arc<dyn SyncSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tables: Mutex::new(Tables {
                video: Table::new(StreamClass::Video, config.video),
                audio: Table::new(StreamClass::Audio, config.audio),
            }),
            hw_video_alias: config.hw_video_alias,
            sink,
            observer: None,
            positions: None,
        })
    }

    /// An engine with default settings and no sync sink.
    pub fn with_defaults() -> Self {
        Self {
            tables: Mutex::new(Tables {
                video: Table::new(StreamClass::Video, TableConfig::video()),
                audio: Table::new(StreamClass::Audio, TableConfig::audio()),
            }),
            hw_video_alias: true,
            sink: Arc::new(NullSink),
            observer: None,
            positions: None,
        }
    }

    /// Attach a diagnostics observer.
    pub fn with_observer(mut self, observer: Arc<dyn LookupObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Attach a buffer position provider.
    pub fn with_positions(mut self, positions: Arc<dyn PositionProvider>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Map a stream class to its table.
    pub fn resolve(&self, class: StreamClass) -> Result<TableHandle> {
        match class {
            StreamClass::Video => Ok(TableHandle::Video),
            StreamClass::Audio => Ok(TableHandle::Audio),
            StreamClass::HwVideo if self.hw_video_alias => Ok(TableHandle::Video),
            StreamClass::HwVideo => Err(Error::invalid_class(format!(
                "{class} (no table, hardware video aliasing disabled)"
            ))),
        }
    }

    fn with_table<R>(&self, class: StreamClass, f: impl FnOnce(&mut Table) -> R) -> Result<R> {
        let handle = self.resolve(class)?;
        let mut tables = self.tables.lock();
        Ok(f(tables.get_mut(handle)))
    }

    fn read_table<R>(&self, class: StreamClass, f: impl FnOnce(&Table) -> R) -> Result<R> {
        let handle = self.resolve(class)?;
        let tables = self.tables.lock();
        Ok(f(tables.get(handle)))
    }

    fn dispatch(&self, class: StreamClass, fx: Effects) {
        if let Some(ts) = fx.first_checkin {
            tracing::debug!("First {} checkin: {} ticks", class, ts.ticks);
            self.sink.first_checkin(class, ts);
        }
        if let Some(ts) = fx.seed_current {
            self.sink.seed_current(class, ts);
        }
        if let Some((ts, fallback)) = fx.first_lookup {
            tracing::debug!(
                "First {} lookup: {} ticks (fallback: {})",
                class,
                ts.ticks,
                fallback
            );
            self.sink.first_lookup(class, ts, fallback);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle and configuration
    // ------------------------------------------------------------------

    /// Allocate the class's pool and move it to `loading`.
    pub fn start(&self, class: StreamClass) -> Result<()> {
        self.with_table(class, |table| table.start())?
    }

    /// Release the class's pool and return it to `idle`.
    pub fn stop(&self, class: StreamClass) -> Result<()> {
        self.with_table(class, |table| table.stop())?
    }

    /// Set the lookup resolution threshold. Legal in any state.
    pub fn set_resolution(&self, class: StreamClass, threshold: u32) -> Result<()> {
        self.with_table(class, |table| table.set_resolution(threshold))?
    }

    /// Set the pool capacity used by the next `start`. Only legal while idle.
    pub fn set_pool_capacity(&self, class: StreamClass, capacity: usize) -> Result<()> {
        self.with_table(class, |table| table.set_capacity(capacity))?
    }

    // ------------------------------------------------------------------
    // Checkin
    // ------------------------------------------------------------------

    /// Record that the unit starting at `offset` carries `ticks` (90 kHz).
    pub fn checkin(&self, class: StreamClass, offset: u32, ticks: u32) -> Result<()> {
        self.checkin_full(class, offset, Timestamp::from_ticks(ticks))
    }

    /// Record that the unit starting at `offset` carries `micros`.
    pub fn checkin_micros(&self, class: StreamClass, offset: u32, micros: u64) -> Result<()> {
        self.checkin_full(class, offset, Timestamp::from_micros(micros))
    }

    /// Record a correspondence with both timestamp forms supplied.
    pub fn checkin_full(&self, class: StreamClass, offset: u32, ts: Timestamp) -> Result<()> {
        let mut fx = Effects::default();
        let (table_class, result) = self.with_table(class, |table| {
            (table.class(), table.checkin(offset, ts, &mut fx))
        })?;

        if let Err(ref e) = result {
            tracing::trace!("Dropped {} checkin at {:#010x}: {}", class, offset, e);
            return result;
        }

        self.dispatch(table_class, fx);
        if let Some(observer) = &self.observer {
            observer.on_checkin(table_class, offset, ts);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Resolve `offset` to a timestamp. `margin = 0` uses the configured
    /// resolution; anything else overrides it for this call.
    pub fn lookup(&self, class: StreamClass, offset: u32, margin: u32) -> Result<Timestamp> {
        self.lookup_outcome(class, offset, margin)
            .map(|outcome| outcome.ts)
    }

    /// Like [`lookup`](Self::lookup), also reporting how the answer was found.
    pub fn lookup_outcome(
        &self,
        class: StreamClass,
        offset: u32,
        margin: u32,
    ) -> Result<LookupOutcome> {
        let mut fx = Effects::default();
        let (table_class, result) = self.with_table(class, |table| {
            (table.class(), table.lookup(offset, margin, &mut fx))
        })?;

        let outcome = result?;
        self.dispatch(table_class, fx);
        if let Some(observer) = &self.observer {
            observer.on_lookup(table_class, offset, &outcome);
        }
        Ok(outcome)
    }

    /// Inspect what `lookup` would match without disturbing any state.
    pub fn pick(&self, class: StreamClass, offset: u32, margin: u32) -> Result<Timestamp> {
        self.read_table(class, |table| table.pick(offset, margin))?
            .map(|outcome| outcome.ts)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn status(&self, class: StreamClass) -> Result<TableStatus> {
        self.read_table(class, |table| table.status())
    }

    pub fn last_checkin(&self, class: StreamClass) -> Result<Option<Timestamp>> {
        self.read_table(class, |table| table.last_checkin())
    }

    pub fn last_lookup(&self, class: StreamClass) -> Result<Option<Timestamp>> {
        self.read_table(class, |table| table.last_lookup())
    }

    /// Whether any checkin was accepted this session.
    pub fn has_checkin(&self, class: StreamClass) -> Result<bool> {
        self.read_table(class, |table| table.has_checkin())
    }

    /// Whether the session's first lookup was answered by the bootstrap
    /// fallback.
    pub fn first_lookup_failed(&self, class: StreamClass) -> Result<bool> {
        self.read_table(class, |table| table.first_lookup_failed())
    }

    /// Number of valid records at or after `offset`.
    pub fn pending_count(&self, class: StreamClass, offset: u32) -> Result<usize> {
        self.read_table(class, |table| table.pending_count(offset))
    }

    pub fn valid_len(&self, class: StreamClass) -> Result<usize> {
        self.read_table(class, |table| table.valid_len())
    }

    pub fn free_len(&self, class: StreamClass) -> Result<usize> {
        self.read_table(class, |table| table.free_len())
    }

    /// Number of list moves the class's pool has performed.
    pub fn splice_count(&self, class: StreamClass) -> Result<u64> {
        self.read_table(class, |table| table.splice_count())
    }

    pub fn stats(&self, class: StreamClass) -> Result<TableStats> {
        self.read_table(class, |table| table.stats())
    }

    /// Copy of the valid list, oldest first. Allocates; for diagnostics only.
    pub fn valid_records(&self, class: StreamClass) -> Result<Vec<(u32, Timestamp)>> {
        self.read_table(class, |table| table.records())
    }

    /// Milliseconds of media buffered between the read and write positions,
    /// from the position provider and the observer's bitrate estimate.
    pub fn buffered_delay_ms(&self, class: StreamClass) -> Result<Option<u64>> {
        let handle = self.resolve(class)?;
        let table_class = match handle {
            TableHandle::Video => StreamClass::Video,
            TableHandle::Audio => StreamClass::Audio,
        };

        let (Some(positions), Some(observer)) = (&self.positions, &self.observer) else {
            return Ok(None);
        };
        let Some(buffer) = positions.positions(table_class) else {
            return Ok(None);
        };
        let Some(bitrate) = observer.bitrate(table_class).filter(|bps| *bps > 0) else {
            return Ok(None);
        };

        Ok(Some(u64::from(buffer.buffered()) * 8 * 1000 / bitrate))
    }
}

impl std::fmt::Debug for PtsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.lock();
        f.debug_struct("PtsEngine")
            .field("video", &tables.video.status())
            .field("audio", &tables.audio.status())
            .field("hw_video_alias", &self.hw_video_alias)
            .field("observer", &self.observer.is_some())
            .field("positions", &self.positions.is_some())
            .finish()
    }
}
