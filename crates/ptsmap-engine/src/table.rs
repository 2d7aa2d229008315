//! A single correspondence table.
//!
//! The table owns a [`RecordPool`] whose valid list holds correspondences in
//! non-decreasing offset order (callers check in in stream order). Lookups
//! resolve a query offset to the last record at or before it, starting from
//! a persistent cursor so steady playback only ever scans a few records.
//!
//! Class-specific behaviour:
//! - video: records far behind the query are garbage collected before the
//!   search, and records scanned past are kept (the recent past may be
//!   queried again).
//! - audio: records scanned past are retired immediately, and a query that
//!   falls between two close records is linearly interpolated.

use ptsmap_common::{Error, Result, StreamClass, TableStatus, Timestamp};
use serde::Serialize;

use crate::config::TableConfig;
use crate::offset::{diff, equal_or_later, later};
use crate::pool::{ListKind, Record, RecordId, RecordPool};

/// Where a lookup answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Repeated query for the previous offset.
    Cache,
    /// A record within the resolution threshold.
    Exact,
    /// Interpolated between two bracketing audio records.
    Interpolated,
    /// Bootstrap fallback to the first checked-in timestamp.
    Fallback,
}

/// A successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LookupOutcome {
    pub ts: Timestamp,
    pub source: MatchSource,
}

/// Per-session counters for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub checkins: u64,
    pub dropped_checkins: u64,
    pub evictions: u64,
    pub lookups: u64,
    pub cache_hits: u64,
    pub matches: u64,
    pub interpolations: u64,
    pub fallbacks: u64,
    pub misses: u64,
    pub gc_retired: u64,
    pub scan_retired: u64,
}

/// Collaborator notifications produced under the lock, dispatched after it.
#[derive(Debug, Default)]
pub(crate) struct Effects {
    pub first_checkin: Option<Timestamp>,
    pub seed_current: Option<Timestamp>,
    pub first_lookup: Option<(Timestamp, bool)>,
}

#[derive(Debug, Clone, Copy)]
struct CachedLookup {
    offset: u32,
    ts: Timestamp,
}

#[derive(Debug, Default)]
struct Located {
    candidate: Option<RecordId>,
    /// Set when a forward scan moved past records starting here.
    scanned_from: Option<RecordId>,
}

pub(crate) struct Table {
    class: StreamClass,
    config: TableConfig,
    status: TableStatus,
    pool: RecordPool,
    /// `None` means "start from the valid-list head".
    cursor: Option<RecordId>,
    cache: Option<CachedLookup>,
    first_checkin: Option<Timestamp>,
    last_checkin: Option<Timestamp>,
    last_lookup: Option<Timestamp>,
    first_lookup_ok: bool,
    first_lookup_failed: bool,
    stats: TableStats,
}

impl Table {
    pub(crate) fn new(class: StreamClass, config: TableConfig) -> Self {
        Self {
            class,
            config,
            status: TableStatus::Idle,
            pool: RecordPool::empty(),
            cursor: None,
            cache: None,
            first_checkin: None,
            last_checkin: None,
            last_lookup: None,
            first_lookup_ok: false,
            first_lookup_failed: false,
            stats: TableStats::default(),
        }
    }

    pub(crate) fn class(&self) -> StreamClass {
        self.class
    }

    pub(crate) fn status(&self) -> TableStatus {
        self.status
    }

    fn runs_gc(&self) -> bool {
        self.class == StreamClass::Video
    }

    fn consumes_scanned(&self) -> bool {
        self.class == StreamClass::Audio
    }

    fn interpolates(&self) -> bool {
        self.class == StreamClass::Audio
    }

    fn not_running(&self) -> Error {
        Error::NotRunning {
            class: self.class,
            status: self.status,
        }
    }

    fn not_idle(&self) -> Error {
        Error::NotIdle {
            class: self.class,
            status: self.status,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub(crate) fn start(&mut self) -> Result<()> {
        if self.status != TableStatus::Idle {
            return Err(self.not_idle());
        }

        self.status = TableStatus::Init;
        let capacity = self.config.capacity;
        match RecordPool::with_capacity(capacity) {
            Ok(pool) => self.pool = pool,
            Err(e) => {
                tracing::warn!(
                    "Failed to allocate {} records for the {} table: {}",
                    capacity,
                    self.class,
                    e
                );
                self.status = TableStatus::Idle;
                return Err(Error::AllocationFailure {
                    class: self.class,
                    capacity,
                });
            }
        }

        self.cursor = None;
        self.cache = None;
        self.first_checkin = None;
        self.last_checkin = None;
        self.last_lookup = None;
        self.first_lookup_ok = false;
        self.first_lookup_failed = false;
        self.stats = TableStats::default();
        self.status = TableStatus::Loading;

        tracing::debug!("{} table started with {} records", self.class, capacity);
        Ok(())
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        if !matches!(self.status, TableStatus::Loading | TableStatus::Running) {
            return Err(self.not_running());
        }

        self.status = TableStatus::Deinit;
        self.pool.release();
        self.cursor = None;
        self.cache = None;
        self.status = TableStatus::Idle;

        tracing::debug!("{} table stopped", self.class);
        Ok(())
    }

    pub(crate) fn set_resolution(&mut self, threshold: u32) -> Result<()> {
        if threshold == 0 {
            return Err(Error::invalid_config(format!(
                "{}.resolution cannot be 0",
                self.class
            )));
        }
        self.config.resolution = threshold;
        Ok(())
    }

    pub(crate) fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if self.status != TableStatus::Idle {
            return Err(self.not_idle());
        }
        if capacity == 0 {
            return Err(Error::invalid_config(format!(
                "{}.capacity cannot be 0",
                self.class
            )));
        }
        self.config.capacity = capacity;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Checkin
    // ------------------------------------------------------------------

    pub(crate) fn checkin(&mut self, offset: u32, ts: Timestamp, fx: &mut Effects) -> Result<()> {
        if !self.status.accepts_checkin() {
            self.stats.dropped_checkins += 1;
            return Err(self.not_running());
        }

        let id = match self.pool.free_tail() {
            Some(id) => id,
            None => {
                // Pool pressure: recycle the stalest correspondence.
                // A loading or running table holds at least one record, so an
                // empty free list implies a non-empty valid list.
                let Some(stalest) = self.pool.valid_head() else {
                    debug_assert!(
                        false,
                        "{} pool has no records while accepting checkins",
                        self.class
                    );
                    self.stats.dropped_checkins += 1;
                    return Err(self.not_running());
                };
                tracing::trace!(
                    "{} pool exhausted, evicting offset {:#010x}",
                    self.class,
                    self.pool.record(stalest).offset
                );
                self.forget_cursor(stalest);
                self.stats.evictions += 1;
                stalest
            }
        };

        *self.pool.record_mut(id) = Record { offset, ts };
        self.pool.move_to_tail(id, ListKind::Valid);
        self.last_checkin = Some(ts);
        self.stats.checkins += 1;

        if self.first_checkin.is_none() {
            self.first_checkin = Some(ts);
            fx.first_checkin = Some(ts);
        }

        if self.status == TableStatus::Loading {
            fx.seed_current = Some(ts);
            self.status = TableStatus::Running;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub(crate) fn lookup(
        &mut self,
        offset: u32,
        margin: u32,
        fx: &mut Effects,
    ) -> Result<LookupOutcome> {
        if self.status != TableStatus::Running {
            return Err(self.not_running());
        }
        self.stats.lookups += 1;

        if let Some(ts) = self.cached(offset) {
            self.stats.cache_hits += 1;
            self.last_lookup = Some(ts);
            return Ok(LookupOutcome {
                ts,
                source: MatchSource::Cache,
            });
        }

        if self.runs_gc() {
            self.collect_garbage(offset);
        }

        let threshold = self.threshold(margin);
        let located = self.locate(offset);

        if let Some(candidate) = located.candidate {
            if self.consumes_scanned() {
                if let Some(from) = located.scanned_from {
                    self.retire_scanned(from, candidate);
                }
            }

            let record = *self.pool.record(candidate);
            if within(offset, record.offset, threshold) {
                self.cache = Some(CachedLookup {
                    offset,
                    ts: record.ts,
                });
                self.cursor = self.pool.prev(candidate);
                // Each match is consumed.
                self.retire(candidate);
                self.stats.matches += 1;
                self.record_success(record.ts, fx);
                return Ok(LookupOutcome {
                    ts: record.ts,
                    source: MatchSource::Exact,
                });
            }

            if self.interpolates() {
                if let Some(ts) = self.interpolate(candidate, offset) {
                    self.cache = Some(CachedLookup { offset, ts });
                    self.cursor = Some(candidate);
                    self.stats.interpolations += 1;
                    self.record_success(ts, fx);
                    return Ok(LookupOutcome {
                        ts,
                        source: MatchSource::Interpolated,
                    });
                }
            }
        }

        if !self.first_lookup_ok {
            if let Some(ts) = self.first_checkin {
                self.first_lookup_ok = true;
                self.first_lookup_failed = true;
                self.last_lookup = Some(ts);
                self.stats.fallbacks += 1;
                fx.first_lookup = Some((ts, true));
                tracing::debug!(
                    "{} first lookup at {:#010x} missed, falling back to first checkin",
                    self.class,
                    offset
                );
                return Ok(LookupOutcome {
                    ts,
                    source: MatchSource::Fallback,
                });
            }
        }

        self.stats.misses += 1;
        Err(Error::NoMatch {
            class: self.class,
            offset,
        })
    }

    /// Resolve `offset` without moving the cursor, touching the cache,
    /// collecting garbage or consuming the matched record.
    pub(crate) fn pick(&self, offset: u32, margin: u32) -> Result<LookupOutcome> {
        if self.status != TableStatus::Running {
            return Err(self.not_running());
        }

        if let Some(ts) = self.cached(offset) {
            return Ok(LookupOutcome {
                ts,
                source: MatchSource::Cache,
            });
        }

        let threshold = self.threshold(margin);
        if let Some(candidate) = self.locate(offset).candidate {
            let record = self.pool.record(candidate);
            if within(offset, record.offset, threshold) {
                return Ok(LookupOutcome {
                    ts: record.ts,
                    source: MatchSource::Exact,
                });
            }
        }

        Err(Error::NoMatch {
            class: self.class,
            offset,
        })
    }

    fn cached(&self, offset: u32) -> Option<Timestamp> {
        self.cache
            .filter(|entry| entry.offset == offset)
            .map(|entry| entry.ts)
    }

    /// Active threshold; doubled until the first lookup succeeds.
    fn threshold(&self, margin: u32) -> u32 {
        let base = if margin == 0 {
            self.config.resolution
        } else {
            margin
        };
        if self.first_lookup_ok {
            base
        } else {
            base.saturating_mul(2)
        }
    }

    fn record_success(&mut self, ts: Timestamp, fx: &mut Effects) {
        self.last_lookup = Some(ts);
        if !self.first_lookup_ok {
            self.first_lookup_ok = true;
            fx.first_lookup = Some((ts, false));
            tracing::debug!("{} first lookup matched at {} ticks", self.class, ts.ticks);
        }
    }

    /// Find the last record at or before `offset`, scanning from the cursor.
    fn locate(&self, offset: u32) -> Located {
        let Some(start) = self.cursor.or_else(|| self.pool.valid_head()) else {
            return Located::default();
        };
        debug_assert_eq!(self.pool.list_of(start), ListKind::Valid);

        let start_offset = self.pool.record(start).offset;

        if later(offset, start_offset) {
            let mut best = start;
            while let Some(next) = self.pool.next(best) {
                if later(self.pool.record(next).offset, offset) {
                    break;
                }
                best = next;
            }
            Located {
                candidate: Some(best),
                scanned_from: (best != start).then_some(start),
            }
        } else if later(start_offset, offset) {
            let mut prev = self.pool.prev(start);
            while let Some(id) = prev {
                if equal_or_later(offset, self.pool.record(id).offset) {
                    return Located {
                        candidate: Some(id),
                        scanned_from: None,
                    };
                }
                prev = self.pool.prev(id);
            }
            Located::default()
        } else {
            Located {
                candidate: Some(start),
                scanned_from: None,
            }
        }
    }

    /// Retire every record from `from` up to (not including) `until`.
    fn retire_scanned(&mut self, from: RecordId, until: RecordId) {
        let mut id = from;
        while id != until {
            let Some(next) = self.pool.next(id) else {
                break;
            };
            self.retire(id);
            self.stats.scan_retired += 1;
            id = next;
        }
    }

    fn collect_garbage(&mut self, offset: u32) {
        let limit = i64::from(self.config.gc_distance);
        while let Some(head) = self.pool.valid_head() {
            if i64::from(diff(offset, self.pool.record(head).offset)) <= limit {
                break;
            }
            self.retire(head);
            self.stats.gc_retired += 1;
        }
    }

    fn interpolate(&self, low: RecordId, offset: u32) -> Option<Timestamp> {
        let lo = *self.pool.record(low);
        let hi = *self.pool.record(self.pool.next(low)?);
        if !later(hi.offset, offset) {
            return None;
        }

        let span = i64::from(diff(hi.offset, lo.offset));
        let step = i64::from(diff(offset, lo.offset));
        if span <= 0 || step < 0 {
            return None;
        }

        let delta = i64::from(diff(hi.ts.ticks, lo.ts.ticks));
        if delta.unsigned_abs() > u64::from(self.config.interpolation_bound) {
            return None;
        }

        let ticks = lo.ts.ticks.wrapping_add((delta * step / span) as u32);
        let micro_delta = i128::from(hi.ts.micros) - i128::from(lo.ts.micros);
        let micros = i128::from(lo.ts.micros) + micro_delta * i128::from(step) / i128::from(span);
        Some(Timestamp::new(ticks, micros.max(0) as u64))
    }

    fn retire(&mut self, id: RecordId) {
        self.forget_cursor(id);
        self.pool.move_to_tail(id, ListKind::Free);
    }

    fn forget_cursor(&mut self, id: RecordId) {
        if self.cursor == Some(id) {
            self.cursor = None;
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub(crate) fn last_checkin(&self) -> Option<Timestamp> {
        self.last_checkin
    }

    pub(crate) fn last_lookup(&self) -> Option<Timestamp> {
        self.last_lookup
    }

    pub(crate) fn has_checkin(&self) -> bool {
        self.first_checkin.is_some()
    }

    pub(crate) fn first_lookup_failed(&self) -> bool {
        self.first_lookup_failed
    }

    /// Valid records at or after `offset`.
    pub(crate) fn pending_count(&self, offset: u32) -> usize {
        self.pool
            .iter_valid()
            .filter(|(_, record)| equal_or_later(record.offset, offset))
            .count()
    }

    pub(crate) fn valid_len(&self) -> usize {
        self.pool.valid_len()
    }

    pub(crate) fn free_len(&self) -> usize {
        self.pool.free_len()
    }

    pub(crate) fn splice_count(&self) -> u64 {
        self.pool.moves()
    }

    pub(crate) fn stats(&self) -> TableStats {
        self.stats
    }

    pub(crate) fn records(&self) -> Vec<(u32, Timestamp)> {
        self.pool
            .iter_valid()
            .map(|(_, record)| (record.offset, record.ts))
            .collect()
    }
}

/// `offset` is at or after `record_offset` by no more than `threshold`.
fn within(offset: u32, record_offset: u32, threshold: u32) -> bool {
    let distance = diff(offset, record_offset);
    distance >= 0 && distance as u32 <= threshold
}
