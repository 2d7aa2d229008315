//! Trace replay: drive an engine from a recorded sequence of calls.

mod positions;
mod trace;

pub use positions::TracePositions;
pub use trace::{parse_trace, ClassSelector, TraceError, TraceEvent};

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ptsmap_engine::{
    BufferPositions, Clock, Error, ManualClock, MatchSource, PtsEngine, StreamClass, TableStats,
    TableStatus, Timestamp,
};
use serde::Serialize;

use crate::config::Config;
use crate::diagnostics::{BitrateEstimator, DiagnosticsSnapshot, SystemClock};
use crate::sync::{SyncEvent, SyncRecorder};

/// Result of replaying a single trace event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepResult {
    Done,
    Timestamp {
        ts: Timestamp,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<MatchSource>,
    },
    Delay {
        delay_ms: Option<u64>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        kind: &'static str,
        message: String,
    },
}

impl StepResult {
    fn failed(err: &Error) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub outcome: StepResult,
}

/// End-of-replay state of one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub class: StreamClass,
    pub status: TableStatus,
    pub valid: usize,
    pub free: usize,
    pub splices: u64,
    pub stats: TableStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<DiagnosticsSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<StepOutcome>,
    pub tables: Vec<TableSummary>,
    pub sync_events: Vec<SyncEvent>,
}

impl ReplayReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_failure()).count()
    }

    /// Human-readable rendering for the terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            let class = step.class.as_deref().unwrap_or("-");
            let detail = match &step.outcome {
                StepResult::Done => "ok".to_string(),
                StepResult::Timestamp { ts, source } => match source {
                    Some(source) => format!("pts {} ({} us) via {:?}", ts.ticks, ts.micros, source),
                    None => format!("pts {} ({} us)", ts.ticks, ts.micros),
                },
                StepResult::Delay { delay_ms: Some(ms) } => format!("{} ms buffered", ms),
                StepResult::Delay { delay_ms: None } => "delay unknown".to_string(),
                StepResult::Skipped { reason } => format!("skipped: {}", reason),
                StepResult::Failed { message, .. } => format!("error: {}", message),
            };
            let _ = writeln!(out, "{:>5}  {:<15} {:<9} {}", step.index, step.op, class, detail);
        }

        out.push('\n');
        for table in &self.tables {
            let _ = writeln!(
                out,
                "{} table: {} | {} valid, {} free, {} splices | {} checkins, {} lookups, {} misses",
                table.class,
                table.status,
                table.valid,
                table.free,
                table.splices,
                table.stats.checkins,
                table.stats.lookups,
                table.stats.misses,
            );
            if let Some(diag) = &table.diagnostics {
                if let Some(bps) = diag.bitrate_bps {
                    let _ = writeln!(out, "  bitrate: {} bit/s", bps);
                }
            }
        }
        for event in &self.sync_events {
            let _ = writeln!(out, "sync: {:?}", event);
        }
        let _ = writeln!(out, "{} events, {} failed", self.steps.len(), self.failures());
        out
    }
}

/// An engine wired to the collaborators a replay needs.
pub struct Session {
    pub engine: PtsEngine,
    pub sync: Arc<SyncRecorder>,
    pub positions: Arc<TracePositions>,
    pub diagnostics: Option<Arc<BitrateEstimator>>,
    /// Replay clock; `None` when arrival times come from the wall clock.
    clock: Option<Arc<ManualClock>>,
}

/// Build a session from configuration. With `wall_clock` set the bitrate
/// estimator timestamps arrivals with real time and `advance` events are
/// ignored.
pub fn build_session(config: &Config, wall_clock: bool) -> Result<Session> {
    let sync = Arc::new(SyncRecorder::new());
    let positions = Arc::new(TracePositions::new());
    let manual = (!wall_clock).then(|| Arc::new(ManualClock::new(0)));

    let mut engine = PtsEngine::new(config.engine_config(), sync.clone())
        .context("Failed to build engine")?
        .with_positions(positions.clone());

    let diagnostics = if config.diagnostics.enabled {
        let clock: Arc<dyn Clock> = match &manual {
            Some(clock) => clock.clone(),
            None => Arc::new(SystemClock::new()),
        };
        let estimator = Arc::new(BitrateEstimator::new(config.diagnostics.window, clock));
        engine = engine.with_observer(estimator.clone());
        Some(estimator)
    } else {
        None
    };

    Ok(Session {
        engine,
        sync,
        positions,
        diagnostics,
        clock: manual,
    })
}

impl Session {
    /// Run one event against the engine. Engine errors become part of the
    /// outcome; nothing here aborts the replay.
    pub fn apply(&self, event: &TraceEvent) -> StepResult {
        self.execute(event).unwrap_or_else(|e| StepResult::failed(&e))
    }

    fn execute(&self, event: &TraceEvent) -> ptsmap_engine::Result<StepResult> {
        let engine = &self.engine;
        match event {
            TraceEvent::Start { class } => {
                let class = class.resolve()?;
                engine.start(class)?;
                if let Some(diagnostics) = &self.diagnostics {
                    diagnostics.reset(class);
                }
                Ok(StepResult::Done)
            }
            TraceEvent::Stop { class } => {
                engine.stop(class.resolve()?)?;
                Ok(StepResult::Done)
            }
            TraceEvent::Checkin { class, offset, pts } => {
                engine.checkin(class.resolve()?, *offset, *pts)?;
                Ok(StepResult::Done)
            }
            TraceEvent::CheckinMicros {
                class,
                offset,
                micros,
            } => {
                engine.checkin_micros(class.resolve()?, *offset, *micros)?;
                Ok(StepResult::Done)
            }
            TraceEvent::Lookup {
                class,
                offset,
                margin,
            } => {
                let outcome = engine.lookup_outcome(class.resolve()?, *offset, *margin)?;
                Ok(StepResult::Timestamp {
                    ts: outcome.ts,
                    source: Some(outcome.source),
                })
            }
            TraceEvent::Pick {
                class,
                offset,
                margin,
            } => {
                let ts = engine.pick(class.resolve()?, *offset, *margin)?;
                Ok(StepResult::Timestamp { ts, source: None })
            }
            TraceEvent::SetResolution { class, threshold } => {
                engine.set_resolution(class.resolve()?, *threshold)?;
                Ok(StepResult::Done)
            }
            TraceEvent::SetCapacity { class, capacity } => {
                engine.set_pool_capacity(class.resolve()?, *capacity)?;
                Ok(StepResult::Done)
            }
            TraceEvent::Positions { class, write, read } => {
                let class = class.resolve()?;
                engine.resolve(class)?;
                self.positions.update(
                    class,
                    BufferPositions {
                        write: *write,
                        read: *read,
                    },
                );
                Ok(StepResult::Done)
            }
            TraceEvent::Delay { class } => Ok(StepResult::Delay {
                delay_ms: engine.buffered_delay_ms(class.resolve()?)?,
            }),
            TraceEvent::Advance { micros } => Ok(self.advance(*micros)),
        }
    }

    fn advance(&self, micros: u64) -> StepResult {
        match &self.clock {
            Some(clock) => {
                clock.advance(micros);
                StepResult::Done
            }
            None => {
                tracing::warn!("Ignoring advance of {} us in wall-clock mode", micros);
                StepResult::Skipped {
                    reason: "wall clock".to_string(),
                }
            }
        }
    }

    /// Replay every event in order and summarize the final state.
    pub fn run(&self, events: &[TraceEvent]) -> ReplayReport {
        let steps = events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                let outcome = self.apply(event);
                if let StepResult::Failed { message, .. } = &outcome {
                    tracing::debug!("Event {} ({}) failed: {}", index, event.op(), message);
                }
                StepOutcome {
                    index,
                    op: event.op(),
                    class: event.class().map(ToString::to_string),
                    outcome,
                }
            })
            .collect();

        ReplayReport {
            steps,
            tables: self.summaries(),
            sync_events: self.sync.events(),
        }
    }

    fn summaries(&self) -> Vec<TableSummary> {
        [StreamClass::Video, StreamClass::Audio]
            .into_iter()
            .filter_map(|class| {
                let engine = &self.engine;
                Some(TableSummary {
                    class,
                    status: engine.status(class).ok()?,
                    valid: engine.valid_len(class).ok()?,
                    free: engine.free_len(class).ok()?,
                    splices: engine.splice_count(class).ok()?,
                    stats: engine.stats(class).ok()?,
                    diagnostics: self.diagnostics.as_ref().map(|d| d.snapshot(class)),
                })
            })
            .collect()
    }
}

/// Load a trace file and replay it against a fresh session.
pub fn replay_file(config: &Config, trace: &Path, wall_clock: bool) -> Result<ReplayReport> {
    let content = std::fs::read_to_string(trace)
        .with_context(|| format!("Failed to read trace file: {:?}", trace))?;
    let events =
        parse_trace(&content).with_context(|| format!("Failed to parse trace file: {:?}", trace))?;

    tracing::info!("Replaying {} events from {:?}", events.len(), trace);
    let session = build_session(config, wall_clock)?;
    Ok(session.run(&events))
}
