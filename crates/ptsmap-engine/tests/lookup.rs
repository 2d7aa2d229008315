//! Checkin/lookup behaviour of the engine, driven through its public API.

mod common;

use assert_matches::assert_matches;
use common::{engine, engine_with_capacity, Notice};
use ptsmap_engine::offset::{diff, equal_or_later, later};
use ptsmap_engine::{Error, MatchSource, PtsEngine, StreamClass};

const VIDEO: StreamClass = StreamClass::Video;
const AUDIO: StreamClass = StreamClass::Audio;

fn assert_ordered(records: &[(u32, ptsmap_engine::Timestamp)]) {
    for pair in records.windows(2) {
        assert!(
            equal_or_later(pair[1].0, pair[0].0),
            "valid list out of order: {:#x} before {:#x}",
            pair[0].0,
            pair[1].0
        );
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn valid_list_stays_ordered_across_wrap() {
    let (engine, _) = engine_with_capacity(32);
    engine.start(VIDEO).unwrap();
    engine.start(AUDIO).unwrap();

    // Deterministic LCG so the step sizes vary without pulling in rand.
    let mut seed: u32 = 0x1234_5678;
    let mut next = || {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        seed >> 20
    };

    let mut offset: u32 = 0xFFFF_0000;
    let mut ticks: u32 = 0;
    for i in 0..500u32 {
        offset = offset.wrapping_add(next() + 1);
        ticks = ticks.wrapping_add(3_600);
        engine.checkin(VIDEO, offset, ticks).unwrap();
        engine.checkin(AUDIO, offset, ticks).unwrap();

        if i % 3 == 0 {
            let query = offset.wrapping_sub(next() % 2_000);
            let _ = engine.lookup(VIDEO, query, 0);
            let _ = engine.lookup(AUDIO, query, 0);
        }

        assert_ordered(&engine.valid_records(VIDEO).unwrap());
        assert_ordered(&engine.valid_records(AUDIO).unwrap());
    }
}

// ---------------------------------------------------------------------------
// Basic resolution
// ---------------------------------------------------------------------------

#[test]
fn lookup_right_after_checkin_returns_value() {
    let (engine, _) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 4_096, 123_456).unwrap();

    let ts = engine.lookup(VIDEO, 4_096, 0).unwrap();
    assert_eq!(ts.ticks, 123_456);
    assert_eq!(ts.micros, 123_456u64 * 100 / 9);
}

#[test]
fn checkin_micros_derives_ticks() {
    let (engine, _) = engine();
    engine.start(AUDIO).unwrap();
    engine.checkin_micros(AUDIO, 0, 2_000_000).unwrap();

    let ts = engine.lookup(AUDIO, 0, 0).unwrap();
    assert_eq!(ts.ticks, 180_000);
    assert_eq!(ts.micros, 2_000_000);
}

#[test]
fn end_to_end_forward_then_backward() {
    let (engine, _) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 1_000).unwrap();
    engine.checkin(VIDEO, 100, 2_000).unwrap();
    engine.checkin(VIDEO, 200, 3_000).unwrap();

    assert_eq!(engine.lookup(VIDEO, 100, 0).unwrap().ticks, 2_000);
    assert_eq!(engine.lookup(VIDEO, 50, 0).unwrap().ticks, 1_000);
}

#[test]
fn query_before_cursor_scans_backward() {
    let (engine, _) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 1_000).unwrap();
    engine.checkin(VIDEO, 100, 2_000).unwrap();
    engine.checkin(VIDEO, 200, 3_000).unwrap();

    // Cursor lands on offset 100, just before the consumed match.
    assert_eq!(engine.lookup(VIDEO, 200, 0).unwrap().ticks, 3_000);
    assert_eq!(engine.lookup(VIDEO, 50, 0).unwrap().ticks, 1_000);
    // Offset 100 is still there for a later query.
    assert_eq!(engine.lookup(VIDEO, 120, 0).unwrap().ticks, 2_000);
}

#[test]
fn matched_record_is_consumed() {
    let (engine, _) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 1_000).unwrap();
    engine.checkin(VIDEO, 100, 2_000).unwrap();

    engine.lookup(VIDEO, 100, 0).unwrap();
    assert_eq!(engine.valid_len(VIDEO).unwrap(), 1);
    // A different offset that would have matched 100 now resolves to 0.
    let outcome = engine.lookup_outcome(VIDEO, 110, 0).unwrap();
    assert_eq!(outcome.ts.ticks, 1_000);
    assert_eq!(outcome.source, MatchSource::Exact);
}

#[test]
fn margin_overrides_resolution() {
    let (engine, _) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 1_000).unwrap();
    engine.checkin(VIDEO, 10_000, 2_000).unwrap();
    engine.lookup(VIDEO, 10_000, 0).unwrap();

    // 300 past the record: outside a margin of 100, inside the default.
    assert_matches!(engine.lookup(VIDEO, 300, 100), Err(Error::NoMatch { .. }));
    assert_eq!(engine.lookup(VIDEO, 300, 0).unwrap().ticks, 1_000);
}

#[test]
fn wraparound_offsets_resolve() {
    assert_eq!(diff(0x0000_0010, 0xFFFF_FFF0), 0x20);
    assert!(later(0x10, 0xFFFF_FFF0));

    let (engine, _) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0xFFFF_FFF0, 100).unwrap();
    engine.checkin(VIDEO, 0x0000_0010, 200).unwrap();

    assert_eq!(engine.lookup(VIDEO, 0x10, 0).unwrap().ticks, 200);
    assert_eq!(engine.lookup(VIDEO, 0xFFFF_FFF8, 0).unwrap().ticks, 100);
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[test]
fn repeated_lookup_hits_cache_without_splicing() {
    let (engine, _) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 1_000).unwrap();
    engine.checkin(VIDEO, 100, 2_000).unwrap();

    let first = engine.lookup(VIDEO, 100, 0).unwrap();
    let moves = engine.splice_count(VIDEO).unwrap();

    let outcome = engine.lookup_outcome(VIDEO, 100, 0).unwrap();
    assert_eq!(outcome.ts, first);
    assert_eq!(outcome.source, MatchSource::Cache);
    assert_eq!(engine.splice_count(VIDEO).unwrap(), moves);
    assert_eq!(engine.stats(VIDEO).unwrap().cache_hits, 1);
}

// ---------------------------------------------------------------------------
// Pool pressure
// ---------------------------------------------------------------------------

#[test]
fn pool_pressure_evicts_stalest() {
    let (engine, _) = engine_with_capacity(4);
    engine.start(VIDEO).unwrap();
    for i in 0..5u32 {
        engine.checkin(VIDEO, i * 100, 1_000 * (i + 1)).unwrap();
    }

    assert_eq!(engine.valid_len(VIDEO).unwrap(), 4);
    assert_eq!(engine.free_len(VIDEO).unwrap(), 0);
    assert_eq!(engine.stats(VIDEO).unwrap().evictions, 1);
    let offsets: Vec<u32> = engine
        .valid_records(VIDEO)
        .unwrap()
        .into_iter()
        .map(|(offset, _)| offset)
        .collect();
    assert_eq!(offsets, vec![100, 200, 300, 400]);

    assert_eq!(engine.lookup(VIDEO, 400, 0).unwrap().ticks, 5_000);
    // The evicted correspondence is gone for good.
    assert_matches!(
        engine.lookup(VIDEO, 0, 0),
        Err(Error::NoMatch { class: StreamClass::Video, offset: 0 })
    );
    assert_ordered(&engine.valid_records(VIDEO).unwrap());
}

#[test]
fn evicted_offset_during_bootstrap_falls_back() {
    let (engine, sink) = engine_with_capacity(4);
    engine.start(VIDEO).unwrap();
    for i in 0..5u32 {
        engine.checkin(VIDEO, i * 100, 1_000 * (i + 1)).unwrap();
    }

    // No lookup has succeeded yet, so the bootstrap fallback answers with the
    // first checked-in value even though its record was evicted.
    let outcome = engine.lookup_outcome(VIDEO, 0, 0).unwrap();
    assert_eq!(outcome.source, MatchSource::Fallback);
    assert_eq!(outcome.ts.ticks, 1_000);
    assert!(engine.first_lookup_failed(VIDEO).unwrap());
    assert!(sink
        .notices()
        .contains(&Notice::FirstLookup(StreamClass::Video, 1_000, true)));

    // Nothing was consumed and the survivors are intact.
    assert_eq!(engine.valid_len(VIDEO).unwrap(), 4);
    assert_ordered(&engine.valid_records(VIDEO).unwrap());

    // Once bootstrap is over the same query is a plain miss.
    assert_matches!(
        engine.lookup(VIDEO, 0, 0),
        Err(Error::NoMatch { class: StreamClass::Video, offset: 0 })
    );
    assert_eq!(engine.lookup(VIDEO, 100, 0).unwrap().ticks, 2_000);
}

#[test]
fn sustained_pressure_never_fails() {
    let (engine, _) = engine_with_capacity(4);
    engine.start(AUDIO).unwrap();
    for i in 0..1_000u32 {
        engine.checkin(AUDIO, i * 10, i * 90).unwrap();
    }
    assert_eq!(engine.valid_len(AUDIO).unwrap(), 4);
    assert_eq!(engine.lookup(AUDIO, 9_990, 0).unwrap().ticks, 999 * 90);
}

// ---------------------------------------------------------------------------
// Bootstrap fallback
// ---------------------------------------------------------------------------

#[test]
fn first_lookup_falls_back_to_first_checkin() {
    let (engine, sink) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 1_000).unwrap();

    let outcome = engine.lookup_outcome(VIDEO, 100_000, 0).unwrap();
    assert_eq!(outcome.ts.ticks, 1_000);
    assert_eq!(outcome.source, MatchSource::Fallback);
    assert!(engine.first_lookup_failed(VIDEO).unwrap());
    assert!(sink
        .notices()
        .contains(&Notice::FirstLookup(StreamClass::Video, 1_000, true)));

    // The fallback is used once; the next miss is a real miss.
    assert_matches!(engine.lookup(VIDEO, 200_000, 0), Err(Error::NoMatch { .. }));
    assert!(engine.first_lookup_failed(VIDEO).unwrap());
}

#[test]
fn successful_first_lookup_is_not_flagged() {
    let (engine, sink) = engine();
    engine.start(AUDIO).unwrap();
    engine.checkin(AUDIO, 0, 1_000).unwrap();
    engine.lookup(AUDIO, 0, 0).unwrap();

    assert!(!engine.first_lookup_failed(AUDIO).unwrap());
    assert!(sink
        .notices()
        .contains(&Notice::FirstLookup(StreamClass::Audio, 1_000, false)));
}

// ---------------------------------------------------------------------------
// Audio interpolation
// ---------------------------------------------------------------------------

#[test]
fn audio_interpolates_between_bracketing_records() {
    let (engine, _) = engine();
    engine.start(AUDIO).unwrap();
    engine.checkin(AUDIO, 0, 1_000).unwrap();
    engine.checkin(AUDIO, 100, 1_100).unwrap();

    let outcome = engine.lookup_outcome(AUDIO, 50, 0).unwrap();
    assert_eq!(outcome.ts.ticks, 1_050);
    assert_eq!(outcome.source, MatchSource::Interpolated);
    // Neither bracketing record is consumed.
    assert_eq!(engine.valid_len(AUDIO).unwrap(), 2);
    assert_eq!(engine.lookup(AUDIO, 75, 0).unwrap().ticks, 1_075);
}

#[test]
fn audio_interpolates_with_default_settings() {
    let engine = PtsEngine::with_defaults();
    engine.start(AUDIO).unwrap();
    engine.checkin(AUDIO, 0, 1_000).unwrap();
    engine.checkin(AUDIO, 100, 1_100).unwrap();

    let outcome = engine.lookup_outcome(AUDIO, 50, 0).unwrap();
    assert_eq!(outcome.ts.ticks, 1_050);
    assert_eq!(outcome.source, MatchSource::Interpolated);
    assert!(!engine.first_lookup_failed(AUDIO).unwrap());
}

#[test]
fn video_never_interpolates() {
    let (engine, _) = engine();
    engine.set_resolution(VIDEO, 16).unwrap();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 1_000).unwrap();
    engine.checkin(VIDEO, 100, 1_100).unwrap();
    engine.lookup(VIDEO, 100, 0).unwrap();

    engine.checkin(VIDEO, 200, 1_200).unwrap();
    assert_matches!(engine.lookup(VIDEO, 150, 0), Err(Error::NoMatch { .. }));
}

// ---------------------------------------------------------------------------
// Pick
// ---------------------------------------------------------------------------

#[test]
fn pick_does_not_disturb_lookup() {
    let (engine, _) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 1_000).unwrap();
    engine.checkin(VIDEO, 100, 2_000).unwrap();

    let moves = engine.splice_count(VIDEO).unwrap();
    assert_eq!(engine.pick(VIDEO, 100, 0).unwrap().ticks, 2_000);
    assert_eq!(engine.pick(VIDEO, 100, 0).unwrap().ticks, 2_000);
    assert_eq!(engine.splice_count(VIDEO).unwrap(), moves);
    assert_eq!(engine.last_lookup(VIDEO).unwrap(), None);

    assert_eq!(engine.lookup(VIDEO, 100, 0).unwrap().ticks, 2_000);
}

#[test]
fn pick_miss_does_not_fall_back() {
    let (engine, _) = engine();
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 1_000).unwrap();

    assert_matches!(engine.pick(VIDEO, 100_000, 0), Err(Error::NoMatch { .. }));
    assert!(!engine.first_lookup_failed(VIDEO).unwrap());
}

// ---------------------------------------------------------------------------
// Notifications and introspection
// ---------------------------------------------------------------------------

#[test]
fn first_events_fire_once_per_class() {
    let (engine, sink) = engine();
    engine.start(VIDEO).unwrap();
    engine.start(AUDIO).unwrap();
    engine.checkin(VIDEO, 0, 900).unwrap();
    engine.checkin(VIDEO, 10, 1_800).unwrap();
    engine.checkin(AUDIO, 0, 450).unwrap();
    engine.lookup(VIDEO, 0, 0).unwrap();
    engine.lookup(VIDEO, 10, 0).unwrap();

    assert_eq!(
        sink.notices(),
        vec![
            Notice::FirstCheckin(StreamClass::Video, 900),
            Notice::SeedCurrent(StreamClass::Video, 900),
            Notice::FirstCheckin(StreamClass::Audio, 450),
            Notice::SeedCurrent(StreamClass::Audio, 450),
            Notice::FirstLookup(StreamClass::Video, 900, false),
        ]
    );
}

#[test]
fn hw_video_notifications_name_video() {
    let (engine, sink) = engine();
    engine.start(StreamClass::HwVideo).unwrap();
    engine.checkin(StreamClass::HwVideo, 0, 900).unwrap();
    assert_eq!(
        sink.notices()[0],
        Notice::FirstCheckin(StreamClass::Video, 900)
    );
}

#[test]
fn introspection_tracks_last_values() {
    let (engine, _) = engine();
    assert!(!engine.has_checkin(VIDEO).unwrap());
    engine.start(VIDEO).unwrap();
    engine.checkin(VIDEO, 0, 10).unwrap();
    engine.checkin(VIDEO, 100, 20).unwrap();
    engine.checkin(VIDEO, 200, 30).unwrap();

    assert!(engine.has_checkin(VIDEO).unwrap());
    assert_eq!(engine.last_checkin(VIDEO).unwrap().map(|ts| ts.ticks), Some(30));
    assert_eq!(engine.pending_count(VIDEO, 100).unwrap(), 2);
    assert_eq!(engine.pending_count(VIDEO, 201).unwrap(), 0);

    engine.lookup(VIDEO, 100, 0).unwrap();
    assert_eq!(engine.last_lookup(VIDEO).unwrap().map(|ts| ts.ticks), Some(20));
    assert_eq!(engine.pending_count(VIDEO, 100).unwrap(), 1);
}

#[test]
fn video_gc_bounds_the_valid_list() {
    let (engine, _) = engine_with_capacity(1_024);
    engine.start(VIDEO).unwrap();
    // Two records far behind, one current.
    engine.checkin(VIDEO, 0, 0).unwrap();
    engine.checkin(VIDEO, 0x100, 90).unwrap();
    engine.checkin(VIDEO, 0x0900_0000, 180).unwrap();

    assert_eq!(engine.lookup(VIDEO, 0x0900_0000, 0).unwrap().ticks, 180);
    assert_eq!(engine.stats(VIDEO).unwrap().gc_retired, 2);
    assert_eq!(engine.valid_len(VIDEO).unwrap(), 0);
}
