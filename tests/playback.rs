//! Integration tests: deterministic scheduling behavior
//!
//! These drive the scheduler core directly with explicit times, so every
//! dispatch decision is reproducible regardless of host timer jitter.

use compas_engine::audio::{AudioOutputContext, AudioOutputEngine, SoundBuffer};
use compas_engine::engine::{PlayRequest, SchedulerCore, SchedulingProfile};
use compas_engine::messaging::channels::{EventConsumer, create_event_channel};
use compas_engine::messaging::event::EngineEvent;
use compas_engine::pattern::SoundRole;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

struct RecordingEngine {
    calls: Mutex<Vec<(String, f64)>>,
}

impl RecordingEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn times(&self) -> Vec<f64> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

impl AudioOutputEngine for RecordingEngine {
    fn schedule(&self, sound: &Arc<SoundBuffer>, time: f64, _gain: f32) {
        self.calls.lock().unwrap().push((sound.id.clone(), time));
    }
}

fn stub(id: &str) -> SoundBuffer {
    SoundBuffer {
        id: id.to_string(),
        samples: vec![0.0; 8],
        sample_rate: 44_100,
        channels: 1,
    }
}

fn core() -> (SchedulerCore, Arc<RecordingEngine>, EventConsumer) {
    let engine = RecordingEngine::new();
    let (producer, consumer) = create_event_channel(4096);
    let mut core = SchedulerCore::new(
        AudioOutputContext::new(engine.clone() as Arc<dyn AudioOutputEngine>),
        producer,
    );
    for role in SoundRole::ALL {
        core.bank_mut().assign(role, stub(&role.to_string()));
    }
    (core, engine, consumer)
}

fn drain(consumer: &mut EventConsumer) -> Vec<EngineEvent> {
    use ringbuf::traits::Consumer;
    let mut events = Vec::new();
    while let Some(event) = consumer.try_pop() {
        events.push(event);
    }
    events
}

/// Every trigger time must come out exactly once even when wakes arrive
/// late, early, bunched, or after long stalls.
#[test]
fn test_exactly_once_under_jittered_wakes() {
    let (mut core, engine, _consumer) = core();
    core.set_scheduling_profile(SchedulingProfile::Desktop);
    core.play(PlayRequest::new(4, 0.1).looped(true), 0.0);

    // Irregular wake times: early bursts, a 0.35 s stall, then catch-up
    for now in [
        0.0, 0.001, 0.002, 0.09, 0.095, 0.19, 0.54, 0.55, 0.56, 0.69, 0.79,
    ] {
        core.tick(now);
    }

    let mut times = engine.times();
    let expected: Vec<f64> = (0..9).map(|k| k as f64 * 0.1).collect();
    times.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(times.len(), expected.len());
    for (got, want) in times.iter().zip(expected.iter()) {
        assert!((got - want).abs() < 1e-9, "got {} want {}", got, want);
    }
}

/// A long stall wider than the look-ahead window must not skip pulses; the
/// next wake dispatches the backlog (late, but present).
#[test]
fn test_stall_dispatches_backlog_without_loss() {
    let (mut core, _engine, mut consumer) = core();
    core.play(PlayRequest::new(4, 0.25).looped(true), 0.0);

    core.tick(0.0);
    // Stall across 6 pulses
    core.tick(1.6);

    let steps: Vec<u32> = drain(&mut consumer)
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Pulse { step, .. } => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(steps, vec![0, 1, 2, 3, 0, 1, 2]);
}

/// Halving the tempo mid-flight must neither re-trigger dispatched pulses
/// nor leave a silent gap longer than one new interval.
#[test]
fn test_tempo_slowdown_keeps_continuity() {
    let (mut core, engine, _consumer) = core();
    core.play(PlayRequest::new(8, 0.25).looped(true), 0.0);

    let mut now = 0.0;
    while now <= 1.0 {
        core.tick(now);
        now += 0.015;
    }
    let before = engine.times().len();

    // 60 BPM: interval becomes 1.0 s
    core.set_tempo(60.0, 1.0);
    while now <= 3.0 {
        core.tick(now);
        now += 0.015;
    }

    let times = engine.times();
    assert!(times.len() > before);
    // No re-trigger: strictly increasing
    for pair in times.windows(2) {
        assert!(pair[1] > pair[0]);
    }
    // Gap at the seam bounded by the new interval
    let next = times[before];
    assert!(next - times[before - 1] <= 1.0 + 1e-9);
}

/// Speeding up mid-flight compresses the remaining grid without skipping
/// the pulse that was already due.
#[test]
fn test_tempo_speedup_compresses_grid() {
    let (mut core, engine, _consumer) = core();
    core.play(PlayRequest::new(8, 0.5).looped(true), 0.0);

    let mut now = 0.0;
    while now <= 1.0 {
        core.tick(now);
        now += 0.015;
    }

    core.set_tempo(240.0, 1.0);
    while now <= 2.0 {
        core.tick(now);
        now += 0.015;
    }

    let times = engine.times();
    // Pulses 0..2 on the old 0.5 s grid, then a 0.25 s grid from 1.25
    assert!((times[3] - 1.25).abs() < 1e-9);
    assert!((times[4] - 1.5).abs() < 1e-9);
    for pair in times.windows(2) {
        assert!(pair[1] > pair[0]);
    }
}

/// Loop-mode long run: folding whole periods keeps trigger times exact.
#[test]
fn test_long_loop_run_stays_on_grid() {
    let (mut core, engine, _consumer) = core();
    core.play(PlayRequest::new(3, 0.2).looped(true), 0.0);

    let mut now = 0.0;
    while now <= 30.0 {
        core.tick(now);
        // Occasional reconfiguration forces a fold
        if (now - 10.0).abs() < 1e-9 || (now - 20.0).abs() < 1e-9 {
            core.set_loop(true, now);
        }
        now += 0.05;
    }

    let times = engine.times();
    assert!(times.len() >= 150);
    for (k, time) in times.iter().enumerate() {
        assert!(
            (time - k as f64 * 0.2).abs() < 1e-6,
            "pulse {} drifted: {}",
            k,
            time
        );
    }
}

/// Reference overlay: 4/3 over 12 pulses, looped. Cycle starts land every
/// 2 s, subdivisions 2/3 s apart, and the batch wraps cleanly each period.
#[test]
fn test_cycle_overlay_loop_seam() {
    let (mut core, _engine, mut consumer) = core();
    core.play(PlayRequest::new(12, 0.5).looped(true).with_cycle(4, 3), 0.0);

    let mut now = 0.0;
    while now <= 13.0 {
        core.tick(now);
        now += 0.015;
    }

    let ticks: Vec<f64> = drain(&mut consumer)
        .iter()
        .filter_map(|e| match e {
            EngineEvent::CycleTick { time, .. } => Some(*time),
            _ => None,
        })
        .collect();

    // Two full periods (6 s each) and a bit: at least 18 subdivisions
    assert!(ticks.len() >= 18);
    for (k, time) in ticks.iter().enumerate() {
        let period = k / 9;
        let offset = (k % 9) as f64 * (2.0 / 3.0);
        let expected = period as f64 * 6.0 + offset;
        assert!(
            (time - expected).abs() < 1e-6,
            "subdivision {} drifted: {} vs {}",
            k,
            time,
            expected
        );
    }
}

/// One-shot with an overlay: the final batch flushes in full, completion
/// arrives exactly once, and nothing follows it.
#[test]
fn test_one_shot_overlay_flush_and_completion() {
    let (mut core, _engine, mut consumer) = core();
    core.play(PlayRequest::new(12, 0.5).with_cycle(4, 3), 0.0);

    let mut now = 0.0;
    while now <= 8.0 {
        core.tick(now);
        now += 0.015;
    }

    let events = drain(&mut consumer);
    let pulses = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Pulse { .. }))
        .count();
    let subdivisions = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::CycleTick { .. }))
        .count();
    let completions = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Completed { .. }))
        .count();

    assert_eq!(pulses, 12);
    assert_eq!(subdivisions, 9);
    assert_eq!(completions, 1);
    assert!(matches!(events.last(), Some(EngineEvent::Completed { .. })));
}

/// Accents on the base grid color the pulse; the pulse count is unchanged.
#[test]
fn test_accents_color_pulses() {
    let (mut core, engine, _consumer) = core();
    let accents: BTreeSet<u32> = [2u32, 5, 8].into_iter().collect();
    core.play(PlayRequest::new(10, 0.2).with_accents(accents), 0.0);

    let mut now = 0.0;
    while now <= 2.5 {
        core.tick(now);
        now += 0.015;
    }

    let calls = engine.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 10);
    assert_eq!(calls.iter().filter(|(id, _)| id == "accent").count(), 3);
    assert_eq!(calls.iter().filter(|(id, _)| id == "start").count(), 1);
    assert_eq!(calls.iter().filter(|(id, _)| id == "base").count(), 6);
}

/// Changing the accent selection mid-flight affects only future pulses.
#[test]
fn test_accent_change_applies_next_wake() {
    use compas_engine::pattern::AccentSelection;

    let (mut core, engine, _consumer) = core();
    core.play(PlayRequest::new(4, 0.5).looped(true), 0.0);

    let mut now = 0.0;
    while now <= 1.0 {
        core.tick(now);
        now += 0.015;
    }
    assert_eq!(
        engine
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == "accent")
            .count(),
        0
    );

    core.set_selected(
        AccentSelection::Pulses([1u32, 2, 3].into_iter().collect()),
        1.0,
    );
    while now <= 3.0 {
        core.tick(now);
        now += 0.015;
    }

    let accented = engine
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|(id, _)| id == "accent")
        .count();
    assert!(accented >= 3);
}
