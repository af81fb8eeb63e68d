// Engine control surface - owns the wake thread and linearizes control
// calls against it through one mutex around the scheduler core.

use crate::audio::bank::SoundSetConfig;
use crate::audio::output::{AudioOutputContext, AudioOutputEngine};
use crate::audio::store::SoundBufferStore;
use crate::engine::config::{SchedulingConfig, SchedulingProfile};
use crate::engine::scheduler::{PlayRequest, SchedulerCore};
use crate::engine::visual::VisualState;
use crate::error::EngineError;
use crate::messaging::channels::{EventConsumer, create_event_channel};
use crate::pattern::state::AccentSelection;
use crate::pattern::voice::SoundRole;
use crate::timing::clock::Clock;
use crate::timing::tap_tempo::{TapTempoDetector, TapTempoResult};
use log::{debug, error, warn};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Outbound event queue size. Deep enough for bursts of a full look-ahead
/// window plus a slow consumer; overflow drops notifications, never audio.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// The playback engine. One wake thread drives the look-ahead dispatcher;
/// every public method locks the same core, so a control call observed as
/// returned has fully happened before the next wake.
///
/// Stopping is synchronous in the strong sense: `stop()` bumps the
/// generation under the lock, so no sound triggers after it returns even if
/// a wake was already past the gate.
pub struct CompasEngine {
    core: Arc<Mutex<SchedulerCore>>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SoundBufferStore>,
    tap: Mutex<TapTempoDetector>,
    consumer: Mutex<Option<EventConsumer>>,
    shutdown: Arc<AtomicBool>,
    wake_handle: Option<JoinHandle<()>>,
}

impl CompasEngine {
    pub fn new(
        output: Arc<dyn AudioOutputEngine>,
        store: Arc<dyn SoundBufferStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (producer, consumer) = create_event_channel(EVENT_QUEUE_CAPACITY);
        let core = Arc::new(Mutex::new(SchedulerCore::new(
            AudioOutputContext::new(output),
            producer,
        )));
        let shutdown = Arc::new(AtomicBool::new(false));
        let wake_handle = spawn_wake_thread(core.clone(), clock.clone(), shutdown.clone());

        Self {
            core,
            clock,
            store,
            tap: Mutex::new(TapTempoDetector::new()),
            consumer: Mutex::new(Some(consumer)),
            shutdown,
            wake_handle: Some(wake_handle),
        }
    }

    fn lock_core(&self) -> MutexGuard<'_, SchedulerCore> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the outbound event queue. Single consumer; returns `None` once
    /// taken.
    pub fn events(&self) -> Option<EventConsumer> {
        self.consumer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Load a sound synchronously and assign it to `role`. Used for the
    /// initial set; playback refuses to start until the base role is ready.
    pub fn preload(&self, role: SoundRole, sound_id: &str) -> Result<(), EngineError> {
        let buffer = self.store.load(sound_id)?;
        self.lock_core().bank_mut().assign(role, buffer);
        Ok(())
    }

    /// Load every assignment of a sound set synchronously. Stops at the
    /// first failure, keeping whatever already loaded.
    pub fn load_sound_set(&self, config: &SoundSetConfig) -> Result<(), EngineError> {
        for assignment in &config.assignments {
            self.preload(assignment.role, &assignment.sound_id)?;
        }
        Ok(())
    }

    /// Swap the sound for `role` without interrupting playback. The load
    /// runs on its own thread; until it commits, the previous sound keeps
    /// playing. Rapid repeated swaps are safe: only the newest request can
    /// commit, earlier in-flight results are discarded on arrival.
    pub fn set_sound(&self, role: SoundRole, sound_id: &str) {
        let token = self.lock_core().bank_mut().begin_swap(role);
        let core = self.core.clone();
        let store = self.store.clone();
        let id = sound_id.to_string();

        thread::spawn(move || {
            let result = store.load(&id);
            let mut core = core.lock().unwrap_or_else(|e| e.into_inner());
            match core.bank_mut().commit(role, token, result) {
                Ok(()) => debug!("sound swap committed: {} -> {}", role, id),
                Err(EngineError::StaleAsyncResult) => {
                    debug!("sound swap superseded: {} -> {}", role, id)
                }
                Err(e) => warn!("sound swap failed, keeping previous: {}", e),
            }
        });
    }

    /// Start playback at the current clock time. Returns whether it started.
    pub fn play(&self, request: PlayRequest) -> bool {
        let now = self.clock.now();
        self.lock_core().play(request, now)
    }

    pub fn stop(&self) {
        self.lock_core().stop();
    }

    pub fn is_playing(&self) -> bool {
        self.lock_core().is_playing()
    }

    pub fn set_tempo(&self, bpm: f64) {
        let now = self.clock.now();
        self.lock_core().set_tempo(bpm, now);
    }

    pub fn set_total(&self, total_pulses: u32) {
        let now = self.clock.now();
        self.lock_core().set_total(total_pulses, now);
    }

    pub fn set_loop(&self, looped: bool) {
        let now = self.clock.now();
        self.lock_core().set_loop(looped, now);
    }

    pub fn set_selected(&self, selection: AccentSelection) {
        let now = self.clock.now();
        self.lock_core().set_selected(selection, now);
    }

    pub fn update_cycle_config(
        &self,
        numerator: u32,
        denominator: u32,
        total_pulses: Option<u32>,
        interval: Option<f64>,
    ) {
        let now = self.clock.now();
        self.lock_core()
            .update_cycle_config(numerator, denominator, total_pulses, interval, now);
    }

    pub fn clear_cycle_config(&self) {
        self.lock_core().clear_cycle_config();
    }

    pub fn set_scheduling(&self, config: SchedulingConfig) {
        self.lock_core().set_scheduling(config);
    }

    pub fn set_scheduling_profile(&self, profile: SchedulingProfile) {
        self.lock_core().set_scheduling_profile(profile);
    }

    /// Register a tap at the current clock time. On the third evenly spaced
    /// tap the estimated tempo applies immediately, mid-playback included.
    pub fn tap(&self) -> TapTempoResult {
        let now = self.clock.now();
        let result = self
            .tap
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .tap(now);
        if let TapTempoResult::Ready { bpm } = result {
            self.lock_core().set_tempo(bpm, now);
        }
        result
    }

    pub fn reset_taps(&self) {
        self.tap.lock().unwrap_or_else(|e| e.into_inner()).reset();
    }

    /// Instantaneous position for polling UIs; `None` when stopped.
    pub fn visual_state(&self) -> Option<VisualState> {
        let now = self.clock.now();
        self.lock_core().visual_state(now)
    }

    pub fn set_mute(&self, muted: bool) {
        self.lock_core().output().set_mute(muted);
    }

    pub fn is_muted(&self) -> bool {
        self.lock_core().output().is_muted()
    }

    pub fn set_volume(&self, volume: f32) {
        self.lock_core().output().set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.lock_core().output().volume()
    }
}

impl Drop for CompasEngine {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.wake_handle.take() {
            if handle.join().is_err() {
                error!("wake thread terminated abnormally");
            }
        }
    }
}

/// The wake loop: sleep one update interval, then run the dispatcher once.
/// A panicking tick is contained and logged; the loop keeps going so one
/// bad wake cannot silence the engine for good.
fn spawn_wake_thread(
    core: Arc<Mutex<SchedulerCore>>,
    clock: Arc<dyn Clock>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("compas-wake".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::Acquire) {
                let update_interval = {
                    let core = core.lock().unwrap_or_else(|e| e.into_inner());
                    core.scheduling().update_interval
                };
                thread::sleep(Duration::from_secs_f64(update_interval));
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                let now = clock.now();
                let mut core = core.lock().unwrap_or_else(|e| e.into_inner());
                if catch_unwind(AssertUnwindSafe(|| core.tick(now))).is_err() {
                    error!("dispatcher tick panicked; continuing");
                }
            }
        })
        .unwrap_or_else(|e| panic!("failed to spawn wake thread: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::store::{MemorySoundStore, SoundBuffer};
    use crate::messaging::event::EngineEvent;
    use crate::timing::clock::{ManualClock, SystemClock};
    use ringbuf::traits::Consumer;

    struct RecordingEngine {
        calls: Mutex<Vec<(String, f64)>>,
    }

    impl RecordingEngine {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl AudioOutputEngine for RecordingEngine {
        fn schedule(&self, sound: &Arc<SoundBuffer>, time: f64, _gain: f32) {
            self.calls.lock().unwrap().push((sound.id.clone(), time));
        }
    }

    fn stocked_store() -> Arc<MemorySoundStore> {
        let store = Arc::new(MemorySoundStore::new());
        store.insert_stub("base");
        store.insert_stub("accent");
        store.insert_stub("start");
        store
    }

    #[test]
    fn test_end_to_end_one_shot_over_real_time() {
        let engine_out = RecordingEngine::new();
        let store = stocked_store();
        let engine = CompasEngine::new(
            engine_out.clone(),
            store,
            Arc::new(SystemClock::new()),
        );
        let mut events = engine.events().unwrap();

        engine.preload(SoundRole::Base, "base").unwrap();
        assert!(engine.play(PlayRequest::new(3, 0.05)));

        // 3 pulses at 50 ms plus slack for wake jitter
        thread::sleep(Duration::from_millis(400));

        assert!(!engine.is_playing());
        assert_eq!(engine_out.call_count(), 3);

        let mut pulses = 0;
        let mut completed = 0;
        while let Some(event) = events.try_pop() {
            match event {
                EngineEvent::Pulse { .. } => pulses += 1,
                EngineEvent::Completed { .. } => completed += 1,
                _ => {}
            }
        }
        assert_eq!(pulses, 3);
        assert_eq!(completed, 1);
    }

    #[test]
    fn test_play_requires_preloaded_base() {
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            stocked_store(),
            Arc::new(SystemClock::new()),
        );
        assert!(!engine.play(PlayRequest::new(4, 0.5)));

        engine.preload(SoundRole::Base, "base").unwrap();
        assert!(engine.play(PlayRequest::new(4, 0.5)));
        engine.stop();
    }

    #[test]
    fn test_preload_missing_sound_fails() {
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            stocked_store(),
            Arc::new(SystemClock::new()),
        );
        let result = engine.preload(SoundRole::Base, "missing");
        assert!(matches!(
            result,
            Err(EngineError::SoundLoadFailure { .. })
        ));
    }

    #[test]
    fn test_load_sound_set() {
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            stocked_store(),
            Arc::new(SystemClock::new()),
        );

        let mut config = SoundSetConfig::new("default".to_string());
        config.assign(SoundRole::Base, "base".to_string());
        config.assign(SoundRole::Accent, "accent".to_string());
        engine.load_sound_set(&config).unwrap();

        let core = engine.lock_core();
        assert_eq!(core.bank().get(SoundRole::Base).unwrap().id, "base");
        assert_eq!(core.bank().get(SoundRole::Accent).unwrap().id, "accent");
    }

    #[test]
    fn test_async_swap_applies() {
        let store = stocked_store();
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            store.clone(),
            Arc::new(SystemClock::new()),
        );
        engine.preload(SoundRole::Base, "base").unwrap();

        store.insert_stub("replacement");
        engine.set_sound(SoundRole::Base, "replacement");

        // Loader thread commits shortly
        for _ in 0..50 {
            thread::sleep(Duration::from_millis(10));
            if engine.lock_core().bank().get(SoundRole::Base).unwrap().id == "replacement" {
                return;
            }
        }
        panic!("swap never committed");
    }

    #[test]
    fn test_failed_swap_keeps_previous_sound() {
        let store = stocked_store();
        store.fail("broken");
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            store,
            Arc::new(SystemClock::new()),
        );
        engine.preload(SoundRole::Base, "base").unwrap();

        engine.set_sound(SoundRole::Base, "broken");
        thread::sleep(Duration::from_millis(100));

        assert_eq!(
            engine.lock_core().bank().get(SoundRole::Base).unwrap().id,
            "base"
        );
    }

    #[test]
    fn test_tap_tempo_applies_on_third_tap() {
        let clock = Arc::new(ManualClock::new());
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            stocked_store(),
            clock.clone(),
        );

        assert_eq!(engine.tap(), TapTempoResult::NeedMore { remaining: 2 });
        clock.advance(0.5);
        assert_eq!(engine.tap(), TapTempoResult::NeedMore { remaining: 1 });
        clock.advance(0.5);
        assert_eq!(engine.tap(), TapTempoResult::Ready { bpm: 120.0 });

        // 120 BPM applied to the pattern
        assert!((engine.lock_core().pattern().interval() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_taps_discards_run() {
        let clock = Arc::new(ManualClock::new());
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            stocked_store(),
            clock.clone(),
        );

        engine.tap();
        clock.advance(0.5);
        engine.tap();
        engine.reset_taps();

        clock.advance(0.5);
        assert_eq!(engine.tap(), TapTempoResult::NeedMore { remaining: 2 });
    }

    #[test]
    fn test_events_taken_once() {
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            stocked_store(),
            Arc::new(SystemClock::new()),
        );
        assert!(engine.events().is_some());
        assert!(engine.events().is_none());
    }

    #[test]
    fn test_mute_and_volume_pass_through() {
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            stocked_store(),
            Arc::new(SystemClock::new()),
        );

        assert!(!engine.is_muted());
        engine.set_mute(true);
        assert!(engine.is_muted());

        engine.set_volume(0.3);
        assert!((engine.volume() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_wake_loop_survives_panicking_output() {
        use std::sync::atomic::AtomicUsize;

        struct FaultyEngine {
            calls: AtomicUsize,
        }

        impl AudioOutputEngine for FaultyEngine {
            fn schedule(&self, _sound: &Arc<SoundBuffer>, _time: f64, _gain: f32) {
                // First dispatch blows up; the rest are counted
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("output device rejected the buffer");
                }
            }
        }

        let faulty = Arc::new(FaultyEngine {
            calls: AtomicUsize::new(0),
        });
        let engine = CompasEngine::new(
            faulty.clone(),
            stocked_store(),
            Arc::new(SystemClock::new()),
        );
        engine.preload(SoundRole::Base, "base").unwrap();
        assert!(engine.play(PlayRequest::new(4, 0.04).looped(true)));

        thread::sleep(Duration::from_millis(300));

        // The wake loop kept ticking past the panic and later pulses
        // still reached the output
        assert!(engine.is_playing());
        assert!(faulty.calls.load(Ordering::SeqCst) > 2);
        engine.stop();
    }

    #[test]
    fn test_drop_joins_wake_thread() {
        let engine = CompasEngine::new(
            RecordingEngine::new(),
            stocked_store(),
            Arc::new(SystemClock::new()),
        );
        drop(engine);
        // Reaching here without hanging is the assertion
    }
}
