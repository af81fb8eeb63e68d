// Scheduler - look-ahead dispatcher
// Wakes on a fixed cadence, dispatches everything due within the look-ahead
// window to the audio output, and mirrors each dispatch onto the outbound
// event queue with the same timestamp.

use crate::audio::bank::SoundBank;
use crate::audio::output::AudioOutputContext;
use crate::engine::config::{SchedulingConfig, SchedulingProfile};
use crate::engine::session::PlaybackSession;
use crate::engine::visual::{VisualState, derive_visual_state};
use crate::messaging::channels::EventProducer;
use crate::messaging::event::EngineEvent;
use crate::pattern::cycle::CycleOverlay;
use crate::pattern::state::{AccentSelection, PatternState};
use crate::pattern::voice::{self, SoundRole};
use crate::timing::pulse_clock::{PulseClock, recompute_phase};
use log::{debug, warn};
use ringbuf::traits::Producer;
use std::collections::BTreeSet;

/// Cycle overlay fraction requested at play time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleRequest {
    pub numerator: u32,
    pub denominator: u32,
}

/// Everything `play` needs to start a session.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub total_pulses: u32,
    /// Seconds per pulse.
    pub interval: f64,
    pub accented: BTreeSet<u32>,
    pub looped: bool,
    /// Cycle overlay to install; `None` keeps whatever overlay is already
    /// configured on the engine.
    pub cycle: Option<CycleRequest>,
    /// Finer accent grid in ticks per bar; `None` keeps accents on the
    /// base pulse grid.
    pub accent_resolution: Option<u32>,
}

impl PlayRequest {
    pub fn new(total_pulses: u32, interval: f64) -> Self {
        Self {
            total_pulses,
            interval,
            accented: BTreeSet::new(),
            looped: false,
            cycle: None,
            accent_resolution: None,
        }
    }

    pub fn looped(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    pub fn with_accents(mut self, accented: BTreeSet<u32>) -> Self {
        self.accented = accented;
        self
    }

    pub fn with_cycle(mut self, numerator: u32, denominator: u32) -> Self {
        self.cycle = Some(CycleRequest {
            numerator,
            denominator,
        });
        self
    }

    pub fn with_accent_resolution(mut self, resolution: u32) -> Self {
        self.accent_resolution = Some(resolution);
        self
    }
}

/// The dispatcher state machine. Drives pulses, fine-grid accents, and the
/// cycle overlay off one `PulseClock`, fenced by a generation token.
///
/// All methods take `now` explicitly; the wake thread passes the shared
/// clock's reading, tests pass whatever they like.
pub struct SchedulerCore {
    pattern: PatternState,
    overlay: Option<CycleOverlay>,
    bank: SoundBank,
    output: AudioOutputContext,
    clock: PulseClock,
    scheduling: SchedulingConfig,
    session: Option<PlaybackSession>,
    generation: u64,
    events: EventProducer,
}

impl SchedulerCore {
    pub fn new(output: AudioOutputContext, events: EventProducer) -> Self {
        Self {
            pattern: PatternState::default(),
            overlay: None,
            bank: SoundBank::new(),
            output,
            clock: PulseClock::new(),
            scheduling: SchedulingConfig::default(),
            session: None,
            generation: 0,
            events,
        }
    }

    pub fn bank(&self) -> &SoundBank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut SoundBank {
        &mut self.bank
    }

    pub fn output(&self) -> &AudioOutputContext {
        &self.output
    }

    pub fn pattern(&self) -> &PatternState {
        &self.pattern
    }

    pub fn overlay(&self) -> Option<&CycleOverlay> {
        self.overlay.as_ref()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn scheduling(&self) -> SchedulingConfig {
        self.scheduling
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    pub fn set_scheduling(&mut self, config: SchedulingConfig) {
        self.scheduling = config;
    }

    pub fn set_scheduling_profile(&mut self, profile: SchedulingProfile) {
        self.scheduling = profile.config();
    }

    /// Start a session at `now`. Returns whether playback actually started;
    /// a not-ready bank or invalid parameters are logged no-ops.
    pub fn play(&mut self, request: PlayRequest, now: f64) -> bool {
        if !self.bank.is_ready() {
            warn!("play ignored: initial sounds not loaded yet");
            return false;
        }
        let Some(mut pattern) =
            PatternState::new(request.total_pulses, request.interval, request.looped)
        else {
            warn!("play ignored: invalid total_pulses or interval");
            return false;
        };

        let selection = match request.accent_resolution {
            Some(resolution) => AccentSelection::WithResolution {
                values: request.accented,
                resolution,
            },
            None => AccentSelection::Pulses(request.accented),
        };
        if !pattern.set_selected(selection) {
            warn!("accent selection ignored: invalid resolution");
        }

        if self.session.is_some() {
            self.stop();
        }
        self.pattern = pattern;

        if let Some(cycle) = request.cycle {
            match CycleOverlay::new(
                cycle.numerator,
                cycle.denominator,
                self.pattern.total_pulses(),
                self.pattern.interval(),
            ) {
                Some(overlay) => self.overlay = Some(overlay),
                None => warn!("cycle overlay ignored: invalid fraction"),
            }
        } else if let Some(overlay) = &mut self.overlay {
            // Retained overlay follows the new pattern
            overlay.rebuild(self.pattern.total_pulses(), self.pattern.interval());
        }
        if let Some(overlay) = &mut self.overlay {
            overlay.reset_cursor();
        }

        self.generation += 1;
        self.clock.start(now, self.pattern.interval());
        self.session = Some(PlaybackSession::new(
            self.generation,
            self.pattern.total_pulses(),
            self.pattern.looped(),
        ));
        true
    }

    /// End the session and invalidate the generation. Anything stamped with
    /// the old generation is stale from here on.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.session = None;
        self.clock.stop();
    }

    /// One wake of the dispatcher: enumerate events due before
    /// `now + look_ahead`, hand them to the audio output, mirror them onto
    /// the event queue, and terminate one-shot sessions that ran out.
    pub fn tick(&mut self, now: f64) {
        if self.session.is_none() {
            return;
        }
        let horizon = now + self.scheduling.look_ahead;
        let generation = self.generation;
        let total = self.pattern.total_pulses() as u64;
        let accents_on_grid = self.pattern.accents_on_pulse_grid();

        // Base-grid pulses. `completed_at` records the end of the bar when
        // the one-shot countdown reaches zero this wake.
        let mut completed_at: Option<f64> = None;
        if let Some(session) = &mut self.session {
            while completed_at.is_none() {
                let time = self.clock.time_of_pulse(session.pulse_cursor);
                if time >= horizon {
                    break;
                }
                let step = (session.pulse_cursor % total) as u32;
                let role = if accents_on_grid {
                    voice::role_for_pulse(step, self.pattern.accented())
                } else if step == 0 {
                    SoundRole::Start
                } else {
                    SoundRole::Base
                };
                dispatch(&self.bank, &self.output, role, time);
                push(
                    &mut self.events,
                    EngineEvent::Pulse {
                        step,
                        role,
                        time,
                        generation,
                    },
                );
                session.pulse_cursor += 1;
                if let Some(remaining) = &mut session.remaining_pulses {
                    *remaining -= 1;
                    if *remaining == 0 {
                        completed_at = Some(self.clock.time_of_pulse(session.pulse_cursor));
                    }
                }
            }
        }

        // Fine-grid accents, when the resolution differs from the base grid
        if !accents_on_grid {
            let tick_interval = self.pattern.accent_tick_interval();
            let resolution = self.pattern.accent_resolution() as u64;
            let accent_horizon = completed_at.unwrap_or(horizon);
            if let Some(session) = &mut self.session {
                loop {
                    if session.remaining_pulses.is_some() && session.accent_cursor >= resolution {
                        // One-shot accents cover a single bar
                        break;
                    }
                    let time =
                        self.clock.start_ref() + session.accent_cursor as f64 * tick_interval;
                    if time >= accent_horizon {
                        break;
                    }
                    let index = (session.accent_cursor % resolution) as u32;
                    if self.pattern.accented().contains(&index) {
                        dispatch(&self.bank, &self.output, SoundRole::Accent, time);
                    }
                    session.accent_cursor += 1;
                }
            }
        }

        // Cycle overlay subdivisions. On completion the rest of the final
        // bar's batch flushes now so nothing is cut off at the seam.
        if self.session.is_some() {
            if let Some(overlay) = &mut self.overlay {
                let period = self.pattern.period();
                let looped = self.pattern.looped();
                let overlay_horizon = completed_at.unwrap_or(horizon);
                while let Some((event, time)) =
                    overlay.next_before(self.clock.start_ref(), period, overlay_horizon, looped)
                {
                    let role = voice::role_for_subdivision(event.subdivision_index);
                    dispatch(&self.bank, &self.output, role, time);
                    push(
                        &mut self.events,
                        EngineEvent::CycleTick {
                            cycle_index: event.cycle_index,
                            subdivision_index: event.subdivision_index,
                            time,
                            generation,
                        },
                    );
                }
            }
        }

        if completed_at.is_some() {
            push(&mut self.events, EngineEvent::Completed { generation });
            self.stop();
        }
    }

    /// Tempo in BPM; the pulse interval follows. Invalid values are
    /// logged no-ops.
    pub fn set_tempo(&mut self, bpm: f64, now: f64) {
        if !self.pattern.set_tempo(bpm) {
            warn!("set_tempo ignored: invalid bpm");
            return;
        }
        self.reconfigure(now);
    }

    pub fn set_total(&mut self, total_pulses: u32, now: f64) {
        if !self.pattern.set_total(total_pulses) {
            warn!("set_total ignored: total_pulses must be positive");
            return;
        }
        self.reconfigure(now);
    }

    pub fn set_loop(&mut self, looped: bool, now: f64) {
        self.pattern.set_looped(looped);
        self.reconfigure(now);
    }

    pub fn set_selected(&mut self, selection: AccentSelection, now: f64) {
        if !self.pattern.set_selected(selection) {
            warn!("set_selected ignored: invalid resolution");
            return;
        }
        self.reconfigure(now);
    }

    /// Install or replace the cycle overlay, optionally updating the
    /// pattern total/interval in the same step. While playing, overlay
    /// events realign to the current elapsed phase rather than restarting
    /// at zero.
    pub fn update_cycle_config(
        &mut self,
        numerator: u32,
        denominator: u32,
        total_pulses: Option<u32>,
        interval: Option<f64>,
        now: f64,
    ) {
        if let Some(total) = total_pulses {
            if !self.pattern.set_total(total) {
                warn!("cycle config: total_pulses ignored");
            }
        }
        if let Some(interval) = interval {
            if !self.pattern.set_interval(interval) {
                warn!("cycle config: interval ignored");
            }
        }
        match CycleOverlay::new(
            numerator,
            denominator,
            self.pattern.total_pulses(),
            self.pattern.interval(),
        ) {
            Some(overlay) => self.overlay = Some(overlay),
            None => {
                warn!("cycle config ignored: invalid fraction");
                return;
            }
        }
        self.reconfigure(now);
    }

    /// Remove the overlay entirely.
    pub fn clear_cycle_config(&mut self) {
        self.overlay = None;
    }

    /// Instantaneous position for polling UIs; `None` when not playing.
    pub fn visual_state(&self, now: f64) -> Option<VisualState> {
        if self.session.is_none() {
            return None;
        }
        derive_visual_state(self.clock.elapsed(now), &self.pattern, self.overlay.as_ref())
    }

    /// Re-derive clock phase, session cursors, and overlay alignment after
    /// a pattern mutation. Changes land at the next tick, never
    /// retroactively; nothing already dispatched re-triggers.
    fn reconfigure(&mut self, now: f64) {
        if self.session.is_some() {
            self.clock.refresh_interval(now, self.pattern.interval());
            if self.pattern.looped() {
                let folded = self.clock.fold_periods(now, self.pattern.total_pulses());
                if folded > 0 {
                    if let Some(session) = &mut self.session {
                        session.pulse_cursor = session.pulse_cursor.saturating_sub(folded);
                        let periods = folded / self.pattern.total_pulses() as u64;
                        session.accent_cursor = session
                            .accent_cursor
                            .saturating_sub(periods * self.pattern.accent_resolution() as u64);
                    }
                }
            }
            let elapsed = self.clock.elapsed(now);
            if let Some(session) = &mut self.session {
                match recompute_phase(
                    elapsed,
                    self.pattern.interval(),
                    self.pattern.total_pulses(),
                    self.pattern.looped(),
                    session.pulse_cursor,
                ) {
                    Some(snapshot) => {
                        session.pulse_cursor = snapshot.pulse_cursor;
                        session.remaining_pulses = snapshot.remaining_pulses;
                    }
                    None => debug!("phase refresh skipped: invalid pattern state"),
                }
                if !self.pattern.accents_on_pulse_grid() {
                    // Only future fine-grid ticks, and never below ticks
                    // already dispatched inside the look-ahead window
                    let tick_interval = self.pattern.accent_tick_interval();
                    let next_tick = (elapsed / tick_interval).ceil() as u64;
                    session.accent_cursor = session.accent_cursor.max(next_tick);
                }
            }
        }
        if let Some(overlay) = &mut self.overlay {
            overlay.rebuild(self.pattern.total_pulses(), self.pattern.interval());
            if self.session.is_some() {
                overlay.realign(
                    self.clock.elapsed(now),
                    self.pattern.period(),
                    self.pattern.looped(),
                );
            }
        }
    }
}

fn dispatch(bank: &SoundBank, output: &AudioOutputContext, role: SoundRole, time: f64) {
    match bank.resolve(role) {
        Some((_, buffer)) => output.dispatch(buffer, time),
        None => debug!("no sound for role {} or its fallbacks", role),
    }
}

fn push(events: &mut EventProducer, event: EngineEvent) {
    if events.try_push(event).is_err() {
        debug!("event queue full, dropping notification");
    }
}
