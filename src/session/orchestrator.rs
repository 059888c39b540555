use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::audio::SynthLink;
use crate::core::entropy::{activity_ratio, lfo_depth_for, lfo_rate_for, reverb_time_for};
use crate::field::gate::GateReport;
use crate::field::{Field, Gate, TriState};
use crate::session::snapshot::{AudioStatus, FieldSnapshot};
use crate::synth::{SynthCommand, ToneEvent};

/// Chance that a cell which changed during a tick also sounds a tone.
pub const EMIT_PROB: f64 = 0.001;
/// Reverb time and LFO follow entropy every this many cycles.
pub const RETUNE_EVERY: u64 = 10;
/// Master volume follows field balance every this many cycles.
pub const VOLUME_EVERY: u64 = 120;
/// Transition rate used by [`Session::pulse`].
pub const PULSE_RATE: f64 = 0.5;
/// Gap between the three notes of the phase-shift sweep.
pub const PHASE_SWEEP_STAGGER_SEC: f32 = 0.05;

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Per-cell transition probability of a regular tick.
    pub transition_rate: f64,
    /// Whether `emit` calls sound from the start.
    pub audio_enabled: bool,
    /// Initial master volume, mirrored for snapshots.
    pub master_volume: f32,
    /// Seed for the emission draws; OS entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transition_rate: 0.02,
            audio_enabled: false,
            master_volume: 0.15,
            seed: None,
        }
    }
}

/// Audio parameters as last pushed to the synth.
#[derive(Debug, Clone, Copy)]
struct AudioMirror {
    enabled: bool,
    master_volume: f32,
    reverb_time_s: f32,
    lfo_rate_hz: f32,
    lfo_depth_hz: f32,
}

/// Owns the field and drives the synth from it.
///
/// Single-threaded: the runner thread owns it; everyone else reads snapshots.
pub struct Session {
    field: Field,
    audio: Option<SynthLink>,
    mirror: AudioMirror,
    transition_rate: f64,
    paused: bool,
    rng: StdRng,
}

impl Session {
    /// `audio` of `None` is the fully degraded mode: every audio command is a no-op.
    pub fn new(field: Field, audio: Option<SynthLink>, cfg: SessionConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut session = Self {
            field,
            audio,
            mirror: AudioMirror {
                enabled: false,
                master_volume: cfg.master_volume.clamp(0.0, 1.0),
                reverb_time_s: 0.3,
                lfo_rate_hz: 0.5,
                lfo_depth_hz: 20.0,
            },
            transition_rate: cfg.transition_rate,
            paused: false,
            rng,
        };
        session.send(if cfg.audio_enabled {
            SynthCommand::Enable
        } else {
            SynthCommand::Disable
        });
        session.mirror.enabled = cfg.audio_enabled && session.audio.is_some();
        session
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn entropy(&self) -> f32 {
        self.field.entropy()
    }

    pub fn cycle(&self) -> u64 {
        self.field.cycle()
    }

    pub fn transition_rate(&self) -> f64 {
        self.transition_rate
    }

    pub fn set_transition_rate(&mut self, rate: f64) {
        if rate.is_finite() {
            self.transition_rate = rate.clamp(f64::MIN_POSITIVE, 1.0);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// One regular tick at the configured rate; nothing happens while paused.
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }
        self.step(self.transition_rate);
    }

    /// Advance the field once at `rate` and run the entropy-driven cadence.
    pub fn step(&mut self, rate: f64) {
        let entropy = self.field.entropy();
        let width = self.field.width();
        let sounding = self.sounding();
        let rng = &mut self.rng;
        let mut tones: Vec<ToneEvent> = Vec::new();
        self.field.step_with(rate, |idx, state| {
            if sounding && rng.random::<f64>() < EMIT_PROB {
                tones.push(ToneEvent::new(state, 1.0, pan_for_column(idx % width, width), entropy));
            }
        });
        for tone in tones {
            self.send(SynthCommand::Emit(tone));
        }

        let cycle = self.field.cycle();
        if cycle % RETUNE_EVERY == 0 {
            self.retune(entropy);
        }
        if cycle % VOLUME_EVERY == 0 {
            let ratio = activity_ratio(&self.field.histogram());
            debug!(cycle, ratio, "volume follows field balance");
            self.modulate_volume(ratio);
        }
    }

    /// Step hard (rate 0.5) and fire a left-to-right three-note burst.
    pub fn pulse(&mut self) {
        self.step(PULSE_RATE);
        if self.sounding() {
            let entropy = self.entropy();
            self.send(SynthCommand::Pulse {
                intensity: 1.0,
                entropy_bias: entropy,
            });
        }
    }

    /// All cells to |0⟩, cycle to zero, pending tones cancelled; then a single
    /// centred |0⟩ tone.
    pub fn reset(&mut self) {
        self.field.reset();
        self.cancel_scheduled();
        info!("field reset");
        self.tone(TriState::Zero, 0.8, 0.0);
    }

    /// Redraw every cell, then sound the full chord.
    pub fn randomize(&mut self) {
        self.field.randomize();
        if self.sounding() {
            let entropy = self.entropy();
            self.send(SynthCommand::Chord {
                states: TriState::ALL.to_vec(),
                intensity: 0.7,
                pan: None,
                entropy_bias: entropy,
            });
        }
    }

    /// Apply a gate and play its signature sound: a chord for `Superpose`, a
    /// rising left-to-right sweep for `PhaseShift`, the first collapsed value
    /// for `Measure`.
    pub fn apply_gate(&mut self, gate: Gate) -> GateReport {
        let report = self.field.apply_gate(gate);
        debug!(gate = gate.name(), touched = report.touched, "gate applied");
        if !self.sounding() {
            return report;
        }
        let entropy = self.entropy();
        match gate {
            Gate::Superpose => {
                self.send(SynthCommand::Chord {
                    states: TriState::ALL.to_vec(),
                    intensity: 0.8,
                    pan: None,
                    entropy_bias: entropy,
                });
            }
            Gate::PhaseShift => {
                for (i, state) in TriState::ALL.into_iter().enumerate() {
                    self.send(SynthCommand::EmitAfter {
                        event: ToneEvent::new(state, 0.6, i as f32 - 1.0, entropy),
                        delay_s: PHASE_SWEEP_STAGGER_SEC * i as f32,
                    });
                }
            }
            Gate::Measure => {
                if let Some(&first) = report.collapsed.first() {
                    self.send(SynthCommand::Emit(ToneEvent::new(first, 1.0, 0.0, entropy)));
                }
            }
        }
        report
    }

    /// Turn tones on and confirm with a centred |1⟩ tone. No-op without a synth.
    pub fn enable_audio(&mut self) {
        if self.audio.is_none() {
            return;
        }
        self.mirror.enabled = true;
        self.send(SynthCommand::Enable);
        self.tone(TriState::One, 0.8, 0.0);
    }

    pub fn disable_audio(&mut self) {
        self.mirror.enabled = false;
        self.send(SynthCommand::Disable);
    }

    /// Flip the enabled flag; returns the new state, always `false` without a synth.
    pub fn toggle_audio(&mut self) -> bool {
        if self.mirror.enabled {
            self.disable_audio();
        } else {
            self.enable_audio();
        }
        self.mirror.enabled
    }

    pub fn audio_enabled(&self) -> bool {
        self.mirror.enabled
    }

    pub fn audio_available(&self) -> bool {
        self.audio.is_some()
    }

    /// Clamped to [0, 1].
    pub fn set_master_volume(&mut self, v: f32) {
        if v.is_nan() {
            return;
        }
        self.mirror.master_volume = v.clamp(0.0, 1.0);
        self.send(SynthCommand::MasterVolume(self.mirror.master_volume));
    }

    pub fn master_volume(&self) -> f32 {
        self.mirror.master_volume
    }

    pub fn reverb_time_s(&self) -> f32 {
        self.mirror.reverb_time_s
    }

    pub fn lfo(&self) -> (f32, f32) {
        (self.mirror.lfo_rate_hz, self.mirror.lfo_depth_hz)
    }

    /// Output level in [0, 1]; 0 without audio.
    pub fn level(&self) -> f32 {
        self.audio.as_ref().map_or(0.0, SynthLink::level)
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            width: self.field.width(),
            height: self.field.height(),
            cells: Arc::from(self.field.cells()),
            histogram: self.field.histogram(),
            entropy: self.field.entropy(),
            cycle: self.field.cycle(),
            paused: self.paused,
            audio: AudioStatus {
                available: self.audio_available(),
                enabled: self.mirror.enabled,
                level: self.level(),
                master_volume: self.mirror.master_volume,
                reverb_time_s: self.mirror.reverb_time_s,
                lfo_rate_hz: self.mirror.lfo_rate_hz,
                lfo_depth_hz: self.mirror.lfo_depth_hz,
            },
        }
    }

    /// Cancel everything scheduled and silence new tones. Called when the
    /// session ends.
    pub fn shutdown(&mut self) {
        self.cancel_scheduled();
        self.send(SynthCommand::Disable);
        self.mirror.enabled = false;
    }

    fn retune(&mut self, entropy: f32) {
        self.mirror.reverb_time_s = reverb_time_for(entropy);
        self.mirror.lfo_rate_hz = lfo_rate_for(entropy);
        self.mirror.lfo_depth_hz = lfo_depth_for(entropy);
        debug!(
            cycle = self.field.cycle(),
            entropy,
            reverb_s = self.mirror.reverb_time_s,
            "retune from entropy"
        );
        self.send(SynthCommand::ReverbTime(entropy));
        self.send(SynthCommand::LfoRate(self.mirror.lfo_rate_hz));
        self.send(SynthCommand::LfoDepth(self.mirror.lfo_depth_hz));
    }

    fn modulate_volume(&mut self, ratio: f32) {
        self.mirror.master_volume = 0.05 + 0.25 * ratio.clamp(0.0, 1.0);
        self.send(SynthCommand::ModulateVolume(ratio));
    }

    fn tone(&mut self, state: TriState, intensity: f32, pan: f32) {
        if self.sounding() {
            let entropy = self.entropy();
            self.send(SynthCommand::Emit(ToneEvent::new(state, intensity, pan, entropy)));
        }
    }

    fn sounding(&self) -> bool {
        self.audio.is_some() && self.mirror.enabled
    }

    /// Hand a command to the synth. A vanished synth drops the session into
    /// degraded mode instead of failing.
    fn send(&mut self, cmd: SynthCommand) {
        self.through_link(|link| link.send(cmd));
    }

    fn cancel_scheduled(&mut self) {
        self.through_link(SynthLink::cancel_scheduled);
    }

    fn through_link(&mut self, deliver: impl FnOnce(&SynthLink) -> bool) {
        let Some(link) = self.audio.as_ref() else {
            return;
        };
        if !deliver(link) {
            warn!("synth went away; continuing without audio");
            self.audio = None;
            self.mirror.enabled = false;
        }
    }
}

/// Linear map of a column onto the stereo field: first column -1, last +1.
pub fn pan_for_column(x: usize, width: usize) -> f32 {
    if width <= 1 {
        return 0.0;
    }
    2.0 * x as f32 / (width - 1) as f32 - 1.0
}
