use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::core::timebase::{Tick, Timebase};
use crate::field::TriState;
use crate::synth::control::LinearRamp;
use crate::synth::events::{CancelEpoch, SynthCommand, ToneEvent};
use crate::synth::lfo::Lfo;
use crate::synth::meter::{LevelMeter, SharedLevel};
use crate::synth::reverb::{ReverbNetwork, ReverbParams};
use crate::synth::voice::ToneVoice;
use crate::synth::{SynthError, check_sample_rate};

/// Maximum relative detune applied per emission (±2.5%).
pub const DETUNE: f32 = 0.025;
/// Chord members sound at this fraction of the requested intensity.
pub const CHORD_SCALE: f32 = 0.7;
/// Gap between the three notes of a pulse.
pub const PULSE_STAGGER_SEC: f32 = 0.03;

const MASTER_RAMP_SEC: f32 = 0.01;
/// Fade applied to a voice stolen to make room for a new one.
const STEAL_FADE_SEC: f32 = 0.005;

#[derive(Clone, Debug)]
pub struct SynthConfig {
    pub fs: f32,
    /// Frames per internal render block.
    pub block: usize,
    /// Base frequency per state: |0⟩, |1⟩, |2⟩.
    pub base_freqs_hz: [f32; 3],
    pub max_voices: usize,
    pub master_volume: f32,
    pub lfo_rate_hz: f32,
    pub lfo_depth_hz: f32,
    pub reverb_mix: f32,
    pub reverb_time_s: f32,
    pub start_enabled: bool,
    /// Seed for detune and reverb jitter; OS entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            fs: 48_000.0,
            block: 256,
            base_freqs_hz: [110.0, 220.0, 440.0],
            max_voices: 64,
            master_volume: 0.15,
            lfo_rate_hz: 0.5,
            lfo_depth_hz: 20.0,
            reverb_mix: 0.4,
            reverb_time_s: 0.3,
            start_enabled: true,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    at_tick: Tick,
    event: ToneEvent,
}

/// Tone generator → master gain → reverb → level meter, on a sample clock.
pub struct SynthEngine {
    cfg: SynthConfig,
    time: Timebase,
    now: Tick,
    voices: Vec<ToneVoice>,
    scheduled: VecDeque<Scheduled>,
    lfo: Lfo,
    lfo_buf: Vec<f32>,
    reverb: ReverbNetwork,
    master: LinearRamp,
    meter: LevelMeter,
    enabled: bool,
    cancel: Option<Arc<CancelEpoch>>,
    seen_epoch: u64,
    rng: StdRng,
}

impl SynthEngine {
    pub fn new(cfg: SynthConfig) -> Result<Self, SynthError> {
        let fs = check_sample_rate(cfg.fs)?;
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let block = cfg.block.max(1);
        let time = Timebase { fs, block };
        let reverb = ReverbNetwork::new(fs, cfg.reverb_mix, cfg.reverb_time_s, &mut rng)?;
        Ok(Self {
            time,
            now: 0,
            voices: Vec::with_capacity(cfg.max_voices.max(1)),
            scheduled: VecDeque::new(),
            lfo: Lfo::new(fs, cfg.lfo_rate_hz, cfg.lfo_depth_hz),
            lfo_buf: vec![0.0; block],
            reverb,
            master: LinearRamp::new(cfg.master_volume.clamp(0.0, 1.0)),
            meter: LevelMeter::new(),
            enabled: cfg.start_enabled,
            cancel: None,
            seen_epoch: 0,
            rng,
            cfg,
        })
    }

    /// Publish the meter reading through `shared` after every render.
    pub fn with_shared_level(mut self, shared: Arc<SharedLevel>) -> Self {
        self.meter = self.meter.with_shared(shared);
        self
    }

    /// Drop scheduled tones whenever `epoch` moves past the value seen here.
    pub fn with_cancel_epoch(mut self, epoch: Arc<CancelEpoch>) -> Self {
        self.seen_epoch = epoch.load();
        self.cancel = Some(epoch);
        self
    }

    pub fn time(&self) -> Timebase {
        self.time
    }

    /// Sample clock: ticks rendered so far.
    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn apply(&mut self, cmd: SynthCommand) {
        match cmd {
            SynthCommand::Emit(ev) => self.emit(ev),
            SynthCommand::EmitAfter { event, delay_s } => self.emit_after(event, delay_s),
            SynthCommand::Chord {
                states,
                intensity,
                pan,
                entropy_bias,
            } => self.emit_chord(&states, intensity, pan, entropy_bias),
            SynthCommand::Pulse {
                intensity,
                entropy_bias,
            } => self.emit_pulse(intensity, entropy_bias),
            SynthCommand::CancelScheduled => {
                self.cancel_scheduled();
            }
            SynthCommand::ReverbTime(entropy) => self.reverb.set_time(entropy),
            SynthCommand::ReverbMix(mix) => self.reverb.set_mix(mix),
            SynthCommand::ReverbFeedback(amount) => self.reverb.set_feedback(amount),
            SynthCommand::LfoRate(hz) => self.set_lfo_rate(hz),
            SynthCommand::LfoDepth(hz) => self.set_lfo_depth(hz),
            SynthCommand::ModulateVolume(ratio) => self.modulate_volume(ratio),
            SynthCommand::MasterVolume(v) => self.set_master_volume(v),
            SynthCommand::Enable => self.enable(),
            SynthCommand::Disable => self.disable(),
        }
    }

    /// Start one tone at the current tick. Ignored while disabled.
    pub fn emit(&mut self, event: ToneEvent) {
        if !self.enabled {
            return;
        }
        self.start_voice(self.now, event);
    }

    /// Queue a tone `delay_s` seconds ahead of the current tick.
    pub fn emit_after(&mut self, event: ToneEvent, delay_s: f32) {
        if !self.enabled {
            return;
        }
        let at_tick = self.now + self.time.sec_to_tick(delay_s);
        let insert_at = self
            .scheduled
            .iter()
            .position(|s| s.at_tick > at_tick)
            .unwrap_or(self.scheduled.len());
        self.scheduled.insert(insert_at, Scheduled { at_tick, event });
    }

    /// One tone per state at 0.7× intensity. Without `pan` the states are
    /// spread evenly between the speakers.
    pub fn emit_chord(
        &mut self,
        states: &[TriState],
        intensity: f32,
        pan: Option<f32>,
        entropy_bias: f32,
    ) {
        let n = states.len();
        for (i, &state) in states.iter().enumerate() {
            let pan = pan.unwrap_or_else(|| spread_pan(i, n));
            self.emit(ToneEvent::new(
                state,
                intensity * CHORD_SCALE,
                pan,
                entropy_bias,
            ));
        }
    }

    /// |0⟩, |1⟩, |2⟩ 30 ms apart, panned left, centre, right.
    pub fn emit_pulse(&mut self, intensity: f32, entropy_bias: f32) {
        for (i, state) in TriState::ALL.into_iter().enumerate() {
            let pan = i as f32 - 1.0;
            self.emit_after(
                ToneEvent::new(state, intensity, pan, entropy_bias),
                PULSE_STAGGER_SEC * i as f32,
            );
        }
    }

    /// Drop every queued tone; returns how many were dropped.
    pub fn cancel_scheduled(&mut self) -> usize {
        let n = self.scheduled.len();
        self.scheduled.clear();
        if n > 0 {
            debug!("cancelled {n} scheduled tones");
        }
        n
    }

    pub fn scheduled_len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn set_lfo_rate(&mut self, hz: f32) {
        self.lfo.set_rate(hz);
    }

    pub fn set_lfo_depth(&mut self, hz: f32) {
        self.lfo.set_depth(hz);
    }

    pub fn lfo_rate(&self) -> f32 {
        self.lfo.rate()
    }

    pub fn lfo_depth(&self) -> f32 {
        self.lfo.depth()
    }

    /// Master volume from how balanced the field is: `0.05 + 0.25·ratio`.
    pub fn modulate_volume(&mut self, activity_ratio: f32) {
        if activity_ratio.is_nan() {
            return;
        }
        self.set_master_volume(0.05 + 0.25 * activity_ratio.clamp(0.0, 1.0));
    }

    /// Clamped to [0, 1], applied over a 10 ms glide.
    pub fn set_master_volume(&mut self, v: f32) {
        if v.is_nan() {
            return;
        }
        let len = self.time.sec_to_ticks_min1(MASTER_RAMP_SEC);
        self.master.ramp_to(v.clamp(0.0, 1.0), len);
    }

    pub fn master_volume(&self) -> f32 {
        self.master.target()
    }

    pub fn reverb(&self) -> &ReverbNetwork {
        &self.reverb
    }

    pub fn reverb_params(&self) -> ReverbParams {
        self.reverb.params()
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// New tones are dropped; tones already sounding and reverb tails ring out.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn level(&self) -> f32 {
        self.meter.level()
    }

    /// Render interleaved stereo frames into `out` (overwritten).
    pub fn render(&mut self, out: &mut [f32]) {
        let block = self.time.block;
        for chunk in out.chunks_mut(block * 2) {
            self.render_chunk(chunk);
        }
    }

    fn render_chunk(&mut self, out: &mut [f32]) {
        let frames = out.len() / 2;
        let start = self.now;
        let end = start + frames as Tick;

        self.sync_cancel();
        while let Some(next) = self.scheduled.front().copied() {
            if next.at_tick >= end {
                break;
            }
            self.scheduled.pop_front();
            if self.enabled {
                self.start_voice(next.at_tick.max(start), next.event);
            }
        }

        out.fill(0.0);
        let lfo = &mut self.lfo_buf[..frames];
        self.lfo.fill(lfo);
        for voice in self.voices.iter_mut() {
            voice.render_add(start, lfo, out);
        }
        self.voices.retain(|v| !v.is_done(end));

        for frame in out.chunks_exact_mut(2) {
            let g = self.master.next();
            frame[0] *= g;
            frame[1] *= g;
        }
        self.reverb.process_interleaved(out);
        self.meter.process_interleaved(out);
        self.now = end;
    }

    fn sync_cancel(&mut self) {
        let Some(epoch) = self.cancel.as_ref().map(|c| c.load()) else {
            return;
        };
        if epoch != self.seen_epoch {
            self.seen_epoch = epoch;
            self.cancel_scheduled();
        }
    }

    fn start_voice(&mut self, onset: Tick, event: ToneEvent) {
        let base = self.cfg.base_freqs_hz[event.state.index()];
        let detune = 1.0 + self.rng.random_range(-DETUNE..DETUNE);
        let Some(voice) = ToneVoice::from_event(self.time, onset, event, base, detune) else {
            return;
        };
        let sounding = self.voices.iter().filter(|v| !v.is_fading()).count();
        if sounding >= self.cfg.max_voices.max(1) {
            // steal the quietest voice with a short fade instead of a hard cut
            let fade = self.time.sec_to_ticks_min1(STEAL_FADE_SEC);
            if let Some(victim) = self
                .voices
                .iter_mut()
                .filter(|v| !v.is_fading())
                .min_by(|a, b| a.gain_at(onset).total_cmp(&b.gain_at(onset)))
            {
                victim.fade_out(onset, fade);
            }
        }
        self.voices.push(voice);
    }
}

/// Even spread of `n` positions strictly inside [-1, 1].
fn spread_pan(i: usize, n: usize) -> f32 {
    2.0 * (i + 1) as f32 / (n + 1) as f32 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SynthEngine {
        SynthEngine::new(SynthConfig {
            seed: Some(7),
            ..SynthConfig::default()
        })
        .expect("engine")
    }

    fn render_secs(engine: &mut SynthEngine, sec: f32) -> Vec<f32> {
        let frames = (sec * engine.time().fs) as usize;
        let mut out = vec![0.0; frames * 2];
        engine.render(&mut out);
        out
    }

    #[test]
    fn volume_modulation_endpoints() {
        let mut e = engine();
        e.modulate_volume(1.0);
        assert!((e.master_volume() - 0.30).abs() < 1e-6);
        e.modulate_volume(0.0);
        assert!((e.master_volume() - 0.05).abs() < 1e-6);
        e.modulate_volume(4.0);
        assert!((e.master_volume() - 0.30).abs() < 1e-6);
        e.set_master_volume(1.7);
        assert_eq!(e.master_volume(), 1.0);
    }

    #[test]
    fn emit_sounds_and_self_terminates() {
        let mut e = engine();
        e.emit(ToneEvent::new(TriState::One, 1.0, 0.0, 1.0));
        assert_eq!(e.active_voices(), 1);
        let out = render_secs(&mut e, 0.1);
        assert!(out.iter().any(|s| s.abs() > 1e-3));
        render_secs(&mut e, 0.3);
        assert_eq!(e.active_voices(), 0);
    }

    #[test]
    fn disabled_engine_is_silent() {
        let mut e = engine();
        e.disable();
        e.emit(ToneEvent::new(TriState::Two, 1.0, 0.0, 1.0));
        e.emit_pulse(1.0, 1.0);
        e.emit_chord(&TriState::ALL, 1.0, None, 1.0);
        assert_eq!(e.active_voices(), 0);
        assert_eq!(e.scheduled_len(), 0);
        let out = render_secs(&mut e, 0.2);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(e.level(), 0.0);
    }

    #[test]
    fn pulse_is_staggered_and_cancellable() {
        let mut e = engine();
        e.emit_pulse(1.0, 0.5);
        assert_eq!(e.scheduled_len(), 3);
        // first block fires only the 0 ms note
        let mut out = vec![0.0; 2 * 256];
        e.render(&mut out);
        assert_eq!(e.active_voices(), 1);
        assert_eq!(e.scheduled_len(), 2);
        assert_eq!(e.cancel_scheduled(), 2);
        render_secs(&mut e, 0.1);
        assert_eq!(e.active_voices(), 1);
    }

    #[test]
    fn pulse_fires_all_three_within_stagger() {
        let mut e = engine();
        e.emit_pulse(1.0, 0.5);
        render_secs(&mut e, 0.07);
        assert_eq!(e.scheduled_len(), 0);
        assert_eq!(e.active_voices(), 3);
    }

    #[test]
    fn disabling_drops_scheduled_at_fire_time() {
        let mut e = engine();
        e.emit_pulse(1.0, 0.5);
        e.disable();
        render_secs(&mut e, 0.1);
        assert_eq!(e.active_voices(), 0);
        assert_eq!(e.scheduled_len(), 0);
    }

    #[test]
    fn chord_spreads_evenly() {
        assert!((spread_pan(0, 3) + 0.5).abs() < 1e-6);
        assert!(spread_pan(1, 3).abs() < 1e-6);
        assert!((spread_pan(2, 3) - 0.5).abs() < 1e-6);
        assert!(spread_pan(0, 1).abs() < 1e-6);

        let mut e = engine();
        e.emit_chord(&TriState::ALL, 1.0, None, 0.0);
        assert_eq!(e.active_voices(), 3);
    }

    #[test]
    fn voice_cap_holds_after_steal_fades() {
        let mut e = SynthEngine::new(SynthConfig {
            max_voices: 4,
            seed: Some(1),
            ..SynthConfig::default()
        })
        .unwrap();
        for _ in 0..10 {
            e.emit(ToneEvent::new(TriState::Zero, 1.0, 0.0, 0.0));
        }
        // stolen voices fade for a few ms before they are dropped
        render_secs(&mut e, 0.02);
        assert_eq!(e.active_voices(), 4);
    }

    #[test]
    fn stolen_voice_fades_instead_of_cutting() {
        let mut e = SynthEngine::new(SynthConfig {
            max_voices: 1,
            reverb_mix: 0.0,
            seed: Some(2),
            ..SynthConfig::default()
        })
        .unwrap();
        e.emit(ToneEvent::new(TriState::Two, 1.0, -1.0, 1.0));
        render_secs(&mut e, 0.05);
        // the replacement is hard right, so the left channel holds only the victim
        e.emit(ToneEvent::new(TriState::Zero, 1.0, 1.0, 1.0));
        assert_eq!(e.active_voices(), 2);
        let out = render_secs(&mut e, 0.02);
        let left: Vec<f32> = out.iter().step_by(2).copied().collect();
        let fade = e.time().sec_to_tick(STEAL_FADE_SEC) as usize;
        let early = left[..fade / 4].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let late = left[3 * fade / 4..fade].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(early > 0.0);
        assert!(late < early, "late={late} early={early}");
        assert!(left[fade..].iter().all(|s| s.abs() < 1e-6));
        assert_eq!(e.active_voices(), 1);
    }

    #[test]
    fn cancel_epoch_beats_a_lost_command() {
        let epoch = CancelEpoch::new();
        let mut e = engine().with_cancel_epoch(epoch.clone());
        e.emit_pulse(1.0, 0.5);
        assert_eq!(e.scheduled_len(), 3);
        epoch.bump();
        let mut out = vec![0.0; 2 * 256];
        e.render(&mut out);
        assert_eq!(e.scheduled_len(), 0);
        assert_eq!(e.active_voices(), 0);

        // later schedules are unaffected until the next bump
        e.emit_pulse(1.0, 0.5);
        e.render(&mut out);
        assert_eq!(e.active_voices(), 1);
    }

    #[test]
    fn level_tracks_activity() {
        let mut e = engine();
        assert_eq!(e.level(), 0.0);
        e.emit_chord(&TriState::ALL, 1.0, None, 1.0);
        render_secs(&mut e, 0.05);
        let active = e.level();
        assert!(active > 0.05, "active={active}");
        render_secs(&mut e, 3.0);
        assert!(e.level() < active);
    }

    #[test]
    fn commands_route_to_parameters() {
        let mut e = engine();
        e.apply(SynthCommand::LfoRate(1.5));
        e.apply(SynthCommand::LfoDepth(50.0));
        e.apply(SynthCommand::ReverbTime(1.0));
        e.apply(SynthCommand::ModulateVolume(1.0));
        e.apply(SynthCommand::Disable);
        assert_eq!(e.lfo_rate(), 1.5);
        assert_eq!(e.lfo_depth(), 50.0);
        assert!((e.reverb_params().time_s - 0.70).abs() < 1e-6);
        assert!((e.master_volume() - 0.30).abs() < 1e-6);
        assert!(!e.is_enabled());
        e.apply(SynthCommand::Enable);
        assert!(e.is_enabled());
    }

    #[test]
    fn rejects_bad_sample_rate() {
        let err = SynthEngine::new(SynthConfig {
            fs: 0.0,
            ..SynthConfig::default()
        })
        .err()
        .expect("error");
        assert_eq!(err, SynthError::InvalidSampleRate(0.0));
    }
}
