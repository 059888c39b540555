use crate::core::db::db_to_amp_ratio;
use crate::core::phase::wrap_unit;
use crate::core::timebase::{Tick, Timebase};
use crate::synth::events::ToneEvent;
use crate::synth::util::{blep_square, equal_power_pan, flush_denorm};

pub const ATTACK_SEC: f32 = 0.02;
pub const TONE_SEC: f32 = 0.35;
/// Peak amplitude of a full-intensity tone at zero entropy bias is half of this.
pub const PEAK_SCALE: f32 = 0.4;

/// Level the exponential decay reaches at the end of the tone (-60 dB).
fn decay_floor() -> f32 {
    db_to_amp_ratio(-60.0)
}

/// Peak envelope amplitude: `0.4 · intensity · (0.5 + entropy_bias / 2)`.
pub fn peak_amplitude(intensity: f32, entropy_bias: f32) -> f32 {
    PEAK_SCALE * intensity.clamp(0.0, 1.0) * (0.5 + entropy_bias.clamp(0.0, 1.0) * 0.5)
}

/// One enveloped square-wave tone, panned and frequency-modulated by the shared LFO.
#[derive(Debug, Clone)]
pub struct ToneVoice {
    freq_hz: f32,
    phase: f32,
    peak: f32,
    onset: Tick,
    attack_ticks: Tick,
    decay_ticks: Tick,
    end: Tick,
    /// Start and length of a steal fade, once requested.
    fade: Option<(Tick, Tick)>,
    decay_log: f32,
    gain_l: f32,
    gain_r: f32,
    inv_fs: f32,
}

impl ToneVoice {
    /// `None` when the tone would be inaudible (zero intensity or bad frequency).
    pub fn from_event(
        time: Timebase,
        onset: Tick,
        event: ToneEvent,
        base_freq_hz: f32,
        detune: f32,
    ) -> Option<Self> {
        let event = event.clamped();
        let freq_hz = base_freq_hz * detune;
        if !freq_hz.is_finite() || freq_hz <= 0.0 {
            return None;
        }
        let peak = peak_amplitude(event.intensity, event.entropy_bias);
        let floor = decay_floor();
        if peak <= floor {
            return None;
        }
        let attack_ticks = time.sec_to_ticks_min1(ATTACK_SEC);
        let len = time.sec_to_tick(TONE_SEC).max(attack_ticks + 1);
        let decay_log = (floor / peak).ln();
        let (gain_l, gain_r) = equal_power_pan(event.pan);
        Some(Self {
            freq_hz,
            phase: 0.0,
            peak,
            onset,
            attack_ticks,
            decay_ticks: len - attack_ticks,
            end: onset + len,
            fade: None,
            decay_log,
            gain_l,
            gain_r,
            inv_fs: 1.0 / time.fs,
        })
    }

    pub fn onset(&self) -> Tick {
        self.onset
    }

    pub fn end_tick(&self) -> Tick {
        self.end
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn freq_hz(&self) -> f32 {
        self.freq_hz
    }

    pub fn is_done(&self, now: Tick) -> bool {
        now >= self.end
    }

    /// Envelope gain at `tick`: linear attack to the peak, then exponential
    /// decay to -60 dB at the end of the tone, zero outside.
    pub fn gain_at(&self, tick: Tick) -> f32 {
        if tick < self.onset || tick >= self.end {
            return 0.0;
        }
        let pos = tick - self.onset;
        if pos < self.attack_ticks {
            return self.peak * (pos + 1) as f32 / self.attack_ticks as f32 * self.fade_gain(tick);
        }
        let frac = (pos - self.attack_ticks) as f32 / self.decay_ticks.max(1) as f32;
        self.peak * (self.decay_log * frac).exp() * self.fade_gain(tick)
    }

    /// Ramp to silence over `len` ticks from `at`; the voice ends there.
    pub fn fade_out(&mut self, at: Tick, len: Tick) {
        let at = at.max(self.onset);
        let len = len.max(1);
        if at + len < self.end {
            self.end = at + len;
            self.fade = Some((at, len));
        }
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    fn fade_gain(&self, tick: Tick) -> f32 {
        match self.fade {
            Some((at, len)) if tick >= at => 1.0 - (tick - at) as f32 / len as f32,
            _ => 1.0,
        }
    }

    /// Add this voice into interleaved stereo `out`, which starts at `start_tick`.
    /// `lfo_hz` holds one frequency deviation per frame.
    pub fn render_add(&mut self, start_tick: Tick, lfo_hz: &[f32], out: &mut [f32]) {
        for (i, (frame, &dev)) in out.chunks_exact_mut(2).zip(lfo_hz).enumerate() {
            let tick = start_tick + i as Tick;
            if tick >= self.end {
                break;
            }
            if tick < self.onset {
                continue;
            }
            let dt = ((self.freq_hz + dev).max(1.0) * self.inv_fs).min(0.5);
            let s = flush_denorm(blep_square(self.phase, dt) * self.gain_at(tick));
            self.phase = wrap_unit(self.phase + dt);
            frame[0] += s * self.gain_l;
            frame[1] += s * self.gain_r;
        }
    }
}
