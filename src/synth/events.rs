use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::field::TriState;

/// Request to render one self-terminating tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEvent {
    pub state: TriState,
    /// Loudness scale in [0, 1].
    pub intensity: f32,
    /// Stereo position, -1 hard left to +1 hard right.
    pub pan: f32,
    /// Entropy at emission time, in [0, 1]; brightens the tone.
    pub entropy_bias: f32,
}

impl ToneEvent {
    pub fn new(state: TriState, intensity: f32, pan: f32, entropy_bias: f32) -> Self {
        Self {
            state,
            intensity,
            pan,
            entropy_bias,
        }
        .clamped()
    }

    /// Clamp every field to its documented range; NaN becomes the neutral value.
    pub fn clamped(self) -> Self {
        let unit = |v: f32, neutral: f32| if v.is_nan() { neutral } else { v.clamp(0.0, 1.0) };
        Self {
            state: self.state,
            intensity: unit(self.intensity, 0.0),
            pan: if self.pan.is_nan() {
                0.0
            } else {
                self.pan.clamp(-1.0, 1.0)
            },
            entropy_bias: unit(self.entropy_bias, 0.0),
        }
    }
}

/// Declarative control messages from the session to the synth.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthCommand {
    /// Sound one tone now.
    Emit(ToneEvent),
    /// Sound one tone after `delay_s` seconds unless cancelled first.
    EmitAfter { event: ToneEvent, delay_s: f32 },
    /// One tone per state at 0.7× intensity; no pan spreads them evenly.
    Chord {
        states: Vec<TriState>,
        intensity: f32,
        pan: Option<f32>,
        entropy_bias: f32,
    },
    /// All three states 30 ms apart, sweeping left to right.
    Pulse { intensity: f32, entropy_bias: f32 },
    /// Drop every scheduled-but-unfired tone.
    CancelScheduled,
    /// Retune the reverb time from an entropy value.
    ReverbTime(f32),
    ReverbMix(f32),
    ReverbFeedback(f32),
    LfoRate(f32),
    LfoDepth(f32),
    /// Master volume from an activity ratio: 0.05 + 0.25·ratio.
    ModulateVolume(f32),
    MasterVolume(f32),
    Enable,
    Disable,
}

/// Cancellation counter shared by the session and the render thread.
///
/// Every cancel request bumps it; the engine drops its scheduled tones as soon
/// as it sees a newer value. Unlike a queued command it cannot be lost to a
/// full queue.
#[derive(Debug, Default)]
pub struct CancelEpoch(AtomicU64);

impl CancelEpoch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Request cancellation; returns the new epoch.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}
