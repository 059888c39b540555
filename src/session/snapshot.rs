use std::sync::Arc;

use crate::field::{StateHistogram, TriState};

/// Consistent copy of everything the presentation layer reads, taken between ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    pub width: usize,
    pub height: usize,
    pub cells: Arc<[TriState]>,
    pub histogram: StateHistogram,
    pub entropy: f32,
    pub cycle: u64,
    pub paused: bool,
    pub audio: AudioStatus,
}

/// Audio side of a snapshot, as last commanded by the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioStatus {
    /// A synth is attached; false in degraded mode.
    pub available: bool,
    pub enabled: bool,
    /// Latest meter reading in [0, 1]; 0 when unavailable.
    pub level: f32,
    pub master_volume: f32,
    pub reverb_time_s: f32,
    pub lfo_rate_hz: f32,
    pub lfo_depth_hz: f32,
}

impl FieldSnapshot {
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            cells: Arc::from(Vec::new()),
            histogram: [0; 3],
            entropy: 0.0,
            cycle: 0,
            paused: false,
            audio: AudioStatus {
                available: false,
                enabled: false,
                level: 0.0,
                master_volume: 0.0,
                reverb_time_s: 0.0,
                lfo_rate_hz: 0.0,
                lfo_depth_hz: 0.0,
            },
        }
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<TriState> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y * self.width + x).copied()
    }

    /// State shares in percent, for stats displays.
    pub fn shares_pct(&self) -> [f32; 3] {
        let total = self.cells.len().max(1) as f32;
        self.histogram.map(|c| c as f32 * 100.0 / total)
    }
}
