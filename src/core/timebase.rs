/// Absolute sample index on the synth clock.
pub type Tick = u64;

#[derive(Clone, Copy, Debug)]
pub struct Timebase {
    pub fs: f32,
    /// Frames rendered per audio block.
    pub block: usize,
}

impl Timebase {
    pub fn tick_to_sec(&self, t: Tick) -> f32 {
        t as f32 / self.fs
    }

    pub fn sec_to_tick(&self, s: f32) -> Tick {
        if !(s > 0.0) {
            return 0;
        }
        let tick = (s as f64 * self.fs as f64).round();
        tick as Tick
    }

    /// Same as [`Self::sec_to_tick`] but never below one tick, for ramp lengths.
    pub fn sec_to_ticks_min1(&self, s: f32) -> Tick {
        self.sec_to_tick(s).max(1)
    }

    pub fn block_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f32(self.block as f32 / self.fs)
    }
}
