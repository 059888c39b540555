use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::entropy::{self, StateHistogram};

/// One cell value. Themed as a qutrit basis state |0⟩, |1⟩, |2⟩.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriState {
    Zero = 0,
    One = 1,
    Two = 2,
}

impl TriState {
    pub const ALL: [TriState; 3] = [TriState::Zero, TriState::One, TriState::Two];

    /// Cyclic successor: 0 → 1 → 2 → 0.
    #[inline]
    pub fn advance(self) -> Self {
        match self {
            TriState::Zero => TriState::One,
            TriState::One => TriState::Two,
            TriState::Two => TriState::Zero,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Uniform draw over the three states.
    #[inline]
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..3usize)]
    }

    /// Display colour hint for renderers: red, green, blue.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            TriState::Zero => [0xff, 0x22, 0x44],
            TriState::One => [0x22, 0xff, 0x44],
            TriState::Two => [0x22, 0x44, 0xff],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    /// Width or height was zero or negative.
    InvalidDimensions { width: i64, height: i64 },
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::InvalidDimensions { width, height } => {
                write!(f, "invalid field dimensions {width}x{height}")
            }
        }
    }
}

impl std::error::Error for FieldError {}

/// Fixed-size row-major grid of [`TriState`] cells plus a cycle counter.
///
/// Every cell evolves independently; there is no neighbour coupling anywhere.
#[derive(Debug, Clone)]
pub struct Field {
    width: usize,
    height: usize,
    cells: Vec<TriState>,
    cycle: u64,
    rng: StdRng,
}

impl Field {
    /// New field with every cell drawn uniformly, seeded from the OS.
    pub fn new(width: i64, height: i64) -> Result<Self, FieldError> {
        Self::from_rng(width, height, StdRng::from_os_rng())
    }

    /// Deterministic variant of [`Self::new`].
    pub fn with_seed(width: i64, height: i64, seed: u64) -> Result<Self, FieldError> {
        Self::from_rng(width, height, StdRng::seed_from_u64(seed))
    }

    fn from_rng(width: i64, height: i64, mut rng: StdRng) -> Result<Self, FieldError> {
        if width <= 0 || height <= 0 {
            return Err(FieldError::InvalidDimensions { width, height });
        }
        let (width, height) = (width as usize, height as usize);
        let len = width
            .checked_mul(height)
            .ok_or(FieldError::InvalidDimensions {
                width: width as i64,
                height: height as i64,
            })?;
        let cells = (0..len).map(|_| TriState::random(&mut rng)).collect();
        Ok(Self {
            width,
            height,
            cells,
            cycle: 0,
            rng,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn cells(&self) -> &[TriState] {
        &self.cells
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<TriState> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y * self.width + x).copied()
    }

    /// Advance each cell by one state with probability `rate`, then bump the cycle.
    ///
    /// `rate` is clamped to (0, 1]; non-positive or NaN rates act as the
    /// smallest positive rate.
    pub fn step(&mut self, rate: f64) {
        self.step_with(rate, |_, _| {});
    }

    /// [`Self::step`], reporting every advanced cell as `(index, new_state)`.
    pub fn step_with<F>(&mut self, rate: f64, mut on_change: F)
    where
        F: FnMut(usize, TriState),
    {
        let rate = clamp_rate(rate);
        for (i, cell) in self.cells.iter_mut().enumerate() {
            if self.rng.random::<f64>() < rate {
                *cell = cell.advance();
                on_change(i, *cell);
            }
        }
        self.cycle += 1;
    }

    /// Every cell to |0⟩ and the cycle counter back to zero.
    pub fn reset(&mut self) {
        self.cells.fill(TriState::Zero);
        self.cycle = 0;
    }

    /// Redraw every cell uniformly. The cycle counter is left alone.
    pub fn randomize(&mut self) {
        for cell in self.cells.iter_mut() {
            *cell = TriState::random(&mut self.rng);
        }
    }

    pub fn histogram(&self) -> StateHistogram {
        let mut counts = [0usize; 3];
        for cell in &self.cells {
            counts[cell.index()] += 1;
        }
        counts
    }

    /// Normalized entropy of the current histogram; never cached.
    pub fn entropy(&self) -> f32 {
        entropy::entropy(&self.histogram())
    }

    pub(crate) fn cells_and_rng(&mut self) -> (&mut [TriState], &mut StdRng) {
        (&mut self.cells, &mut self.rng)
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() || rate <= 0.0 {
        f64::MIN_POSITIVE
    } else {
        rate.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_dimensions() {
        for (w, h) in [(0, 10), (10, 0), (-1, 4), (3, -2), (0, 0)] {
            let err = Field::with_seed(w, h, 1).unwrap_err();
            assert_eq!(err, FieldError::InvalidDimensions { width: w, height: h });
        }
    }

    #[test]
    fn advance_is_cyclic() {
        assert_eq!(TriState::Zero.advance(), TriState::One);
        assert_eq!(TriState::One.advance(), TriState::Two);
        assert_eq!(TriState::Two.advance(), TriState::Zero);
        for s in TriState::ALL {
            assert_eq!(s.advance().advance().advance(), s);
            assert_eq!(TriState::from_index(s.index()), Some(s));
        }
        assert_eq!(TriState::from_index(3), None);
    }

    #[test]
    fn full_rate_step_moves_every_cell() {
        let mut field = Field::with_seed(7, 5, 42).unwrap();
        let before = field.cells().to_vec();
        let mut changed = 0;
        field.step_with(1.0, |_, _| changed += 1);
        assert_eq!(changed, 35);
        for (a, b) in before.iter().zip(field.cells()) {
            assert_eq!(a.advance(), *b);
        }
        assert_eq!(field.cycle(), 1);
    }

    #[test]
    fn reset_zeroes_cells_and_cycle() {
        let mut field = Field::with_seed(4, 4, 3).unwrap();
        field.step(0.5);
        field.step(0.5);
        field.reset();
        assert_eq!(field.histogram(), [16, 0, 0]);
        assert_eq!(field.cycle(), 0);
        assert_eq!(field.entropy(), 0.0);
    }

    #[test]
    fn randomize_keeps_cycle() {
        let mut field = Field::with_seed(8, 8, 9).unwrap();
        field.step(0.1);
        field.randomize();
        assert_eq!(field.cycle(), 1);
        assert_eq!(field.histogram().iter().sum::<usize>(), 64);
    }

    #[test]
    fn out_of_range_rates_are_clamped() {
        let mut field = Field::with_seed(10, 10, 5).unwrap();
        field.reset();
        field.step(7.5);
        assert_eq!(field.histogram(), [0, 100, 0]);
        field.step(0.0);
        field.step(-3.0);
        field.step(f64::NAN);
        assert_eq!(field.histogram(), [0, 100, 0]);
        assert_eq!(field.cycle(), 4);
    }

    #[test]
    fn cell_lookup_is_row_major() {
        let mut field = Field::with_seed(3, 2, 11).unwrap();
        field.reset();
        field.step_with(1.0, |_, _| {});
        assert_eq!(field.cell(2, 1), Some(TriState::One));
        assert_eq!(field.cell(3, 0), None);
        assert_eq!(field.cell(0, 2), None);
    }
}
