use rand::Rng;

use super::grid::{Field, TriState};

/// Per-cell probability that `Superpose` resamples a cell.
pub const SUPERPOSE_PROB: f64 = 0.10;
/// Per-cell probability that `PhaseShift` advances a cell.
pub const PHASE_SHIFT_PROB: f64 = 0.05;
/// Per-cell probability that `Measure` collapses a cell.
pub const MEASURE_PROB: f64 = 0.20;

/// Bulk stochastic operators, loosely named after quantum gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Resample a cell uniformly over all three states.
    Superpose,
    /// Advance a cell by one state, like a light [`Field::step`].
    PhaseShift,
    /// Collapse a cell to |0⟩ or |2⟩ with equal odds, never |1⟩.
    Measure,
}

impl Gate {
    pub fn name(self) -> &'static str {
        match self {
            Gate::Superpose => "superpose",
            Gate::PhaseShift => "phase-shift",
            Gate::Measure => "measure",
        }
    }
}

impl std::str::FromStr for Gate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "superpose" | "hadamard" | "h" => Ok(Gate::Superpose),
            "phase-shift" | "phase" | "p" => Ok(Gate::PhaseShift),
            "measure" | "m" => Ok(Gate::Measure),
            other => Err(format!("unknown gate '{other}'")),
        }
    }
}

/// What a gate did to the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateReport {
    /// Cells selected by the gate's per-cell draw.
    pub touched: usize,
    /// For `Measure`: collapsed values in cell-index order. Empty otherwise.
    pub collapsed: Vec<TriState>,
}

impl Field {
    /// Apply `gate` to every cell independently. The cycle counter is unchanged.
    pub fn apply_gate(&mut self, gate: Gate) -> GateReport {
        let (cells, rng) = self.cells_and_rng();
        let mut report = GateReport::default();
        match gate {
            Gate::Superpose => {
                for cell in cells.iter_mut() {
                    if rng.random::<f64>() < SUPERPOSE_PROB {
                        *cell = TriState::random(rng);
                        report.touched += 1;
                    }
                }
            }
            Gate::PhaseShift => {
                for cell in cells.iter_mut() {
                    if rng.random::<f64>() < PHASE_SHIFT_PROB {
                        *cell = cell.advance();
                        report.touched += 1;
                    }
                }
            }
            Gate::Measure => {
                for cell in cells.iter_mut() {
                    if rng.random::<f64>() < MEASURE_PROB {
                        let outcome = if rng.random::<bool>() {
                            TriState::Two
                        } else {
                            TriState::Zero
                        };
                        *cell = outcome;
                        report.collapsed.push(outcome);
                        report.touched += 1;
                    }
                }
            }
        }
        report
    }
}
