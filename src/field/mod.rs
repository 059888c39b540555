//! The qutrit field: a flat grid of three-valued cells with stochastic
//! evolution and gate operators. No audio, no timing.

pub mod gate;
pub mod grid;

pub use crate::core::entropy::StateHistogram;
pub use gate::Gate;
pub use grid::{Field, FieldError, TriState};
