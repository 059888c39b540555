//! Field-independent math: entropy, time base, level conversions and windows.

pub mod db;
pub mod entropy;
pub mod fft;
pub mod phase;
pub mod timebase;
