//! A grid of three-valued cells evolving by independent random transitions,
//! whose Shannon entropy continuously retunes a small procedural synthesizer.

pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod core;
pub mod field;
pub mod session;
pub mod synth;
