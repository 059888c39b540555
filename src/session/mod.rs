//! The tick loop that couples the field to the synth.

pub mod orchestrator;
pub mod runner;
pub mod snapshot;

pub use orchestrator::{Session, SessionConfig};
pub use runner::{SessionCommand, SessionRunner};
pub use snapshot::{AudioStatus, FieldSnapshot};
