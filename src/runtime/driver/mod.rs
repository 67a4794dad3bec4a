//! Drivers that feed a [`Session`](super::Session) its host inputs.

pub mod simulated;

pub use self::simulated::{ScriptStep, SimulatedHost, run_scripted};
