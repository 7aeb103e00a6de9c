//! Triangular arbitrage engine
//!
//! Wires the market-data cache, detector and executor into a single control
//! loop actor, and loads its configuration.

pub mod engine;
pub mod handle;
pub mod logging;
pub mod settings;

pub use engine::{next_delay, CycleReport, Engine};
pub use handle::{Command, EngineHandle, EngineStats, EngineStopped};
