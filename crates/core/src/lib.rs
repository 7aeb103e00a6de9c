//! Core types and utilities for the triangular arbitrage engine
//!
//! This crate provides shared types used across all components:
//! - Currency, symbol and order book definitions
//! - Triangle configuration with a precomputed leg-direction table
//! - Opportunity and trade execution records
//! - Decimal precision helpers
//! - Configuration, errors and engine events

pub mod types;
pub mod symbols;
pub mod triangle;
pub mod book;
pub mod precision;
pub mod opportunities;
pub mod trades;
pub mod config;
pub mod errors;
pub mod events;

pub use types::*;
pub use symbols::*;
pub use triangle::*;
pub use book::*;
pub use opportunities::*;
pub use trades::*;
pub use config::*;
pub use errors::*;
pub use events::*;
