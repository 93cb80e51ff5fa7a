//! GeoMarket Core Types
//!
//! This crate defines the fundamental data structures shared by the
//! settlement engine, the chain gateway, and the CLI: addresses and cell
//! ids, fixed-point geographic coordinates, stake events and positions,
//! and the single-leaf Merkle commitment that defines market payouts.

mod error;
mod geo;
mod merkle;
mod types;

pub use error::*;
pub use geo::*;
pub use merkle::*;
pub use types::*;
