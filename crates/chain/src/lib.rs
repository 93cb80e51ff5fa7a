//! GeoMarket Chain Gateway
//!
//! Everything that touches the blockchain lives here: ABI encoding and
//! decoding for the spatial market contract, a JSON-RPC HTTP transport,
//! and the `MarketClient` the settlement engine drives.
//!
//! Supports two modes:
//! - **Mock Mode**: for development and testing without a node. Contract
//!   state is tracked in-memory and submissions are recorded, not sent.
//! - **Live Mode**: real JSON-RPC calls (`eth_call`, `eth_getLogs`,
//!   `eth_sendTransaction`) against a connected node. The node holds the
//!   signing key; this crate never sees one.

pub mod abi;
mod client;
mod rpc;

pub use client::{ClientMode, MarketClient, MarketConfig};
pub use rpc::{from_quantity, to_quantity, RpcTransport};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("sender address required for submission")]
    MissingSender,
}

pub type Result<T> = std::result::Result<T, ChainError>;
