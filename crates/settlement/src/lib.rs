//! GeoMarket Settlement Engine
//!
//! Computes who is owed what once a geographic market resolves, and
//! assembles the ordered transactions that close, resolve, and pay out.
//!
//! ## Settlement Flow
//!
//! 1. **Discover**: scan historical stake events in provider-sized block
//!    windows to find the wallet's cell ids (`ChunkedLogScanner`), then
//!    keep only ids with a live balance (`filter_positions`).
//! 2. **Resolve**: for the winning coordinates, read the cell id and stake
//!    totals from the contract and derive the single-leaf Merkle
//!    commitment (`compute_resolution`).
//! 3. **Claim**: pair each held id with its payout numerator and proof,
//!    from the resolution service when one is configured, otherwise via
//!    the documented fallback (`assemble_claims`).
//! 4. **Build**: turn commitment or claims into an ordered list of
//!    unsigned calls (`txbuilder`) — close before resolve, one claim per
//!    winning id.
//! 5. **Submit**: walk the call list through the chain gateway with an
//!    explicit state machine (`Submitter`), stopping at the first failure.
//!
//! The engine is stateless between invocations: everything is rebuilt
//! from chain reads and discarded once the call list is returned.

mod claims;
mod engine;
mod positions;
mod resolution;
mod scanner;
mod submit;
mod txbuilder;

pub use claims::{assemble_claims, ResolutionService};
pub use engine::{CellTotal, SettlementEngine};
pub use positions::filter_positions;
pub use resolution::compute_resolution;
pub use scanner::{
    dedup_positions, windows, ChunkedLogScanner, MARKET_SCAN_WINDOW, STAKER_SCAN_WINDOW,
};
pub use submit::{SubmitState, Submitter};
pub use txbuilder::{claim_sequence, resolve_sequence, stake_call};

use thiserror::Error;

use geomarket_chain::ChainError;

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("log scan failed for blocks {from}..={to}: {source}")]
    Scan {
        from: u64,
        to: u64,
        #[source]
        source: ChainError,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("no stake events found for this wallet")]
    NoPositionsFound,

    #[error("no claimable positions (all balances are zero)")]
    NoClaimablePositions,

    #[error("no winnings to claim for this wallet")]
    NoWinningPositions,

    #[error("market has no stakes recorded")]
    NoStakes,

    #[error("no stake on the resolved cell (payout denominator would be zero)")]
    EmptyWinningCell,

    #[error("sender {0} is neither the market owner nor its resolver")]
    NotResolver(String),

    #[error("resolution service error for id {id}: {reason}")]
    ResolutionService { id: String, reason: String },

    #[error("submission failed at call {index}: {reason}")]
    Submission { index: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, SettlementError>;
