use serde::{Deserialize, Serialize};

use crate::GeoPoint;

/// 20-byte account address
pub type Address = [u8; 20];

/// 32-byte cell identifier (the contract's uint256 cell id, big-endian)
pub type CellId = [u8; 32];

/// 32-byte hash value (Merkle roots, proof siblings, transaction hashes)
pub type Hash256 = [u8; 32];

/// Parse a 20-byte address from a hex string, with or without `0x` prefix.
pub fn parse_address(s: &str) -> Result<Address, crate::CoreError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped)
        .map_err(|_| crate::CoreError::InvalidAddress(s.to_string()))?;
    let addr: Address = bytes
        .try_into()
        .map_err(|_| crate::CoreError::InvalidAddress(s.to_string()))?;
    Ok(addr)
}

/// Format an address as a `0x`-prefixed hex string.
pub fn format_address(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr))
}

/// Format a cell id as the decimal uint256 the contract reports.
///
/// Repeated division of the big-endian bytes by 10; no bignum dependency
/// for one conversion.
pub fn format_cell_id(id: &CellId) -> String {
    let mut digits = Vec::new();
    let mut scratch = *id;
    loop {
        let mut remainder: u16 = 0;
        let mut all_zero = true;
        for byte in scratch.iter_mut() {
            let value = (remainder << 8) | *byte as u16;
            *byte = (value / 10) as u8;
            remainder = value % 10;
            if *byte != 0 {
                all_zero = false;
            }
        }
        digits.push(b'0' + remainder as u8);
        if all_zero {
            break;
        }
    }
    digits.reverse();
    String::from_utf8(digits).expect("decimal digits are valid utf-8")
}

/// A stake recorded in the market's event log.
///
/// Immutable source of truth for position discovery. The engine never
/// mutates these; it only reads them back out of historical logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEvent {
    /// Account that placed the stake
    pub staker: Address,
    /// Cell id the stake landed on
    pub id: CellId,
    /// Staked latitude, fixed-point 1e6 degrees
    pub lat_e6: i32,
    /// Staked longitude, fixed-point 1e6 degrees
    pub lon_e6: i32,
    /// Stake amount in wei
    pub amount: u128,
    /// Block the event was emitted in
    pub block_number: u64,
}

/// A wallet's outstanding position on one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Cell id
    pub id: CellId,
    /// Coordinates recorded by the earliest stake event for this id
    pub point: GeoPoint,
    /// Current claimable balance in wei
    pub balance: u128,
}

/// Read-only snapshot of the market's global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    /// Trading close timestamp (epoch seconds, 0 = not yet closed)
    pub trading_close: u64,
    /// Dispute window end timestamp (epoch seconds)
    pub dispute_end: u64,
    /// Total wei staked across all cells
    pub total_staked: u128,
    /// Market owner
    pub owner: Address,
    /// Authorized resolver
    pub resolver: Address,
    /// Resolved coordinates, if the market has been resolved
    pub resolved: Option<GeoPoint>,
}

/// Market lifecycle phase derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketPhase {
    /// Trading is open
    Open,
    /// Trading closed, resolution not yet published
    Closed,
    /// Resolution published, claims possible
    Resolved,
}

impl MarketSnapshot {
    /// Derive the lifecycle phase at the given wall-clock time.
    pub fn phase(&self, now: u64) -> MarketPhase {
        if self.resolved.is_some() {
            MarketPhase::Resolved
        } else if self.trading_close != 0 && now >= self.trading_close {
            MarketPhase::Closed
        } else {
            MarketPhase::Open
        }
    }
}

/// The single leaf committed to by a market resolution.
///
/// `payout_numerator` together with `payout_denominator` defines a
/// claimant's share as `stake_at_id * numerator / denominator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionCommitment {
    /// Winning cell id
    pub id: CellId,
    /// Payout numerator committed into the leaf (total market stake)
    pub payout_numerator: u128,
    /// Payout denominator (total stake on the winning cell)
    pub payout_denominator: u128,
    /// Merkle root authenticating the single leaf
    pub merkle_root: Hash256,
    /// Resolved coordinates
    pub point: GeoPoint,
}

/// One claimable position with the data the contract needs to pay it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimItem {
    /// Cell id being claimed
    pub id: CellId,
    /// Payout numerator for this id
    pub payout_numerator: u128,
    /// Sibling hashes proving the leaf; empty for a single-leaf tree
    pub proof: Vec<Hash256>,
}

/// An unsigned contract call descriptor.
///
/// The engine only ever produces these; signing and submission belong to
/// the chain gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Target contract address
    pub to: Address,
    /// ABI-encoded calldata
    pub data: Vec<u8>,
    /// Attached wei value, if the call is payable
    pub value: Option<u128>,
}

impl CallRequest {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self { to, data, value: None }
    }

    pub fn with_value(to: Address, data: Vec<u8>, value: u128) -> Self {
        Self { to, data, value: Some(value) }
    }
}
