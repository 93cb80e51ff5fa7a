//! Resolution commitment computation
//!
//! Derives the single-leaf Merkle commitment for closing and resolving a
//! market at the winning coordinates. The cell id is always read from the
//! contract — it must match the contract's discretization exactly, so it
//! is never re-derived locally.

use tracing::info;

use geomarket_chain::MarketClient;
use geomarket_core::{format_cell_id, leaf_hash, GeoPoint, ResolutionCommitment};

use crate::{Result, SettlementError};

/// Compute the settlement commitment for the given winning coordinates.
///
/// Preconditions: the market must have stakes (`totalStaked > 0`) and the
/// winning cell must have stakes (`totalStakedPerId(id) > 0`). Either
/// failing is a named error; no transaction is built, and a zero payout
/// denominator can never reach `setResolution`.
pub async fn compute_resolution(
    client: &MarketClient,
    point: GeoPoint,
) -> Result<ResolutionCommitment> {
    let id = client.cell_id_for(point).await?;

    let total_staked = client.total_staked().await?;
    if total_staked == 0 {
        return Err(SettlementError::NoStakes);
    }

    let winning_stake = client.total_staked_per_id(&id).await?;
    if winning_stake == 0 {
        return Err(SettlementError::EmptyWinningCell);
    }

    // Root of the one-leaf tree: the hash of (id, totalStaked). The proof
    // for that leaf is the empty sequence.
    let merkle_root = leaf_hash(&id, total_staked);

    info!(
        "resolution for cell {} at {}: numerator {}, denominator {}",
        format_cell_id(&id),
        point,
        total_staked,
        winning_stake,
    );

    Ok(ResolutionCommitment {
        id,
        payout_numerator: total_staked,
        payout_denominator: winning_stake,
        merkle_root,
        point,
    })
}
