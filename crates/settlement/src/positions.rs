//! Position filtering
//!
//! Candidate ids from the scanner are only positions if the wallet still
//! holds a balance on them — stakes that were already claimed read zero.
//! Balance reads are independent, so they fan out concurrently; a single
//! failed read fails the whole batch.

use futures::future::try_join_all;
use tracing::debug;

use geomarket_chain::MarketClient;
use geomarket_core::{Address, CellId, GeoPoint, Position};

use crate::{Result, SettlementError};

/// Keep only candidates with `balanceOf(account, id) > 0`.
///
/// Empty input yields empty output. A non-empty input where every balance
/// reads zero is the distinguished `NoClaimablePositions` condition, not
/// a silent empty list.
pub async fn filter_positions(
    client: &MarketClient,
    account: &Address,
    candidates: &[(CellId, GeoPoint)],
) -> Result<Vec<Position>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let balances = try_join_all(
        candidates.iter().map(|(id, _)| client.balance_of(account, id)),
    )
    .await?;

    let positions: Vec<Position> = candidates
        .iter()
        .zip(balances)
        .filter(|(_, balance)| *balance > 0)
        .map(|((id, point), balance)| Position { id: *id, point: *point, balance })
        .collect();

    debug!("{} of {} candidate id(s) hold a balance", positions.len(), candidates.len());

    if positions.is_empty() {
        return Err(SettlementError::NoClaimablePositions);
    }
    Ok(positions)
}
