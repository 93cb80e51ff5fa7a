//! Settlement engine facade
//!
//! Ties the components into the operations callers actually run:
//! discover positions, prepare a claim batch, prepare a resolution,
//! read market status, aggregate per-cell stakes. Every operation is an
//! explicit call returning a result or a typed failure — nothing here
//! re-invokes itself; callers poll or re-invoke deliberately.

use std::collections::HashMap;

use tracing::info;

use geomarket_chain::MarketClient;
use geomarket_core::{
    format_address, Address, CallRequest, CellId, GeoPoint, MarketSnapshot, Position,
};

use crate::claims::{assemble_claims, ResolutionService};
use crate::positions::filter_positions;
use crate::resolution::compute_resolution;
use crate::scanner::{dedup_positions, ChunkedLogScanner};
use crate::txbuilder::{claim_sequence, resolve_sequence, stake_call};
use crate::{Result, SettlementError};

/// Total stake recorded on one cell, from a market-wide scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTotal {
    pub id: CellId,
    pub point: GeoPoint,
    pub total: u128,
}

/// One engine instance per market; stateless between operations.
pub struct SettlementEngine<'a> {
    client: &'a MarketClient,
    service: Option<ResolutionService>,
}

impl<'a> SettlementEngine<'a> {
    pub fn new(client: &'a MarketClient, service: Option<ResolutionService>) -> Self {
        Self { client, service }
    }

    /// Discover the wallet's live positions: scan stake history, dedup to
    /// candidate ids, keep those with a non-zero balance.
    pub async fn discover_positions(&self, staker: &Address) -> Result<Vec<Position>> {
        let scanner = ChunkedLogScanner::new(self.client);
        let events = scanner.scan_staker(staker).await?;
        let candidates = dedup_positions(&events);
        if candidates.is_empty() {
            return Err(SettlementError::NoPositionsFound);
        }
        filter_positions(self.client, staker, &candidates).await
    }

    /// Build the ordered claim batch for the wallet's winning positions.
    pub async fn prepare_claims(&self, staker: &Address) -> Result<Vec<CallRequest>> {
        let held = self.discover_positions(staker).await?;
        let items = assemble_claims(self.client, self.service.as_ref(), &held).await?;
        info!("claiming {} position(s)", items.len());
        Ok(claim_sequence(self.client.market_address(), &items))
    }

    /// Build the close-then-resolve sequence for the winning coordinates.
    ///
    /// When a sender is configured it must be the market owner or its
    /// resolver; the contract would reject anyone else, so the engine
    /// fails before building calls rather than after submission.
    pub async fn prepare_resolution(&self, point: GeoPoint) -> Result<Vec<CallRequest>> {
        if let Some(sender) = self.client.sender() {
            let owner = self.client.owner().await?;
            let resolver = self.client.resolver().await?;
            if sender != owner && sender != resolver {
                return Err(SettlementError::NotResolver(format_address(&sender)));
            }
        }
        let commitment = compute_resolution(self.client, point).await?;
        Ok(resolve_sequence(self.client.market_address(), &commitment))
    }

    /// Build a stake call for the given coordinates and amount.
    pub fn prepare_stake(&self, point: GeoPoint, amount_wei: u128) -> CallRequest {
        stake_call(self.client.market_address(), point, amount_wei)
    }

    /// Read the market's global state.
    pub async fn market_status(&self) -> Result<MarketSnapshot> {
        Ok(self.client.snapshot().await?)
    }

    /// Aggregate staked amounts per cell from a market-wide scan, in
    /// first-seen cell order. Subject to the same recent-history coverage
    /// gap as any scan without a configured deployment block.
    pub async fn cell_totals(&self) -> Result<Vec<CellTotal>> {
        let scanner = ChunkedLogScanner::new(self.client);
        let events = scanner.scan_market().await?;

        let order = dedup_positions(&events);
        let mut sums: HashMap<CellId, u128> = HashMap::new();
        for event in &events {
            *sums.entry(event.id).or_insert(0) += event.amount;
        }

        Ok(order
            .into_iter()
            .map(|(id, point)| CellTotal { id, point, total: sums[&id] })
            .collect())
    }
}
