//! Settlement transaction building
//!
//! Pure functions from computed state to ordered call descriptors. No
//! chain reads, no signing, no submission — the output is data.

use geomarket_chain::abi;
use geomarket_core::{Address, CallRequest, ClaimItem, GeoPoint, ResolutionCommitment};

/// Build the resolve sequence: `closeMarket()` then `setResolution(...)`.
///
/// The order is mandatory — the contract may reject resolution on an open
/// market — and both calls are always emitted in this order; whether the
/// close already happened on-chain is not checked here.
pub fn resolve_sequence(market: Address, commitment: &ResolutionCommitment) -> Vec<CallRequest> {
    vec![
        CallRequest::new(market, abi::close_market_calldata()),
        CallRequest::new(
            market,
            abi::set_resolution_calldata(
                &commitment.merkle_root,
                commitment.payout_denominator,
                commitment.point.lat_e6,
                commitment.point.lon_e6,
            ),
        ),
    ]
}

/// Build the claim sequence: one `claim(id, numerator, proof)` per winning
/// item, in assembler order. Never mixed with resolve calls.
pub fn claim_sequence(market: Address, items: &[ClaimItem]) -> Vec<CallRequest> {
    items
        .iter()
        .map(|item| {
            CallRequest::new(
                market,
                abi::claim_calldata(&item.id, item.payout_numerator, &item.proof),
            )
        })
        .collect()
}

/// Build a payable `stakeAt(latE6, lonE6)` call carrying the stake amount.
pub fn stake_call(market: Address, point: GeoPoint, amount_wei: u128) -> CallRequest {
    CallRequest::with_value(
        market,
        abi::stake_at_calldata(point.lat_e6, point.lon_e6),
        amount_wei,
    )
}
