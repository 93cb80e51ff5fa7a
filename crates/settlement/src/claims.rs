//! Claim assembly
//!
//! Pairs each held position with the payout numerator and Merkle proof
//! the contract's `claim` entry point needs. The authoritative source is
//! the external resolution service; without one configured the engine
//! falls back to a documented degraded mode for the single-resolved-cell
//! case. The fallback is never used to paper over a *failing* service —
//! a configured service that errors aborts the whole batch.

use futures::future::try_join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use geomarket_chain::MarketClient;
use geomarket_core::{format_cell_id, CellId, ClaimItem, Hash256, Position};

use crate::{Result, SettlementError};

/// Client for the external resolution service.
///
/// Contract: `GET {base}/id/{id}` returns
/// `{ "payoutNumerator": string|number, "proof": [hex, ...] }`.
pub struct ResolutionService {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PayoutResponse {
    #[serde(rename = "payoutNumerator")]
    payout_numerator: NumeratorRepr,
    proof: Vec<String>,
}

/// The service reports numerators as JSON numbers or decimal strings
/// (values above 2^53 only arrive as strings).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumeratorRepr {
    Number(u64),
    Text(String),
}

impl NumeratorRepr {
    fn value(&self) -> std::result::Result<u128, String> {
        match self {
            NumeratorRepr::Number(n) => Ok(*n as u128),
            NumeratorRepr::Text(s) => s
                .parse::<u128>()
                .map_err(|_| format!("malformed payout numerator {:?}", s)),
        }
    }
}

impl ResolutionService {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http: reqwest::Client::new(), base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the payout numerator and proof for one cell id.
    pub async fn payout_for(&self, id: &CellId) -> Result<(u128, Vec<Hash256>)> {
        let id_str = format_cell_id(id);
        let url = format!("{}/id/{}", self.base_url, id_str);
        debug!("fetching payout for id {} from {}", id_str, url);

        let service_err = |reason: String| SettlementError::ResolutionService {
            id: id_str.clone(),
            reason,
        };

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| service_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(service_err(format!("http status {}", response.status())));
        }
        let payload: PayoutResponse = response
            .json()
            .await
            .map_err(|e| service_err(format!("malformed response: {}", e)))?;

        let numerator = payload.payout_numerator.value().map_err(service_err)?;
        Ok((numerator, normalize_proof(&payload.proof)))
    }
}

/// Normalize proof entries to raw 32-byte hashes.
///
/// Hex strings may arrive with or without a `0x` prefix. Entries that are
/// not well-formed 32-byte hex are dropped, not coerced.
fn normalize_proof(entries: &[String]) -> Vec<Hash256> {
    let mut proof = Vec::with_capacity(entries.len());
    for entry in entries {
        let stripped = entry.strip_prefix("0x").unwrap_or(entry);
        match hex::decode(stripped).ok().and_then(|b| Hash256::try_from(b).ok()) {
            Some(hash) => proof.push(hash),
            None => warn!("dropping malformed proof entry {:?}", entry),
        }
    }
    proof
}

/// Produce the winning claim items for the held positions.
///
/// Preferred path (service configured): each id's `(numerator, proof)` is
/// fetched concurrently; a position wins iff its numerator is positive
/// and its proof non-empty; any single fetch failure aborts the batch.
///
/// Fallback path (no service configured): every held id claims with
/// `numerator = totalStaked` and an empty proof. This is a weaker,
/// non-cryptographically-authenticated guess that only pays out correctly
/// when the contract accepts the declared numerator for a single resolved
/// cell; it is a degraded mode, not an equivalent of the preferred path.
///
/// Output order follows the input positions.
pub async fn assemble_claims(
    client: &MarketClient,
    service: Option<&ResolutionService>,
    held: &[Position],
) -> Result<Vec<ClaimItem>> {
    match service {
        Some(service) => {
            let payouts =
                try_join_all(held.iter().map(|p| service.payout_for(&p.id))).await?;

            let mut winning = Vec::new();
            for (position, (numerator, proof)) in held.iter().zip(payouts) {
                if numerator > 0 && !proof.is_empty() {
                    winning.push(ClaimItem {
                        id: position.id,
                        payout_numerator: numerator,
                        proof,
                    });
                } else {
                    debug!("id {} holds no winnings", format_cell_id(&position.id));
                }
            }
            if winning.is_empty() {
                return Err(SettlementError::NoWinningPositions);
            }
            Ok(winning)
        }
        None => {
            let total_staked = client.total_staked().await?;
            if total_staked == 0 {
                return Err(SettlementError::NoStakes);
            }
            warn!(
                "no resolution service configured; claiming {} position(s) with \
                 empty proofs and numerator = total stake (degraded mode)",
                held.len(),
            );
            Ok(held
                .iter()
                .map(|p| ClaimItem {
                    id: p.id,
                    payout_numerator: total_staked,
                    proof: Vec::new(),
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomarket_chain::{MarketClient, MarketConfig};
    use geomarket_core::GeoPoint;

    fn mock_client() -> MarketClient {
        MarketClient::new(MarketConfig::mock([0x33u8; 20]))
    }

    fn position(id_byte: u8) -> Position {
        Position {
            id: [id_byte; 32],
            point: GeoPoint { lat_e6: 0, lon_e6: 0 },
            balance: 1,
        }
    }

    #[test]
    fn test_normalize_proof_adds_missing_prefix() {
        let entries = vec![
            format!("0x{}", "aa".repeat(32)),
            "bb".repeat(32),
        ];
        let proof = normalize_proof(&entries);
        assert_eq!(proof, vec![[0xaau8; 32], [0xbbu8; 32]]);
    }

    #[test]
    fn test_normalize_proof_drops_malformed() {
        let entries = vec![
            "0x1234".to_string(),
            "not hex at all".to_string(),
            "cc".repeat(32),
            "dd".repeat(33),
        ];
        let proof = normalize_proof(&entries);
        assert_eq!(proof, vec![[0xccu8; 32]]);
    }

    #[test]
    fn test_numerator_accepts_number_and_string() {
        let n: PayoutResponse =
            serde_json::from_str(r#"{"payoutNumerator": 100, "proof": []}"#).unwrap();
        assert_eq!(n.payout_numerator.value().unwrap(), 100);

        let s: PayoutResponse = serde_json::from_str(
            r#"{"payoutNumerator": "340282366920938463463374607431768211455", "proof": []}"#,
        )
        .unwrap();
        assert_eq!(s.payout_numerator.value().unwrap(), u128::MAX);
    }

    #[test]
    fn test_numerator_rejects_garbage_string() {
        let bad: PayoutResponse =
            serde_json::from_str(r#"{"payoutNumerator": "12x4", "proof": []}"#).unwrap();
        assert!(bad.payout_numerator.value().is_err());
    }

    #[tokio::test]
    async fn test_fallback_uses_total_staked_and_empty_proof() {
        let client = mock_client();
        client.set_mock_total_staked(100);
        let held = [position(42)];

        let items = assemble_claims(&client, None, &held).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, [42u8; 32]);
        assert_eq!(items[0].payout_numerator, 100);
        assert!(items[0].proof.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_requires_stakes() {
        let client = mock_client();
        let held = [position(42)];

        let err = assemble_claims(&client, None, &held).await.unwrap_err();
        assert!(matches!(err, SettlementError::NoStakes));
    }

    #[tokio::test]
    async fn test_fallback_preserves_position_order() {
        let client = mock_client();
        client.set_mock_total_staked(7);
        let held = [position(3), position(1), position(2)];

        let items = assemble_claims(&client, None, &held).await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![[3u8; 32], [1u8; 32], [2u8; 32]]);
    }
}
