//! Chunked historical log scanning
//!
//! Providers cap the block span of a single log query, so history is
//! walked in contiguous windows and the results concatenated. Windows are
//! fetched strictly sequentially — each window's bound depends on the
//! previous — and any window failure aborts the whole scan: a partial
//! position list is worse than no list.

use std::collections::HashSet;

use tracing::{debug, info};

use geomarket_chain::MarketClient;
use geomarket_core::{Address, CellId, GeoPoint, StakeEvent};

use crate::{Result, SettlementError};

/// Maximum block span per query for staker-scoped scans.
pub const STAKER_SCAN_WINDOW: u64 = 100_000;

/// Maximum block span per query for unscoped market-wide scans, which
/// providers cap more aggressively.
pub const MARKET_SCAN_WINDOW: u64 = 50_000;

/// Partition `[from, to]` into contiguous inclusive windows of at most
/// `size` blocks. Never overlaps, never repeats, always reaches `to`.
pub fn windows(from: u64, to: u64, size: u64) -> Vec<(u64, u64)> {
    assert!(size > 0, "window size must be positive");
    let mut out = Vec::new();
    let mut start = from;
    loop {
        let end = start.saturating_add(size - 1).min(to);
        out.push((start, end));
        if end == to {
            break;
        }
        start = end + 1;
    }
    out
}

/// Reduce scanned events to unique position ids with their coordinates,
/// preserving first-seen order.
///
/// First-seen wins: later stakes at the same id never overwrite the
/// recorded coordinates. The contract derives ids deterministically from
/// coordinates, so disagreement should be impossible; if it ever happens,
/// the earliest record is the one kept.
pub fn dedup_positions(events: &[StakeEvent]) -> Vec<(CellId, GeoPoint)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for event in events {
        if seen.insert(event.id) {
            out.push((event.id, GeoPoint { lat_e6: event.lat_e6, lon_e6: event.lon_e6 }));
        }
    }
    out
}

/// Paginated stake-event retrieval under provider range limits.
pub struct ChunkedLogScanner<'a> {
    client: &'a MarketClient,
}

impl<'a> ChunkedLogScanner<'a> {
    pub fn new(client: &'a MarketClient) -> Self {
        Self { client }
    }

    /// Scan stake events for one staker (window size 100k blocks).
    pub async fn scan_staker(&self, staker: &Address) -> Result<Vec<StakeEvent>> {
        self.scan(Some(staker), STAKER_SCAN_WINDOW).await
    }

    /// Scan all stake events on the market (window size 50k blocks).
    pub async fn scan_market(&self) -> Result<Vec<StakeEvent>> {
        self.scan(None, MARKET_SCAN_WINDOW).await
    }

    async fn scan(&self, staker: Option<&Address>, window: u64) -> Result<Vec<StakeEvent>> {
        let latest = self.client.latest_block().await?;
        // Without a configured deployment block this is a best-effort
        // recent-history scan: events older than one window are invisible.
        let start = match self.client.deploy_block() {
            Some(block) => block.min(latest),
            None => latest.saturating_sub(window),
        };

        let spans = windows(start, latest, window);
        debug!(
            "scanning blocks {}..={} in {} window(s) of up to {}",
            start,
            latest,
            spans.len(),
            window,
        );

        let mut events = Vec::new();
        for (from, to) in spans {
            let chunk = self
                .client
                .stake_logs(staker, from, to)
                .await
                .map_err(|source| SettlementError::Scan { from, to, source })?;
            events.extend(chunk);
        }

        info!("scan found {} stake event(s)", events.len());
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomarket_chain::MarketConfig;

    fn mock_client() -> MarketClient {
        MarketClient::new(MarketConfig::mock([0x33u8; 20]))
    }

    fn event(id_byte: u8, lat: i32, lon: i32, block: u64) -> StakeEvent {
        StakeEvent {
            staker: [0x01u8; 20],
            id: [id_byte; 32],
            lat_e6: lat,
            lon_e6: lon,
            amount: 1,
            block_number: block,
        }
    }

    #[test]
    fn test_windows_exact_multiple() {
        // 200 blocks in windows of 100: two windows, no overlap
        assert_eq!(windows(0, 199, 100), vec![(0, 99), (100, 199)]);
    }

    #[test]
    fn test_windows_remainder() {
        assert_eq!(windows(0, 250, 100), vec![(0, 99), (100, 199), (200, 250)]);
    }

    #[test]
    fn test_windows_single_block() {
        assert_eq!(windows(7, 7, 100), vec![(7, 7)]);
    }

    #[test]
    fn test_windows_cover_range_exactly() {
        // Pagination completeness: every block covered exactly once
        for (from, to, size) in [(0u64, 1_000, 77), (5, 5, 1), (100, 100_000, 50_000)] {
            let spans = windows(from, to, size);
            assert_eq!(spans.first().unwrap().0, from);
            assert_eq!(spans.last().unwrap().1, to);
            for pair in spans.windows(2) {
                assert_eq!(pair[0].1 + 1, pair[1].0);
            }
            for (a, b) in &spans {
                assert!(a <= b);
                assert!(b - a < size);
            }
        }
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let events = vec![
            event(2, 10, 20, 1),
            event(1, 30, 40, 2),
            event(2, 99, 99, 3),
        ];
        let positions = dedup_positions(&events);
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].0, [2u8; 32]);
        assert_eq!(positions[1].0, [1u8; 32]);
    }

    #[test]
    fn test_first_seen_coordinates_win() {
        let events = vec![event(7, 10, 20, 1), event(7, 50, 60, 2)];
        let positions = dedup_positions(&events);
        assert_eq!(positions, vec![([7u8; 32], GeoPoint { lat_e6: 10, lon_e6: 20 })]);
    }

    #[test]
    fn test_dedup_idempotent_across_merged_scans() {
        // Scanning twice and merging yields the same id→coordinate map
        let events = vec![event(1, 10, 20, 1), event(2, 30, 40, 2)];
        let mut doubled = events.clone();
        doubled.extend(events.clone());
        assert_eq!(dedup_positions(&events), dedup_positions(&doubled));
    }

    #[tokio::test]
    async fn test_scan_spans_multiple_windows() {
        let mut config = MarketConfig::mock([0x33u8; 20]);
        config.deploy_block = Some(0);
        let client = MarketClient::new(config);
        let staker = [0x01u8; 20];

        // Stakes spread across more than one 100k window
        let p1 = GeoPoint { lat_e6: 1, lon_e6: 1 };
        let p2 = GeoPoint { lat_e6: 2, lon_e6: 2 };
        let p3 = GeoPoint { lat_e6: 3, lon_e6: 3 };
        client.add_mock_stake(staker, p1, 100, 10);
        client.add_mock_stake(staker, p2, 100, 150_000);
        client.add_mock_stake(staker, p3, 100, 250_000);

        let scanner = ChunkedLogScanner::new(&client);
        let events = scanner.scan_staker(&staker).await.unwrap();
        assert_eq!(events.len(), 3);
        // Ascending block order preserved across windows
        assert!(events.windows(2).all(|w| w[0].block_number <= w[1].block_number));
    }

    #[tokio::test]
    async fn test_scan_default_lower_bound_is_recent_history() {
        let client = mock_client();
        let staker = [0x01u8; 20];

        let old = GeoPoint { lat_e6: 1, lon_e6: 1 };
        let recent = GeoPoint { lat_e6: 2, lon_e6: 2 };
        client.add_mock_stake(staker, old, 100, 10);
        client.add_mock_stake(staker, recent, 100, 500_000);

        // No deploy block configured: only the last window is visible
        let scanner = ChunkedLogScanner::new(&client);
        let events = scanner.scan_staker(&staker).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].block_number, 500_000);
    }

    #[tokio::test]
    async fn test_scan_aborts_on_window_failure() {
        let client = mock_client();
        let staker = [0x01u8; 20];
        client.add_mock_stake(staker, GeoPoint { lat_e6: 1, lon_e6: 1 }, 100, 10);
        client.fail_mock_logs_at(5);

        let scanner = ChunkedLogScanner::new(&client);
        let err = scanner.scan_staker(&staker).await.unwrap_err();
        assert!(matches!(err, SettlementError::Scan { .. }));
    }
}
