//! Market contract gateway
//!
//! `MarketClient` is the single place the settlement engine talks to the
//! chain through. In mock mode all contract state lives in-memory and
//! submissions are recorded instead of sent; in live mode every method
//! maps to one JSON-RPC call against the configured node.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{json, Value};
use tracing::{debug, info};

use geomarket_core::{
    keccak256, Address, CallRequest, CellId, GeoPoint, Hash256, MarketSnapshot, StakeEvent,
};

use crate::rpc::{from_hex_blob, from_quantity, to_quantity, RpcTransport};
use crate::{abi, ChainError, Result};

/// Gateway mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// In-memory contract state, recorded submissions
    Mock,
    /// JSON-RPC against a real node
    Live,
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Gateway mode (Mock or Live)
    pub mode: ClientMode,
    /// Node JSON-RPC endpoint (only used in Live mode)
    pub rpc_url: String,
    /// Market contract address
    pub market: Address,
    /// Sender account for submissions; the node holds its key
    pub sender: Option<Address>,
    /// Market deployment block, if known. Scans without it fall back to a
    /// recent-history window.
    pub deploy_block: Option<u64>,
}

impl MarketConfig {
    /// Create a mock configuration for development and tests.
    pub fn mock(market: Address) -> Self {
        Self {
            mode: ClientMode::Mock,
            rpc_url: String::new(),
            market,
            sender: None,
            deploy_block: None,
        }
    }

    /// Create a live configuration against a node endpoint.
    pub fn live(rpc_url: impl Into<String>, market: Address) -> Self {
        Self {
            mode: ClientMode::Live,
            rpc_url: rpc_url.into(),
            market,
            sender: None,
            deploy_block: None,
        }
    }
}

/// In-memory contract state for mock mode
#[derive(Debug, Default)]
struct MockChain {
    /// Chain tip
    latest_block: u64,
    /// Every stake event ever emitted, in block order
    stakes: Vec<StakeEvent>,
    /// (account, id) → claimable balance
    balances: HashMap<(Address, CellId), u128>,
    /// id → total staked on that cell
    per_id: HashMap<CellId, u128>,
    /// Total staked across all cells
    total_staked: u128,
    trading_close: u64,
    dispute_end: u64,
    owner: Address,
    resolver: Address,
    resolved: Option<GeoPoint>,
    /// Calls accepted by `submit`, in order
    submitted: Vec<CallRequest>,
    /// Counter for deterministic mock transaction hashes
    tx_counter: u64,
    /// Any log query whose window contains this block fails
    fail_logs_at: Option<u64>,
    /// All submissions fail with this reason
    fail_submissions: Option<String>,
}

/// Market contract gateway with Mock and Live modes.
pub struct MarketClient {
    config: MarketConfig,
    /// JSON-RPC transport (only used in Live mode)
    rpc: Option<RpcTransport>,
    /// Mock state (only used in Mock mode)
    mock: Arc<RwLock<MockChain>>,
}

impl MarketClient {
    pub fn new(config: MarketConfig) -> Self {
        let rpc = match config.mode {
            ClientMode::Live => Some(RpcTransport::new(config.rpc_url.clone())),
            ClientMode::Mock => None,
        };
        Self { config, rpc, mock: Arc::new(RwLock::new(MockChain::default())) }
    }

    pub fn is_mock(&self) -> bool {
        self.config.mode == ClientMode::Mock
    }

    pub fn market_address(&self) -> Address {
        self.config.market
    }

    pub fn sender(&self) -> Option<Address> {
        self.config.sender
    }

    pub fn deploy_block(&self) -> Option<u64> {
        self.config.deploy_block
    }

    fn transport(&self) -> Result<&RpcTransport> {
        self.rpc.as_ref().ok_or_else(|| ChainError::Rpc {
            code: 0,
            message: "rpc transport not initialized".to_string(),
        })
    }

    /// Execute a view call and return the raw return data.
    async fn call_view(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let params = json!([
            {
                "to": geomarket_core::format_address(&self.config.market),
                "data": format!("0x{}", hex::encode(&data)),
            },
            "latest",
        ]);
        let result = self.transport()?.request("eth_call", params).await?;
        let blob = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("eth_call result is not a string".to_string()))?;
        from_hex_blob(blob)
    }

    // ==================== Chain reads ====================

    /// Current chain tip.
    pub async fn latest_block(&self) -> Result<u64> {
        if self.is_mock() {
            return Ok(self.mock.read().expect("mock chain lock poisoned").latest_block);
        }
        let result = self.transport()?.request("eth_blockNumber", json!([])).await?;
        let s = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("eth_blockNumber result is not a string".to_string()))?;
        from_quantity(s)
    }

    /// Fetch stake events for one block window, optionally scoped to a
    /// staker. This is a single provider query; range chunking is the
    /// scanner's job.
    pub async fn stake_logs(
        &self,
        staker: Option<&Address>,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<StakeEvent>> {
        if self.is_mock() {
            let state = self.mock.read().expect("mock chain lock poisoned");
            if let Some(fail_at) = state.fail_logs_at {
                if (from_block..=to_block).contains(&fail_at) {
                    return Err(ChainError::Rpc {
                        code: -32000,
                        message: "mock log window failure".to_string(),
                    });
                }
            }
            let events = state
                .stakes
                .iter()
                .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
                .filter(|e| staker.map_or(true, |s| &e.staker == s))
                .cloned()
                .collect();
            return Ok(events);
        }

        let topic0 = format!("0x{}", hex::encode(abi::event_topic(abi::STAKE_EVENT_SIG)));
        let topic1 = match staker {
            Some(addr) => Value::String(format!("0x{}", hex::encode(abi::address_word(addr)))),
            None => Value::Null,
        };
        let params = json!([{
            "address": geomarket_core::format_address(&self.config.market),
            "topics": [topic0, topic1],
            "fromBlock": to_quantity(from_block),
            "toBlock": to_quantity(to_block),
        }]);
        let result = self.transport()?.request("eth_getLogs", params).await?;
        let entries = result
            .as_array()
            .ok_or_else(|| ChainError::Decode("eth_getLogs result is not an array".to_string()))?;

        let mut events = Vec::with_capacity(entries.len());
        for entry in entries {
            events.push(decode_log_entry(entry)?);
        }
        Ok(events)
    }

    /// `balanceOf(account, id)`
    pub async fn balance_of(&self, account: &Address, id: &CellId) -> Result<u128> {
        if self.is_mock() {
            let state = self.mock.read().expect("mock chain lock poisoned");
            return Ok(state.balances.get(&(*account, *id)).copied().unwrap_or(0));
        }
        let data = self.call_view(abi::balance_of_calldata(account, id)).await?;
        abi::decode_uint_word(&data)
    }

    /// `totalStaked()`
    pub async fn total_staked(&self) -> Result<u128> {
        if self.is_mock() {
            return Ok(self.mock.read().expect("mock chain lock poisoned").total_staked);
        }
        let data = self.call_view(abi::view_calldata("totalStaked()")).await?;
        abi::decode_uint_word(&data)
    }

    /// `totalStakedPerId(id)`
    pub async fn total_staked_per_id(&self, id: &CellId) -> Result<u128> {
        if self.is_mock() {
            let state = self.mock.read().expect("mock chain lock poisoned");
            return Ok(state.per_id.get(id).copied().unwrap_or(0));
        }
        let data = self.call_view(abi::total_staked_per_id_calldata(id)).await?;
        abi::decode_uint_word(&data)
    }

    /// `cellIdFor(latE6, lonE6)` — always read from the contract so the
    /// id matches its discretization exactly; never derived locally.
    pub async fn cell_id_for(&self, point: GeoPoint) -> Result<CellId> {
        if self.is_mock() {
            return Ok(Self::mock_cell_id(point));
        }
        let data = self
            .call_view(abi::cell_id_for_calldata(point.lat_e6, point.lon_e6))
            .await?;
        abi::decode_word32(&data)
    }

    /// `tradingClose()`
    pub async fn trading_close(&self) -> Result<u64> {
        if self.is_mock() {
            return Ok(self.mock.read().expect("mock chain lock poisoned").trading_close);
        }
        let data = self.call_view(abi::view_calldata("tradingClose()")).await?;
        abi::decode_u64_word(&data)
    }

    /// `disputeEnd()`
    pub async fn dispute_end(&self) -> Result<u64> {
        if self.is_mock() {
            return Ok(self.mock.read().expect("mock chain lock poisoned").dispute_end);
        }
        let data = self.call_view(abi::view_calldata("disputeEnd()")).await?;
        abi::decode_u64_word(&data)
    }

    /// `owner()`
    pub async fn owner(&self) -> Result<Address> {
        if self.is_mock() {
            return Ok(self.mock.read().expect("mock chain lock poisoned").owner);
        }
        let data = self.call_view(abi::view_calldata("owner()")).await?;
        abi::decode_address_word(&data)
    }

    /// `resolver()`
    pub async fn resolver(&self) -> Result<Address> {
        if self.is_mock() {
            return Ok(self.mock.read().expect("mock chain lock poisoned").resolver);
        }
        let data = self.call_view(abi::view_calldata("resolver()")).await?;
        abi::decode_address_word(&data)
    }

    /// Resolved coordinates, or `None` while unresolved.
    ///
    /// The contract exposes `resolvedLatE6`/`resolvedLonE6` views that
    /// default to zero; (0, 0) is treated as the unresolved sentinel.
    pub async fn resolved_point(&self) -> Result<Option<GeoPoint>> {
        if self.is_mock() {
            return Ok(self.mock.read().expect("mock chain lock poisoned").resolved);
        }
        let lat_data = self.call_view(abi::view_calldata("resolvedLatE6()")).await?;
        let lon_data = self.call_view(abi::view_calldata("resolvedLonE6()")).await?;
        let lat_e6 = abi::decode_int32_word(&lat_data)?;
        let lon_e6 = abi::decode_int32_word(&lon_data)?;
        if lat_e6 == 0 && lon_e6 == 0 {
            return Ok(None);
        }
        Ok(Some(GeoPoint { lat_e6, lon_e6 }))
    }

    /// Read the full market snapshot.
    pub async fn snapshot(&self) -> Result<MarketSnapshot> {
        Ok(MarketSnapshot {
            trading_close: self.trading_close().await?,
            dispute_end: self.dispute_end().await?,
            total_staked: self.total_staked().await?,
            owner: self.owner().await?,
            resolver: self.resolver().await?,
            resolved: self.resolved_point().await?,
        })
    }

    // ==================== Submission ====================

    /// Submit one call through the connected node and return the
    /// transaction hash. The node signs; this client never holds a key.
    pub async fn submit(&self, call: &CallRequest) -> Result<Hash256> {
        if self.is_mock() {
            let mut state = self.mock.write().expect("mock chain lock poisoned");
            if let Some(reason) = &state.fail_submissions {
                return Err(ChainError::Rpc { code: -32000, message: reason.clone() });
            }
            state.submitted.push(call.clone());
            state.tx_counter += 1;
            let mut hash = [0u8; 32];
            hash[..8].copy_from_slice(&state.tx_counter.to_le_bytes());
            hash[8..16].copy_from_slice(b"mocktxn!");
            info!("[MOCK] accepted call #{} to 0x{}", state.tx_counter, hex::encode(call.to));
            return Ok(hash);
        }

        let from = self.config.sender.ok_or(ChainError::MissingSender)?;
        let mut tx = json!({
            "from": geomarket_core::format_address(&from),
            "to": geomarket_core::format_address(&call.to),
            "data": format!("0x{}", hex::encode(&call.data)),
        });
        if let Some(value) = call.value {
            tx["value"] = Value::String(format!("0x{:x}", value));
        }

        let result = self.transport()?.request("eth_sendTransaction", json!([tx])).await?;
        let s = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("transaction hash is not a string".to_string()))?;
        let bytes = from_hex_blob(s)?;
        let hash: Hash256 = bytes
            .try_into()
            .map_err(|_| ChainError::Decode(format!("transaction hash has wrong length: {}", s)))?;
        info!("transaction accepted: 0x{}", hex::encode(hash));
        Ok(hash)
    }

    // ==================== Mock state helpers ====================

    /// Deterministic mock cell id for a coordinate pair.
    pub fn mock_cell_id(point: GeoPoint) -> CellId {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(b"cell");
        data.extend_from_slice(&point.lat_e6.to_be_bytes());
        data.extend_from_slice(&point.lon_e6.to_be_bytes());
        keccak256(&data)
    }

    /// Record a stake in the mock chain: appends the event and updates
    /// balances, per-cell totals, the global total, and the tip.
    pub fn add_mock_stake(
        &self,
        staker: Address,
        point: GeoPoint,
        amount: u128,
        block_number: u64,
    ) -> CellId {
        let id = Self::mock_cell_id(point);
        let mut state = self.mock.write().expect("mock chain lock poisoned");
        state.stakes.push(StakeEvent {
            staker,
            id,
            lat_e6: point.lat_e6,
            lon_e6: point.lon_e6,
            amount,
            block_number,
        });
        *state.balances.entry((staker, id)).or_insert(0) += amount;
        *state.per_id.entry(id).or_insert(0) += amount;
        state.total_staked += amount;
        state.latest_block = state.latest_block.max(block_number);
        debug!("[MOCK] stake of {} at {} in block {}", amount, point, block_number);
        id
    }

    /// Record a raw stake event without touching balances or totals.
    /// Lets tests shape log history independently of current state.
    pub fn add_mock_stake_event(&self, event: StakeEvent) {
        let mut state = self.mock.write().expect("mock chain lock poisoned");
        state.latest_block = state.latest_block.max(event.block_number);
        state.stakes.push(event);
    }

    /// Overwrite a balance (e.g. zero after a simulated claim).
    pub fn set_mock_balance(&self, account: Address, id: CellId, balance: u128) {
        let mut state = self.mock.write().expect("mock chain lock poisoned");
        state.balances.insert((account, id), balance);
    }

    pub fn set_mock_latest_block(&self, block: u64) {
        self.mock.write().expect("mock chain lock poisoned").latest_block = block;
    }

    pub fn set_mock_total_staked(&self, total: u128) {
        self.mock.write().expect("mock chain lock poisoned").total_staked = total;
    }

    pub fn set_mock_owner(&self, owner: Address) {
        self.mock.write().expect("mock chain lock poisoned").owner = owner;
    }

    pub fn set_mock_resolver(&self, resolver: Address) {
        self.mock.write().expect("mock chain lock poisoned").resolver = resolver;
    }

    pub fn set_mock_trading_close(&self, ts: u64) {
        self.mock.write().expect("mock chain lock poisoned").trading_close = ts;
    }

    pub fn set_mock_dispute_end(&self, ts: u64) {
        self.mock.write().expect("mock chain lock poisoned").dispute_end = ts;
    }

    pub fn set_mock_resolved(&self, point: GeoPoint) {
        self.mock.write().expect("mock chain lock poisoned").resolved = Some(point);
    }

    /// Make any log query covering `block` fail, to exercise scan aborts.
    pub fn fail_mock_logs_at(&self, block: u64) {
        self.mock.write().expect("mock chain lock poisoned").fail_logs_at = Some(block);
    }

    /// Make every submission fail with the given reason.
    pub fn fail_mock_submissions(&self, reason: impl Into<String>) {
        self.mock.write().expect("mock chain lock poisoned").fail_submissions =
            Some(reason.into());
    }

    /// Calls accepted by mock submission, in order.
    pub fn mock_submitted(&self) -> Vec<CallRequest> {
        self.mock.read().expect("mock chain lock poisoned").submitted.clone()
    }
}

/// Decode one `eth_getLogs` entry into a `StakeEvent`.
fn decode_log_entry(entry: &Value) -> Result<StakeEvent> {
    let topics_json = entry
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::Decode("log entry missing topics".to_string()))?;
    let mut topics = Vec::with_capacity(topics_json.len());
    for t in topics_json {
        let s = t
            .as_str()
            .ok_or_else(|| ChainError::Decode("log topic is not a string".to_string()))?;
        let bytes = from_hex_blob(s)?;
        let topic: Hash256 = bytes
            .try_into()
            .map_err(|_| ChainError::Decode(format!("log topic has wrong length: {}", s)))?;
        topics.push(topic);
    }

    let data = entry
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::Decode("log entry missing data".to_string()))?;
    let data = from_hex_blob(data)?;

    let block_number = entry
        .get("blockNumber")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::Decode("log entry missing blockNumber".to_string()))?;
    let block_number = from_quantity(block_number)?;

    abi::decode_stake_log(&topics, &data, block_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_client() -> MarketClient {
        MarketClient::new(MarketConfig::mock([0x33u8; 20]))
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = mock_client();
        assert!(client.is_mock());
        assert_eq!(client.market_address(), [0x33u8; 20]);
    }

    #[tokio::test]
    async fn test_mock_stake_updates_state() {
        let client = mock_client();
        let staker = [0x01u8; 20];
        let point = GeoPoint { lat_e6: 38_897_700, lon_e6: -77_036_500 };

        let id = client.add_mock_stake(staker, point, 500, 10);

        assert_eq!(client.latest_block().await.unwrap(), 10);
        assert_eq!(client.balance_of(&staker, &id).await.unwrap(), 500);
        assert_eq!(client.total_staked().await.unwrap(), 500);
        assert_eq!(client.total_staked_per_id(&id).await.unwrap(), 500);
        assert_eq!(client.cell_id_for(point).await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_mock_stake_logs_filter_by_staker() {
        let client = mock_client();
        let alice = [0x01u8; 20];
        let bob = [0x02u8; 20];
        let point = GeoPoint { lat_e6: 1, lon_e6: 2 };

        client.add_mock_stake(alice, point, 100, 5);
        client.add_mock_stake(bob, point, 200, 6);

        let all = client.stake_logs(None, 0, 10).await.unwrap();
        assert_eq!(all.len(), 2);

        let alice_only = client.stake_logs(Some(&alice), 0, 10).await.unwrap();
        assert_eq!(alice_only.len(), 1);
        assert_eq!(alice_only[0].staker, alice);
    }

    #[tokio::test]
    async fn test_mock_stake_logs_filter_by_range() {
        let client = mock_client();
        let staker = [0x01u8; 20];
        let point = GeoPoint { lat_e6: 1, lon_e6: 2 };

        client.add_mock_stake(staker, point, 100, 5);
        client.add_mock_stake(staker, point, 100, 50);

        let early = client.stake_logs(None, 0, 10).await.unwrap();
        assert_eq!(early.len(), 1);
        assert_eq!(early[0].block_number, 5);

        let none = client.stake_logs(None, 11, 40).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_mock_log_failure_aborts_window() {
        let client = mock_client();
        client.fail_mock_logs_at(7);

        assert!(client.stake_logs(None, 0, 10).await.is_err());
        assert!(client.stake_logs(None, 8, 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_submit_records_calls() {
        let client = mock_client();
        let call = CallRequest::new([0x33u8; 20], vec![1, 2, 3]);

        let hash1 = client.submit(&call).await.unwrap();
        let hash2 = client.submit(&call).await.unwrap();
        assert_ne!(hash1, hash2);
        assert_eq!(client.mock_submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_submit_failure_reason_surfaced() {
        let client = mock_client();
        client.fail_mock_submissions("execution reverted: market open");

        let call = CallRequest::new([0x33u8; 20], vec![]);
        let err = client.submit(&call).await.unwrap_err();
        assert!(err.to_string().contains("execution reverted: market open"));
        assert!(client.mock_submitted().is_empty());
    }

    #[tokio::test]
    async fn test_mock_resolved_point() {
        let client = mock_client();
        assert_eq!(client.resolved_point().await.unwrap(), None);

        let point = GeoPoint { lat_e6: 1, lon_e6: 2 };
        client.set_mock_resolved(point);
        assert_eq!(client.resolved_point().await.unwrap(), Some(point));
    }

    #[tokio::test]
    async fn test_snapshot_composition() {
        let client = mock_client();
        client.set_mock_owner([0x0au8; 20]);
        client.set_mock_resolver([0x0bu8; 20]);
        client.set_mock_trading_close(1_000);
        client.set_mock_dispute_end(2_000);
        client.set_mock_total_staked(42);

        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(snapshot.owner, [0x0au8; 20]);
        assert_eq!(snapshot.resolver, [0x0bu8; 20]);
        assert_eq!(snapshot.trading_close, 1_000);
        assert_eq!(snapshot.dispute_end, 2_000);
        assert_eq!(snapshot.total_staked, 42);
        assert_eq!(snapshot.resolved, None);
    }

    #[test]
    fn test_mock_cell_id_deterministic() {
        let a = GeoPoint { lat_e6: 1, lon_e6: 2 };
        let b = GeoPoint { lat_e6: 2, lon_e6: 1 };
        assert_eq!(MarketClient::mock_cell_id(a), MarketClient::mock_cell_id(a));
        assert_ne!(MarketClient::mock_cell_id(a), MarketClient::mock_cell_id(b));
    }

    #[test]
    fn test_decode_log_entry() {
        let staker: Address = [0x22u8; 20];
        let mut id = [0u8; 32];
        id[31] = 42;
        let entry = json!({
            "topics": [
                format!("0x{}", hex::encode(abi::event_topic(abi::STAKE_EVENT_SIG))),
                format!("0x{}", hex::encode(abi::address_word(&staker))),
                format!("0x{}", hex::encode(id)),
            ],
            "data": format!(
                "0x{}{}{}",
                hex::encode(abi::int32_word(1_000_000)),
                hex::encode(abi::int32_word(-2_000_000)),
                hex::encode(geomarket_core::amount_word(777)),
            ),
            "blockNumber": "0x10",
        });

        let event = decode_log_entry(&entry).unwrap();
        assert_eq!(event.staker, staker);
        assert_eq!(event.id, id);
        assert_eq!(event.lat_e6, 1_000_000);
        assert_eq!(event.lon_e6, -2_000_000);
        assert_eq!(event.amount, 777);
        assert_eq!(event.block_number, 0x10);
    }
}
