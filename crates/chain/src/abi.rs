//! ABI encoding and decoding for the spatial market contract
//!
//! Function selectors and event topics are derived at runtime by hashing
//! the canonical signature, so they cannot drift from the strings below.
//! Words are 32 bytes, big-endian, per the contract ABI.

use geomarket_core::{amount_word, keccak256, Address, CellId, Hash256, StakeEvent};

use crate::{ChainError, Result};

/// Canonical signature of the stake event.
pub const STAKE_EVENT_SIG: &str = "Stake(address,uint256,int32,int32,uint256)";

/// First 4 bytes of the keccak-256 of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Full keccak-256 of a canonical event signature (log topic0).
pub fn event_topic(signature: &str) -> Hash256 {
    keccak256(signature.as_bytes())
}

// ==================== Word encoding ====================

/// Encode an address as a 32-byte word (12 zero bytes + 20 address bytes).
pub fn address_word(addr: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr);
    word
}

/// Encode an `i32` as a sign-extended 32-byte word.
pub fn int32_word(value: i32) -> [u8; 32] {
    let fill = if value < 0 { 0xff } else { 0x00 };
    let mut word = [fill; 32];
    word[28..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encode a `u64` as a 32-byte word.
pub fn u64_word(value: u64) -> [u8; 32] {
    amount_word(value as u128)
}

// ==================== Word decoding ====================

fn expect_word(data: &[u8]) -> Result<&[u8]> {
    if data.len() != 32 {
        return Err(ChainError::Decode(format!(
            "expected 32-byte word, got {} bytes",
            data.len()
        )));
    }
    Ok(data)
}

/// Decode a uint256 word into `u128`, rejecting values above 128 bits.
pub fn decode_uint_word(data: &[u8]) -> Result<u128> {
    let word = expect_word(data)?;
    if word[..16].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("uint256 exceeds 128 bits".to_string()));
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(bytes))
}

/// Decode a uint256 word into `u64` (timestamps, block numbers).
pub fn decode_u64_word(data: &[u8]) -> Result<u64> {
    let value = decode_uint_word(data)?;
    u64::try_from(value)
        .map_err(|_| ChainError::Decode("value exceeds 64 bits".to_string()))
}

/// Decode an address word (validates the 12 padding bytes are zero).
pub fn decode_address_word(data: &[u8]) -> Result<Address> {
    let word = expect_word(data)?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("address word has non-zero padding".to_string()));
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&word[12..]);
    Ok(addr)
}

/// Decode a sign-extended int32 word.
pub fn decode_int32_word(data: &[u8]) -> Result<i32> {
    let word = expect_word(data)?;
    let fill = if word[28] & 0x80 != 0 { 0xff } else { 0x00 };
    if word[..28].iter().any(|b| *b != fill) {
        return Err(ChainError::Decode("int32 word has invalid sign extension".to_string()));
    }
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&word[28..]);
    Ok(i32::from_be_bytes(bytes))
}

/// Decode an opaque 32-byte word (cell ids, hashes).
pub fn decode_word32(data: &[u8]) -> Result<[u8; 32]> {
    let word = expect_word(data)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(word);
    Ok(out)
}

// ==================== Call encoding ====================

/// `closeMarket()`
pub fn close_market_calldata() -> Vec<u8> {
    selector("closeMarket()").to_vec()
}

/// `setResolution(bytes32 merkleRoot, uint256 payoutDenominator, int32 latE6, int32 lonE6)`
pub fn set_resolution_calldata(
    merkle_root: &Hash256,
    payout_denominator: u128,
    lat_e6: i32,
    lon_e6: i32,
) -> Vec<u8> {
    let mut data = selector("setResolution(bytes32,uint256,int32,int32)").to_vec();
    data.extend_from_slice(merkle_root);
    data.extend_from_slice(&amount_word(payout_denominator));
    data.extend_from_slice(&int32_word(lat_e6));
    data.extend_from_slice(&int32_word(lon_e6));
    data
}

/// `claim(uint256 id, uint256 payoutNumerator, bytes32[] proof)`
///
/// The dynamic proof array is head/tail encoded: the head carries a byte
/// offset to the tail, the tail a length word followed by the siblings.
pub fn claim_calldata(id: &CellId, payout_numerator: u128, proof: &[Hash256]) -> Vec<u8> {
    let mut data = selector("claim(uint256,uint256,bytes32[])").to_vec();
    data.extend_from_slice(id);
    data.extend_from_slice(&amount_word(payout_numerator));
    // Offset of the proof tail relative to the start of the arguments:
    // three head words of 32 bytes each.
    data.extend_from_slice(&u64_word(96));
    data.extend_from_slice(&u64_word(proof.len() as u64));
    for sibling in proof {
        data.extend_from_slice(sibling);
    }
    data
}

/// Payable `stakeAt(int32 latE6, int32 lonE6)`
pub fn stake_at_calldata(lat_e6: i32, lon_e6: i32) -> Vec<u8> {
    let mut data = selector("stakeAt(int32,int32)").to_vec();
    data.extend_from_slice(&int32_word(lat_e6));
    data.extend_from_slice(&int32_word(lon_e6));
    data
}

/// `cellIdFor(int32 latE6, int32 lonE6)`
pub fn cell_id_for_calldata(lat_e6: i32, lon_e6: i32) -> Vec<u8> {
    let mut data = selector("cellIdFor(int32,int32)").to_vec();
    data.extend_from_slice(&int32_word(lat_e6));
    data.extend_from_slice(&int32_word(lon_e6));
    data
}

/// `balanceOf(address account, uint256 id)`
pub fn balance_of_calldata(account: &Address, id: &CellId) -> Vec<u8> {
    let mut data = selector("balanceOf(address,uint256)").to_vec();
    data.extend_from_slice(&address_word(account));
    data.extend_from_slice(id);
    data
}

/// `totalStakedPerId(uint256 id)`
pub fn total_staked_per_id_calldata(id: &CellId) -> Vec<u8> {
    let mut data = selector("totalStakedPerId(uint256)").to_vec();
    data.extend_from_slice(id);
    data
}

/// Zero-argument view calldata: `totalStaked()`, `owner()`, etc.
pub fn view_calldata(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

// ==================== Log decoding ====================

/// Decode a raw stake log (topics + data) into a `StakeEvent`.
///
/// Layout: topic0 = event signature hash, topic1 = staker (indexed),
/// topic2 = id (indexed); data packs `latE6`, `lonE6`, `amount`.
pub fn decode_stake_log(
    topics: &[Hash256],
    data: &[u8],
    block_number: u64,
) -> Result<StakeEvent> {
    if topics.len() != 3 {
        return Err(ChainError::Decode(format!(
            "stake log has {} topics, expected 3",
            topics.len()
        )));
    }
    if topics[0] != event_topic(STAKE_EVENT_SIG) {
        return Err(ChainError::Decode("log topic0 is not the Stake event".to_string()));
    }
    if data.len() != 96 {
        return Err(ChainError::Decode(format!(
            "stake log data is {} bytes, expected 96",
            data.len()
        )));
    }
    let staker = decode_address_word(&topics[1])?;
    let id = topics[2];
    let lat_e6 = decode_int32_word(&data[..32])?;
    let lon_e6 = decode_int32_word(&data[32..64])?;
    let amount = decode_uint_word(&data[64..96])?;
    Ok(StakeEvent { staker, id, lat_e6, lon_e6, amount, block_number })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_from_u64(n: u64) -> CellId {
        let mut id = [0u8; 32];
        id[24..].copy_from_slice(&n.to_be_bytes());
        id
    }

    #[test]
    fn test_selector_is_prefix_of_topic() {
        let sig = "closeMarket()";
        assert_eq!(selector(sig), event_topic(sig)[..4]);
    }

    #[test]
    fn test_selectors_distinct() {
        assert_ne!(selector("closeMarket()"), selector("totalStaked()"));
        assert_ne!(selector("owner()"), selector("resolver()"));
    }

    #[test]
    fn test_int32_word_positive() {
        let word = int32_word(5);
        assert_eq!(&word[..28], &[0u8; 28]);
        assert_eq!(&word[28..], &5i32.to_be_bytes());
    }

    #[test]
    fn test_int32_word_negative() {
        let word = int32_word(-1);
        assert_eq!(word, [0xffu8; 32]);

        let word = int32_word(-77_036_500);
        assert_eq!(&word[..28], &[0xffu8; 28]);
        assert_eq!(decode_int32_word(&word).unwrap(), -77_036_500);
    }

    #[test]
    fn test_int32_word_round_trip() {
        for v in [i32::MIN, -1, 0, 1, 90_000_000, i32::MAX] {
            assert_eq!(decode_int32_word(&int32_word(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_decode_int32_rejects_bad_sign_extension() {
        let mut word = int32_word(1);
        word[0] = 0xff;
        assert!(decode_int32_word(&word).is_err());
    }

    #[test]
    fn test_address_word_round_trip() {
        let addr: Address = [0xabu8; 20];
        assert_eq!(decode_address_word(&address_word(&addr)).unwrap(), addr);
    }

    #[test]
    fn test_decode_address_rejects_dirty_padding() {
        let mut word = address_word(&[0xabu8; 20]);
        word[0] = 1;
        assert!(decode_address_word(&word).is_err());
    }

    #[test]
    fn test_decode_uint_rejects_overflow() {
        let word = [0xffu8; 32];
        assert!(decode_uint_word(&word).is_err());
    }

    #[test]
    fn test_decode_uint_round_trip() {
        for v in [0u128, 1, 500, u128::MAX] {
            assert_eq!(decode_uint_word(&amount_word(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_set_resolution_calldata_layout() {
        let root = [0x11u8; 32];
        let data = set_resolution_calldata(&root, 500, 38_897_700, -77_036_500);
        assert_eq!(data.len(), 4 + 32 * 4);
        assert_eq!(&data[..4], &selector("setResolution(bytes32,uint256,int32,int32)"));
        assert_eq!(&data[4..36], &root);
        assert_eq!(&data[36..68], &amount_word(500));
        assert_eq!(&data[68..100], &int32_word(38_897_700));
        assert_eq!(&data[100..132], &int32_word(-77_036_500));
    }

    #[test]
    fn test_claim_calldata_empty_proof() {
        let id = id_from_u64(42);
        let data = claim_calldata(&id, 100, &[]);
        // selector + id + numerator + offset + zero length
        assert_eq!(data.len(), 4 + 32 * 4);
        assert_eq!(&data[4..36], &id);
        assert_eq!(&data[36..68], &amount_word(100));
        assert_eq!(&data[68..100], &u64_word(96));
        assert_eq!(&data[100..132], &u64_word(0));
    }

    #[test]
    fn test_claim_calldata_with_proof() {
        let id = id_from_u64(42);
        let proof = [[0xaau8; 32], [0xbbu8; 32]];
        let data = claim_calldata(&id, 100, &proof);
        assert_eq!(data.len(), 4 + 32 * 4 + 32 * 2);
        assert_eq!(&data[100..132], &u64_word(2));
        assert_eq!(&data[132..164], &proof[0]);
        assert_eq!(&data[164..196], &proof[1]);
    }

    #[test]
    fn test_balance_of_calldata_layout() {
        let account: Address = [0x01u8; 20];
        let id = id_from_u64(7);
        let data = balance_of_calldata(&account, &id);
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[4..36], &address_word(&account));
        assert_eq!(&data[36..68], &id);
    }

    #[test]
    fn test_decode_stake_log() {
        let staker: Address = [0x22u8; 20];
        let id = id_from_u64(42);
        let topics = [event_topic(STAKE_EVENT_SIG), address_word(&staker), id];
        let mut data = Vec::new();
        data.extend_from_slice(&int32_word(38_897_700));
        data.extend_from_slice(&int32_word(-77_036_500));
        data.extend_from_slice(&amount_word(1_000));

        let event = decode_stake_log(&topics, &data, 123).unwrap();
        assert_eq!(event.staker, staker);
        assert_eq!(event.id, id);
        assert_eq!(event.lat_e6, 38_897_700);
        assert_eq!(event.lon_e6, -77_036_500);
        assert_eq!(event.amount, 1_000);
        assert_eq!(event.block_number, 123);
    }

    #[test]
    fn test_decode_stake_log_rejects_wrong_topic() {
        let topics = [event_topic("Other(uint256)"), [0u8; 32], [0u8; 32]];
        assert!(decode_stake_log(&topics, &[0u8; 96], 1).is_err());
    }

    #[test]
    fn test_decode_stake_log_rejects_short_data() {
        let topics = [
            event_topic(STAKE_EVENT_SIG),
            address_word(&[0u8; 20]),
            [0u8; 32],
        ];
        assert!(decode_stake_log(&topics, &[0u8; 64], 1).is_err());
    }
}
