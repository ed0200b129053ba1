//! Harness address encoding.
//!
//! An address is a network prefix byte followed by a 20-byte key hash,
//! rendered as Base58 with a 4-byte double SHA-256 checksum appended.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::constants::NetworkType;
use crate::error::KeyError;

/// Length of the key hash carried in an address.
pub const KEY_HASH_LEN: usize = 20;

const CHECKSUM_LEN: usize = 4;

const NETWORKS: [NetworkType; 4] = [
    NetworkType::Mainnet,
    NetworkType::Testnet,
    NetworkType::Simnet,
    NetworkType::Regtest,
];

/// A pay-to-key-hash address on one network.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: NetworkType,
    key_hash: [u8; KEY_HASH_LEN],
}

impl Address {
    /// Create an address from a key hash and network.
    pub fn from_key_hash(key_hash: [u8; KEY_HASH_LEN], network: NetworkType) -> Self {
        Self { network, key_hash }
    }

    /// The 20-byte key hash encoded in this address.
    pub fn key_hash(&self) -> &[u8; KEY_HASH_LEN] {
        &self.key_hash
    }

    /// The network this address belongs to.
    pub fn network(&self) -> NetworkType {
        self.network
    }

    /// Encode as Base58Check text.
    pub fn encode(&self) -> String {
        let mut payload = Vec::with_capacity(1 + KEY_HASH_LEN + CHECKSUM_LEN);
        payload.push(self.network.address_prefix());
        payload.extend_from_slice(&self.key_hash);
        let checksum = checksum(&payload);
        payload.extend_from_slice(&checksum);
        bs58::encode(payload).into_string()
    }

    /// Decode Base58Check text, accepting any known network.
    pub fn decode(s: &str) -> Result<Self, KeyError> {
        let data = bs58::decode(s)
            .into_vec()
            .map_err(|e| KeyError::InvalidAddress(e.to_string()))?;
        if data.len() != 1 + KEY_HASH_LEN + CHECKSUM_LEN {
            return Err(KeyError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                1 + KEY_HASH_LEN + CHECKSUM_LEN,
                data.len()
            )));
        }
        let (body, check) = data.split_at(1 + KEY_HASH_LEN);
        if checksum(body) != check {
            return Err(KeyError::InvalidAddress("checksum mismatch".into()));
        }
        let prefix = body[0];
        let network = NETWORKS
            .into_iter()
            .find(|n| n.address_prefix() == prefix)
            .ok_or_else(|| KeyError::InvalidAddress(format!("unknown prefix 0x{prefix:02x}")))?;
        let mut key_hash = [0u8; KEY_HASH_LEN];
        key_hash.copy_from_slice(&body[1..]);
        Ok(Self { network, key_hash })
    }

    /// Decode and require the given network.
    pub fn decode_for(s: &str, expected: NetworkType) -> Result<Self, KeyError> {
        let addr = Self::decode(s)?;
        if addr.network != expected {
            return Err(KeyError::WrongNetwork {
                expected: expected.to_string(),
                found: addr.network.to_string(),
            });
        }
        Ok(addr)
    }
}

fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Address {
        Address::from_key_hash([0xAA; KEY_HASH_LEN], NetworkType::Regtest)
    }

    #[test]
    fn encode_decode_preserves_network_and_hash() {
        let addr = sample();
        let text = addr.encode();
        let back: Address = text.parse().unwrap();
        assert_eq!(back, addr);
        assert_eq!(back.network(), NetworkType::Regtest);
    }

    #[test]
    fn networks_encode_differently() {
        let a = Address::from_key_hash([1; KEY_HASH_LEN], NetworkType::Mainnet);
        let b = Address::from_key_hash([1; KEY_HASH_LEN], NetworkType::Simnet);
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn corrupted_checksum_rejected() {
        let text = sample().encode();
        let mut bytes = bs58::decode(&text).into_vec().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let bad = bs58::encode(bytes).into_string();
        assert!(matches!(Address::decode(&bad), Err(KeyError::InvalidAddress(_))));
    }

    #[test]
    fn wrong_length_rejected() {
        let short = bs58::encode([0x7a, 1, 2, 3]).into_string();
        assert!(Address::decode(&short).is_err());
        assert!(Address::decode("0OIl").is_err());
    }

    #[test]
    fn decode_for_checks_network() {
        let text = sample().encode();
        assert!(Address::decode_for(&text, NetworkType::Regtest).is_ok());
        let err = Address::decode_for(&text, NetworkType::Mainnet).unwrap_err();
        assert_eq!(
            err,
            KeyError::WrongNetwork {
                expected: "mainnet".into(),
                found: "regtest".into()
            }
        );
    }
}
