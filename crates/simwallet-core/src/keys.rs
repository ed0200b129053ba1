//! Seeded key provider for the simulated wallet.
//!
//! Child keys are Ed25519 keypairs derived from a 32-byte master seed with
//! BLAKE3 keyed derivation. The address key hash is the first 20 bytes of
//! the BLAKE3 hash of the child's verifying key.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::address::{Address, KEY_HASH_LEN};
use crate::constants::NetworkType;
use crate::error::KeyError;
use crate::traits::KeyProvider;

/// BLAKE3 KDF context for child key derivation.
const KDF_CONTEXT: &str = "simwallet-key-derivation-v1";

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

/// A 32-byte master seed. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 32],
}

impl Seed {
    /// Generate a random seed from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

/// [`KeyProvider`] deriving every address from one seed.
pub struct SeededKeyProvider {
    seed: Seed,
    network: NetworkType,
}

impl SeededKeyProvider {
    pub fn new(seed: Seed, network: NetworkType) -> Self {
        Self { seed, network }
    }

    /// Provider over a fresh random seed.
    pub fn random(network: NetworkType) -> Self {
        Self::new(Seed::generate(), network)
    }

    /// Verifying key bytes of the child at `index`.
    pub fn public_key(&self, index: u32) -> [u8; 32] {
        let mut ikm = Vec::with_capacity(36);
        ikm.extend_from_slice(self.seed.as_bytes());
        ikm.extend_from_slice(&index.to_le_bytes());
        let mut derived = blake3::derive_key(KDF_CONTEXT, &ikm);
        let signing = ed25519_dalek::SigningKey::from_bytes(&derived);
        derived.zeroize();
        ikm.zeroize();
        signing.verifying_key().to_bytes()
    }
}

impl fmt::Debug for SeededKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededKeyProvider")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl KeyProvider for SeededKeyProvider {
    fn network(&self) -> NetworkType {
        self.network
    }

    fn derive_address(&self, index: u32) -> Result<Address, KeyError> {
        let pk = self.public_key(index);
        let digest = blake3::hash(&pk);
        let mut key_hash = [0u8; KEY_HASH_LEN];
        key_hash.copy_from_slice(&digest.as_bytes()[..KEY_HASH_LEN]);
        Ok(Address::from_key_hash(key_hash, self.network))
    }

    fn pay_to_address_script(&self, address: &Address) -> Vec<u8> {
        p2pkh_script(address)
    }
}

/// `OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG`.
pub fn p2pkh_script(address: &Address) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, KEY_HASH_LEN as u8]);
    script.extend_from_slice(address.key_hash());
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SeededKeyProvider {
        SeededKeyProvider::new(Seed::from_bytes([7; 32]), NetworkType::Regtest)
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = provider().derive_address(3).unwrap();
        let b = provider().derive_address(3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn indices_produce_distinct_addresses() {
        let p = provider();
        let addrs: Vec<_> = (0..16).map(|i| p.derive_address(i).unwrap()).collect();
        for (i, a) in addrs.iter().enumerate() {
            for b in &addrs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn different_seeds_differ() {
        let other = SeededKeyProvider::new(Seed::from_bytes([8; 32]), NetworkType::Regtest);
        assert_ne!(
            provider().derive_address(0).unwrap(),
            other.derive_address(0).unwrap()
        );
    }

    #[test]
    fn script_contains_script_hash() {
        let p = provider();
        let addr = p.derive_address(1).unwrap();
        let script = p.pay_to_address_script(&addr);
        let hash = p.script_hash_of(&addr);
        assert_eq!(script.len(), 25);
        assert!(script.windows(hash.len()).any(|w| w == hash.as_slice()));
    }

    #[test]
    fn address_carries_provider_network() {
        let p = SeededKeyProvider::new(Seed::from_bytes([1; 32]), NetworkType::Simnet);
        assert_eq!(p.derive_address(0).unwrap().network(), NetworkType::Simnet);
        assert_eq!(p.coinbase_maturity(NetworkType::Simnet), 16);
    }

    #[test]
    fn random_providers_use_fresh_seeds() {
        let a = SeededKeyProvider::random(NetworkType::Regtest);
        let b = SeededKeyProvider::random(NetworkType::Regtest);
        assert_ne!(a.derive_address(0).unwrap(), b.derive_address(0).unwrap());
        assert_eq!(a.network(), NetworkType::Regtest);
    }

    #[test]
    fn debug_redacts_seed() {
        let s = format!("{:?}", Seed::from_bytes([9; 32]));
        assert!(s.contains("REDACTED"));
        assert!(!s.contains('9'));
    }
}
