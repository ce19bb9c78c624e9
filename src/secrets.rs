// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret classification and identity derivation.
//!
//! A caller authenticates with a single opaque string which is classified,
//! in order, as: raw private key (64 hex chars, optional `0x`), BIP-39
//! mnemonic (12 or 24 valid words), or opaque passphrase (anything else,
//! hashed to a scalar). Derivation is deterministic: the same secret always
//! yields the same identity.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use bip39::Mnemonic;
use sha2::{Digest, Sha256};
use tiny_hderive::bip32::ExtendedPrivKey;

use crate::error::RelayError;

/// Standard Ethereum derivation path for mnemonic secrets.
const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Domain tag mixed into the passphrase hash so the scalar is not a plain
/// SHA-256 of user input.
const PASSPHRASE_DOMAIN: &[u8] = b"agent-relay:passphrase:v1";

/// A classified caller secret. Produced once by [`classify`] and matched
/// exhaustively downstream.
#[derive(Debug, Clone)]
pub enum Secret {
    /// 64 hex characters, `0x` prefix already stripped.
    PrivateKey(String),
    /// Validated 12- or 24-word BIP-39 phrase.
    Mnemonic(Mnemonic),
    /// Anything else; hashed to a scalar.
    Passphrase(String),
}

impl Secret {
    /// Short label for logs. Never includes secret material.
    pub fn kind(&self) -> &'static str {
        match self {
            Secret::PrivateKey(_) => "private_key",
            Secret::Mnemonic(_) => "mnemonic",
            Secret::Passphrase(_) => "passphrase",
        }
    }
}

/// A signing identity derived from exactly one secret.
#[derive(Debug, Clone)]
pub struct Identity {
    signer: PrivateKeySigner,
    address: Address,
}

impl Identity {
    fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self { signer, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

/// Classify a raw secret string into exactly one [`Secret`] variant.
///
/// Detection is order-sensitive: private-key pattern first, then mnemonic
/// validity, else passphrase. The two leading patterns are disjoint by
/// construction (hex keys contain no whitespace, mnemonics contain at least
/// eleven separators); this is asserted rather than assumed.
pub fn classify(raw: &str) -> Result<Secret, RelayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RelayError::InvalidSecret("secret is empty".into()));
    }

    let bare = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if bare.len() == 64 && bare.chars().all(|c| c.is_ascii_hexdigit()) {
        debug_assert!(
            trimmed.split_whitespace().count() == 1,
            "hex key and mnemonic patterns must be disjoint"
        );
        return Ok(Secret::PrivateKey(bare.to_lowercase()));
    }

    let word_count = trimmed.split_whitespace().count();
    if word_count == 12 || word_count == 24 {
        if let Ok(mnemonic) = Mnemonic::parse(trimmed) {
            return Ok(Secret::Mnemonic(mnemonic));
        }
    }

    Ok(Secret::Passphrase(trimmed.to_string()))
}

/// Derive the signing identity for a raw secret.
pub fn resolve(raw: &str) -> Result<Identity, RelayError> {
    let secret = classify(raw)?;
    let signer = match &secret {
        Secret::PrivateKey(hex_key) => signer_from_hex(hex_key)?,
        Secret::Mnemonic(mnemonic) => {
            let seed = mnemonic.to_seed("");
            let ext = ExtendedPrivKey::derive(&seed, ETH_DERIVATION_PATH).map_err(|e| {
                RelayError::InvalidSecret(format!("mnemonic derivation failed: {e:?}"))
            })?;
            PrivateKeySigner::from_slice(&ext.secret())
                .map_err(|e| RelayError::InvalidSecret(e.to_string()))?
        }
        Secret::Passphrase(phrase) => {
            let mut hasher = Sha256::new();
            hasher.update(PASSPHRASE_DOMAIN);
            hasher.update(phrase.as_bytes());
            let (scalar, rehashes) = scalar_from_digest(hasher.finalize().into());
            if rehashes > 0 {
                tracing::debug!(rehashes, "passphrase digest re-hashed to reach a valid scalar");
            }
            PrivateKeySigner::from_slice(&scalar)
                .map_err(|e| RelayError::InvalidSecret(e.to_string()))?
        }
    };
    Ok(Identity::from_signer(signer))
}

fn signer_from_hex(hex_key: &str) -> Result<PrivateKeySigner, RelayError> {
    let bytes =
        alloy::hex::decode(hex_key).map_err(|e| RelayError::InvalidSecret(e.to_string()))?;
    PrivateKeySigner::from_slice(&bytes)
        .map_err(|e| RelayError::InvalidSecret(format!("invalid private key: {e}")))
}

/// Map a digest to a valid secp256k1 scalar, re-hashing until it passes the
/// curve's validity check (zero or above the group order fails). Returns the
/// scalar and how many re-hash rounds were needed.
fn scalar_from_digest(mut digest: [u8; 32]) -> ([u8; 32], u32) {
    let mut rounds = 0;
    while k256::SecretKey::from_slice(&digest).is_err() {
        digest = Sha256::digest(digest).into();
        rounds += 1;
    }
    (digest, rounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_SECRET: &str =
        "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa11";
    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn classifies_hex_key_with_and_without_prefix() {
        assert!(matches!(classify(HEX_SECRET).unwrap(), Secret::PrivateKey(_)));
        let prefixed = format!("0x{HEX_SECRET}");
        assert!(matches!(classify(&prefixed).unwrap(), Secret::PrivateKey(_)));
    }

    #[test]
    fn classifies_valid_mnemonic() {
        assert!(matches!(classify(TEST_MNEMONIC).unwrap(), Secret::Mnemonic(_)));
    }

    #[test]
    fn wrong_word_count_falls_through_to_passphrase() {
        let thirteen = format!("{TEST_MNEMONIC} abandon");
        assert!(matches!(classify(&thirteen).unwrap(), Secret::Passphrase(_)));
    }

    #[test]
    fn invalid_words_fall_through_to_passphrase() {
        let twelve_junk = "zzz zzz zzz zzz zzz zzz zzz zzz zzz zzz zzz zzz";
        assert!(matches!(classify(twelve_junk).unwrap(), Secret::Passphrase(_)));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(classify("   ").is_err());
    }

    #[test]
    fn private_key_resolution_is_deterministic_and_prefix_insensitive() {
        let a = resolve(HEX_SECRET).unwrap();
        let b = resolve(&format!("0x{HEX_SECRET}")).unwrap();
        let c = resolve(HEX_SECRET).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.address(), c.address());
    }

    #[test]
    fn mnemonic_resolves_to_standard_first_account() {
        let identity = resolve(TEST_MNEMONIC).unwrap();
        // First m/44'/60'/0'/0/0 account of the all-abandon test vector.
        assert_eq!(
            identity.address().to_string().to_lowercase(),
            "0x9858effd232b4033e47d90003d41ec34ecaeda94"
        );
    }

    #[test]
    fn passphrase_resolution_is_deterministic() {
        let a = resolve("correct horse battery staple").unwrap();
        let b = resolve("correct horse battery staple").unwrap();
        assert_eq!(a.address(), b.address());

        let other = resolve("correct horse battery staples").unwrap();
        assert_ne!(a.address(), other.address());
    }

    #[test]
    fn passphrase_differs_from_raw_sha256_of_input() {
        // The domain tag must be in the preimage.
        let tagged = resolve("hunter2").unwrap();
        let untagged: [u8; 32] = Sha256::digest(b"hunter2").into();
        let untagged_signer = PrivateKeySigner::from_slice(&untagged).unwrap();
        assert_ne!(tagged.address(), untagged_signer.address());
    }

    #[test]
    fn invalid_scalar_is_rehashed_until_valid() {
        // 0xff..ff is above the secp256k1 group order; all-zero is the
        // additive identity. Both must be rejected and re-hashed.
        let (scalar, rounds) = scalar_from_digest([0xff; 32]);
        assert!(rounds >= 1);
        assert!(k256::SecretKey::from_slice(&scalar).is_ok());

        let (scalar, rounds) = scalar_from_digest([0u8; 32]);
        assert!(rounds >= 1);
        assert!(k256::SecretKey::from_slice(&scalar).is_ok());
    }
}
