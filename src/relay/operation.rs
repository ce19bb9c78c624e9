// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operation building, hashing, and signing.
//!
//! The operation hash is keccak256 over the ABI encoding of the versioned
//! tuple `(version, account, nonce, payload)`. The relay contract recomputes
//! the same hash from the same fields and recovers the signer, so the
//! encoding here and the encoding on-chain must stay byte-identical: any
//! change to field order or types is a wire-compatibility break and bumps
//! `OP_SCHEMA_VERSION`.

use alloy::{
    primitives::{keccak256, Address, Bytes, Signature, B256, U256},
    signers::SignerSync,
    sol_types::SolValue,
};

use crate::error::RelayError;
use crate::secrets::Identity;

/// Hash-layout version. Bumped on any wire-incompatible change.
pub const OP_SCHEMA_VERSION: u64 = 1;

/// An off-chain-signed operation awaiting settlement.
///
/// Wire tuple order is `(sender, target, nonce, signature, sponsor)`, with
/// the payload carried as the operation's call data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOperation {
    /// Smart-account address the operation acts as.
    pub sender: Address,
    /// Recipient / call target.
    pub target: Address,
    /// Message payload, settled as call data.
    pub payload: Bytes,
    /// Relay nonce, scoped per sender.
    pub nonce: u64,
    /// 65-byte recoverable signature over [`operation_hash`].
    pub signature: Bytes,
    /// Fee sponsor, or `None` when unsponsored.
    pub sponsor: Option<Address>,
}

/// Canonical operation hash for `(account, nonce, payload)`.
pub fn operation_hash(account: Address, nonce: u64, payload: &Bytes) -> B256 {
    let encoded = (
        U256::from(OP_SCHEMA_VERSION),
        account,
        U256::from(nonce),
        payload.clone(),
    )
        .abi_encode();
    keccak256(encoded)
}

/// Sign an operation hash with the identity's key. The raw hash is signed,
/// no message prefix, matching on-chain recovery.
pub fn sign_operation_hash(identity: &Identity, hash: B256) -> Result<Bytes, RelayError> {
    let signature = identity
        .signer()
        .sign_hash_sync(&hash)
        .map_err(|e| RelayError::Rpc(format!("signing failed: {e}")))?;
    Ok(Bytes::from(signature.as_bytes().to_vec()))
}

impl SignedOperation {
    /// Build the canonical record for `(account, recipient, payload, nonce)`
    /// and sign its hash.
    pub fn build_and_sign(
        identity: &Identity,
        account: Address,
        recipient: Address,
        payload: Bytes,
        nonce: u64,
        sponsor: Option<Address>,
    ) -> Result<Self, RelayError> {
        let hash = operation_hash(account, nonce, &payload);
        let signature = sign_operation_hash(identity, hash)?;
        Ok(Self {
            sender: account,
            target: recipient,
            payload,
            nonce,
            signature,
            sponsor,
        })
    }

    /// Recompute this operation's hash from its own fields.
    pub fn hash(&self) -> B256 {
        operation_hash(self.sender, self.nonce, &self.payload)
    }

    /// Verify the signature the way the relay contract does: recompute the
    /// hash from the record and recover the signer.
    pub fn verify(&self, expected_owner: Address) -> Result<(), RelayError> {
        let signature = Signature::try_from(self.signature.as_ref())
            .map_err(|_| RelayError::SignatureInvalid)?;
        let recovered = signature
            .recover_address_from_prehash(&self.hash())
            .map_err(|_| RelayError::SignatureInvalid)?;
        if recovered == expected_owner {
            Ok(())
        } else {
            Err(RelayError::SignatureInvalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::resolve;

    const HEX_SECRET: &str =
        "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa11";

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn hash_is_deterministic() {
        let payload = Bytes::from_static(b"hello");
        let a = operation_hash(addr(0xb0), 0, &payload);
        let b = operation_hash(addr(0xb0), 0, &payload);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_is_sensitive_to_every_field() {
        let payload = Bytes::from_static(b"hello");
        let base = operation_hash(addr(0xb0), 0, &payload);

        assert_ne!(base, operation_hash(addr(0xb1), 0, &payload));
        assert_ne!(base, operation_hash(addr(0xb0), 1, &payload));
        assert_ne!(
            base,
            operation_hash(addr(0xb0), 0, &Bytes::from_static(b"hellp"))
        );
    }

    #[test]
    fn sign_then_verify_round_trip() {
        let identity = resolve(HEX_SECRET).unwrap();
        let account = addr(0xb0);

        let op = SignedOperation::build_and_sign(
            &identity,
            account,
            addr(0xc0),
            Bytes::from_static(b"hello"),
            0,
            None,
        )
        .unwrap();

        // Verifier side: recompute the hash from (account, payload, nonce)
        // and recover the identity that signed it.
        op.verify(identity.address()).unwrap();
    }

    #[test]
    fn verify_rejects_wrong_owner() {
        let identity = resolve(HEX_SECRET).unwrap();
        let op = SignedOperation::build_and_sign(
            &identity,
            addr(0xb0),
            addr(0xc0),
            Bytes::from_static(b"hello"),
            0,
            None,
        )
        .unwrap();

        assert!(matches!(
            op.verify(addr(0xde)),
            Err(RelayError::SignatureInvalid)
        ));
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let identity = resolve(HEX_SECRET).unwrap();
        let mut op = SignedOperation::build_and_sign(
            &identity,
            addr(0xb0),
            addr(0xc0),
            Bytes::from_static(b"hello"),
            0,
            None,
        )
        .unwrap();

        op.payload = Bytes::from_static(b"goodbye");
        assert!(op.verify(identity.address()).is_err());
    }

    #[test]
    fn signing_is_deterministic_per_secret() {
        let a = resolve(HEX_SECRET).unwrap();
        let b = resolve(HEX_SECRET).unwrap();
        let hash = operation_hash(addr(0xb0), 7, &Bytes::from_static(b"x"));

        assert_eq!(
            sign_operation_hash(&a, hash).unwrap(),
            sign_operation_hash(&b, hash).unwrap()
        );
    }
}
