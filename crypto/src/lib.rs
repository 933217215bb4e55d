//! ECDSA secp256k1 signing/recovery and Keccak256 hashing.
//!
//! Grounded in the teacher's `codechain-key` crate (RSV-layout recoverable
//! signatures, `public_to_address` derivation), adapted to the real
//! crates.io `secp256k1` crate rather than the team's private fork.

use ethereum_types::{H256, H512};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use e2c_types::{Address, Signature};

pub const SIGNATURE_LENGTH: usize = 65;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("secp256k1 error: {0}")]
    Secp(#[from] secp256k1::Error),
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
}

/// A local validator's signing identity.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn from_secret(secret: SecretKey) -> Self {
        let ctx = Secp256k1::new();
        let public = PublicKey::from_secret_key(&ctx, &secret);
        KeyPair {
            secret,
            public,
        }
    }

    pub fn generate() -> Self {
        let ctx = Secp256k1::new();
        let (secret, public) = ctx.generate_keypair(&mut rand::thread_rng());
        KeyPair {
            secret,
            public,
        }
    }

    pub fn address(&self) -> Address {
        public_to_address(&self.public)
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Signs a 32-byte digest, producing an RSV-encoded recoverable
    /// signature (spec §4.1 `sign`).
    pub fn sign(&self, digest: H256) -> Result<Signature, Error> {
        sign(&self.secret, digest)
    }
}

/// Keccak256 of the 64-byte uncompressed public key (sans the `0x04`
/// prefix byte), taking the low 20 bytes — the standard address
/// derivation (spec §3 "a 20-byte address derived from its ECDSA public
/// key").
pub fn public_to_address(public: &PublicKey) -> Address {
    let uncompressed = public.serialize_uncompressed();
    debug_assert_eq!(uncompressed[0], 0x04);
    let hash = keccak_hash::keccak(&uncompressed[1..]);
    Address::from_slice(&hash.as_bytes()[12..])
}

/// Signs `digest` with `secret`, returning `r || s || v` (spec §6: "65-byte
/// ECDSA signature").
pub fn sign(secret: &SecretKey, digest: H256) -> Result<Signature, Error> {
    let ctx = Secp256k1::signing_only();
    let message = Message::from_slice(digest.as_bytes())?;
    let recoverable = ctx.sign_ecdsa_recoverable(&message, secret);
    let (recovery_id, compact) = recoverable.serialize_compact();
    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..64].copy_from_slice(&compact);
    out[64] = recovery_id.to_i32() as u8;
    Ok(out)
}

/// Recovers the address that produced `signature` over `digest` (spec §4.1
/// `recover_signer`, §4.2 step 2).
pub fn recover(signature: &Signature, digest: H256) -> Result<Address, Error> {
    let public = recover_public(signature, digest)?;
    Ok(public_to_address(&public))
}

/// Recovers the raw public key, for callers that need more than the address
/// (e.g. validating a seal against a known public key rather than address).
pub fn recover_public(signature: &Signature, digest: H256) -> Result<PublicKey, Error> {
    let recovery_id = RecoveryId::from_i32(signature[64] as i32)
        .map_err(|_| Error::InvalidRecoveryId(signature[64]))?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)?;
    let ctx = Secp256k1::verification_only();
    let message = Message::from_slice(digest.as_bytes())?;
    let public = ctx.recover_ecdsa(&message, &recoverable)?;
    Ok(public)
}

/// Keccak256 of an arbitrary byte string (spec §4.1 `sign`: "Keccak256 +
/// ECDSA").
pub fn keccak256(data: impl AsRef<[u8]>) -> H256 {
    keccak_hash::keccak(data.as_ref())
}

/// Uncompressed public key bytes, for wire messages that need to advertise
/// a validator's key alongside its address.
pub fn public_bytes(public: &PublicKey) -> H512 {
    H512::from_slice(&public.serialize_uncompressed()[1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_recover_yields_signer_address() {
        let keypair = KeyPair::generate();
        let digest = keccak256(b"hello e2c");
        let sig = keypair.sign(digest).unwrap();
        let recovered = recover(&sig, digest).unwrap();
        assert_eq!(recovered, keypair.address());
    }

    #[test]
    fn recovery_fails_on_tampered_digest() {
        let keypair = KeyPair::generate();
        let digest = keccak256(b"original");
        let other = keccak256(b"tampered");
        let sig = keypair.sign(digest).unwrap();
        let recovered = recover(&sig, other).unwrap();
        assert_ne!(recovered, keypair.address());
    }
}
