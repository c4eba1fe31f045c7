//! Crypto primitives (C1): Ed25519 device-key signing and EVM personal-sign (EIP-191)
//! wallet-signature verification.
//!
//! All fallible operations here return a [`CryptoError`]; none of them panic on
//! malformed input, per §4.1 of the specification.

use alloy_primitives::{Signature as EvmSignature, keccak256};
use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ids::Address;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed ed25519 secret key")]
    MalformedSecretKey,
    #[error("malformed ed25519 public key")]
    MalformedPublicKey,
    #[error("malformed ed25519 signature")]
    MalformedSignature,
    #[error("malformed EVM signature")]
    MalformedEvmSignature,
}

pub type Ed25519PublicKeyBytes = [u8; 32];
pub type Ed25519SecretKeyBytes = [u8; 32];
pub type Ed25519SignatureBytes = [u8; 64];

/// Generates a fresh Ed25519 device keypair using the supplied CSPRNG. The RNG is an
/// injected capability so tests can use a deterministic (seeded) generator.
pub fn generate_ed25519_keypair<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> (Ed25519PublicKeyBytes, Ed25519SecretKeyBytes) {
    let signing_key = SigningKey::generate(rng);
    (
        signing_key.verifying_key().to_bytes(),
        signing_key.to_bytes(),
    )
}

/// Signs `bytes` with the given Ed25519 secret key.
pub fn ed25519_sign(
    sk: &Ed25519SecretKeyBytes,
    bytes: &[u8],
) -> Result<Ed25519SignatureBytes, CryptoError> {
    let signing_key = SigningKey::from_bytes(sk);
    Ok(signing_key.sign(bytes).to_bytes())
}

/// Verifies an Ed25519 signature. Never panics; malformed keys/signatures are
/// reported as `Ok(false)` rather than propagated as errors, since "is this valid"
/// is the only question a caller on the ingress path ever asks.
pub fn ed25519_verify(pk: &Ed25519PublicKeyBytes, bytes: &[u8], sig: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(pk) else {
        return false;
    };
    let Ok(sig_array) = <[u8; 64]>::try_from(sig) else {
        return false;
    };
    let signature = Ed25519Signature::from_bytes(&sig_array);
    verifying_key.verify(bytes, &signature).is_ok()
}

/// Computes the EIP-191 `personal_sign` digest: `keccak256("\x19Ethereum Signed
/// Message:\n" + len(message) + message)`.
fn eth_signed_message_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut buf = Vec::with_capacity(prefix.len() + message.len());
    buf.extend_from_slice(prefix.as_bytes());
    buf.extend_from_slice(message);
    keccak256(buf).0
}

/// Verifies that `sig` (a 65-byte EIP-191 signature, `r || s || v`) was produced by
/// `address` over `message`, under the standard `personal_sign` scheme. Addresses are
/// compared lowercase; malformed signatures verify to `false`, never an error, since
/// this sits on the same ingress path as [`ed25519_verify`].
pub fn verify_wallet_signature(address: Address, message: &str, sig: &[u8]) -> bool {
    let Ok(signature) = EvmSignature::try_from(sig) else {
        return false;
    };
    let digest = eth_signed_message_hash(message.as_bytes());
    let Ok(recovered) = signature.recover_address_from_prehash(&digest.into()) else {
        return false;
    };
    recovered.into_array() == address.0
}

/// A hex-encoded 64-byte Ed25519 signature, as carried on the wire in
/// [`crate::message::Envelope::signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ed25519SignatureHex(pub Ed25519SignatureBytes);

impl Serialize for Ed25519SignatureHex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Ed25519SignatureHex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|_| serde::de::Error::custom("invalid hex in ed25519 signature"))?;
        let array: Ed25519SignatureBytes = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("ed25519 signature must be 64 bytes"))?;
        Ok(Ed25519SignatureHex(array))
    }
}

/// A hex-encoded 65-byte `r || s || v` EVM personal-sign signature, carried in a
/// [`crate::message::DelegationProof::wallet_signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmSignatureHex(pub [u8; 65]);

impl Serialize for EvmSignatureHex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for EvmSignatureHex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|_| serde::de::Error::custom("invalid hex in EVM signature"))?;
        let array: [u8; 65] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("EVM signature must be 65 bytes"))?;
        Ok(EvmSignatureHex(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn ed25519_sign_then_verify_succeeds() {
        let (pk, sk) = generate_ed25519_keypair(&mut OsRng);
        let msg = b"hello opchan";
        let sig = ed25519_sign(&sk, msg).unwrap();
        assert!(ed25519_verify(&pk, msg, &sig));
    }

    #[test]
    fn ed25519_verify_fails_on_bit_flip() {
        let (pk, sk) = generate_ed25519_keypair(&mut OsRng);
        let msg = b"hello opchan";
        let mut sig = ed25519_sign(&sk, msg).unwrap();
        sig[0] ^= 0xFF;
        assert!(!ed25519_verify(&pk, msg, &sig));
    }

    #[test]
    fn ed25519_verify_rejects_malformed_key() {
        let bad_pk = [0u8; 32];
        assert!(!ed25519_verify(&bad_pk, b"msg", &[0u8; 64]));
    }

    #[test]
    fn ed25519_verify_rejects_wrong_length_signature() {
        let (pk, _) = generate_ed25519_keypair(&mut OsRng);
        assert!(!ed25519_verify(&pk, b"msg", &[0u8; 10]));
    }
}
