//! Delegation manager (C3, §4.2): creates wallet-backed or anonymous delegations,
//! signs outgoing messages, and verifies incoming ones.

use rand_core::{CryptoRng, RngCore};
use uuid::Uuid;

use super::{DelegationDuration, DelegationKind, DelegationRecord, DelegationStore};
use crate::crypto::{self, CryptoError, Ed25519SignatureHex, EvmSignatureHex};
use crate::error::DelegationError;
use crate::ids::{Address, Author, DevicePubKey};
use crate::message::Envelope;
use crate::timestamp::Timestamp;

/// Injected capability for obtaining a wallet's signature over an arbitrary byte
/// string (§1 "the wallet... is out of scope; the core receives a caller-supplied
/// signing callback"). May be slow or fail; both are surfaced as a `Result` (§4.2,
/// §5 "Wallet signing callbacks may be slow or fail").
#[async_trait::async_trait]
pub trait WalletSigner: Send + Sync {
    async fn sign(&self, message: &str) -> Result<[u8; 65], String>;
}

/// A snapshot of the active delegation, safe to expose to callers without leaking
/// the device secret key (§4.2 `status`).
#[derive(Debug, Clone)]
pub struct DelegationStatus {
    pub present: bool,
    pub valid: bool,
    pub time_remaining_ms: i64,
    pub public_key: Option<DevicePubKey>,
    pub address: Option<Author>,
    pub proof_wallet_address: Option<Address>,
}

impl DelegationStatus {
    fn absent() -> Self {
        DelegationStatus {
            present: false,
            valid: false,
            time_remaining_ms: 0,
            public_key: None,
            address: None,
            proof_wallet_address: None,
        }
    }
}

pub struct DelegationManager {
    store: DelegationStore,
}

impl DelegationManager {
    pub fn new(store: DelegationStore) -> Self {
        DelegationManager { store }
    }

    /// Generates a fresh device keypair, composes a human-readable authorization
    /// message embedding the device public key, wallet address, expiry, and a
    /// nonce, obtains a wallet signature via `signer`, persists the record, and
    /// succeeds only if the wallet signature verifies against its own authorization
    /// message (the round-trip self-check named in §4.2).
    #[tracing::instrument(skip_all, fields(%wallet_address))]
    pub async fn create_wallet_delegation<R: RngCore + CryptoRng>(
        &self,
        wallet_address: Address,
        duration: DelegationDuration,
        now: Timestamp,
        signer: &dyn WalletSigner,
        rng: &mut R,
    ) -> Result<(), DelegationError> {
        let (device_pk, device_sk) = crypto::generate_ed25519_keypair(rng);
        let expiry = Timestamp(now.as_millis() + duration.as_millis());

        let mut nonce_bytes = [0u8; 16];
        rng.fill_bytes(&mut nonce_bytes);
        let nonce = hex::encode(nonce_bytes);

        let auth_message = format!(
            "OpChan wants to authorize a new device to post on your behalf.\n\n\
             Device public key: {}\n\
             Wallet address: {}\n\
             Expires at: {}\n\
             Nonce: {}",
            hex::encode(device_pk),
            wallet_address,
            expiry.as_millis(),
            nonce,
        );

        tracing::debug!("requesting wallet signature over authorization message");
        let wallet_signature = signer.sign(&auth_message).await.map_err(|err| {
            tracing::warn!(%err, "wallet signing callback failed");
            DelegationError::WalletSignFailed(err)
        })?;

        if !crypto::verify_wallet_signature(wallet_address, &auth_message, &wallet_signature) {
            tracing::warn!("wallet signature failed its own self-check after signing");
            return Err(DelegationError::SelfCheckFailed);
        }
        tracing::info!("wallet delegation created");

        let record = DelegationRecord {
            device_pk,
            device_sk,
            kind: DelegationKind::Wallet {
                wallet_address,
                auth_message,
                wallet_signature: EvmSignatureHex(wallet_signature),
                expiry_timestamp_ms: expiry,
            },
            created_at_ms: now,
        };
        self.store.save(&record)?;
        Ok(())
    }

    /// Generates a device keypair and a random session id, persists the record, and
    /// returns the session id to the caller (§4.2).
    pub fn create_anonymous_delegation<R: RngCore + CryptoRng>(
        &self,
        duration: DelegationDuration,
        now: Timestamp,
        rng: &mut R,
    ) -> Result<Uuid, DelegationError> {
        let (device_pk, device_sk) = crypto::generate_ed25519_keypair(rng);
        let session_id = Uuid::new_v4();
        let expiry = Timestamp(now.as_millis() + duration.as_millis());
        let record = DelegationRecord {
            device_pk,
            device_sk,
            kind: DelegationKind::Anonymous {
                session_id,
                expiry_timestamp_ms: expiry,
            },
            created_at_ms: now,
        };
        self.store.save(&record)?;
        Ok(session_id)
    }

    /// Replaces the active delegation, if any, with none (§3 "replaced by
    /// `clear()+create()`").
    pub fn clear(&self) -> Result<(), DelegationError> {
        Ok(self.store.clear()?)
    }

    /// Loads the active delegation, refuses if expired, signs `unsigned` with the
    /// device key, and attaches signature, device public key, and (for wallet
    /// delegations) the delegation proof.
    pub fn sign(&self, mut unsigned: Envelope, now: Timestamp) -> Result<Envelope, DelegationError> {
        let record = self.store.load()?.ok_or(DelegationError::NoActiveDelegation)?;
        if record.is_expired(now) {
            return Err(DelegationError::Expired);
        }

        unsigned.signature = None;
        unsigned.device_pub_key = None;
        unsigned.delegation_proof = None;
        let payload = crate::message::canonical::canonical_bytes(&unsigned);
        let signature = crypto::ed25519_sign(&record.device_sk, &payload)?;

        unsigned.signature = Some(Ed25519SignatureHex(signature));
        unsigned.device_pub_key = Some(DevicePubKey(record.device_pk));
        unsigned.delegation_proof = match &record.kind {
            DelegationKind::Wallet {
                wallet_address,
                auth_message,
                wallet_signature,
                expiry_timestamp_ms,
            } => Some(crate::message::DelegationProof {
                auth_message: auth_message.clone(),
                wallet_signature: *wallet_signature,
                expiry_timestamp_ms: *expiry_timestamp_ms,
                wallet_address: *wallet_address,
            }),
            DelegationKind::Anonymous { .. } => None,
        };
        Ok(unsigned)
    }

    /// Verifies a signed message's cryptographic integrity, per §4.2 step-by-step:
    /// device signature, delegation-proof binding (if present), or author-is-UUIDv4
    /// (if absent). Returns `false` rather than an error for any failure, since
    /// every caller on the ingress path only ever needs a boolean.
    pub fn verify(signed: &Envelope) -> bool {
        Self::verify_with_reason(signed).0
    }

    pub fn verify_with_reason(signed: &Envelope) -> (bool, Vec<String>) {
        let mut reasons = Vec::new();

        let (Some(signature), Some(device_pub_key)) =
            (signed.signature, signed.device_pub_key)
        else {
            reasons.push("missing signature or device_pub_key".to_string());
            return (false, reasons);
        };

        let mut for_signing = signed.clone();
        for_signing.signature = None;
        for_signing.device_pub_key = None;
        for_signing.delegation_proof = None;
        let payload = crate::message::canonical::canonical_bytes(&for_signing);

        if !crypto::ed25519_verify(&device_pub_key.0, &payload, &signature.0) {
            reasons.push("ed25519 signature does not verify".to_string());
            return (false, reasons);
        }

        match &signed.delegation_proof {
            Some(proof) => {
                if !crypto::verify_wallet_signature(
                    proof.wallet_address,
                    &proof.auth_message,
                    &proof.wallet_signature.0,
                ) {
                    reasons.push("wallet signature over delegation proof does not verify".to_string());
                    return (false, reasons);
                }
                let device_hex = device_pub_key.to_hex();
                let wallet_hex = proof.wallet_address.to_hex();
                let expiry_str = proof.expiry_timestamp_ms.as_millis().to_string();
                if !proof.auth_message.contains(&device_hex) {
                    reasons.push("auth_message does not bind the signing device key".to_string());
                }
                if !proof.auth_message.contains(&wallet_hex)
                    && !proof.auth_message.contains(&wallet_hex[2..])
                {
                    reasons.push("auth_message does not bind the wallet address".to_string());
                }
                if !proof.auth_message.contains(&expiry_str) {
                    reasons.push("auth_message does not bind the expiry timestamp".to_string());
                }
                if !matches!(signed.author, Author::Wallet(a) if a == proof.wallet_address) {
                    reasons.push("author does not match the delegation proof's wallet address".to_string());
                }
            }
            None => {
                if !matches!(signed.author, Author::Anonymous(id) if id.get_version_num() == 4) {
                    reasons.push("author without a delegation proof must be a UUIDv4".to_string());
                }
            }
        }

        (reasons.is_empty(), reasons)
    }

    /// `status(current_address)` (§4.2): reports whether a delegation is active,
    /// valid, and (for wallet delegations matching `current_address`) how much time
    /// remains before expiry.
    pub fn status(&self, now: Timestamp) -> Result<DelegationStatus, DelegationError> {
        let Some(record) = self.store.load()? else {
            return Ok(DelegationStatus::absent());
        };
        let expiry = record.kind.expiry();
        let valid = !record.is_expired(now);
        let address = match &record.kind {
            DelegationKind::Wallet { wallet_address, .. } => Author::Wallet(*wallet_address),
            DelegationKind::Anonymous { session_id, .. } => Author::Anonymous(*session_id),
        };
        let proof_wallet_address = match &record.kind {
            DelegationKind::Wallet { wallet_address, .. } => Some(*wallet_address),
            DelegationKind::Anonymous { .. } => None,
        };
        Ok(DelegationStatus {
            present: true,
            valid,
            time_remaining_ms: expiry.as_millis() as i64 - now.as_millis() as i64,
            public_key: Some(DevicePubKey(record.device_pk)),
            address: Some(address),
            proof_wallet_address,
        })
    }
}

impl From<CryptoError> for DelegationError {
    fn from(value: CryptoError) -> Self {
        DelegationError::Crypto(value)
    }
}
