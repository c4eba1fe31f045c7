//! Message envelope, kind-specific payloads (C4), and the canonical encoding used for
//! signing and verification.

pub mod canonical;
pub mod payload;
pub mod validate;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{Ed25519SignatureHex, EvmSignatureHex};
use crate::ids::{Address, DevicePubKey};
use crate::timestamp::Timestamp;

pub use payload::{DisplayPreference, MessageKind, ModerationAction, Payload, TargetKind};

/// A wallet's one-time authorization of a device key (§3 "Delegation proof").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationProof {
    /// Human-readable authorization text that textually contains the device public
    /// key, the wallet address, and the expiry timestamp (§4.2, §6).
    pub auth_message: String,
    pub wallet_signature: EvmSignatureHex,
    pub expiry_timestamp_ms: Timestamp,
    pub wallet_address: Address,
}

/// The author field of a message: a wallet address (delegated signing) or an
/// anonymous session id.
pub use crate::ids::Author;

/// A complete forum message: the common envelope fields plus a kind-specific
/// [`Payload`]. `signature`, `device_pub_key`, and `delegation_proof` are `None`
/// before signing and `Some` after; the canonical encoding (see [`canonical`])
/// always serializes all three as explicit JSON `null` when absent, never omitting
/// the keys, so the signed byte layout never depends on whether the message has
/// been signed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub id: Uuid,
    pub timestamp: Timestamp,
    pub author: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Ed25519SignatureHex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_pub_key: Option<DevicePubKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation_proof: Option<DelegationProof>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    pub fn unsigned(id: Uuid, timestamp: Timestamp, author: Author, payload: Payload) -> Self {
        Envelope {
            id,
            timestamp,
            author,
            signature: None,
            device_pub_key: None,
            delegation_proof: None,
            payload,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some() && self.device_pub_key.is_some()
    }

    /// The dedup key from §4.4 step 3: `(kind, id, timestamp)`.
    pub fn dedup_key(&self) -> (MessageKind, Uuid, Timestamp) {
        (self.kind(), self.id, self.timestamp)
    }
}
