//! Delegation store (C2) and delegation manager (C3).
//!
//! A wallet key authorizes an ephemeral Ed25519 device key once; the device key then
//! signs every forum message until the authorization expires. This module owns the
//! one active [`DelegationRecord`] (persisted durably) and the signing/verification
//! operations built on top of it.

pub mod manager;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{Ed25519PublicKeyBytes, Ed25519SecretKeyBytes, EvmSignatureHex};
use crate::error::ReplicaError;
use crate::ids::Address;
use crate::store::{DurableStore, trees};
use crate::timestamp::Timestamp;

pub use manager::{DelegationManager, DelegationStatus, WalletSigner};

/// How long a freshly created delegation remains valid for signing. §4.2 names two
/// concrete durations; the engine does not invent others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegationDuration {
    SevenDays,
    ThirtyDays,
}

impl DelegationDuration {
    pub fn as_millis(self) -> u64 {
        match self {
            DelegationDuration::SevenDays => 7 * 24 * 60 * 60 * 1000,
            DelegationDuration::ThirtyDays => 30 * 24 * 60 * 60 * 1000,
        }
    }
}

/// The two ways a delegation can come into being (§3 "Delegation").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DelegationKind {
    Wallet {
        wallet_address: Address,
        auth_message: String,
        wallet_signature: EvmSignatureHex,
        expiry_timestamp_ms: Timestamp,
    },
    Anonymous {
        session_id: Uuid,
        expiry_timestamp_ms: Timestamp,
    },
}

impl DelegationKind {
    pub fn expiry(&self) -> Timestamp {
        match self {
            DelegationKind::Wallet {
                expiry_timestamp_ms,
                ..
            } => *expiry_timestamp_ms,
            DelegationKind::Anonymous {
                expiry_timestamp_ms,
                ..
            } => *expiry_timestamp_ms,
        }
    }
}

/// The device keypair plus whichever authorization brought it into being. Exactly
/// one of these is ever active at a time (§3 "Delegation: ... replaced by
/// `clear()+create()`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub device_pk: Ed25519PublicKeyBytes,
    pub device_sk: Ed25519SecretKeyBytes,
    pub kind: DelegationKind,
    pub created_at_ms: Timestamp,
}

impl DelegationRecord {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.as_millis() > self.kind.expiry().as_millis()
    }
}

/// Persists the single active delegation record (C2). Never written to by any
/// component other than [`DelegationManager`] (§5 "Shared-resource policy").
#[derive(Clone)]
pub struct DelegationStore {
    durable: DurableStore,
}

const ACTIVE_KEY: &[u8] = b"active";

impl DelegationStore {
    pub fn new(durable: DurableStore) -> Self {
        DelegationStore { durable }
    }

    pub fn save(&self, record: &DelegationRecord) -> Result<(), ReplicaError> {
        self.durable.put(trees::DELEGATIONS, ACTIVE_KEY, record)
    }

    pub fn load(&self) -> Result<Option<DelegationRecord>, ReplicaError> {
        self.durable.get(trees::DELEGATIONS, ACTIVE_KEY)
    }

    pub fn clear(&self) -> Result<(), ReplicaError> {
        self.durable.remove(trees::DELEGATIONS, ACTIVE_KEY)
    }
}
