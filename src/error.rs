//! Error taxonomy (C11, §7). One `thiserror` enum per component boundary, composed
//! into [`EngineError`] at the client facade — the same layering the teacher uses for
//! `PaymentError` feeding into the HTTP layer in `handlers.rs`.

use crate::message::validate::ValidationReport;

#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    /// Structural validation or signature verification failed; the message was
    /// never stored.
    #[error("message rejected: {0:?}")]
    Rejected(ValidationReport),
    /// The durable write failed; the message is already applied in memory.
    #[error("durable store write failed")]
    StorageFailure(#[source] sled::Error),
    #[error("durable store error")]
    Store(#[source] sled::Error),
    #[error("failed to (de)serialize a stored record")]
    Codec(#[source] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("the active delegation has expired")]
    DelegationExpired,
    #[error("no active delegation; the caller is not authenticated")]
    Unauthenticated,
    #[error("the action's target does not resolve to a post or comment in the replica")]
    UnknownTarget,
    #[error("transport send failed; the message remains pending in the local replica")]
    TransportUnavailable,
    #[error(transparent)]
    Replica(#[from] ReplicaError),
}

#[derive(Debug, thiserror::Error)]
pub enum DelegationError {
    #[error("no active delegation")]
    NoActiveDelegation,
    #[error("the active delegation has expired")]
    Expired,
    #[error("the wallet signing callback failed: {0}")]
    WalletSignFailed(String),
    #[error("the wallet signature failed its own self-check immediately after signing")]
    SelfCheckFailed,
    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),
    #[error(transparent)]
    Store(#[from] ReplicaError),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Replica(#[from] ReplicaError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Delegation(#[from] DelegationError),
    #[error("durable store error")]
    Store(#[from] sled::Error),
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}
