//! End-to-end coverage of the six numbered scenarios named in the specification's
//! walkthrough section: an anonymous post round-trip, vote supersession, a
//! moderation toggle, permission denial, delegation binding, and relevance decay.
//! Unit tests elsewhere exercise these mechanisms in isolation; this suite drives
//! them together through [`opchan_core::client::Client`] the way a host application
//! would.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use opchan_core::client::Client;
use opchan_core::config::EngineConfig;
use opchan_core::delegation::manager::WalletSigner;
use opchan_core::error::ActionError;
use opchan_core::identity::{NameLookup, ResolvedName};
use opchan_core::ids::{Address, Author};
use opchan_core::message::{DisplayPreference, ModerationAction, TargetKind};
use opchan_core::replica::VerificationStatus;
use opchan_core::store::DurableStore;
use opchan_core::timestamp::{Clock, Timestamp};
use opchan_core::transport::{HealthSink, ReceiveSink, StatusCallback, SyncSink, Transport};
use uuid::Uuid;

/// A no-op [`Transport`]: every action in this suite only needs its message to be
/// applied locally and durably, not actually delivered to a peer.
struct NullTransport;

#[async_trait::async_trait]
impl Transport for NullTransport {
    async fn send(&self, _signed_message: opchan_core::message::Envelope, status_cb: Option<StatusCallback>) {
        if let Some(cb) = status_cb {
            cb(opchan_core::transport::SendStatus::Delivered);
        }
    }
    fn on_receive(&self, _sink: ReceiveSink) {}
    fn on_health(&self, _sink: HealthSink) {}
    fn on_sync(&self, _sink: SyncSink) {}
    fn is_ready(&self) -> bool {
        true
    }
}

struct FixedClock(AtomicU64);
impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.0.load(Ordering::SeqCst))
    }
}
impl FixedClock {
    fn new(ms: u64) -> Self {
        FixedClock(AtomicU64::new(ms))
    }
    fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

struct NoEns;
#[async_trait::async_trait]
impl NameLookup for NoEns {
    async fn resolve(&self, _address: Address) -> Result<ResolvedName, String> {
        Ok(ResolvedName::default())
    }
}

struct AlwaysEns(String);
#[async_trait::async_trait]
impl NameLookup for AlwaysEns {
    async fn resolve(&self, _address: Address) -> Result<ResolvedName, String> {
        Ok(ResolvedName {
            ens_name: Some(self.0.clone()),
            ens_avatar: None,
        })
    }
}

fn client_with(clock: Arc<FixedClock>, lookup: Arc<dyn NameLookup>) -> Client {
    Client::open(
        EngineConfig::default(),
        DurableStore::temporary().unwrap(),
        Arc::new(NullTransport),
        lookup,
        clock,
    )
    .unwrap()
}

#[tokio::test]
async fn scenario_1_anonymous_post_round_trip() {
    let clock = Arc::new(FixedClock::new(1_000));
    let client = client_with(clock.clone(), Arc::new(NoEns));
    let session = client.create_anonymous_delegation(&mut rand_core::OsRng).unwrap();
    let author = Author::Anonymous(session);
    let cb = || {};

    let envelope = client
        .create_post(author, true, Uuid::new_v4(), "Hello".to_string(), "World".to_string(), &cb)
        .await
        .unwrap();

    let stored = client.replica().post(envelope.id).unwrap();
    assert_eq!(stored.body, "World");
    assert!(!client.replica().is_pending(envelope.id));
}

#[tokio::test]
async fn scenario_2_vote_supersession_keeps_the_latest_vote_regardless_of_order() {
    let clock = Arc::new(FixedClock::new(1_000));
    let client = client_with(clock.clone(), Arc::new(NoEns));
    let session = client.create_anonymous_delegation(&mut rand_core::OsRng).unwrap();
    let author = Author::Anonymous(session);
    let cb = || {};

    let post = client
        .create_post(author, true, Uuid::new_v4(), "t".to_string(), "b".to_string(), &cb)
        .await
        .unwrap();

    client.vote(author, true, post.id, 1, &cb).await.unwrap();
    clock.advance(1_000);
    client.vote(author, true, post.id, -1, &cb).await.unwrap();

    let votes = client.replica().votes_on(post.id);
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].value, -1);
}

#[tokio::test]
async fn scenario_3_moderation_toggle_resolves_to_the_latest_action() {
    let clock = Arc::new(FixedClock::new(1_000));
    let client = client_with(clock.clone(), Arc::new(AlwaysEns("cellowner.eth".to_string())));
    let session = client.create_anonymous_delegation(&mut rand_core::OsRng).unwrap();
    let author = Author::Anonymous(session);
    let cb = || {};

    let cell = client
        .create_cell(
            author,
            true,
            VerificationStatus::EnsVerified,
            "General".to_string(),
            "desc".to_string(),
            None,
            &cb,
        )
        .await
        .unwrap();
    let post = client
        .create_post(author, true, cell.id, "t".to_string(), "b".to_string(), &cb)
        .await
        .unwrap();

    client
        .moderate(author, true, ModerationAction::Moderate, cell.id, TargetKind::Post, post.id, None, &cb)
        .await
        .unwrap();
    clock.advance(1_000);
    client
        .moderate(author, true, ModerationAction::Unmoderate, cell.id, TargetKind::Post, post.id, None, &cb)
        .await
        .unwrap();

    let effective = client
        .replica()
        .moderation_in_effect(cell.id, TargetKind::Post, post.id)
        .unwrap();
    assert!(!effective.is_in_effect());
}

#[tokio::test]
async fn scenario_4_permission_denial_for_cell_creation_without_ens_verification() {
    let clock = Arc::new(FixedClock::new(1_000));
    let client = client_with(clock.clone(), Arc::new(NoEns));
    let session = client.create_anonymous_delegation(&mut rand_core::OsRng).unwrap();
    let author = Author::Anonymous(session);
    let cb = || {};

    let result = client
        .create_cell(
            author,
            true,
            VerificationStatus::WalletUnconnected,
            "General".to_string(),
            "desc".to_string(),
            None,
            &cb,
        )
        .await;
    assert!(matches!(result, Err(ActionError::PermissionDenied)));
}

struct LocalWalletSigner(alloy_signer_local::PrivateKeySigner);

#[async_trait::async_trait]
impl WalletSigner for LocalWalletSigner {
    async fn sign(&self, message: &str) -> Result<[u8; 65], String> {
        use alloy_signer::Signer;
        let signature = self
            .0
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| e.to_string())?;
        Ok(signature.as_bytes())
    }
}

#[tokio::test]
async fn scenario_5_delegation_binds_the_device_key_to_the_wallet_that_authorized_it() {
    use alloy_signer::Signer as _;

    let clock = Arc::new(FixedClock::new(1_000));
    let client = client_with(clock.clone(), Arc::new(NoEns));

    let wallet = alloy_signer_local::PrivateKeySigner::random();
    let address = Address(wallet.address().into_array());
    let signer = LocalWalletSigner(wallet);

    client
        .create_wallet_delegation(address, &signer, &mut rand_core::OsRng)
        .await
        .unwrap();

    let cb = || {};
    let envelope = client
        .create_post(Author::Wallet(address), true, Uuid::new_v4(), "t".to_string(), "b".to_string(), &cb)
        .await
        .unwrap();

    assert!(envelope.is_signed());
    assert_eq!(envelope.delegation_proof.as_ref().unwrap().wallet_address, address);

    let status = client.delegation_status().unwrap();
    assert_eq!(status.proof_wallet_address, Some(address));
}

#[tokio::test]
async fn scenario_5b_a_message_signed_by_a_different_device_key_fails_verification() {
    use opchan_core::delegation::manager::DelegationManager as Manager;

    let clock = Arc::new(FixedClock::new(1_000));
    let wallet = alloy_signer_local::PrivateKeySigner::random();
    let address = Address(wallet.address().into_array());
    let signer = LocalWalletSigner(wallet);

    // Two independent clients delegate the same wallet to two distinct device
    // keys, then each signs the same-shaped post.
    let client_a = client_with(clock.clone(), Arc::new(NoEns));
    client_a
        .create_wallet_delegation(address, &signer, &mut rand_core::OsRng)
        .await
        .unwrap();
    let cb = || {};
    let envelope_a = client_a
        .create_post(Author::Wallet(address), true, Uuid::new_v4(), "t".to_string(), "b".to_string(), &cb)
        .await
        .unwrap();

    let client_b = client_with(clock.clone(), Arc::new(NoEns));
    client_b
        .create_wallet_delegation(address, &signer, &mut rand_core::OsRng)
        .await
        .unwrap();
    let envelope_b = client_b
        .create_post(Author::Wallet(address), true, Uuid::new_v4(), "t".to_string(), "b".to_string(), &cb)
        .await
        .unwrap();

    // Forge a message: B's signature and device key, but A's delegation proof
    // (bound to a different device key). This must not verify.
    let mut forged = envelope_b.clone();
    forged.delegation_proof = envelope_a.delegation_proof.clone();

    let (ok, reasons) = Manager::verify_with_reason(&forged);
    assert!(!ok, "forged message with a swapped device key must not verify");
    assert!(reasons.iter().any(|r| r.contains("device key")));
}

#[tokio::test]
async fn scenario_6_relevance_decays_by_half_after_one_half_life() {
    let clock = Arc::new(FixedClock::new(1_000));
    let client = client_with(clock.clone(), Arc::new(AlwaysEns("author.eth".to_string())));
    let session = client.create_anonymous_delegation(&mut rand_core::OsRng).unwrap();
    let author = Author::Anonymous(session);
    let cb = || {};

    let post = client
        .create_post(author, true, Uuid::new_v4(), "t".to_string(), "b".to_string(), &cb)
        .await
        .unwrap();

    let fresh = client
        .relevance_score(post.id, Timestamp(1_000), |_| VerificationStatus::Anonymous)
        .unwrap();
    let half_life_later = client
        .relevance_score(post.id, Timestamp(1_000 + 7 * 86_400_000), |_| VerificationStatus::Anonymous)
        .unwrap();

    assert!((half_life_later - fresh / 2.0).abs() < 1e-6);
}

#[tokio::test]
async fn update_profile_without_a_delegation_is_unauthenticated() {
    let clock = Arc::new(FixedClock::new(1_000));
    let client = client_with(clock.clone(), Arc::new(NoEns));
    let wallet = Address([3u8; 20]);

    let result = client.update_profile(Author::Wallet(wallet), Some("cap".to_string()), DisplayPreference::CallSign);
    assert!(matches!(result, Err(ActionError::Unauthenticated)));
}

#[tokio::test]
async fn bookmark_and_follow_are_local_only_and_survive_a_replica_read() {
    let clock = Arc::new(FixedClock::new(1_000));
    let client = client_with(clock.clone(), Arc::new(NoEns));
    let session = client.create_anonymous_delegation(&mut rand_core::OsRng).unwrap();
    let author = Author::Anonymous(session);
    let cb = || {};

    let post = client
        .create_post(author, true, Uuid::new_v4(), "t".to_string(), "b".to_string(), &cb)
        .await
        .unwrap();
    let stored = client.replica().post(post.id).unwrap();

    client.bookmark_post(author, &stored).unwrap();
    assert_eq!(client.bookmarks_for(&author).len(), 1);

    let followed = Address([9u8; 20]);
    client.follow(author, followed).unwrap();
    assert_eq!(client.following_for(&author).len(), 1);
}
