//! Identity resolver (C6, §4.5): resolves wallet addresses to display identity,
//! cached in the replica and refreshed through an injected name-lookup capability.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::delegation::DelegationManager;
use crate::error::{ActionError, DelegationError};
use crate::ids::{Address, Author};
use crate::message::{DisplayPreference, Envelope, Payload};
use crate::replica::{Replica, UserIdentity, VerificationStatus};
use crate::timestamp::{Clock, Timestamp};

/// Injected name-lookup capability (e.g. an ENS resolver). Implementations may be
/// slow or fail; both are surfaced to the resolver as ordinary `Result`s, the same
/// way a [`crate::delegation::WalletSigner`] surfaces wallet-signing failures.
#[async_trait::async_trait]
pub trait NameLookup: Send + Sync {
    async fn resolve(&self, address: Address) -> Result<ResolvedName, String>;
}

/// What a name lookup can tell us about an address. `None` for both fields means
/// the address has no primary name registered, not that the lookup failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedName {
    pub ens_name: Option<String>,
    pub ens_avatar: Option<String>,
}

/// How an address's wallet connection was observed when resolving its
/// [`VerificationStatus`]: whether it is the caller's own, currently delegated
/// wallet, or merely an address seen on some other message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalletLinkage {
    Connected,
    Unconnected,
}

/// Resolves addresses to [`UserIdentity`], backed by the replica's identity cache
/// (§4.4 `identities`) and refreshed via an injected [`NameLookup`] no more often
/// than the freshness window allows. Concurrent `get` calls for the same address
/// coalesce onto a single in-flight refresh via a per-address lock.
pub struct IdentityResolver {
    replica: Arc<Replica>,
    name_lookup: Arc<dyn NameLookup>,
    clock: Arc<dyn Clock>,
    freshness_ms: u64,
    refresh_locks: dashmap::DashMap<Address, Arc<Mutex<()>>>,
}

impl IdentityResolver {
    pub fn new(
        replica: Arc<Replica>,
        name_lookup: Arc<dyn NameLookup>,
        clock: Arc<dyn Clock>,
        freshness_ms: u64,
    ) -> Self {
        IdentityResolver {
            replica,
            name_lookup,
            clock,
            freshness_ms,
            refresh_locks: dashmap::DashMap::new(),
        }
    }

    /// Resolves an author to its display identity. Anonymous authors never touch
    /// the name-lookup capability: they resolve immediately to
    /// `verification_status = Anonymous` (§4.5).
    pub async fn get(&self, author: Author, fresh: bool) -> UserIdentity {
        let address = match author {
            Author::Anonymous(_) => return Self::anonymous_identity(self.clock.now()),
            Author::Wallet(address) => address,
        };
        self.get_address(address, fresh, WalletLinkage::Unconnected)
            .await
    }

    /// Like [`Self::get`], but marks `address` as the caller's own connected
    /// wallet when no ENS name is on record for it — the distinction between
    /// `WalletConnected` and `WalletUnconnected` in §3's verification-status
    /// enumeration.
    pub async fn get_own(&self, address: Address, fresh: bool) -> UserIdentity {
        self.get_address(address, fresh, WalletLinkage::Connected)
            .await
    }

    async fn get_address(
        &self,
        address: Address,
        fresh: bool,
        linkage: WalletLinkage,
    ) -> UserIdentity {
        let now = self.clock.now();
        if let Some(cached) = self.replica.identity(address) {
            let age_ms = now.as_millis().saturating_sub(cached.last_updated_ms.as_millis());
            if !fresh || age_ms <= self.freshness_ms {
                return cached;
            }
        }

        let lock = self
            .refresh_locks
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(cached) = self.replica.identity(address) {
            let age_ms = now.as_millis().saturating_sub(cached.last_updated_ms.as_millis());
            if age_ms <= self.freshness_ms {
                return cached;
            }
        }

        let resolved = self.name_lookup.resolve(address).await.unwrap_or_else(|err| {
            tracing::warn!(%address, %err, "name lookup failed; keeping identity unverified");
            ResolvedName::default()
        });

        let (call_sign, display_preference) = self
            .replica
            .identity(address)
            .map(|existing| (existing.call_sign, existing.display_preference))
            .unwrap_or((None, DisplayPreference::Address));

        let verification_status = match (&resolved.ens_name, linkage) {
            (Some(_), _) => VerificationStatus::EnsVerified,
            (None, WalletLinkage::Connected) => VerificationStatus::WalletConnected,
            (None, WalletLinkage::Unconnected) => VerificationStatus::WalletUnconnected,
        };

        let identity = UserIdentity {
            address,
            ens_name: resolved.ens_name,
            ens_avatar: resolved.ens_avatar,
            call_sign,
            display_preference,
            verification_status,
            last_updated_ms: now,
        };

        if let Err(err) = self.replica.put_identity(identity.clone()) {
            tracing::warn!(%address, %err, "failed to persist refreshed identity");
        }
        identity
    }

    fn anonymous_identity(now: Timestamp) -> UserIdentity {
        UserIdentity {
            address: Address([0u8; 20]),
            ens_name: None,
            ens_avatar: None,
            call_sign: None,
            display_preference: DisplayPreference::Address,
            verification_status: VerificationStatus::Anonymous,
            last_updated_ms: now,
        }
    }

    /// Constructs a ProfileUpdate message, signs it with the active delegation,
    /// applies it locally, and returns the signed envelope for the caller to send
    /// over the transport (§4.5 `update_profile`).
    pub fn update_profile(
        &self,
        delegation: &DelegationManager,
        author: Author,
        id: uuid::Uuid,
        now: Timestamp,
        call_sign: Option<String>,
        display_preference: DisplayPreference,
    ) -> Result<Envelope, ActionError> {
        let unsigned = Envelope::unsigned(
            id,
            now,
            author,
            Payload::ProfileUpdate {
                call_sign,
                display_preference,
            },
        );
        let signed = delegation.sign(unsigned, now).map_err(|err| match err {
            DelegationError::NoActiveDelegation => ActionError::Unauthenticated,
            DelegationError::Expired => ActionError::DelegationExpired,
            other => ActionError::Replica(crate::error::ReplicaError::Rejected(
                crate::message::validate::ValidationReport {
                    errors: vec![other.to_string()],
                    ..Default::default()
                },
            )),
        })?;

        match self.replica.apply_message(signed.clone(), now) {
            crate::replica::ApplyOutcome::Accepted | crate::replica::ApplyOutcome::Duplicate => {
                Ok(signed)
            }
            crate::replica::ApplyOutcome::Rejected { reasons } => Err(ActionError::Replica(
                crate::error::ReplicaError::Rejected(crate::message::validate::ValidationReport {
                    errors: reasons,
                    ..Default::default()
                }),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::validate::Limits;
    use crate::store::DurableStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedClock(u64);
    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp(self.0)
        }
    }

    struct CountingLookup {
        calls: AtomicU64,
        ens_name: Option<String>,
    }

    #[async_trait::async_trait]
    impl NameLookup for CountingLookup {
        async fn resolve(&self, _address: Address) -> Result<ResolvedName, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ResolvedName {
                ens_name: self.ens_name.clone(),
                ens_avatar: None,
            })
        }
    }

    fn resolver(
        ens_name: Option<String>,
        now_ms: u64,
        freshness_ms: u64,
    ) -> (IdentityResolver, Arc<CountingLookup>) {
        let replica = Arc::new(
            Replica::open(DurableStore::temporary().unwrap(), Limits::default()).unwrap(),
        );
        let lookup = Arc::new(CountingLookup {
            calls: AtomicU64::new(0),
            ens_name,
        });
        let clock = Arc::new(FixedClock(now_ms));
        let resolver = IdentityResolver::new(replica, lookup.clone(), clock, freshness_ms);
        (resolver, lookup)
    }

    fn addr() -> Address {
        Address([7u8; 20])
    }

    #[tokio::test]
    async fn anonymous_author_never_touches_name_lookup() {
        let (resolver, lookup) = resolver(Some("alice.eth".to_string()), 0, 300_000);
        let identity = resolver
            .get(Author::Anonymous(uuid::Uuid::new_v4()), true)
            .await;
        assert_eq!(identity.verification_status, VerificationStatus::Anonymous);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wallet_with_ens_name_resolves_to_ens_verified() {
        let (resolver, _lookup) = resolver(Some("alice.eth".to_string()), 0, 300_000);
        let identity = resolver.get(Author::Wallet(addr()), true).await;
        assert_eq!(identity.verification_status, VerificationStatus::EnsVerified);
        assert_eq!(identity.ens_name.as_deref(), Some("alice.eth"));
    }

    #[tokio::test]
    async fn wallet_without_ens_name_resolves_to_unconnected() {
        let (resolver, _lookup) = resolver(None, 0, 300_000);
        let identity = resolver.get(Author::Wallet(addr()), true).await;
        assert_eq!(identity.verification_status, VerificationStatus::WalletUnconnected);
    }

    #[tokio::test]
    async fn own_wallet_without_ens_name_resolves_to_connected() {
        let (resolver, _lookup) = resolver(None, 0, 300_000);
        let identity = resolver.get_own(addr(), true).await;
        assert_eq!(identity.verification_status, VerificationStatus::WalletConnected);
    }

    #[tokio::test]
    async fn a_second_get_within_the_freshness_window_does_not_refresh() {
        let (resolver, lookup) = resolver(Some("alice.eth".to_string()), 0, 300_000);
        resolver.get(Author::Wallet(addr()), true).await;
        resolver.get(Author::Wallet(addr()), true).await;
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_without_fresh_always_returns_the_cache_even_if_stale() {
        let (resolver, lookup) = resolver(Some("alice.eth".to_string()), 0, 1);
        resolver.get(Author::Wallet(addr()), true).await;
        resolver.get(Author::Wallet(addr()), false).await;
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }
}
