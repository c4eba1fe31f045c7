//! Client facade (C10, §4.10): wires the durable store, replica, delegation
//! manager, identity resolver, and transport adapter into one object so callers
//! never reach into the replica or delegation manager directly — the same
//! single-facade habit the teacher uses for `Facilitator`/`FacilitatorLocal`.

use std::sync::Arc;

use uuid::Uuid;

use crate::actions::{self, ActionContext, OnCacheUpdated};
use crate::config::EngineConfig;
use crate::delegation::{DelegationDuration, DelegationManager, DelegationStatus, DelegationStore, WalletSigner};
use crate::error::{ActionError, EngineError};
use crate::identity::{IdentityResolver, NameLookup};
use crate::ids::{Address, Author};
use crate::message::{DisplayPreference, Envelope, ModerationAction, TargetKind};
use crate::replica::{
    Bookmark, EnhancedCell, EnhancedPost, Following, Replica, StoredComment, StoredModeration, StoredPost,
    UserIdentity, VerificationStatus,
};
use crate::scoring::{relevance_score, ScoringInput};
use crate::store::DurableStore;
use crate::timestamp::{Clock, Timestamp};
use crate::transport::Transport;

/// The running engine: every component named in §2, owned as one unit with an
/// explicit `open`/`close` lifecycle (§4.10).
pub struct Client {
    config: EngineConfig,
    durable: DurableStore,
    replica: Arc<Replica>,
    delegation: DelegationManager,
    identity: IdentityResolver,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl Client {
    /// Opens `durable_store`, hydrates the replica from it, and registers the
    /// replica's `apply_message` as the transport's receive sink, so messages
    /// arriving from peers are applied without any action on the caller's part.
    pub fn open(
        config: EngineConfig,
        durable_store: DurableStore,
        transport: Arc<dyn Transport>,
        name_lookup: Arc<dyn NameLookup>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let replica = Arc::new(Replica::open(durable_store.clone(), config.limits())?);
        let delegation = DelegationManager::new(DelegationStore::new(durable_store.clone()));
        let identity = IdentityResolver::new(
            replica.clone(),
            name_lookup,
            clock.clone(),
            config.identity_cache_freshness_ms,
        );

        let sink_replica = replica.clone();
        let sink_clock = clock.clone();
        transport.on_receive(Box::new(move |envelope: Envelope| {
            let now = sink_clock.now();
            let _ = sink_replica.apply_message(envelope, now);
        }));

        Ok(Client {
            config,
            durable: durable_store,
            replica,
            delegation,
            identity,
            transport,
            clock,
        })
    }

    /// Flushes the durable store. Does not clear any persisted data; the
    /// transport registration is simply dropped along with `self`.
    pub fn close(self) -> Result<(), EngineError> {
        self.durable.flush()?;
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    fn action_context<'a>(&'a self, current_user: Author, is_authenticated: bool) -> ActionContext<'a> {
        ActionContext {
            current_user,
            is_authenticated,
            replica: &self.replica,
            delegation: &self.delegation,
            transport: self.transport.as_ref(),
        }
    }

    // -- Delegation manager (C3) --------------------------------------------

    pub async fn create_wallet_delegation(
        &self,
        wallet_address: Address,
        signer: &dyn WalletSigner,
        rng: &mut (impl rand_core::RngCore + rand_core::CryptoRng),
    ) -> Result<(), EngineError> {
        self.delegation
            .create_wallet_delegation(
                wallet_address,
                DelegationDuration::SevenDays,
                self.clock.now(),
                signer,
                rng,
            )
            .await?;
        Ok(())
    }

    pub fn create_anonymous_delegation(
        &self,
        rng: &mut (impl rand_core::RngCore + rand_core::CryptoRng),
    ) -> Result<Uuid, EngineError> {
        Ok(self
            .delegation
            .create_anonymous_delegation(DelegationDuration::ThirtyDays, self.clock.now(), rng)?)
    }

    pub fn clear_delegation(&self) -> Result<(), EngineError> {
        Ok(self.delegation.clear()?)
    }

    pub fn delegation_status(&self) -> Result<DelegationStatus, EngineError> {
        Ok(self.delegation.status(self.clock.now())?)
    }

    // -- Identity resolver (C6) ----------------------------------------------

    pub async fn identity(&self, author: Author, fresh: bool) -> UserIdentity {
        self.identity.get(author, fresh).await
    }

    pub async fn own_identity(&self, address: Address, fresh: bool) -> UserIdentity {
        self.identity.get_own(address, fresh).await
    }

    pub fn update_profile(
        &self,
        author: Author,
        call_sign: Option<String>,
        display_preference: DisplayPreference,
    ) -> Result<Envelope, ActionError> {
        self.identity.update_profile(
            &self.delegation,
            author,
            Uuid::new_v4(),
            self.clock.now(),
            call_sign,
            display_preference,
        )
    }

    // -- Forum actions (C7) ---------------------------------------------------

    pub async fn create_cell(
        &self,
        current_user: Author,
        is_authenticated: bool,
        author_verification: VerificationStatus,
        name: String,
        description: String,
        icon: Option<String>,
        on_cache_updated: OnCacheUpdated<'_>,
    ) -> Result<Envelope, ActionError> {
        let ctx = self.action_context(current_user, is_authenticated);
        actions::create_cell(&ctx, author_verification, self.clock.now(), name, description, icon, on_cache_updated)
            .await
    }

    pub async fn create_post(
        &self,
        current_user: Author,
        is_authenticated: bool,
        cell_id: Uuid,
        title: String,
        body: String,
        on_cache_updated: OnCacheUpdated<'_>,
    ) -> Result<Envelope, ActionError> {
        let ctx = self.action_context(current_user, is_authenticated);
        actions::create_post(&ctx, self.clock.now(), cell_id, title, body, on_cache_updated).await
    }

    pub async fn create_comment(
        &self,
        current_user: Author,
        is_authenticated: bool,
        post_id: Uuid,
        body: String,
        on_cache_updated: OnCacheUpdated<'_>,
    ) -> Result<Envelope, ActionError> {
        let ctx = self.action_context(current_user, is_authenticated);
        actions::create_comment(&ctx, self.clock.now(), post_id, body, on_cache_updated).await
    }

    pub async fn vote(
        &self,
        current_user: Author,
        is_authenticated: bool,
        target_id: Uuid,
        value: i8,
        on_cache_updated: OnCacheUpdated<'_>,
    ) -> Result<Envelope, ActionError> {
        let ctx = self.action_context(current_user, is_authenticated);
        actions::vote(&ctx, self.clock.now(), target_id, value, on_cache_updated).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn moderate(
        &self,
        current_user: Author,
        is_authenticated: bool,
        action: ModerationAction,
        cell_id: Uuid,
        target_kind: TargetKind,
        target_id: Uuid,
        reason: Option<String>,
        on_cache_updated: OnCacheUpdated<'_>,
    ) -> Result<Envelope, ActionError> {
        let ctx = self.action_context(current_user, is_authenticated);
        actions::moderate(&ctx, self.clock.now(), action, cell_id, target_kind, target_id, reason, on_cache_updated)
            .await
    }

    pub fn bookmark_post(&self, user_id: Author, post: &StoredPost) -> Result<(), ActionError> {
        actions::bookmark_post(&self.replica, user_id, self.clock.now(), post)
    }

    pub fn bookmark_comment(&self, user_id: Author, comment: &StoredComment) -> Result<(), ActionError> {
        actions::bookmark_comment(&self.replica, user_id, self.clock.now(), comment)
    }

    pub fn remove_bookmark(&self, target_kind: TargetKind, target_id: Uuid) -> Result<(), ActionError> {
        actions::remove_bookmark(&self.replica, target_kind, target_id)
    }

    pub fn bookmarks_for(&self, user_id: &Author) -> Vec<Bookmark> {
        self.replica.bookmarks_for(user_id)
    }

    pub fn follow(&self, user_id: Author, followed_address: Address) -> Result<(), ActionError> {
        actions::follow(&self.replica, user_id, followed_address, self.clock.now())
    }

    pub fn unfollow(&self, user_id: Author, followed_address: Address) -> Result<(), ActionError> {
        actions::unfollow(&self.replica, user_id, followed_address)
    }

    pub fn following_for(&self, user_id: &Author) -> Vec<Following> {
        self.replica.following_for(user_id)
    }

    // -- Relevance scorer (C8) -------------------------------------------------

    /// Scores `post_id` per §4.7, or `None` if the post is unknown.
    pub fn relevance_score(
        &self,
        post_id: Uuid,
        now: Timestamp,
        verification_of: impl Fn(Author) -> VerificationStatus,
    ) -> Option<f64> {
        let post = self.replica.post(post_id)?;
        let votes = self.replica.votes_on(post_id);
        let comments = self.replica.comments_on_post(post_id);
        let moderation = self.moderation_for_post(&post);
        let input = ScoringInput {
            post: &post,
            votes: &votes,
            comments: &comments,
            moderation: moderation.as_ref(),
        };
        Some(relevance_score(&input, now, verification_of))
    }

    fn moderation_for_post(&self, post: &StoredPost) -> Option<StoredModeration> {
        self.replica
            .moderation_in_effect(post.cell_id, TargetKind::Post, post.id)
    }

    /// Assembles the `EnhancedPost` read model for `post_id`, or `None` if the
    /// post is unknown.
    pub fn enhanced_post(
        &self,
        post_id: Uuid,
        now: Timestamp,
        verification_of: impl Fn(Author) -> VerificationStatus,
    ) -> Option<EnhancedPost> {
        let post = self.replica.post(post_id)?;
        let votes = self.replica.votes_on(post_id);
        let comments = self.replica.comments_on_post(post_id);
        let moderation = self.moderation_for_post(&post);
        Some(crate::scoring::enhanced_post(
            &post,
            &votes,
            &comments,
            moderation.as_ref(),
            now,
            verification_of,
        ))
    }

    /// Assembles the `EnhancedCell` read model for `cell_id`, or `None` if the
    /// cell is unknown.
    pub fn enhanced_cell(&self, cell_id: Uuid, now: Timestamp) -> Option<EnhancedCell> {
        self.replica.enhanced_cell(cell_id, now)
    }

    pub fn is_transport_ready(&self) -> bool {
        self.transport.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ResolvedName;
    use crate::transport::test_support::MemoryTransport;

    struct NoNames;

    #[async_trait::async_trait]
    impl NameLookup for NoNames {
        async fn resolve(&self, _address: Address) -> Result<ResolvedName, String> {
            Ok(ResolvedName::default())
        }
    }

    struct FixedClock(u64);
    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp(self.0)
        }
    }

    fn client() -> Client {
        Client::open(
            EngineConfig::default(),
            DurableStore::temporary().unwrap(),
            Arc::new(MemoryTransport::new(true)),
            Arc::new(NoNames),
            Arc::new(FixedClock(1_000)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn open_registers_the_replicas_apply_message_as_the_receive_sink() {
        let client = client();
        let session = client
            .create_anonymous_delegation(&mut rand_core::OsRng)
            .unwrap();
        let author = Author::Anonymous(session);
        let cb = || {};

        let envelope = client
            .create_post(author, true, Uuid::new_v4(), "Hi".to_string(), "World".to_string(), &cb)
            .await
            .unwrap();

        assert!(client.replica().post(envelope.id).is_some());
    }

    #[tokio::test]
    async fn unauthenticated_post_is_rejected() {
        let client = client();
        let cb = || {};
        let result = client
            .create_post(
                Author::Anonymous(Uuid::new_v4()),
                false,
                Uuid::new_v4(),
                "Hi".to_string(),
                "World".to_string(),
                &cb,
            )
            .await;
        assert!(matches!(result, Err(ActionError::Unauthenticated)));
    }

    #[tokio::test]
    async fn relevance_score_of_an_unknown_post_is_none() {
        let client = client();
        assert!(client
            .relevance_score(Uuid::new_v4(), Timestamp(1_000), |_| VerificationStatus::Anonymous)
            .is_none());
    }

    #[test]
    fn close_flushes_the_durable_store() {
        let client = client();
        assert!(client.close().is_ok());
    }
}
