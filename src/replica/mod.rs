//! Local replica (C5, §4.4): in-memory indexes over accepted messages, backed by the
//! durable store. The sole entry point for incoming network/local messages is
//! [`Replica::apply_message`].

pub mod types;

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::crypto;
use crate::delegation::DelegationManager;
use crate::error::ReplicaError;
use crate::ids::{Address, Author};
use crate::message::payload::Payload;
use crate::message::validate::{self, Limits};
use crate::message::{Envelope, MessageKind};
use crate::store::{DurableStore, trees};
use crate::timestamp::Timestamp;

pub use types::*;

/// The local replica: every in-memory index named in §4.4, plus the durable store that
/// backs them. `&self` methods throughout — `DashMap` gives us the concurrent-safe
/// interior mutability the single-threaded cooperative model (§5) doesn't strictly
/// require but an async host naturally wants at `await` points.
pub struct Replica {
    durable: DurableStore,
    limits: Limits,

    cells: DashMap<Uuid, StoredCell>,
    posts: DashMap<Uuid, StoredPost>,
    posts_by_cell: DashMap<Uuid, Vec<Uuid>>,
    comments: DashMap<Uuid, StoredComment>,
    comments_by_post: DashMap<Uuid, Vec<Uuid>>,
    votes: DashMap<(Uuid, Author), StoredVote>,
    moderations: DashMap<(Uuid, crate::message::TargetKind, Uuid), StoredModeration>,
    profile_updates: DashMap<Uuid, StoredProfileUpdate>,
    latest_profile_by_author: DashMap<Author, Uuid>,
    identities: DashMap<Address, UserIdentity>,
    bookmarks: DashMap<String, Bookmark>,
    following: DashMap<String, Following>,
    seen: DashMap<(MessageKind, Uuid, Timestamp), ()>,
    pending: DashMap<Uuid, ()>,
    last_sync_ms: AtomicU64,
}

impl Replica {
    /// Opens `durable` and hydrates every in-memory index from it, one tree at a time
    /// (§4.4 "hydrates indexes from the durable store"; sequential rather than
    /// concurrent, per the single-threaded scheduling model in §5).
    pub fn open(durable: DurableStore, limits: Limits) -> Result<Self, ReplicaError> {
        let replica = Replica {
            durable,
            limits,
            cells: DashMap::new(),
            posts: DashMap::new(),
            posts_by_cell: DashMap::new(),
            comments: DashMap::new(),
            comments_by_post: DashMap::new(),
            votes: DashMap::new(),
            moderations: DashMap::new(),
            profile_updates: DashMap::new(),
            latest_profile_by_author: DashMap::new(),
            identities: DashMap::new(),
            bookmarks: DashMap::new(),
            following: DashMap::new(),
            seen: DashMap::new(),
            pending: DashMap::new(),
            last_sync_ms: AtomicU64::new(0),
        };
        replica.hydrate()?;
        Ok(replica)
    }

    fn hydrate(&self) -> Result<(), ReplicaError> {
        for cell in self.durable.iter_all::<StoredCell>(trees::CELLS)? {
            self.index_cell(cell);
        }
        for post in self.durable.iter_all::<StoredPost>(trees::POSTS)? {
            self.index_post(post);
        }
        for comment in self.durable.iter_all::<StoredComment>(trees::COMMENTS)? {
            self.index_comment(comment);
        }
        for vote in self.durable.iter_all::<StoredVote>(trees::VOTES)? {
            self.votes.insert((vote.target_id, vote.author), vote);
        }
        for moderation in self.durable.iter_all::<StoredModeration>(trees::MODERATIONS)? {
            self.moderations.insert(
                (moderation.cell_id, moderation.target_kind, moderation.target_id),
                moderation,
            );
        }
        for identity in self.durable.iter_all::<UserIdentity>(trees::IDENTITIES)? {
            self.identities.insert(identity.address, identity);
        }
        for profile in self.durable.iter_all::<StoredProfileUpdate>(trees::PROFILES)? {
            self.index_profile_update(profile);
        }
        for bookmark in self.durable.iter_all::<Bookmark>(trees::BOOKMARKS)? {
            self.bookmarks.insert(bookmark.id.clone(), bookmark);
        }
        for following in self.durable.iter_all::<Following>(trees::FOLLOWING)? {
            self.following.insert(following.id.clone(), following);
        }
        for key in self
            .durable
            .iter_all::<(MessageKind, Uuid, Timestamp)>(trees::SEEN)?
        {
            self.seen.insert(key, ());
        }
        Ok(())
    }

    fn index_cell(&self, cell: StoredCell) {
        self.cells.insert(cell.id, cell);
    }

    fn index_post(&self, post: StoredPost) {
        self.posts_by_cell.entry(post.cell_id).or_default().push(post.id);
        self.posts.insert(post.id, post);
    }

    fn index_comment(&self, comment: StoredComment) {
        let mut by_post = self.comments_by_post.entry(comment.post_id).or_default();
        let pos = by_post
            .binary_search_by_key(&comment.timestamp, |id| {
                self.comments.get(id).map(|c| c.timestamp).unwrap_or(Timestamp::ZERO)
            })
            .unwrap_or_else(|i| i);
        by_post.insert(pos, comment.id);
        drop(by_post);
        self.comments.insert(comment.id, comment);
    }

    /// Indexes a single `StoredProfileUpdate`, updating `latest_profile_by_author`
    /// only if it wins the `(timestamp, id)` tie-break over the current latest —
    /// the same total order `update_index`'s vote/moderation branches use, so
    /// replaying records in arbitrary order (as `hydrate` does) converges on the
    /// same winner every time.
    fn index_profile_update(&self, profile: StoredProfileUpdate) {
        let wins = match self
            .latest_profile_by_author
            .get(&profile.author)
            .and_then(|latest_id| self.profile_updates.get(&*latest_id).map(|p| (p.timestamp, p.id)))
        {
            None => true,
            Some(existing) => (profile.timestamp, profile.id) > existing,
        };
        if wins {
            self.latest_profile_by_author.insert(profile.author, profile.id);
        }
        self.profile_updates.insert(profile.id, profile);
    }

    /// Stable durable key for a vote: one record per `(target, author)`, so a newer
    /// winner overwrites the previous one in the durable store instead of
    /// accumulating (§4.4, §8 convergence invariant — must survive a restart).
    fn vote_durable_key(target_id: Uuid, author: Author) -> Vec<u8> {
        format!("{target_id}:{author}").into_bytes()
    }

    /// Stable durable key for a moderation record: one per `(cell, target_kind,
    /// target)`, for the same reason as [`Self::vote_durable_key`].
    fn moderation_durable_key(cell_id: Uuid, target_kind: crate::message::TargetKind, target_id: Uuid) -> Vec<u8> {
        format!("{cell_id}:{target_kind:?}:{target_id}").into_bytes()
    }

    /// §4.4 `apply_message`: structural validation, cryptographic verification, dedup,
    /// index update, durable persist, `seen`/`pending` bookkeeping — atomically from
    /// the observer's perspective (§5 "Ordering guarantees").
    #[tracing::instrument(skip_all, fields(kind = ?envelope.kind(), id = %envelope.id))]
    pub fn apply_message(&self, envelope: Envelope, now: Timestamp) -> ApplyOutcome {
        let (sig_ok, sig_reasons) = DelegationManager::verify_with_reason(&envelope);
        let report = validate::validate(&envelope, &self.limits, now, Some(sig_ok));
        if !report.ok {
            let mut reasons = report.errors.clone();
            reasons.extend(sig_reasons);
            tracing::warn!(?reasons, "rejecting message");
            return ApplyOutcome::Rejected { reasons };
        }

        let dedup_key = envelope.dedup_key();
        if self.seen.contains_key(&dedup_key) {
            tracing::debug!("duplicate message");
            return ApplyOutcome::Duplicate;
        }

        self.update_index(&envelope);

        if let Err(err) = self.persist(&envelope) {
            tracing::warn!(?err, "durable store write failed; message applied in memory only");
        }

        self.seen.insert(dedup_key, ());
        self.last_sync_ms.fetch_max(envelope.timestamp.as_millis(), Ordering::SeqCst);
        tracing::info!("accepted message");
        ApplyOutcome::Accepted
    }

    fn update_index(&self, envelope: &Envelope) {
        let id = envelope.id;
        let author = envelope.author;
        let timestamp = envelope.timestamp;
        match &envelope.payload {
            Payload::Cell { name, description, icon } => {
                self.index_cell(StoredCell {
                    id,
                    author,
                    timestamp,
                    name: name.clone(),
                    description: description.clone(),
                    icon: icon.clone(),
                });
            }
            Payload::Post { cell_id, title, body } => {
                self.index_post(StoredPost {
                    id,
                    author,
                    timestamp,
                    cell_id: *cell_id,
                    title: title.clone(),
                    body: body.clone(),
                });
            }
            Payload::Comment { post_id, body } => {
                self.index_comment(StoredComment {
                    id,
                    author,
                    timestamp,
                    post_id: *post_id,
                    body: body.clone(),
                });
            }
            Payload::Vote { target_id, value } => {
                let key = (*target_id, author);
                let newer = match self.votes.get(&key) {
                    None => true,
                    Some(existing) => (timestamp, id) > (existing.timestamp, existing.id),
                };
                if newer {
                    self.votes.insert(
                        key,
                        StoredVote {
                            id,
                            author,
                            timestamp,
                            target_id: *target_id,
                            value: *value,
                        },
                    );
                }
            }
            Payload::Moderate {
                action,
                target_kind,
                target_id,
                cell_id,
                reason,
            } => {
                let key = (*cell_id, *target_kind, *target_id);
                let wins = match self.moderations.get(&key) {
                    None => true,
                    Some(existing) => {
                        (timestamp, id) > (existing.timestamp, existing.id)
                    }
                };
                if wins {
                    self.moderations.insert(
                        key,
                        StoredModeration {
                            id,
                            author,
                            timestamp,
                            cell_id: *cell_id,
                            action: *action,
                            target_kind: *target_kind,
                            target_id: *target_id,
                            reason: reason.clone(),
                        },
                    );
                }
            }
            Payload::ProfileUpdate { call_sign, display_preference } => {
                self.index_profile_update(StoredProfileUpdate {
                    id,
                    author,
                    timestamp,
                    call_sign: call_sign.clone(),
                    display_preference: *display_preference,
                });
            }
        }
    }

    fn persist(&self, envelope: &Envelope) -> Result<(), ReplicaError> {
        let id_key = envelope.id.as_bytes();
        match &envelope.payload {
            Payload::Cell { .. } => {
                self.durable.put(trees::CELLS, id_key, &self.cells.get(&envelope.id).unwrap().clone())?;
            }
            Payload::Post { .. } => {
                self.durable.put(trees::POSTS, id_key, &self.posts.get(&envelope.id).unwrap().clone())?;
            }
            Payload::Comment { .. } => {
                self.durable
                    .put(trees::COMMENTS, id_key, &self.comments.get(&envelope.id).unwrap().clone())?;
            }
            Payload::Vote { target_id, .. } => {
                if let Some(vote) = self.votes.get(&(*target_id, envelope.author)) {
                    let key = Self::vote_durable_key(*target_id, envelope.author);
                    self.durable.put(trees::VOTES, &key, &vote.clone())?;
                }
            }
            Payload::Moderate { cell_id, target_kind, target_id, .. } => {
                if let Some(m) = self.moderations.get(&(*cell_id, *target_kind, *target_id)) {
                    let key = Self::moderation_durable_key(*cell_id, *target_kind, *target_id);
                    self.durable.put(trees::MODERATIONS, &key, &m.clone())?;
                }
            }
            Payload::ProfileUpdate { .. } => {
                if let Some(p) = self.profile_updates.get(&envelope.id) {
                    self.durable.put(trees::PROFILES, p.id.as_bytes(), &p.clone())?;
                }
            }
        }
        self.durable
            .put(trees::SEEN, id_key, &envelope.dedup_key())?;
        Ok(())
    }

    // -- Reads -------------------------------------------------------------

    pub fn cell(&self, id: Uuid) -> Option<StoredCell> {
        self.cells.get(&id).map(|r| r.clone())
    }

    pub fn post(&self, id: Uuid) -> Option<StoredPost> {
        self.posts.get(&id).map(|r| r.clone())
    }

    pub fn comment(&self, id: Uuid) -> Option<StoredComment> {
        self.comments.get(&id).map(|r| r.clone())
    }

    pub fn posts_in_cell(&self, cell_id: Uuid) -> Vec<StoredPost> {
        self.posts_by_cell
            .get(&cell_id)
            .map(|ids| ids.iter().filter_map(|id| self.posts.get(id).map(|r| r.clone())).collect())
            .unwrap_or_default()
    }

    pub fn comments_on_post(&self, post_id: Uuid) -> Vec<StoredComment> {
        self.comments_by_post
            .get(&post_id)
            .map(|ids| ids.iter().filter_map(|id| self.comments.get(id).map(|r| r.clone())).collect())
            .unwrap_or_default()
    }

    pub fn votes_on(&self, target_id: Uuid) -> Vec<StoredVote> {
        self.votes
            .iter()
            .filter(|entry| entry.key().0 == target_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn moderation_in_effect(
        &self,
        cell_id: Uuid,
        target_kind: crate::message::TargetKind,
        target_id: Uuid,
    ) -> Option<StoredModeration> {
        self.moderations.get(&(cell_id, target_kind, target_id)).map(|r| r.clone())
    }

    /// Builds the `EnhancedCell` read model on demand (§3 "Derived entities"): post
    /// count, distinct authors across the cell's posts and comments, and activity
    /// within the last 7 days of `now`. Never stored — recomputed from the
    /// replica's own indexes on every call.
    pub fn enhanced_cell(&self, cell_id: Uuid, now: Timestamp) -> Option<EnhancedCell> {
        const RECENT_ACTIVITY_WINDOW_MS: u64 = 7 * 86_400_000;
        let cell = self.cell(cell_id)?;
        let posts = self.posts_in_cell(cell_id);
        let cutoff = now.as_millis().saturating_sub(RECENT_ACTIVITY_WINDOW_MS);

        let mut authors: BTreeSet<Author> = BTreeSet::new();
        let mut recent_activity_count = 0usize;
        for post in &posts {
            authors.insert(post.author);
            if post.timestamp.as_millis() >= cutoff {
                recent_activity_count += 1;
            }
            for comment in self.comments_on_post(post.id) {
                authors.insert(comment.author);
                if comment.timestamp.as_millis() >= cutoff {
                    recent_activity_count += 1;
                }
            }
        }

        Some(EnhancedCell {
            cell,
            post_count: posts.len(),
            active_author_count: authors.len(),
            recent_activity_count,
        })
    }

    pub fn identity(&self, address: Address) -> Option<UserIdentity> {
        self.identities.get(&address).map(|r| r.clone())
    }

    pub fn put_identity(&self, identity: UserIdentity) -> Result<(), ReplicaError> {
        self.durable.put(trees::IDENTITIES, identity.address.to_hex().as_bytes(), &identity)?;
        self.identities.insert(identity.address, identity);
        Ok(())
    }

    pub fn is_pending(&self, id: Uuid) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn mark_pending(&self, id: Uuid) {
        self.pending.insert(id, ());
    }

    pub fn clear_pending(&self, id: Uuid) {
        self.pending.remove(&id);
    }

    pub fn last_sync_ms(&self) -> Option<Timestamp> {
        let value = self.last_sync_ms.load(Ordering::SeqCst);
        if value == 0 { None } else { Some(Timestamp(value)) }
    }

    // -- Bookmarks & following (§4.7 [NEW], local-only) ---------------------

    pub fn bookmark(&self, bookmark: Bookmark) -> Result<(), ReplicaError> {
        self.durable.put(trees::BOOKMARKS, bookmark.id.as_bytes(), &bookmark)?;
        self.bookmarks.insert(bookmark.id.clone(), bookmark);
        Ok(())
    }

    pub fn remove_bookmark(&self, id: &str) -> Result<(), ReplicaError> {
        self.durable.remove(trees::BOOKMARKS, id.as_bytes())?;
        self.bookmarks.remove(id);
        Ok(())
    }

    pub fn bookmarks_for(&self, user_id: &Author) -> Vec<Bookmark> {
        self.bookmarks
            .iter()
            .filter(|entry| &entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn follow(&self, following: Following) -> Result<(), ReplicaError> {
        self.durable.put(trees::FOLLOWING, following.id.as_bytes(), &following)?;
        self.following.insert(following.id.clone(), following);
        Ok(())
    }

    pub fn unfollow(&self, id: &str) -> Result<(), ReplicaError> {
        self.durable.remove(trees::FOLLOWING, id.as_bytes())?;
        self.following.remove(id);
        Ok(())
    }

    pub fn following_for(&self, user_id: &Author) -> Vec<Following> {
        self.following
            .iter()
            .filter(|entry| &entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn flush(&self) -> Result<(), sled::Error> {
        self.durable.flush()
    }
}
