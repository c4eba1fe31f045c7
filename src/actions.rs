//! Forum actions (C7, §4.6): the pre-send permission matrix, message assembly,
//! signing, local application, and transport emission. Each action is a function
//! of `(inputs, current_user, is_authenticated)`, as named in the specification;
//! here that shape is the `ActionContext` the caller assembles once per call.

use uuid::Uuid;

use crate::delegation::DelegationManager;
use crate::error::ActionError;
use crate::ids::Author;
use crate::message::{DisplayPreference, Envelope, ModerationAction, Payload, TargetKind};
use crate::replica::{Bookmark, Following, Replica, VerificationStatus};
use crate::timestamp::Timestamp;
use crate::transport::{SendStatus, Transport};

/// The calling context every action is a function of (§4.6): who is asking, and
/// whether they are currently authenticated.
pub struct ActionContext<'a> {
    pub current_user: Author,
    pub is_authenticated: bool,
    pub replica: &'a Replica,
    pub delegation: &'a DelegationManager,
    pub transport: &'a dyn Transport,
}

/// Invoked once an action has been applied locally, mirroring the
/// caller-supplied `on_cache_updated` callback named in §4.6.
pub type OnCacheUpdated<'a> = &'a (dyn Fn() + Sync);

async fn assemble_sign_apply_send(
    ctx: &ActionContext<'_>,
    payload: Payload,
    now: Timestamp,
    on_cache_updated: OnCacheUpdated<'_>,
) -> Result<Envelope, ActionError> {
    let id = Uuid::new_v4();
    let unsigned = Envelope::unsigned(id, now, ctx.current_user, payload);
    let signed = ctx.delegation.sign(unsigned, now).map_err(|err| match err {
        crate::error::DelegationError::NoActiveDelegation => ActionError::Unauthenticated,
        crate::error::DelegationError::Expired => ActionError::DelegationExpired,
        other => ActionError::Replica(crate::error::ReplicaError::Rejected(
            crate::message::validate::ValidationReport {
                errors: vec![other.to_string()],
                ..Default::default()
            },
        )),
    })?;

    match ctx.replica.apply_message(signed.clone(), now) {
        crate::replica::ApplyOutcome::Accepted => {}
        crate::replica::ApplyOutcome::Duplicate => {}
        crate::replica::ApplyOutcome::Rejected { reasons } => {
            return Err(ActionError::Replica(crate::error::ReplicaError::Rejected(
                crate::message::validate::ValidationReport {
                    errors: reasons,
                    ..Default::default()
                },
            )));
        }
    }

    ctx.replica.mark_pending(signed.id);
    on_cache_updated();

    let (tx, rx) = tokio::sync::oneshot::channel();
    ctx.transport
        .send(signed.clone(), Some(Box::new(move |status| {
            let _ = tx.send(status);
        })))
        .await;

    // The message is already durable locally; a transport failure only means it
    // stays marked pending for the host to retry sending later (§4.4).
    match rx.await {
        Ok(SendStatus::Delivered) => {
            ctx.replica.clear_pending(signed.id);
            tracing::info!(id = %signed.id, "message delivered");
            Ok(signed)
        }
        Ok(SendStatus::Failed) => {
            tracing::warn!(id = %signed.id, "transport reported send failure; message remains pending");
            Err(ActionError::TransportUnavailable)
        }
        Err(_) => {
            tracing::warn!(id = %signed.id, "transport dropped the status callback without reporting; message remains pending");
            Err(ActionError::TransportUnavailable)
        }
    }
}

/// `createCell` (§4.6): requires `verification_status = EnsVerified`.
pub async fn create_cell(
    ctx: &ActionContext<'_>,
    author_verification: VerificationStatus,
    now: Timestamp,
    name: String,
    description: String,
    icon: Option<String>,
    on_cache_updated: OnCacheUpdated<'_>,
) -> Result<Envelope, ActionError> {
    if author_verification != VerificationStatus::EnsVerified {
        return Err(ActionError::PermissionDenied);
    }
    assemble_sign_apply_send(
        ctx,
        Payload::Cell {
            name,
            description,
            icon,
        },
        now,
        on_cache_updated,
    )
    .await
}

/// `createPost` (§4.6): requires authentication, wallet or anonymous.
pub async fn create_post(
    ctx: &ActionContext<'_>,
    now: Timestamp,
    cell_id: Uuid,
    title: String,
    body: String,
    on_cache_updated: OnCacheUpdated<'_>,
) -> Result<Envelope, ActionError> {
    require_authenticated(ctx)?;
    assemble_sign_apply_send(
        ctx,
        Payload::Post {
            cell_id,
            title,
            body,
        },
        now,
        on_cache_updated,
    )
    .await
}

/// `createComment` (§4.6): requires authentication.
pub async fn create_comment(
    ctx: &ActionContext<'_>,
    now: Timestamp,
    post_id: Uuid,
    body: String,
    on_cache_updated: OnCacheUpdated<'_>,
) -> Result<Envelope, ActionError> {
    require_authenticated(ctx)?;
    assemble_sign_apply_send(ctx, Payload::Comment { post_id, body }, now, on_cache_updated).await
}

/// `vote` (§4.6): requires authentication, and `target_id` must resolve to a post
/// or comment already in the replica.
pub async fn vote(
    ctx: &ActionContext<'_>,
    now: Timestamp,
    target_id: Uuid,
    value: i8,
    on_cache_updated: OnCacheUpdated<'_>,
) -> Result<Envelope, ActionError> {
    require_authenticated(ctx)?;
    if ctx.replica.post(target_id).is_none() && ctx.replica.comment(target_id).is_none() {
        return Err(ActionError::UnknownTarget);
    }
    assemble_sign_apply_send(ctx, Payload::Vote { target_id, value }, now, on_cache_updated).await
}

/// `moderate`/`unmoderate` (§4.6): the caller must be the author of the named
/// cell. The cell's own author is the only moderator — there is no separate
/// moderator list.
pub async fn moderate(
    ctx: &ActionContext<'_>,
    now: Timestamp,
    action: ModerationAction,
    cell_id: Uuid,
    target_kind: TargetKind,
    target_id: Uuid,
    reason: Option<String>,
    on_cache_updated: OnCacheUpdated<'_>,
) -> Result<Envelope, ActionError> {
    require_authenticated(ctx)?;
    let cell = ctx.replica.cell(cell_id).ok_or(ActionError::UnknownTarget)?;
    if cell.author != ctx.current_user {
        return Err(ActionError::PermissionDenied);
    }
    assemble_sign_apply_send(
        ctx,
        Payload::Moderate {
            action,
            target_kind,
            target_id,
            cell_id,
            reason,
        },
        now,
        on_cache_updated,
    )
    .await
}

/// `profile update` (§4.6): requires authentication.
pub async fn update_profile(
    ctx: &ActionContext<'_>,
    now: Timestamp,
    call_sign: Option<String>,
    display_preference: DisplayPreference,
    on_cache_updated: OnCacheUpdated<'_>,
) -> Result<Envelope, ActionError> {
    require_authenticated(ctx)?;
    assemble_sign_apply_send(
        ctx,
        Payload::ProfileUpdate {
            call_sign,
            display_preference,
        },
        now,
        on_cache_updated,
    )
    .await
}

fn require_authenticated(ctx: &ActionContext<'_>) -> Result<(), ActionError> {
    if !ctx.is_authenticated {
        return Err(ActionError::Unauthenticated);
    }
    Ok(())
}

// -- Bookmarks & following (§4.7 [NEW]): local-only, never signed or sent ------

pub fn bookmark_post(
    replica: &Replica,
    user_id: Author,
    now: Timestamp,
    post: &crate::replica::StoredPost,
) -> Result<(), ActionError> {
    replica
        .bookmark(Bookmark {
            id: Bookmark::key(TargetKind::Post, post.id),
            user_id,
            created_at_ms: now,
            target_kind: TargetKind::Post,
            target_id: post.id,
            title: Some(post.title.clone()),
            author: Some(post.author),
            cell_id: Some(post.cell_id),
        })
        .map_err(ActionError::from)
}

pub fn bookmark_comment(
    replica: &Replica,
    user_id: Author,
    now: Timestamp,
    comment: &crate::replica::StoredComment,
) -> Result<(), ActionError> {
    replica
        .bookmark(Bookmark {
            id: Bookmark::key(TargetKind::Comment, comment.id),
            user_id,
            created_at_ms: now,
            target_kind: TargetKind::Comment,
            target_id: comment.id,
            title: None,
            author: Some(comment.author),
            cell_id: None,
        })
        .map_err(ActionError::from)
}

pub fn remove_bookmark(
    replica: &Replica,
    target_kind: TargetKind,
    target_id: Uuid,
) -> Result<(), ActionError> {
    let key = Bookmark::key(target_kind, target_id);
    replica.remove_bookmark(&key).map_err(ActionError::from)
}

pub fn follow(
    replica: &Replica,
    user_id: Author,
    followed_address: crate::ids::Address,
    now: Timestamp,
) -> Result<(), ActionError> {
    replica
        .follow(Following {
            id: Following::key(&user_id, followed_address),
            user_id,
            followed_address,
            followed_at_ms: now,
        })
        .map_err(ActionError::from)
}

pub fn unfollow(
    replica: &Replica,
    user_id: Author,
    followed_address: crate::ids::Address,
) -> Result<(), ActionError> {
    let key = Following::key(&user_id, followed_address);
    replica.unfollow(&key).map_err(ActionError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::{DelegationDuration, DelegationManager, DelegationStore};
    use crate::message::validate::Limits;
    use crate::store::DurableStore;
    use crate::transport::test_support::MemoryTransport;

    fn anon_ctx(
        durable: DurableStore,
        now: Timestamp,
    ) -> (Replica, DelegationManager, Author) {
        let replica = Replica::open(durable.clone(), Limits::default()).unwrap();
        let delegation = DelegationManager::new(DelegationStore::new(durable));
        let session = delegation
            .create_anonymous_delegation(DelegationDuration::ThirtyDays, now, &mut rand_core::OsRng)
            .unwrap();
        (replica, delegation, Author::Anonymous(session))
    }

    #[tokio::test]
    async fn create_post_applies_locally_and_sends() {
        let durable = DurableStore::temporary().unwrap();
        let now = Timestamp(1_000);
        let (replica, delegation, author) = anon_ctx(durable, now);
        let transport = MemoryTransport::new(true);
        let ctx = ActionContext {
            current_user: author,
            is_authenticated: true,
            replica: &replica,
            delegation: &delegation,
            transport: &transport,
        };
        let cb = || {};

        let envelope = create_post(
            &ctx,
            now,
            Uuid::new_v4(),
            "Hi".to_string(),
            "World".to_string(),
            &cb,
        )
        .await
        .unwrap();

        assert!(replica.post(envelope.id).is_some());
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_cell_requires_ens_verification() {
        let durable = DurableStore::temporary().unwrap();
        let now = Timestamp(1_000);
        let (replica, delegation, author) = anon_ctx(durable, now);
        let transport = MemoryTransport::new(true);
        let ctx = ActionContext {
            current_user: author,
            is_authenticated: true,
            replica: &replica,
            delegation: &delegation,
            transport: &transport,
        };
        let cb = || {};

        let result = create_cell(
            &ctx,
            VerificationStatus::WalletUnconnected,
            now,
            "General".to_string(),
            "General discussion".to_string(),
            None,
            &cb,
        )
        .await;
        assert!(matches!(result, Err(ActionError::PermissionDenied)));
    }

    #[tokio::test]
    async fn vote_requires_a_known_target() {
        let durable = DurableStore::temporary().unwrap();
        let now = Timestamp(1_000);
        let (replica, delegation, author) = anon_ctx(durable, now);
        let transport = MemoryTransport::new(true);
        let ctx = ActionContext {
            current_user: author,
            is_authenticated: true,
            replica: &replica,
            delegation: &delegation,
            transport: &transport,
        };
        let cb = || {};

        let result = vote(&ctx, now, Uuid::new_v4(), 1, &cb).await;
        assert!(matches!(result, Err(ActionError::UnknownTarget)));
    }

    #[tokio::test]
    async fn moderate_requires_cell_authorship() {
        let durable = DurableStore::temporary().unwrap();
        let now = Timestamp(1_000);
        let (replica, delegation, author) = anon_ctx(durable, now);
        let transport = MemoryTransport::new(true);
        let ctx = ActionContext {
            current_user: author,
            is_authenticated: true,
            replica: &replica,
            delegation: &delegation,
            transport: &transport,
        };
        let cb = || {};

        let cell = create_cell(
            &ctx,
            VerificationStatus::EnsVerified,
            now,
            "General".to_string(),
            "General discussion".to_string(),
            None,
            &cb,
        )
        .await;
        // An anonymous author can never be EnsVerified in practice, but this
        // action only checks the flag passed in, so the cell is created for the
        // purpose of exercising the moderation authorship check below.
        let cell_id = cell.unwrap().id;

        let other_durable = DurableStore::temporary().unwrap();
        let (_, _, other_author) = anon_ctx(other_durable, now);
        let other_ctx = ActionContext {
            current_user: other_author,
            is_authenticated: true,
            replica: &replica,
            delegation: &delegation,
            transport: &transport,
        };

        let result = moderate(
            &other_ctx,
            now,
            ModerationAction::Moderate,
            cell_id,
            TargetKind::Post,
            Uuid::new_v4(),
            None,
            &cb,
        )
        .await;
        assert!(matches!(result, Err(ActionError::PermissionDenied)));
    }

    #[test]
    fn bookmark_then_remove_roundtrips() {
        let durable = DurableStore::temporary().unwrap();
        let now = Timestamp(1_000);
        let (replica, _delegation, author) = anon_ctx(durable, now);
        let post = crate::replica::StoredPost {
            id: Uuid::new_v4(),
            author,
            timestamp: now,
            cell_id: Uuid::new_v4(),
            title: "t".to_string(),
            body: "b".to_string(),
        };

        bookmark_post(&replica, author, now, &post).unwrap();
        assert_eq!(replica.bookmarks_for(&author).len(), 1);

        remove_bookmark(&replica, TargetKind::Post, post.id).unwrap();
        assert_eq!(replica.bookmarks_for(&author).len(), 0);
    }

    #[test]
    fn follow_then_unfollow_roundtrips() {
        let durable = DurableStore::temporary().unwrap();
        let now = Timestamp(1_000);
        let (replica, _delegation, author) = anon_ctx(durable, now);
        let followed = crate::ids::Address([9u8; 20]);

        follow(&replica, author, followed, now).unwrap();
        assert_eq!(replica.following_for(&author).len(), 1);

        unfollow(&replica, author, followed).unwrap();
        assert_eq!(replica.following_for(&author).len(), 0);
    }
}
