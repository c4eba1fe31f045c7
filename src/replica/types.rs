//! Entities stored and derived by the local replica (§3, §4.4).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::ids::Author;
use crate::message::{DisplayPreference, ModerationAction, TargetKind};
use crate::timestamp::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCell {
    pub id: Uuid,
    pub author: Author,
    pub timestamp: Timestamp,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPost {
    pub id: Uuid,
    pub author: Author,
    pub timestamp: Timestamp,
    pub cell_id: Uuid,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredComment {
    pub id: Uuid,
    pub author: Author,
    pub timestamp: Timestamp,
    pub post_id: Uuid,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVote {
    pub id: Uuid,
    pub author: Author,
    pub timestamp: Timestamp,
    pub target_id: Uuid,
    pub value: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModeration {
    pub id: Uuid,
    pub author: Author,
    pub timestamp: Timestamp,
    pub cell_id: Uuid,
    pub action: ModerationAction,
    pub target_kind: TargetKind,
    pub target_id: Uuid,
    pub reason: Option<String>,
}

impl StoredModeration {
    pub fn is_in_effect(&self) -> bool {
        matches!(self.action, ModerationAction::Moderate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProfileUpdate {
    pub id: Uuid,
    pub author: Author,
    pub timestamp: Timestamp,
    pub call_sign: Option<String>,
    pub display_preference: DisplayPreference,
}

/// Computed, never stored on a message (§3 "Verification status").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Anonymous,
    WalletUnconnected,
    WalletConnected,
    EnsVerified,
}

/// An address's resolved identity (§4.5/C6), cached with a last-refresh timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub address: crate::ids::Address,
    pub ens_name: Option<String>,
    pub ens_avatar: Option<String>,
    pub call_sign: Option<String>,
    pub display_preference: DisplayPreference,
    pub verification_status: VerificationStatus,
    pub last_updated_ms: Timestamp,
}

impl UserIdentity {
    /// §4.5 `display_name` derivation: call sign (if preferred and present), else ENS
    /// name, else the short hex form of the address.
    pub fn display_name(&self) -> String {
        if matches!(self.display_preference, DisplayPreference::CallSign) {
            if let Some(call_sign) = &self.call_sign {
                if !call_sign.is_empty() {
                    return call_sign.clone();
                }
            }
        }
        if let Some(ens_name) = &self.ens_name {
            return ens_name.clone();
        }
        self.address.short_display()
    }
}

/// Local-only, never broadcast (§3, §4.7 [NEW]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: Author,
    pub created_at_ms: Timestamp,
    pub target_kind: TargetKind,
    pub target_id: Uuid,
    pub title: Option<String>,
    pub author: Option<Author>,
    pub cell_id: Option<Uuid>,
}

impl Bookmark {
    pub fn key(target_kind: TargetKind, target_id: Uuid) -> String {
        let prefix = match target_kind {
            TargetKind::Post => "post",
            TargetKind::Comment => "comment",
            TargetKind::User => "user",
        };
        format!("{prefix}:{target_id}")
    }
}

/// Local-only, never broadcast (§3, §4.7 [NEW]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Following {
    pub id: String,
    pub user_id: Author,
    pub followed_address: crate::ids::Address,
    pub followed_at_ms: Timestamp,
}

impl Following {
    pub fn key(user_id: &Author, followed_address: crate::ids::Address) -> String {
        format!("{user_id}:{followed_address}")
    }
}

/// Post + materialized votes/comments/moderation/relevance (§3 "Derived entities").
/// Built on demand from the replica's indexes and thrown away (§9 "Cached and cyclic
/// references").
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedPost {
    pub post: StoredPost,
    pub upvotes: Vec<StoredVote>,
    pub downvotes: Vec<StoredVote>,
    pub comment_count: usize,
    pub is_moderated: bool,
    pub relevance_score: f64,
    pub verified_upvoter_count: usize,
    pub verified_commenters: BTreeSet<Author>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedCell {
    pub cell: StoredCell,
    pub post_count: usize,
    pub active_author_count: usize,
    pub recent_activity_count: usize,
}

/// The outcome of `apply_message` (§4.4 step list; §7 error taxonomy kinds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Accepted,
    Duplicate,
    Rejected { reasons: Vec<String> },
}
