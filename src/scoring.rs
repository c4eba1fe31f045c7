//! Relevance scorer (C8, §4.7): a pure function of a post, its votes and comments,
//! verification status, and the current moderation record. Takes `now` as a
//! parameter rather than reading a clock, so it stays a pure, independently
//! testable function (as the specification requires).

use std::collections::BTreeSet;

use crate::ids::Author;
use crate::replica::{StoredComment, StoredModeration, StoredPost, StoredVote, VerificationStatus};
use crate::timestamp::Timestamp;

const BASE_SCORE: f64 = 100.0;
const UPVOTE_WEIGHT: f64 = 10.0;
const COMMENT_WEIGHT: f64 = 3.0;
const AUTHOR_VERIFIED_BONUS: f64 = 20.0;
const UPVOTER_VERIFIED_WEIGHT: f64 = 5.0;
const COMMENTER_VERIFIED_WEIGHT: f64 = 10.0;
const HALF_LIFE_DAYS: f64 = 7.0;
const MODERATED_FACTOR: f64 = 0.5;
const UNMODERATED_FACTOR: f64 = 1.0;

/// Everything the scorer needs about a post's engagement, gathered by the caller
/// from the replica (§4.7: "plus that post's votes, comments, a `verification_of`
/// function, and the current moderation record").
pub struct ScoringInput<'a> {
    pub post: &'a StoredPost,
    pub votes: &'a [StoredVote],
    pub comments: &'a [StoredComment],
    pub moderation: Option<&'a StoredModeration>,
}

/// Computes the exact relevance score defined in §4.7. `verification_of` is called
/// once per distinct author encountered (the post's author, each upvoter, each
/// commenter), never memoized here — callers resolving through [`crate::identity`]
/// should pass a closure over their own already-cached lookups.
pub fn relevance_score(
    input: &ScoringInput,
    now: Timestamp,
    verification_of: impl Fn(Author) -> VerificationStatus,
) -> f64 {
    let upvotes = input.votes.iter().filter(|v| v.value == 1).count();
    let engagement =
        UPVOTE_WEIGHT * upvotes as f64 + COMMENT_WEIGHT * input.comments.len() as f64;

    let author_v = if verification_of(input.post.author) == VerificationStatus::EnsVerified {
        AUTHOR_VERIFIED_BONUS
    } else {
        0.0
    };

    let verified_upvoters = input
        .votes
        .iter()
        .filter(|v| v.value == 1 && verification_of(v.author) == VerificationStatus::EnsVerified)
        .count();
    let upvoter_v = UPVOTER_VERIFIED_WEIGHT * verified_upvoters as f64;

    let verified_commenters: BTreeSet<Author> = input
        .comments
        .iter()
        .filter(|c| verification_of(c.author) == VerificationStatus::EnsVerified)
        .map(|c| c.author)
        .collect();
    let commenter_v = COMMENTER_VERIFIED_WEIGHT * verified_commenters.len() as f64;

    let days_old = input.post.timestamp.days_since(now);
    let decay = (-std::f64::consts::LN_2 * days_old / HALF_LIFE_DAYS).exp();

    let mod_factor = match input.moderation {
        Some(m) if m.is_in_effect() => MODERATED_FACTOR,
        _ => UNMODERATED_FACTOR,
    };

    let raw = (BASE_SCORE + engagement + author_v + upvoter_v + commenter_v) * decay * mod_factor;
    raw.max(0.0)
}

/// Builds the `EnhancedPost` read model on demand (§3 "Derived entities"): the
/// post itself, its upvotes/downvotes split out, comment count, whether it's
/// currently moderated, its relevance score, and the verified-upvoter/commenter
/// counts the scorer itself already computes internally. Never stored —
/// callers rebuild it from the replica's own indexes whenever they need it.
pub fn enhanced_post(
    post: &StoredPost,
    votes: &[StoredVote],
    comments: &[StoredComment],
    moderation: Option<&StoredModeration>,
    now: Timestamp,
    verification_of: impl Fn(Author) -> VerificationStatus,
) -> crate::replica::EnhancedPost {
    let upvotes: Vec<StoredVote> = votes.iter().filter(|v| v.value == 1).cloned().collect();
    let downvotes: Vec<StoredVote> = votes.iter().filter(|v| v.value != 1).cloned().collect();

    let verified_upvoter_count = upvotes
        .iter()
        .filter(|v| verification_of(v.author) == VerificationStatus::EnsVerified)
        .count();
    let verified_commenters: BTreeSet<Author> = comments
        .iter()
        .filter(|c| verification_of(c.author) == VerificationStatus::EnsVerified)
        .map(|c| c.author)
        .collect();

    let input = ScoringInput { post, votes, comments, moderation };
    let score = relevance_score(&input, now, &verification_of);

    crate::replica::EnhancedPost {
        post: post.clone(),
        upvotes,
        downvotes,
        comment_count: comments.len(),
        is_moderated: moderation.map(|m| m.is_in_effect()).unwrap_or(false),
        relevance_score: score,
        verified_upvoter_count,
        verified_commenters,
    }
}
