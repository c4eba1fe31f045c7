//! Kind-specific payload fields (§3 of the specification).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The six message kinds the engine knows how to validate, sign, and apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Cell,
    Post,
    Comment,
    Vote,
    Moderate,
    ProfileUpdate,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageKind::Cell => "Cell",
            MessageKind::Post => "Post",
            MessageKind::Comment => "Comment",
            MessageKind::Vote => "Vote",
            MessageKind::Moderate => "Moderate",
            MessageKind::ProfileUpdate => "ProfileUpdate",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationAction {
    Moderate,
    Unmoderate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    Post,
    Comment,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayPreference {
    CallSign,
    Address,
}

/// The payload fields specific to a message's [`MessageKind`], internally tagged by
/// `kind` so the tag and the fields it selects live in the same flat JSON object as
/// the envelope's common fields (see [`super::Envelope`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Payload {
    Cell {
        name: String,
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Post {
        cell_id: Uuid,
        title: String,
        body: String,
    },
    #[serde(rename_all = "camelCase")]
    Comment {
        post_id: Uuid,
        body: String,
    },
    #[serde(rename_all = "camelCase")]
    Vote {
        target_id: Uuid,
        value: i8,
    },
    #[serde(rename_all = "camelCase")]
    Moderate {
        action: ModerationAction,
        target_kind: TargetKind,
        target_id: Uuid,
        cell_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ProfileUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_sign: Option<String>,
        display_preference: DisplayPreference,
    },
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Cell { .. } => MessageKind::Cell,
            Payload::Post { .. } => MessageKind::Post,
            Payload::Comment { .. } => MessageKind::Comment,
            Payload::Vote { .. } => MessageKind::Vote,
            Payload::Moderate { .. } => MessageKind::Moderate,
            Payload::ProfileUpdate { .. } => MessageKind::ProfileUpdate,
        }
    }
}
