//! Structural validation (C4): required fields, field-range checks, and enum domain
//! checks per message kind. Produces a [`ValidationReport`] suitable for diagnostics
//! rather than a bare boolean, so callers can explain a rejection to a user.

use super::payload::Payload;
use super::{Envelope, MessageKind};
use crate::ids::Author;
use crate::timestamp::Timestamp;

/// Field-length limits. Implementations may tighten these, never loosen them
/// (§4.3). Defaults match the specification's own limits.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_title_len: usize,
    pub max_body_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_title_len: 300,
            max_body_len: 10_000,
        }
    }
}

/// A sensible upper bound on message timestamps: one day past whenever validation
/// runs, guarding against obviously-wrong clocks without requiring validation to take
/// a `now` parameter of its own for every call site.
const FAR_FUTURE_SLACK_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub ok: bool,
    pub missing_fields: Vec<String>,
    pub invalid_fields: Vec<String>,
    /// Whether the cryptographic signature check passed. `None` when validation was
    /// run structurally only, before a signature check was performed.
    pub signature_ok: Option<bool>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn invalid(&mut self, field: &str, reason: impl Into<String>) {
        self.invalid_fields.push(field.to_string());
        self.errors.push(reason.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Runs structural validation for `envelope` against `limits`, given the result of a
/// signature check performed by the caller (the delegation manager, C3). Passing
/// `signature_ok = None` skips the signature-derived `ok` contribution, useful when
/// validating a message before it has been signed at all.
pub fn validate(
    envelope: &Envelope,
    limits: &Limits,
    now: Timestamp,
    signature_ok: Option<bool>,
) -> ValidationReport {
    let mut report = ValidationReport {
        signature_ok,
        ..Default::default()
    };

    validate_timestamp(envelope.timestamp, now, &mut report);
    validate_author(&envelope.author, &mut report);
    validate_payload(&envelope.payload, limits, &mut report);

    if envelope.author.is_wallet() && envelope.delegation_proof.is_none() && envelope.is_signed() {
        report.warn("wallet-authored message carries no delegation proof");
    }
    if !envelope.author.is_wallet() && envelope.delegation_proof.is_some() {
        report.invalid(
            "delegationProof",
            "anonymous authors must not carry a delegation proof",
        );
    }

    let structurally_ok = report.invalid_fields.is_empty() && report.missing_fields.is_empty();
    report.ok = structurally_ok && signature_ok.unwrap_or(true);
    report
}

fn validate_timestamp(timestamp: Timestamp, now: Timestamp, report: &mut ValidationReport) {
    if timestamp.as_millis() == 0 {
        report.invalid("timestamp", "timestamp must be a positive integer");
    } else if timestamp.as_millis() > now.as_millis().saturating_add(FAR_FUTURE_SLACK_MS) {
        report.invalid("timestamp", "timestamp is implausibly far in the future");
    }
}

fn validate_author(author: &Author, report: &mut ValidationReport) {
    match author {
        Author::Wallet(_) => {}
        Author::Anonymous(uuid) => {
            if uuid.get_version_num() != 4 {
                report.invalid("author", "anonymous author must be a UUIDv4");
            }
        }
    }
}

fn validate_payload(payload: &Payload, limits: &Limits, report: &mut ValidationReport) {
    match payload {
        Payload::Cell {
            name, description, ..
        } => {
            if name.is_empty() {
                report.invalid("name", "cell name must not be empty");
            }
            if description.is_empty() {
                report.invalid("description", "cell description must not be empty");
            }
        }
        Payload::Post { title, body, .. } => {
            validate_len("title", title, 1, limits.max_title_len, report);
            validate_len("body", body, 1, limits.max_body_len, report);
        }
        Payload::Comment { body, .. } => {
            validate_len("body", body, 1, limits.max_body_len, report);
        }
        Payload::Vote { value, .. } => {
            if *value != 1 && *value != -1 {
                report.invalid("value", "vote value must be +1 or -1");
            }
        }
        Payload::Moderate { .. } => {
            // `action` and `target_kind` are closed Rust enums: an out-of-domain
            // value is rejected by deserialization itself, before validation runs.
        }
        Payload::ProfileUpdate {
            call_sign,
            display_preference,
        } => {
            use super::payload::DisplayPreference;
            if matches!(display_preference, DisplayPreference::CallSign)
                && call_sign.as_deref().unwrap_or("").is_empty()
            {
                report.warn("display_preference is CallSign but call_sign is empty");
            }
        }
    }
}

fn validate_len(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
    report: &mut ValidationReport,
) {
    if value.len() < min {
        report.invalid(field, format!("{field} must not be empty"));
    } else if value.len() > max {
        report.invalid(field, format!("{field} exceeds the {max}-byte limit"));
    }
}

pub fn message_kind_label(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Cell => "Cell",
        MessageKind::Post => "Post",
        MessageKind::Comment => "Comment",
        MessageKind::Vote => "Vote",
        MessageKind::Moderate => "Moderate",
        MessageKind::ProfileUpdate => "ProfileUpdate",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::payload::Payload;
    use uuid::Uuid;

    fn post(title: &str, body: &str, timestamp: u64) -> Envelope {
        Envelope::unsigned(
            Uuid::new_v4(),
            Timestamp(timestamp),
            Author::Anonymous(Uuid::new_v4()),
            Payload::Post {
                cell_id: Uuid::new_v4(),
                title: title.to_string(),
                body: body.to_string(),
            },
        )
    }

    #[test]
    fn zero_timestamp_is_rejected() {
        let report = validate(&post("t", "b", 0), &Limits::default(), Timestamp(10_000), None);
        assert!(!report.ok);
        assert!(report.invalid_fields.contains(&"timestamp".to_string()));
    }

    #[test]
    fn far_future_timestamp_is_rejected() {
        let report = validate(
            &post("t", "b", 10_000_000_000_000),
            &Limits::default(),
            Timestamp(1_000),
            None,
        );
        assert!(!report.ok);
    }

    #[test]
    fn empty_title_is_rejected() {
        let report = validate(&post("", "b", 1000), &Limits::default(), Timestamp(2000), None);
        assert!(!report.ok);
        assert!(report.invalid_fields.contains(&"title".to_string()));
    }

    #[test]
    fn max_length_title_is_accepted_exactly_at_limit() {
        let limits = Limits::default();
        let title = "x".repeat(limits.max_title_len);
        let report = validate(&post(&title, "b", 1000), &limits, Timestamp(2000), Some(true));
        assert!(report.ok);
    }

    #[test]
    fn over_length_title_is_rejected() {
        let limits = Limits::default();
        let title = "x".repeat(limits.max_title_len + 1);
        let report = validate(&post(&title, "b", 1000), &limits, Timestamp(2000), None);
        assert!(!report.ok);
    }

    #[test]
    fn vote_value_must_be_plus_or_minus_one() {
        let envelope = Envelope::unsigned(
            Uuid::new_v4(),
            Timestamp(1000),
            Author::Anonymous(Uuid::new_v4()),
            Payload::Vote {
                target_id: Uuid::new_v4(),
                value: 2,
            },
        );
        let report = validate(&envelope, &Limits::default(), Timestamp(2000), None);
        assert!(!report.ok);
        assert!(report.invalid_fields.contains(&"value".to_string()));
    }

    #[test]
    fn vote_value_zero_is_rejected() {
        let envelope = Envelope::unsigned(
            Uuid::new_v4(),
            Timestamp(1000),
            Author::Anonymous(Uuid::new_v4()),
            Payload::Vote {
                target_id: Uuid::new_v4(),
                value: 0,
            },
        );
        let report = validate(&envelope, &Limits::default(), Timestamp(2000), None);
        assert!(!report.ok);
    }

    #[test]
    fn anonymous_author_with_delegation_proof_is_rejected() {
        let mut envelope = post("t", "b", 1000);
        envelope.delegation_proof = Some(crate::message::DelegationProof {
            auth_message: "x".to_string(),
            wallet_signature: crate::crypto::EvmSignatureHex([0u8; 65]),
            expiry_timestamp_ms: Timestamp(5000),
            wallet_address: crate::ids::Address([0u8; 20]),
        });
        let report = validate(&envelope, &Limits::default(), Timestamp(2000), None);
        assert!(!report.ok);
    }

    #[test]
    fn signature_failure_overrides_otherwise_valid_structure() {
        let report = validate(
            &post("t", "b", 1000),
            &Limits::default(),
            Timestamp(2000),
            Some(false),
        );
        assert!(!report.ok);
    }
}
