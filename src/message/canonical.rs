//! The canonical payload for signing (§4.3/§4.4 of the specification): a stable,
//! deterministic encoding of a message with the three signature-carrying fields
//! replaced by an explicit JSON `null` "absent" sentinel.
//!
//! This is the interoperability constant the specification's first Open Question
//! asks an implementer to commit to: object keys sorted lexicographically at every
//! nesting level, integers as bare decimal tokens, no floating point, no
//! insignificant whitespace. `serde_json::Value`'s object representation is a
//! `BTreeMap` (this crate does not enable the `preserve_order` feature), so routing
//! every message through [`serde_json::to_value`] before re-serializing sorts every
//! level of nesting for free; `serde_json::to_vec` never inserts whitespace.

use super::Envelope;

const SENTINEL_FIELDS: [&str; 3] = ["signature", "devicePubKey", "delegationProof"];

/// Produces the exact byte sequence that is signed and verified for `envelope`,
/// regardless of whether it has been signed yet.
pub fn canonical_bytes(envelope: &Envelope) -> Vec<u8> {
    let mut value =
        serde_json::to_value(envelope).expect("Envelope's Serialize impl cannot fail");
    if let serde_json::Value::Object(map) = &mut value {
        for field in SENTINEL_FIELDS {
            map.insert(field.to_string(), serde_json::Value::Null);
        }
    }
    serde_json::to_vec(&value).expect("serde_json::Value serialization cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Author;
    use crate::message::payload::Payload;
    use crate::timestamp::Timestamp;
    use uuid::Uuid;

    fn sample_envelope() -> Envelope {
        let author = Author::parse("3f1c2a10-1234-4abc-8def-0123456789ab").unwrap();
        Envelope::unsigned(
            Uuid::parse_str("00000000-0000-4000-8000-000000000001").unwrap(),
            Timestamp(1000),
            author,
            Payload::Post {
                cell_id: Uuid::parse_str("00000000-0000-4000-8000-000000000002").unwrap(),
                title: "Hi".to_string(),
                body: "World".to_string(),
            },
        )
    }

    #[test]
    fn canonical_bytes_are_stable_regardless_of_signing_state() {
        let unsigned = sample_envelope();
        let unsigned_bytes = canonical_bytes(&unsigned);

        let mut signed = unsigned.clone();
        signed.signature = Some(crate::crypto::Ed25519SignatureHex([7u8; 64]));
        signed.device_pub_key = Some(crate::ids::DevicePubKey([9u8; 32]));
        let signed_bytes = canonical_bytes(&signed);

        assert_eq!(unsigned_bytes, signed_bytes);
    }

    #[test]
    fn canonical_bytes_have_no_whitespace() {
        let bytes = canonical_bytes(&sample_envelope());
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains(' '));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn canonical_bytes_sort_keys_lexicographically() {
        let bytes = canonical_bytes(&sample_envelope());
        let text = String::from_utf8(bytes).unwrap();
        let author_pos = text.find("\"author\"").unwrap();
        let body_pos = text.find("\"body\"").unwrap();
        let kind_pos = text.find("\"kind\"").unwrap();
        let timestamp_pos = text.find("\"timestamp\"").unwrap();
        assert!(author_pos < body_pos);
        assert!(body_pos < kind_pos);
        assert!(kind_pos < timestamp_pos);
    }

    #[test]
    fn modifying_body_changes_canonical_bytes() {
        let original = sample_envelope();
        let mut modified = original.clone();
        if let Payload::Post { body, .. } = &mut modified.payload {
            *body = "World!".to_string();
        }
        assert_ne!(canonical_bytes(&original), canonical_bytes(&modified));
    }
}
