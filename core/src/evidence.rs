//! Evidence hasher: shared-secret digest over receipt fields.
//!
//! `evidence_hash = SHA-256(request_id ‖ canonical_json(result) ‖
//! completed_at(RFC3339) ‖ secret)`, hex-encoded.
//!
//! This is a MAC-like, shared-secret construction: a party holding the
//! server secret can recompute the digest and detect tampering with a
//! receipt. It is deliberately **not** an asymmetric signature and carries
//! no public, third-party verifiability.
//!
//! Canonical serialization relies on `serde_json`'s default map ordering
//! (sorted keys), so identical `Value`s always produce identical bytes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic digest function over receipt fields plus a server secret.
#[derive(Debug, Clone)]
pub struct EvidenceHasher {
    secret: String,
}

impl EvidenceHasher {
    /// Create a hasher bound to a server secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Compute the evidence hash for a receipt.
    ///
    /// Pure function of `(request_id, result, completed_at, secret)`:
    /// identical inputs reproduce the same digest, changing any one input
    /// changes it.
    #[must_use]
    pub fn digest(&self, request_id: &str, result: &Value, completed_at: DateTime<Utc>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request_id.as_bytes());
        hasher.update(result.to_string().as_bytes());
        hasher.update(
            completed_at
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .as_bytes(),
        );
        hasher.update(self.secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn identical_inputs_reproduce_the_digest() {
        let hasher = EvidenceHasher::new("secret");
        let a = hasher.digest("r-1", &json!("Approve"), fixed_time());
        let b = hasher.digest("r-1", &json!("Approve"), fixed_time());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // hex SHA-256
    }

    #[test]
    fn digest_is_canonical_over_map_key_order() {
        let hasher = EvidenceHasher::new("secret");
        let a = hasher.digest("r-1", &json!({ "a": 1, "b": 2 }), fixed_time());
        let b = hasher.digest("r-1", &json!({ "b": 2, "a": 1 }), fixed_time());
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn changing_any_input_changes_the_digest(
            request_id in "[a-z0-9-]{1,32}",
            result in "[ -~]{0,64}",
            secret in "[ -~]{1,32}",
        ) {
            let hasher = EvidenceHasher::new(secret.clone());
            let base = hasher.digest(&request_id, &json!(result), fixed_time());

            let other_id = format!("{request_id}x");
            prop_assert_ne!(&base, &hasher.digest(&other_id, &json!(result), fixed_time()));

            let other_result = format!("{result}!");
            prop_assert_ne!(&base, &hasher.digest(&request_id, &json!(other_result), fixed_time()));

            let later = fixed_time() + chrono::Duration::seconds(1);
            prop_assert_ne!(&base, &hasher.digest(&request_id, &json!(result), later));

            let other_hasher = EvidenceHasher::new(format!("{secret}x"));
            prop_assert_ne!(&base, &other_hasher.digest(&request_id, &json!(result), fixed_time()));
        }
    }
}
