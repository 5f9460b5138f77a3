//! # IPN signature verification
//!
//! The gateway can attach a `verify_sign` field to its notifications. The signature is an MD5 hex digest over the
//! canonicalised payload:
//!
//! ```text
//!     key1=value1&key2=value2&...&keyN=valueN{store_password}
//! ```
//!
//! where the keys are every payload field except `verify_sign` itself (the `verify_key` field the gateway attaches
//! is part of the signed payload), sorted lexicographically, and the store password is appended directly after the
//! last pair. The received digest is compared case-insensitively.
//!
//! Verification is best-effort: when no store password is configured, or the notification carries no signature,
//! there is nothing to check and the caller is expected to log a warning and continue. This mirrors the gateway's
//! own contract; operators who need hard authenticity must configure a store password *and* enable signatures on
//! the gateway side.

use std::collections::HashMap;

use spg_common::Secret;

const SIGNATURE_FIELD: &str = "verify_sign";

/// Compute the expected signature for a payload with the given store password.
pub fn compute_ipn_signature(payload: &HashMap<String, String>, store_password: &Secret<String>) -> String {
    let mut keys: Vec<&String> = payload.keys().filter(|k| k.as_str() != SIGNATURE_FIELD).collect();
    keys.sort();
    let mut canonical = keys.iter().map(|k| format!("{k}={}", payload[*k])).collect::<Vec<_>>().join("&");
    canonical.push_str(store_password.reveal());
    format!("{:x}", md5::compute(canonical.as_bytes()))
}

/// Check a notification's `verify_sign` against the store password.
///
/// Returns `None` when the payload carries no signature, or an empty one (nothing to verify), otherwise whether
/// the recomputed digest matches, compared case-insensitively.
pub fn verify_ipn_signature(payload: &HashMap<String, String>, store_password: &Secret<String>) -> Option<bool> {
    let received = payload.get(SIGNATURE_FIELD).filter(|s| !s.is_empty())?;
    let expected = compute_ipn_signature(payload, store_password);
    Some(received.eq_ignore_ascii_case(&expected))
}

#[cfg(test)]
mod test {
    use super::*;

    fn payload() -> HashMap<String, String> {
        [
            ("tran_id", "T1"),
            ("val_id", "V1"),
            ("amount", "500.00"),
            ("status", "VALID"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn roundtrip_signature_verifies() {
        let secret = Secret::new("hunter2".to_string());
        let mut p = payload();
        let sig = compute_ipn_signature(&p, &secret);
        p.insert("verify_sign".into(), sig.to_uppercase());
        // Comparison is case-insensitive.
        assert_eq!(verify_ipn_signature(&p, &secret), Some(true));
    }

    #[test]
    fn tampered_payload_fails() {
        let secret = Secret::new("hunter2".to_string());
        let mut p = payload();
        let sig = compute_ipn_signature(&p, &secret);
        p.insert("verify_sign".into(), sig);
        p.insert("amount".into(), "9999.00".into());
        assert_eq!(verify_ipn_signature(&p, &secret), Some(false));
    }

    #[test]
    fn missing_signature_is_nothing_to_verify() {
        let secret = Secret::new("hunter2".to_string());
        assert_eq!(verify_ipn_signature(&payload(), &secret), None);
    }

    #[test]
    fn only_the_signature_itself_is_excluded_from_the_digest() {
        let secret = Secret::new("hunter2".to_string());
        let clean = compute_ipn_signature(&payload(), &secret);
        let mut p = payload();
        p.insert("verify_sign".into(), "anything".into());
        assert_eq!(compute_ipn_signature(&p, &secret), clean);
        // verify_key is part of the signed payload, not a signature field.
        p.insert("verify_key".into(), "amount,status".into());
        assert_ne!(compute_ipn_signature(&p, &secret), clean);
    }

    #[test]
    fn payloads_carrying_verify_key_roundtrip() {
        let secret = Secret::new("hunter2".to_string());
        let mut p = payload();
        p.insert("verify_key".into(), "amount,status,tran_id,val_id".into());
        let sig = compute_ipn_signature(&p, &secret);
        p.insert("verify_sign".into(), sig);
        assert_eq!(verify_ipn_signature(&p, &secret), Some(true));
    }

    #[test]
    fn an_empty_signature_is_nothing_to_verify() {
        let secret = Secret::new("hunter2".to_string());
        let mut p = payload();
        p.insert("verify_sign".into(), String::new());
        assert_eq!(verify_ipn_signature(&p, &secret), None);
    }
}
