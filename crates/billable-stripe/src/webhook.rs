//! Webhook signature verification.
//!
//! The `Stripe-Signature` header has the form `t=timestamp,v1=signature,...`.
//! The signature is a hex HMAC-SHA256 of `"{timestamp}.{payload}"` keyed with
//! the endpoint secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::StripeError;
use crate::types::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

/// Verify a signature header against the payload at time `now` (Unix seconds).
///
/// # Errors
///
/// - `StripeError::InvalidSignature` if the header is malformed or no `v1`
///   signature matches.
/// - `StripeError::StaleSignature` if the timestamp is outside `tolerance`.
pub fn verify_signature(
    secret: &str,
    payload: &str,
    header: &str,
    now: i64,
    tolerance: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::InvalidSignature)?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature)?;

    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature);
    }

    let mac = signed_mac(secret, timestamp, payload)?;
    let valid = signatures.iter().any(|sig| {
        hex::decode(sig).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });

    if !valid {
        return Err(StripeError::InvalidSignature);
    }

    let age_seconds = now - signed_at;
    if tolerance > 0 && age_seconds.abs() > tolerance {
        return Err(StripeError::StaleSignature { age_seconds });
    }

    Ok(())
}

/// Verify the signature and parse the event.
///
/// # Errors
///
/// Returns a signature error, or `StripeError::Serialization` if the payload
/// is not an event.
pub fn construct_event(
    secret: &str,
    payload: &str,
    header: &str,
    now: i64,
) -> Result<WebhookEvent, StripeError> {
    verify_signature(secret, payload, header, now, DEFAULT_TOLERANCE_SECONDS)?;
    Ok(serde_json::from_str(payload)?)
}

/// Build a signature header for a payload (test fixtures, local tooling).
///
/// # Errors
///
/// Returns `StripeError::Configuration` if the secret cannot key the MAC.
pub fn sign_payload(secret: &str, payload: &str, timestamp: i64) -> Result<String, StripeError> {
    let timestamp = timestamp.to_string();
    let signature = hex::encode(signed_mac(secret, &timestamp, payload)?.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={signature}"))
}

fn signed_mac(secret: &str, timestamp: &str, payload: &str) -> Result<HmacSha256, StripeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeError::Configuration(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const PAYLOAD: &str = r#"{"id":"evt_1","type":"charge.succeeded","data":{"object":{}}}"#;

    #[test]
    fn signed_payload_verifies() {
        let header = sign_payload(SECRET, PAYLOAD, 1_700_000_000).unwrap();
        assert!(verify_signature(SECRET, PAYLOAD, &header, 1_700_000_010, 300).is_ok());
    }

    #[test]
    fn any_matching_v1_signature_is_accepted() {
        let header = sign_payload(SECRET, PAYLOAD, 1_700_000_000).unwrap();
        let header = header.replacen("v1=", "v1=deadbeef,v1=", 1);
        assert!(verify_signature(SECRET, PAYLOAD, &header, 1_700_000_000, 300).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = sign_payload(SECRET, PAYLOAD, 1_700_000_000).unwrap();
        let result = verify_signature(SECRET, "{}", &header, 1_700_000_000, 300);
        assert!(matches!(result, Err(StripeError::InvalidSignature)));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = sign_payload("whsec_other", PAYLOAD, 1_700_000_000).unwrap();
        let result = verify_signature(SECRET, PAYLOAD, &header, 1_700_000_000, 300);
        assert!(matches!(result, Err(StripeError::InvalidSignature)));
    }

    #[test]
    fn old_timestamp_is_rejected() {
        let header = sign_payload(SECRET, PAYLOAD, 1_700_000_000).unwrap();
        let result = verify_signature(SECRET, PAYLOAD, &header, 1_700_001_000, 300);
        assert!(matches!(
            result,
            Err(StripeError::StaleSignature { age_seconds: 1000 })
        ));
    }

    #[test]
    fn malformed_header_is_rejected() {
        for header in ["", "v1=abc", "t=notanumber,v1=abc", "t=1700000000"] {
            assert!(verify_signature(SECRET, PAYLOAD, header, 1_700_000_000, 300).is_err());
        }
    }

    #[test]
    fn construct_event_parses_payload() {
        let header = sign_payload(SECRET, PAYLOAD, 1_700_000_000).unwrap();
        let event = construct_event(SECRET, PAYLOAD, &header, 1_700_000_000).unwrap();
        assert_eq!(event.event_type, "charge.succeeded");
    }
}
