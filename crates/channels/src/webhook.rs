//! Inbound webhook signature verification.
//!
//! The header name comes from `channels.<name>.webhook.signature_header`.
//! Signatures are hex HMAC-SHA256 of the raw body, optionally prefixed
//! with `sha256=`.

use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

use crate::factory::canonical_channel;
use crate::registry::ChannelRegistry;

type HmacSha256 = Hmac<Sha256>;

/// Webhook verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// The channel declares no signature header.
    #[error("No webhook signature header configured for {0}")]
    Unconfigured(String),

    /// The request does not carry the configured header.
    #[error("Missing {0} header")]
    MissingHeader(String),

    /// Header present but not valid hex.
    #[error("Malformed signature: {0}")]
    Malformed(String),

    /// Signature does not match the body.
    #[error("Signature mismatch")]
    Mismatch,

    #[error("Invalid webhook secret")]
    InvalidSecret,
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `signature` (hex, optional `sha256=` prefix) against `body`.
///
/// The comparison is constant-time.
pub fn verify_signature(signature: &str, body: &[u8], secret: &str) -> Result<(), WebhookError> {
    let hex_sig = signature.trim();
    let hex_sig = hex_sig.strip_prefix("sha256=").unwrap_or(hex_sig);
    let expected = hex::decode(hex_sig).map_err(|e| WebhookError::Malformed(e.to_string()))?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::Mismatch)
}

/// Verifies an inbound webhook for `channel` using the registry's
/// configured signature header. Channel aliases resolve as in the factory.
pub fn verify_webhook_signature(
    registry: &ChannelRegistry,
    channel: &str,
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
) -> Result<(), WebhookError> {
    let channel = canonical_channel(channel);
    let header_name = registry
        .channel(channel)
        .and_then(|c| c.signature_header().map(str::to_string))
        .ok_or_else(|| WebhookError::Unconfigured(channel.to_string()))?;

    let signature = headers
        .get(header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| WebhookError::MissingHeader(header_name.clone()))?;

    match verify_signature(signature, body, secret) {
        Ok(()) => {
            debug!(channel, "Webhook signature verified");
            Ok(())
        }
        Err(e) => {
            warn!(channel, "Webhook verification failed: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_registry;

    fn headers(name: &str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            value.parse().unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_valid_signature_with_and_without_prefix() {
        let body = br#"{"event":"reservation.created"}"#;
        let sig = sign_body("whsec", body).unwrap();
        let registry = fixture_registry("https://channel.example");

        assert!(
            verify_webhook_signature(&registry, "airbnb", &headers("x-signature", &sig), body, "whsec")
                .is_ok()
        );
        assert!(
            verify_webhook_signature(
                &registry,
                "airbnb",
                &headers("X-Signature", &format!("sha256={sig}")),
                body,
                "whsec"
            )
            .is_ok()
        );
    }

    #[test]
    fn resolves_channel_aliases() {
        let body = br#"{"event":"rate.updated"}"#;
        let sig = sign_body("whsec", body).unwrap();
        let registry = fixture_registry("https://channel.example");

        for alias in ["booking.com", "booking_com", "Booking"] {
            assert_eq!(
                verify_webhook_signature(&registry, alias, &headers("X-Signature", &sig), body, "whsec"),
                Ok(())
            );
        }
    }

    #[test]
    fn rejects_tampered_body() {
        let sig = sign_body("whsec", b"original").unwrap();
        assert_eq!(
            verify_signature(&sig, b"tampered", "whsec"),
            Err(WebhookError::Mismatch)
        );
    }

    #[test]
    fn rejects_non_hex_signature() {
        assert!(matches!(
            verify_signature("sha256=zz", b"body", "whsec"),
            Err(WebhookError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_missing_header() {
        let registry = fixture_registry("https://channel.example");
        let err = verify_webhook_signature(&registry, "airbnb", &HeaderMap::new(), b"{}", "s")
            .expect_err("no header");
        assert_eq!(err, WebhookError::MissingHeader("X-Signature".to_string()));
    }

    #[test]
    fn rejects_channel_without_signature_header() {
        let registry = fixture_registry("https://channel.example");
        let err = verify_webhook_signature(&registry, "vrbo", &HeaderMap::new(), b"{}", "s")
            .expect_err("unconfigured");
        assert_eq!(err, WebhookError::Unconfigured("vrbo".to_string()));
    }
}
