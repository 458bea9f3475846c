//! Webhook authenticity checks.
//!
//! Two schemes are accepted when a secret is configured:
//! - `X-Webhook-Signature: <hex hmac-sha256(secret, raw body)>`
//! - `asaas-access-token: <secret>` (the gateway's static auth token)
//!
//! With no secret every request passes; the server logs a warning at startup.

use std::fmt;

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC of the raw body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Header carrying the shared access token.
pub const TOKEN_HEADER: &str = "asaas-access-token";

/// Verifies inbound webhook requests against a shared secret.
#[derive(Clone, Default)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl WebhookVerifier {
    /// Creates a verifier. `None` or an empty secret disables verification.
    #[must_use]
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Whether a secret is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Returns `true` if the request is authentic.
    #[must_use]
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        let Some(secret) = self.secret.as_deref() else {
            return true;
        };

        if let Some(signature) = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            return verify_hmac(secret, signature.trim(), body);
        }

        headers
            .get(TOKEN_HEADER)
            .map(|v| constant_time_eq::constant_time_eq(v.as_bytes(), secret.as_bytes()))
            .unwrap_or(false)
    }
}

fn verify_hmac(secret: &str, signature_hex: &str, body: &[u8]) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Hex HMAC-SHA256 of `body`, as a sender would compute it.
#[must_use]
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const BODY: &[u8] = br#"{"event":"PAYMENT_CONFIRMED","payment":{"id":"pay_1"}}"#;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
        headers
    }

    #[test]
    fn disabled_verifier_accepts_everything() {
        let verifier = WebhookVerifier::new(None);
        assert!(!verifier.is_enabled());
        assert!(verifier.verify(&HeaderMap::new(), BODY));
        assert!(!WebhookVerifier::new(Some(String::new())).is_enabled());
    }

    #[test]
    fn valid_signature_passes() {
        let verifier = WebhookVerifier::new(Some("whsec".to_string()));
        let sig = compute_signature("whsec", BODY);
        assert!(verifier.verify(&headers(SIGNATURE_HEADER, &sig), BODY));
    }

    #[test]
    fn tampered_body_fails() {
        let verifier = WebhookVerifier::new(Some("whsec".to_string()));
        let sig = compute_signature("whsec", BODY);
        assert!(!verifier.verify(&headers(SIGNATURE_HEADER, &sig), b"{}"));
    }

    #[test]
    fn wrong_secret_and_garbage_fail() {
        let verifier = WebhookVerifier::new(Some("whsec".to_string()));
        let sig = compute_signature("other", BODY);
        assert!(!verifier.verify(&headers(SIGNATURE_HEADER, &sig), BODY));
        assert!(!verifier.verify(&headers(SIGNATURE_HEADER, "zz-not-hex"), BODY));
        assert!(!verifier.verify(&HeaderMap::new(), BODY));
    }

    #[test]
    fn access_token_header_passes() {
        let verifier = WebhookVerifier::new(Some("whsec".to_string()));
        assert!(verifier.verify(&headers(TOKEN_HEADER, "whsec"), BODY));
        assert!(!verifier.verify(&headers(TOKEN_HEADER, "whsed"), BODY));
    }

    #[test]
    fn access_token_prefix_or_extension_fails() {
        let verifier = WebhookVerifier::new(Some("whsec".to_string()));
        assert!(!verifier.verify(&headers(TOKEN_HEADER, "whse"), BODY));
        assert!(!verifier.verify(&headers(TOKEN_HEADER, "whsec0"), BODY));
        assert!(!verifier.verify(&headers(TOKEN_HEADER, ""), BODY));
    }

    #[test]
    fn debug_hides_secret() {
        let verifier = WebhookVerifier::new(Some("whsec".to_string()));
        assert!(!format!("{verifier:?}").contains("whsec"));
    }
}
