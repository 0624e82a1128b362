//! Bearer credentials and client-side expiry detection.
//!
//! Credentials are signed tokens of the form `header.payload.signature`
//! where `payload` is base64url-encoded JSON carrying an `exp` claim in
//! seconds since the epoch. The client never verifies the signature; it
//! only peeks at `exp` so that an obviously stale token is refreshed
//! before it is sent to the server.
//!
//! Decoding fails open: a token whose payload cannot be read is treated
//! as *not expired*. Only an explicit `exp` in the past proves expiry.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{now_secs, UnixSeconds};

/// The access/refresh credential pair issued by the auth endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    /// Short-lived token that authenticates the realtime channel.
    pub access_token: String,
    /// Longer-lived token used only to mint a new access token.
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Extract the `exp` claim from a token's payload segment.
///
/// Returns `None` when the token has fewer than two segments, the payload
/// is not valid base64, not valid JSON, or has no numeric `exp`.
pub fn decode_expiry(token: &str) -> Option<UnixSeconds> {
    let payload = token.split('.').nth(1)?;
    let bytes = decode_segment(payload)?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

    match claims.get("exp")? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        _ => None,
    }
}

/// Whether `token` is expired at `now` (seconds since the epoch).
///
/// Expired means `exp <= now`. Undecodable tokens are not expired.
pub fn is_expired_at(token: &str, now: UnixSeconds) -> bool {
    match decode_expiry(token) {
        Some(exp) => exp <= now,
        None => false,
    }
}

/// Whether `token` is expired against the current wall clock.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_secs())
}

/// Decode a base64url segment, tolerating trailing padding and the
/// standard alphabet.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    if trimmed.is_empty() {
        return None;
    }
    BASE64_URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(trimmed))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const NOW: UnixSeconds = 1_700_000_000;

    /// Build an unsigned token around an arbitrary JSON payload.
    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            BASE64_URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            BASE64_URL_SAFE_NO_PAD.encode(payload),
        )
    }

    fn signed_token(exp: i64) -> String {
        let claims = serde_json::json!({ "sub": 7, "exp": exp });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encoding should succeed")
    }

    #[test]
    fn signed_token_in_the_past_is_expired() {
        assert!(is_expired_at(&signed_token(NOW - 10), NOW));
    }

    #[test]
    fn signed_token_in_the_future_is_not_expired() {
        assert!(!is_expired_at(&signed_token(NOW + 600), NOW));
    }

    #[test]
    fn exp_equal_to_now_is_expired() {
        assert!(is_expired_at(&token_with_payload(&format!(r#"{{"exp":{NOW}}}"#)), NOW));
    }

    #[test]
    fn decode_expiry_reads_claim() {
        let token = token_with_payload(r#"{"exp":1234,"sub":"u1"}"#);
        assert_eq!(decode_expiry(&token), Some(1234));
    }

    #[test]
    fn fractional_exp_is_floored() {
        let token = token_with_payload(r#"{"exp":1234.9}"#);
        assert_eq!(decode_expiry(&token), Some(1234));
    }

    #[test]
    fn padded_payload_is_accepted() {
        let payload = BASE64_URL_SAFE.encode(r#"{"exp":10}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(decode_expiry(&token), Some(10));
    }

    #[test]
    fn malformed_tokens_fail_open() {
        let cases = [
            String::new(),
            "no-dots-at-all".to_string(),
            "header.".to_string(),
            "header.!!!not-base64!!!.sig".to_string(),
            token_with_payload("not json"),
            token_with_payload(r#"{"sub":"missing exp"}"#),
            token_with_payload(r#"{"exp":"soon"}"#),
            token_with_payload(r#"[1,2,3]"#),
        ];

        for token in &cases {
            assert!(
                !is_expired_at(token, NOW),
                "malformed token {token:?} must not be reported expired"
            );
        }
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let pair = CredentialPair::new("secret-access", "secret-refresh");
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn pair_uses_camel_case_wire_names() {
        let pair: CredentialPair =
            serde_json::from_str(r#"{"accessToken":"a","refreshToken":"r"}"#).unwrap();
        assert_eq!(pair, CredentialPair::new("a", "r"));
    }
}
