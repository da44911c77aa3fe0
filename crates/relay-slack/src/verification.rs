//! Slack request signing
//!
//! Every Events API request carries `X-Slack-Request-Timestamp` and
//! `X-Slack-Signature: v0=<hex>`, where the hex is
//! HMAC-SHA256(signing_secret, `v0:{timestamp}:{body}`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SlackError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted distance between the request timestamp and now
pub const MAX_REQUEST_AGE_SECS: u64 = 300;

const SIGNATURE_VERSION: &str = "v0";

#[derive(Clone)]
pub struct SignatureVerifier {
    signing_secret: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

impl SignatureVerifier {
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
        }
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|e| SlackError::Verification(e.to_string()))?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }

    /// Signature header value for `body` sent at `timestamp`
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String> {
        let mac = self.mac(timestamp, body)?;
        Ok(format!(
            "{SIGNATURE_VERSION}={}",
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Check a request against the current clock
    pub fn verify(&self, timestamp: &str, signature: &str, body: &[u8]) -> Result<()> {
        self.verify_at(timestamp, signature, body, unix_now())
    }

    /// Check a request as of `now` (unix seconds)
    pub fn verify_at(&self, timestamp: &str, signature: &str, body: &[u8], now: i64) -> Result<()> {
        let sent: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SlackError::Verification(format!("bad timestamp '{timestamp}'")))?;

        if now.abs_diff(sent) > MAX_REQUEST_AGE_SECS {
            return Err(SlackError::Verification(
                "request timestamp outside the accepted window".to_string(),
            ));
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .ok_or_else(|| SlackError::Verification("malformed signature".to_string()))?;

        // constant-time comparison
        self.mac(timestamp, body)?
            .verify_slice(&expected)
            .map_err(|_| SlackError::Verification("signature mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = br#"{"type":"url_verification","challenge":"abc"}"#;

    #[test]
    fn test_accepts_own_signature() {
        let verifier = SignatureVerifier::new(SECRET);
        let signature = verifier.sign("1531420618", BODY).unwrap();

        assert!(signature.starts_with("v0="));
        assert_eq!(signature.len(), 3 + 64);
        verifier
            .verify_at("1531420618", &signature, BODY, 1_531_420_618 + 10)
            .unwrap();
    }

    #[test]
    fn test_published_slack_example() {
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let expected = "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503";
        let verifier = SignatureVerifier::new(SECRET);

        assert_eq!(verifier.sign("1531420618", body).unwrap(), expected);
        verifier
            .verify_at("1531420618", expected, body, 1_531_420_618)
            .unwrap();
    }

    #[test]
    fn test_rejects_tampered_body_and_wrong_secret() {
        let signature = SignatureVerifier::new(SECRET).sign("1000", BODY).unwrap();

        let tampered = SignatureVerifier::new(SECRET).verify_at("1000", &signature, b"{}", 1000);
        assert!(matches!(tampered, Err(SlackError::Verification(_))));

        let other = SignatureVerifier::new("another").verify_at("1000", &signature, BODY, 1000);
        assert!(matches!(other, Err(SlackError::Verification(_))));
    }

    #[test]
    fn test_rejects_stale_and_future_requests() {
        let verifier = SignatureVerifier::new(SECRET);
        let signature = verifier.sign("1000", BODY).unwrap();

        assert!(verifier.verify_at("1000", &signature, BODY, 1000 + 300).is_ok());
        assert!(verifier.verify_at("1000", &signature, BODY, 1000 + 301).is_err());
        assert!(verifier.verify_at("1000", &signature, BODY, 1000 - 301).is_err());
    }

    #[test]
    fn test_rejects_malformed_headers() {
        let verifier = SignatureVerifier::new(SECRET);
        assert!(verifier.verify_at("soon", "v0=00", BODY, 0).is_err());
        assert!(verifier.verify_at("0", "v1=abcd", BODY, 0).is_err());
        assert!(verifier.verify_at("0", "v0=not-hex", BODY, 0).is_err());
    }
}
