//! HMAC-SHA256 request signing and nonce generation for private calls.
//!
//! The service authenticates a private call with three headers:
//! - `Apiauth-Key`: the API key
//! - `Apiauth-Nonce`: a strictly increasing integer
//! - `Apiauth-Signature`: uppercase hex HMAC-SHA256 of
//!   `nonce + key + "/api" + path + "/" + encoded_params`, keyed by the secret
//!
//! A nonce that is not greater than the last one the service saw for the key
//! is rejected, so `NonceSequence` never hands out the same value twice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::ApiError;
use crate::params::RequestParams;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_KEY: &str = "Apiauth-Key";
pub const HEADER_NONCE: &str = "Apiauth-Nonce";
pub const HEADER_SIGNATURE: &str = "Apiauth-Signature";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Scale applied to the millisecond clock when deriving nonces.
const NONCE_SCALE: u64 = 10_000;

/// Per-client source of strictly increasing nonces.
///
/// Each value is `max(last + 1, unix_millis * 10_000)`, committed with a
/// compare-and-swap so concurrent callers never observe the same nonce.
#[derive(Debug, Default)]
pub struct NonceSequence {
    last: AtomicU64,
}

impl NonceSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next nonce derived from the wall clock.
    pub fn next(&self) -> u64 {
        self.advance(unix_millis().saturating_mul(NONCE_SCALE))
    }

    /// Last nonce handed out, or 0 if none.
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }

    fn advance(&self, candidate: u64) -> u64 {
        let mut prev = self.last.load(Ordering::Acquire);
        loop {
            let next = candidate.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The path component that is signed: `/api{path}/`.
pub fn signing_path(path: &str) -> String {
    format!("/api{path}/")
}

/// The exact string fed to HMAC.
pub fn signing_message(nonce: u64, key: &str, path: &str, encoded_params: &str) -> String {
    format!("{nonce}{key}{}{encoded_params}", signing_path(path))
}

/// Sign a private call. `path` is the API-relative path (`/wallet-send`,
/// `/ad-get/ad_id/123`) and `params` are encoded exactly as they are sent.
pub fn sign(
    path: &str,
    params: &RequestParams,
    nonce: u64,
    key: &str,
    secret: &str,
) -> Result<String, ApiError> {
    sign_encoded(path, &params.encode(), nonce, key, secret)
}

/// Like `sign`, for callers that already hold the encoded parameter string.
pub fn sign_encoded(
    path: &str,
    encoded_params: &str,
    nonce: u64,
    key: &str,
    secret: &str,
) -> Result<String, ApiError> {
    let message = signing_message(nonce, key, path, encoded_params);
    tracing::trace!(nonce, %message, "signing private request");
    hmac_sha256_upper_hex(secret.as_bytes(), &message)
}

fn hmac_sha256_upper_hex(secret: &[u8], message: &str) -> Result<String, ApiError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ApiError::Configuration(format!("invalid HMAC key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

/// API key and secret used to sign private calls.
///
/// The secret is held in a `SecretString` and never shows up in `Debug`
/// output or logs.
#[derive(Debug, Clone)]
pub struct Credentials {
    key: String,
    secret: SecretString,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: SecretString) -> Self {
        Self {
            key: key.into(),
            secret,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn sign_encoded(
        &self,
        path: &str,
        encoded_params: &str,
        nonce: u64,
    ) -> Result<String, ApiError> {
        sign_encoded(
            path,
            encoded_params,
            nonce,
            &self.key,
            self.secret.expose_secret(),
        )
    }

    /// Authentication headers for a private call, in the order they are sent.
    pub fn headers(
        &self,
        path: &str,
        encoded_params: &str,
        nonce: u64,
    ) -> Result<Vec<(String, String)>, ApiError> {
        let signature = self.sign_encoded(path, encoded_params, nonce)?;
        Ok(vec![
            ("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()),
            (HEADER_KEY.to_string(), self.key.clone()),
            (HEADER_NONCE.to_string(), nonce.to_string()),
            (HEADER_SIGNATURE.to_string(), signature),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn signing_message_layout() {
        let message = signing_message(1234, "key", "/wallet-send", "address=1abc&amount=0.1");
        assert_eq!(message, "1234key/api/wallet-send/address=1abc&amount=0.1");
    }

    #[test]
    fn signing_path_always_has_trailing_slash() {
        assert_eq!(signing_path("/myself"), "/api/myself/");
        assert_eq!(signing_path("/ad-get/ad_id/42"), "/api/ad-get/ad_id/42/");
    }

    #[test]
    fn signature_is_64_uppercase_hex() {
        let params = RequestParams::new().with("address", "1abc").with("amount", "0.1");
        let sig = sign("/wallet-send", &params, 1, "key", "secret").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn signature_is_deterministic() {
        let params = RequestParams::new().with("msg", "hello!");
        let a = sign("/ad", &params, 99, "key", "secret").unwrap();
        let b = sign("/ad", &params, 99, "key", "secret").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn signature_depends_on_every_input() {
        let params = RequestParams::new().with("a", "1");
        let base = sign("/ads", &params, 1, "key", "secret").unwrap();
        assert_ne!(base, sign("/ad", &params, 1, "key", "secret").unwrap());
        assert_ne!(base, sign("/ads", &params, 2, "key", "secret").unwrap());
        assert_ne!(base, sign("/ads", &params, 1, "other", "secret").unwrap());
        assert_ne!(base, sign("/ads", &params, 1, "key", "other").unwrap());
        let changed = RequestParams::new().with("a", "2");
        assert_ne!(base, sign("/ads", &changed, 1, "key", "secret").unwrap());
    }

    #[test]
    fn known_signature() {
        // HMAC-SHA256("secret", "1000keyvalue/api/myself/")
        let sig = sign_encoded("/myself", "", 1000, "keyvalue", "secret").unwrap();
        assert_eq!(
            sig,
            "00F9BDA61473A7F04341255738C63B5E60C479AB9A9344AED3846D51430BFFE2"
        );
    }

    #[test]
    fn msg_is_escaped_before_signing() {
        let params = RequestParams::new().with("msg", "a!b");
        let expected = sign_encoded("/ad", "msg=a%21b", 5, "k", "s").unwrap();
        assert_eq!(sign("/ad", &params, 5, "k", "s").unwrap(), expected);
    }

    #[test]
    fn headers_carry_key_nonce_and_signature() {
        let creds = Credentials::new("my-key", SecretString::from("my-secret".to_owned()));
        let headers = creds.headers("/myself", "", 77).unwrap();
        let names: Vec<_> = headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            ["Content-Type", HEADER_KEY, HEADER_NONCE, HEADER_SIGNATURE]
        );
        assert_eq!(headers[0].1, FORM_CONTENT_TYPE);
        assert_eq!(headers[1].1, "my-key");
        assert_eq!(headers[2].1, "77");
        assert_eq!(
            headers[3].1,
            sign_encoded("/myself", "", 77, "my-key", "my-secret").unwrap()
        );
    }

    #[test]
    fn debug_does_not_expose_secret() {
        let creds = Credentials::new("k", SecretString::from("super-secret-value".to_owned()));
        assert!(!format!("{creds:?}").contains("super-secret-value"));
    }

    #[test]
    fn nonce_is_strictly_increasing() {
        let nonces = NonceSequence::new();
        let mut prev = 0;
        for _ in 0..10_000 {
            let n = nonces.next();
            assert!(n > prev, "{n} <= {prev}");
            prev = n;
        }
    }

    #[test]
    fn nonce_follows_clock_when_ahead() {
        let nonces = NonceSequence::new();
        assert_eq!(nonces.advance(100), 100);
        assert_eq!(nonces.advance(100), 101);
        assert_eq!(nonces.advance(50), 102);
        assert_eq!(nonces.advance(500), 500);
        assert_eq!(nonces.last(), 500);
    }

    #[test]
    fn nonce_is_scaled_wall_clock() {
        let before = unix_millis() * NONCE_SCALE;
        let n = NonceSequence::new().next();
        assert!(n >= before);
    }

    #[test]
    fn concurrent_nonces_are_unique() {
        let nonces = Arc::new(NonceSequence::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let nonces = Arc::clone(&nonces);
                std::thread::spawn(move || (0..1_000).map(|_| nonces.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let batch = handle.join().unwrap();
            assert!(batch.windows(2).all(|w| w[0] < w[1]));
            for n in batch {
                assert!(seen.insert(n), "duplicate nonce {n}");
            }
        }
        assert_eq!(seen.len(), 8_000);
    }
}
