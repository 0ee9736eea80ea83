//! Time-limited media links — HMAC-signed download URLs.
//!
//! A stored attachment is referenced by an opaque storage key; the
//! resolver turns it into `{base}/media/{key}?expires=…&sig=…` where
//! `sig` is HMAC-SHA256 over `"{key}:{expires}"`. Whoever serves
//! `/media/{key}` validates with [`verify`].

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use echo_core::config::MediaConfig;

use crate::error::MediaError;

type HmacSha256 = Hmac<Sha256>;

/// Resolves a storage key into an externally fetchable link.
pub trait MediaResolver: Send + Sync {
    fn signed_url(&self, key: &str) -> Result<String, MediaError>;
}

/// Production resolver. Unconfigured base URL or secret yields
/// `MediaError::Unconfigured`, which the pipeline degrades into a
/// placeholder notice rather than a failed delivery.
pub struct HmacMediaResolver {
    base_url: Option<String>,
    secret: Option<String>,
    ttl_secs: u64,
}

impl HmacMediaResolver {
    pub fn from_config(cfg: &MediaConfig) -> Self {
        Self {
            base_url: cfg.url.clone(),
            secret: cfg.secret.clone(),
            ttl_secs: cfg.ttl,
        }
    }
}

impl MediaResolver for HmacMediaResolver {
    fn signed_url(&self, key: &str) -> Result<String, MediaError> {
        let base = self.base_url.as_deref().ok_or(MediaError::Unconfigured)?;
        let secret = self.secret.as_deref().ok_or(MediaError::Unconfigured)?;

        let expires = Utc::now().timestamp() + self.ttl_secs as i64;
        let sig = sign(secret, key, expires)?;
        Ok(format!(
            "{}/media/{}?expires={}&sig={}",
            base.trim_end_matches('/'),
            encode_path(key),
            expires,
            sig
        ))
    }
}

/// Percent-encode the key for use as a URL path, keeping `/` as the
/// segment separator. The signature covers the raw key; the serving
/// side decodes the path before verifying.
fn encode_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn sign(secret: &str, key: &str, expires: i64) -> Result<String, MediaError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| MediaError::Signing(e.to_string()))?;
    mac.update(format!("{key}:{expires}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a signed link's expiry and signature at instant `now`
/// (Unix seconds).
pub fn verify(secret: &str, key: &str, expires: i64, sig_hex: &str, now: i64) -> bool {
    if expires < now {
        return false;
    }
    let Ok(expected) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{key}:{expires}").as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> HmacMediaResolver {
        HmacMediaResolver {
            base_url: Some("https://echo.local".into()),
            secret: Some("s3cret".into()),
            ttl_secs: 604_800,
        }
    }

    #[test]
    fn signed_url_round_trips_through_verify() {
        let url = resolver().signed_url("uploads/u1/video.mp4").unwrap();
        assert!(url.starts_with("https://echo.local/media/uploads/u1/video.mp4?expires="));

        let query = url.split_once('?').unwrap().1;
        let mut expires = 0i64;
        let mut sig = "";
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("sig", v) => sig = v,
                _ => {}
            }
        }

        let now = Utc::now().timestamp();
        assert!(verify("s3cret", "uploads/u1/video.mp4", expires, sig, now));
        // Wrong key or expired link fails.
        assert!(!verify("s3cret", "uploads/u1/other.mp4", expires, sig, now));
        assert!(!verify("s3cret", "uploads/u1/video.mp4", expires, sig, expires + 1));
        assert!(!verify("wrong", "uploads/u1/video.mp4", expires, sig, now));
    }

    #[test]
    fn reserved_characters_in_the_key_are_path_encoded() {
        let url = resolver().signed_url("uploads/u1/my video?.mp4").unwrap();
        let (path, query) = url.split_once('?').unwrap();
        assert_eq!(
            path,
            "https://echo.local/media/uploads/u1/my%20video%3F.mp4"
        );
        // The signature still covers the raw key, so the decoded path
        // verifies.
        let mut expires = 0i64;
        let mut sig = "";
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("sig", v) => sig = v,
                _ => {}
            }
        }
        let now = Utc::now().timestamp();
        assert!(verify("s3cret", "uploads/u1/my video?.mp4", expires, sig, now));
    }

    #[test]
    fn unconfigured_resolver_errors() {
        let r = HmacMediaResolver {
            base_url: None,
            secret: None,
            ttl_secs: 60,
        };
        assert!(matches!(
            r.signed_url("k").unwrap_err(),
            MediaError::Unconfigured
        ));
    }
}
