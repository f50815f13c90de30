//! Slack request signature verification.
//!
//! Slack signs every callback with HMAC-SHA256 over
//! `"v0:" + timestamp + ":" + body`, keyed by the app's signing secret, and
//! sends `"v0=" + hex(digest)` in `X-Slack-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Header carrying the Unix timestamp that was signed
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Signature scheme version
pub const SIGNATURE_VERSION: &str = "v0";

/// Compute the signature Slack would send for this request.
pub fn compute_signature(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);

    format!(
        "{}={}",
        SIGNATURE_VERSION,
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Verify a supplied signature.
///
/// Returns `false` on any mismatch, including an empty signature or
/// timestamp; never panics.
pub fn verify(signing_secret: &str, timestamp: &str, body: &[u8], supplied: &str) -> bool {
    if supplied.is_empty() || timestamp.is_empty() {
        return false;
    }
    let expected = compute_signature(signing_secret, timestamp, body);
    constant_time_compare(&expected, supplied)
}

/// Whether `timestamp` (Unix seconds, as text) lies within `max_age` of `now`.
///
/// Timestamps in the future are held to the same window. Anything that is not
/// a decimal integer is stale.
pub fn is_timestamp_fresh(timestamp: &str, now: u64, max_age: Duration) -> bool {
    let Ok(ts) = timestamp.trim().parse::<u64>() else {
        return false;
    };
    now.abs_diff(ts) <= max_age.as_secs()
}

/// Constant-time string comparison to prevent timing attacks
///
/// SECURITY: This function takes the same amount of time regardless of how
/// many characters match, preventing timing side-channel attacks.
///
/// IMPORTANT: We use `subtle::ConstantTimeEq` for proper constant-time comparison.
/// The naive XOR approach can still be optimized by the compiler.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    // Pad shorter string to match length (prevents length oracle)
    let max_len = std::cmp::max(a.len(), b.len());

    // Different pad values ensure a mismatch when lengths differ
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];

    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
