//! Time-based one-time password validation.
//!
//! Fixed parameters: 6 digits, 30-second step, HMAC-SHA1. Validation is
//! evaluated at "now plus a forward skew" rather than the present instant:
//! callers generate a token and then issue a key shortly afterwards, so the
//! reference timestamp leans into the upcoming window. Callers depend on this;
//! do not remove the skew.
//!
//! No replay window is tracked: a token validates for its whole step, and may
//! gate more than one key-creation call within it.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

pub const DIGITS: u32 = 6;
pub const STEP_SECONDS: u64 = 30;
/// Offset applied by callers of [`validate`]; see module docs.
pub const FORWARD_SKEW_MILLIS: u64 = 30_000;

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Compute the code for `secret` at the given epoch-millisecond instant.
pub fn code_at(secret: &[u8], unix_millis: u64) -> String {
    let counter = (unix_millis / 1000) / STEP_SECONDS;
    // HMAC accepts keys of any length; new_from_slice cannot fail here.
    let mut mac = HmacSha1::new_from_slice(secret).expect("hmac key");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // RFC 4226 dynamic truncation.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);
    format!("{:06}", bin % 10u32.pow(DIGITS))
}

/// Validate `token` against `secret` at "now + `clock_offset_millis`".
///
/// Total: a malformed or absent token yields `false`, never an error.
pub fn validate(secret: &str, token: Option<&str>, clock_offset_millis: u64) -> bool {
    let token = match token {
        Some(t) => t.trim(),
        None => return false,
    };
    if token.len() != DIGITS as usize || !token.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let at = now_millis().saturating_add(clock_offset_millis);
    let expected = code_at(secret.as_bytes(), at);
    ct_eq(expected.as_bytes(), token.as_bytes())
}

/// Constant-time equality for two byte slices.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc: u8 = 0;
    for i in 0..a.len() {
        acc |= a[i] ^ b[i];
    }
    acc == 0
}
