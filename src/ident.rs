//! Identifier generation.
//!
//! Document identifiers are not security sensitive: they come from
//! `thread_rng`, with no uniqueness check at generation time. Accidental
//! collisions are rare, not impossible; the storage layer's uniqueness
//! constraints are the authoritative guard and reject the insert. API key
//! material comes from the OS generator.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub const DOCUMENT_ID_LEN: usize = 5;
pub const DEFAULT_NAME_LEN: usize = 22;
pub const KEY_ID_PREFIX: &str = "0x";

const KEY_SECRET_BYTES: usize = 16;
const KEY_ID_HEX_DIGITS: usize = 6;

fn random_letters(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Short document identifier: 5 random letters.
pub fn document_id() -> String {
    random_letters(DOCUMENT_ID_LEN)
}

/// Default document name used when the caller supplies none: 22 random
/// letters, long enough that collisions are negligible in practice.
pub fn default_document_name() -> String {
    random_letters(DEFAULT_NAME_LEN)
}

/// Bearer credential: 16 bytes of OS randomness, hex-encoded.
pub fn key_secret() -> String {
    let mut buf = [0u8; KEY_SECRET_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Key handle: 24-bit random integer, zero-padded hex, `0x`-prefixed.
pub fn key_id() -> String {
    format!("{}{:06x}", KEY_ID_PREFIX, OsRng.next_u32() & 0x00ff_ffff)
}

/// Format check for key IDs as produced by [`key_id`].
pub fn is_key_id(s: &str) -> bool {
    s.len() == KEY_ID_PREFIX.len() + KEY_ID_HEX_DIGITS
        && s.starts_with(KEY_ID_PREFIX)
        && s.as_bytes()[KEY_ID_PREFIX.len()..]
            .iter()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_shape() {
        let id = document_id();
        assert_eq!(id.len(), DOCUMENT_ID_LEN);
        assert!(id.bytes().all(|b| b.is_ascii_alphabetic()));
    }

    #[test]
    fn default_name_shape() {
        let name = default_document_name();
        assert_eq!(name.len(), DEFAULT_NAME_LEN);
        assert!(name.bytes().all(|b| b.is_ascii_alphabetic()));
    }

    #[test]
    fn key_secret_is_32_hex_chars() {
        let secret = key_secret();
        assert_eq!(secret.len(), 32);
        assert!(secret.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(secret, key_secret());
    }

    #[test]
    fn key_id_format_round_trips_the_check() {
        for _ in 0..32 {
            let id = key_id();
            assert_eq!(id.len(), 8);
            assert!(is_key_id(&id), "generated id failed its own check: {id}");
        }
    }

    #[test]
    fn is_key_id_rejects_malformed_values() {
        assert!(!is_key_id(""));
        assert!(!is_key_id("0x"));
        assert!(!is_key_id("00a1b2c3"));
        assert!(!is_key_id("0x00a1b"));
        assert!(!is_key_id("0x00a1b2c"));
        assert!(!is_key_id("0x00A1B2"));
        assert!(!is_key_id("0xzzzzzz"));
    }
}
