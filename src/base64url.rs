//! Base64url helpers shared by the compact-token decoder and the MAC verifier.
//!
//! Decoding maps the URL-safe alphabet back onto the standard one (`-` to
//! `+`, `_` to `/`) and restores `=` padding to a multiple of four before
//! handing the string to a strict standard decoder. Non-canonical trailing
//! bits are rejected, so two distinct strings never decode to the same bytes.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

pub use base64::DecodeError;

/// Characters of the base64url alphabet.
pub fn is_base64url_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Restore the standard alphabet and padding.
pub fn to_standard(input: &str) -> String {
    let mut standard: String = input
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    while standard.len() % 4 != 0 {
        standard.push('=');
    }
    standard
}

pub fn decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(to_standard(input))
}

/// Encode without padding.
pub fn encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}
