//! HMAC-SHA256 over disclosed values.
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::base64url;

type HmacSha256 = Hmac<Sha256>;

/// Check `mac_b64url` against HMAC-SHA256(`key_b64url`, `plaintext`).
///
/// Both inputs are base64url. Any decoding problem is reported as a failed
/// check. The comparison runs in constant time.
pub fn verify_mac(plaintext: &str, key_b64url: &str, mac_b64url: &str) -> bool {
    let (key, mac) = match (base64url::decode(key_b64url), base64url::decode(mac_b64url)) {
        (Ok(key), Ok(mac)) => (key, mac),
        _ => {
            log::debug!("MAC or key is not valid base64url");
            return false;
        }
    };
    let mut hmac = match HmacSha256::new_from_slice(&key) {
        Ok(hmac) => hmac,
        Err(_) => return false,
    };
    hmac.update(plaintext.as_bytes());
    hmac.verify_slice(&mac).is_ok()
}

/// Compute the base64url HMAC-SHA256 of `plaintext` under the raw `key`.
pub fn compute_mac(plaintext: &str, key: &[u8]) -> Result<String, hmac::digest::InvalidLength> {
    let mut hmac = HmacSha256::new_from_slice(key)?;
    hmac.update(plaintext.as_bytes());
    Ok(base64url::encode(hmac.finalize().into_bytes()))
}
