//! Deterministic re-serialization and ECDSA verification of JSON-LD
//! credential bodies.
//!
//! The canonical form is the JSON Canonicalization Scheme: object keys
//! sorted, no insignificant whitespace, `/` left unescaped. The signer
//! computed the signature over the credential with `proof.signatureValue`
//! and the obfuscation descriptors removed, so callers strip both with
//! [`strip_for_signing`] before calling [`verify`].
use std::convert::TryFrom;

use serde_json::Value;

use crate::base64url;
use crate::error::Error;
use crate::jwk::{Params, JWK};

pub const SIGNATURE_VALUE: &str = "signatureValue";

/// Canonical bytes of `value`.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, Error> {
    Ok(serde_jcs::to_vec(value)?)
}

/// Copy of `credential` with `proof.signatureValue` and the top-level
/// `obfuscation_field` removed.
pub fn strip_for_signing(credential: &Value, obfuscation_field: &str) -> Value {
    let mut stripped = credential.clone();
    if let Some(object) = stripped.as_object_mut() {
        object.remove(obfuscation_field);
        if let Some(proof) = object.get_mut("proof").and_then(Value::as_object_mut) {
            proof.remove(SIGNATURE_VALUE);
        }
    }
    stripped
}

/// The base64url signature carried in `proof.signatureValue`, if any.
pub fn signature_value(credential: &Value) -> Option<&str> {
    credential
        .get("proof")
        .and_then(|proof| proof.get(SIGNATURE_VALUE))
        .and_then(Value::as_str)
}

/// Verify a DER-encoded ES256 signature over the canonical form of
/// `credential_without_proof`.
pub fn try_verify(
    credential_without_proof: &Value,
    signature_b64url: &str,
    public_jwk: &JWK,
) -> Result<(), Error> {
    use p256::ecdsa::signature::Verifier;
    let ec = match &public_jwk.params {
        Params::EC(ec) => ec,
        _ => return Err(Error::KeyTypeNotImplemented),
    };
    let public_key = p256::PublicKey::try_from(ec)?;
    let data = canonical_bytes(credential_without_proof)?;
    let signature_der = base64url::decode(signature_b64url)?;
    let signature =
        p256::ecdsa::Signature::from_der(&signature_der).map_err(|_| Error::SignatureInvalid)?;
    p256::ecdsa::VerifyingKey::from(public_key)
        .verify(&data, &signature)
        .map_err(|_| Error::SignatureInvalid)
}

/// Boolean form of [`try_verify`].
pub fn verify(credential_without_proof: &Value, signature_b64url: &str, public_jwk: &JWK) -> bool {
    match try_verify(credential_without_proof, signature_b64url, public_jwk) {
        Ok(()) => true,
        Err(err) => {
            log::debug!("canonical signature check failed: {}", err);
            false
        }
    }
}
