//! Compact JWS decoding and signature verification.
//!
//! Only the compact serialization is supported. Segments are decoded with
//! [`crate::base64url::decode`], so padded and unpadded inputs are both
//! accepted, but non-canonical trailing bits are not.
use std::collections::BTreeMap;
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::base64url;
use crate::error::{DecodeStage, Error};
use crate::jwk::{Algorithm, Params as JWKParams, JWK};

// RFC 7515 - JSON Web Signature (JWS)

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Header {
    #[serde(rename = "alg")]
    pub algorithm: String,

    #[serde(rename = "kid")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    #[serde(rename = "typ")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// `DEF` when the payload is raw-DEFLATE compressed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,

    #[serde(rename = "crit")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<Vec<String>>,

    #[serde(flatten)]
    pub additional_parameters: BTreeMap<String, Value>,
}

impl Header {
    pub fn algorithm(&self) -> Result<Algorithm, Error> {
        self.algorithm.parse()
    }

    pub fn is_deflated(&self) -> bool {
        self.zip.as_deref() == Some("DEF")
    }
}

/// The three decoded segments of a compact JWS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactParts {
    pub header: Header,
    /// Payload bytes as transmitted, before any decompression.
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
    /// `base64url(header) || '.' || base64url(payload)` exactly as received.
    pub signing_input: Vec<u8>,
}

impl CompactParts {
    /// Verify the signature with `key`, using the algorithm named in the
    /// header.
    pub fn verify(&self, key: &JWK) -> Result<(), Error> {
        let algorithm = self.header.algorithm()?;
        verify_bytes(algorithm, &self.signing_input, key, &self.signature)
    }
}

/// Split a compact JWS into exactly three segments.
pub fn split_compact(token: &str) -> Result<(&str, &str, &str), Error> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c), None) => Ok((a, b, c)),
        _ => Err(Error::decode(
            DecodeStage::Jws,
            "expected three dot-separated segments",
        )),
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, Error> {
    base64url::decode(segment)
        .map_err(|e| Error::decode(DecodeStage::Jws, format!("invalid {}: {}", name, e)))
}

/// Decode a compact JWS. A failure on any segment fails the whole token.
pub fn decode_compact(token: &str) -> Result<CompactParts, Error> {
    let (header_b64, payload_b64, signature_b64) = split_compact(token)?;
    let header_json = decode_segment(header_b64, "header")?;
    let payload = decode_segment(payload_b64, "payload")?;
    let signature = decode_segment(signature_b64, "signature")?;
    let header: Header = serde_json::from_slice(&header_json)
        .map_err(|e| Error::decode(DecodeStage::Jws, format!("invalid header: {}", e)))?;
    if let Some(name) = header.critical.iter().flatten().next() {
        return Err(Error::decode(
            DecodeStage::Jws,
            format!("unsupported critical header '{}'", name),
        ));
    }
    let signing_input = [header_b64.as_bytes(), b".", payload_b64.as_bytes()].concat();
    Ok(CompactParts {
        header,
        payload,
        signature,
        signing_input,
    })
}

/// Verify a JOSE-style signature (raw `r||s` for ECDSA) over `data`.
pub fn verify_bytes(
    algorithm: Algorithm,
    data: &[u8],
    key: &JWK,
    signature: &[u8],
) -> Result<(), Error> {
    if let Some(key_algorithm) = key.algorithm.as_deref() {
        if key_algorithm != algorithm.as_str() {
            return Err(Error::AlgorithmMismatch);
        }
    }
    match &key.params {
        JWKParams::EC(ec) => match algorithm {
            Algorithm::ES256 => {
                use p256::ecdsa::signature::Verifier;
                let public_key = p256::PublicKey::try_from(ec)?;
                let verifying_key = p256::ecdsa::VerifyingKey::from(public_key);
                let sig = p256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| Error::SignatureInvalid)?;
                verifying_key
                    .verify(data, &sig)
                    .map_err(|_| Error::SignatureInvalid)
            }
            _ => Err(Error::AlgorithmMismatch),
        },
        #[cfg(feature = "rsa")]
        JWKParams::RSA(rsa_params) => {
            let public_key = rsa::RsaPublicKey::try_from(rsa_params)?;
            verify_rsa(algorithm, data, public_key, signature)
        }
        #[cfg(not(feature = "rsa"))]
        JWKParams::RSA(_) => Err(Error::KeyTypeNotImplemented),
    }
}

#[cfg(feature = "rsa")]
pub(crate) fn verify_rsa(
    algorithm: Algorithm,
    data: &[u8],
    public_key: rsa::RsaPublicKey,
    signature: &[u8],
) -> Result<(), Error> {
    use rsa::signature::Verifier;
    use sha2::Sha256;
    match algorithm {
        Algorithm::RS256 => {
            let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key);
            let sig = rsa::pkcs1v15::Signature::try_from(signature)
                .map_err(|_| Error::SignatureInvalid)?;
            verifying_key
                .verify(data, &sig)
                .map_err(|_| Error::SignatureInvalid)
        }
        Algorithm::PS256 => {
            let verifying_key = rsa::pss::VerifyingKey::<Sha256>::new(public_key);
            let sig =
                rsa::pss::Signature::try_from(signature).map_err(|_| Error::SignatureInvalid)?;
            verifying_key
                .verify(data, &sig)
                .map_err(|_| Error::SignatureInvalid)
        }
        _ => Err(Error::AlgorithmMismatch),
    }
}
