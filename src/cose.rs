//! COSE_Sign1 decoding and verification (RFC 9052).
use coset::iana::EnumI64;
use coset::{
    iana, Algorithm as CoseAlgorithm, CborSerializable, CoseSign1, TaggedCborSerializable,
};

use crate::error::Error;
use crate::jwk::{Algorithm, Params, JWK};

/// Leading byte of a CBOR tag 18 (`COSE_Sign1`).
const COSE_SIGN1_TAG_BYTE: u8 = 0xd2;

/// Decode a `COSE_Sign1` object, tagged or untagged.
pub fn decode_sign1(bytes: &[u8]) -> Result<CoseSign1, Error> {
    let sign1 = if bytes.first() == Some(&COSE_SIGN1_TAG_BYTE) {
        CoseSign1::from_tagged_slice(bytes)?
    } else {
        CoseSign1::from_slice(bytes)?
    };
    Ok(sign1)
}

/// Key identifier from the protected header, falling back to the
/// unprotected one.
pub fn key_id(sign1: &CoseSign1) -> Option<&[u8]> {
    [&sign1.protected.header.key_id, &sign1.unprotected.key_id]
        .into_iter()
        .find(|kid| !kid.is_empty())
        .map(Vec::as_slice)
}

/// Signature algorithm named in the protected header.
pub fn algorithm(sign1: &CoseSign1) -> Result<Algorithm, Error> {
    match &sign1.protected.header.alg {
        Some(CoseAlgorithm::Assigned(iana::Algorithm::ES256)) => Ok(Algorithm::ES256),
        Some(CoseAlgorithm::Assigned(iana::Algorithm::PS256)) => Ok(Algorithm::PS256),
        Some(other) => Err(Error::UnsupportedAlgorithm(algorithm_name(other))),
        None => Err(Error::UnsupportedAlgorithm("missing".to_string())),
    }
}

fn algorithm_name(algorithm: &CoseAlgorithm) -> String {
    match algorithm {
        CoseAlgorithm::Assigned(i) => format!("assigned({})", i.to_i64()),
        CoseAlgorithm::PrivateUse(i) => format!("private_use({})", i),
        CoseAlgorithm::Text(text) => text.to_owned(),
    }
}

/// A public key able to check a COSE signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationKey {
    P256(p256::PublicKey),
    #[cfg(feature = "rsa")]
    Rsa(rsa::RsaPublicKey),
}

impl VerificationKey {
    /// Parse a DER `SubjectPublicKeyInfo`.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, Error> {
        use p256::pkcs8::DecodePublicKey;
        match p256::PublicKey::from_public_key_der(der) {
            Ok(key) => Ok(Self::P256(key)),
            Err(_) => Self::rsa_from_spki_der(der),
        }
    }

    #[cfg(feature = "rsa")]
    fn rsa_from_spki_der(der: &[u8]) -> Result<Self, Error> {
        use rsa::pkcs8::DecodePublicKey;
        rsa::RsaPublicKey::from_public_key_der(der)
            .map(Self::Rsa)
            .map_err(|e| Error::InvalidKey(format!("unsupported SubjectPublicKeyInfo: {}", e)))
    }

    #[cfg(not(feature = "rsa"))]
    fn rsa_from_spki_der(_der: &[u8]) -> Result<Self, Error> {
        Err(Error::InvalidKey(
            "unsupported SubjectPublicKeyInfo".to_string(),
        ))
    }

    pub fn from_jwk(jwk: &JWK) -> Result<Self, Error> {
        match &jwk.params {
            Params::EC(ec) => Ok(Self::P256(p256::PublicKey::try_from(ec)?)),
            #[cfg(feature = "rsa")]
            Params::RSA(rsa_params) => Ok(Self::Rsa(rsa::RsaPublicKey::try_from(rsa_params)?)),
            #[cfg(not(feature = "rsa"))]
            Params::RSA(_) => Err(Error::KeyTypeNotImplemented),
        }
    }
}

/// Verify the signature over the `Sig_structure`
/// `["Signature1", protected, h'', payload]`.
pub fn verify_sign1(sign1: &CoseSign1, key: &VerificationKey) -> Result<(), Error> {
    let algorithm = algorithm(sign1)?;
    let tbs = sign1.tbs_data(b"");
    match (algorithm, key) {
        (Algorithm::ES256, VerificationKey::P256(public_key)) => {
            use p256::ecdsa::signature::Verifier;
            let sig = p256::ecdsa::Signature::from_slice(&sign1.signature)
                .map_err(|_| Error::SignatureInvalid)?;
            p256::ecdsa::VerifyingKey::from(public_key)
                .verify(&tbs, &sig)
                .map_err(|_| Error::SignatureInvalid)
        }
        #[cfg(feature = "rsa")]
        (Algorithm::PS256, VerificationKey::Rsa(public_key)) => {
            crate::jws::verify_rsa(algorithm, &tbs, public_key.clone(), &sign1.signature)
        }
        _ => Err(Error::AlgorithmMismatch),
    }
}
