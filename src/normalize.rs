//! Format detection and normalization.
//!
//! Detection order:
//! 1. a JSON object with a Verifiable Credential shape (optionally wrapped
//!    in `verifiableCredential`),
//! 2. a `shc:/` SMART Health Card,
//! 3. an `HC1:` EU DCC,
//! 4. one base64 unwrap followed by a second attempt.
//!
//! Anything else is [`Error::MalformedInput`].
use serde_json::{Map, Value};

use crate::base64url;
use crate::canonical;
use crate::cose;
use crate::credential::{
    numeric_date, timestamp, Claims, CredentialFormat, NormalizedCredential, SignatureMaterial,
};
use crate::dcc;
use crate::error::Error;
use crate::options::VerifierOptions;
use crate::shc;
use crate::vc::{self, Credential};

struct Decoded {
    format: CredentialFormat,
    payload: Map<String, Value>,
    claims: Claims,
    material: SignatureMaterial,
}

pub fn normalize(input: &[u8]) -> Result<NormalizedCredential, Error> {
    normalize_with(input, &VerifierOptions::default())
}

pub fn normalize_str(input: &str) -> Result<NormalizedCredential, Error> {
    normalize_with(input.as_bytes(), &VerifierOptions::default())
}

pub fn normalize_with(
    input: &[u8],
    options: &VerifierOptions,
) -> Result<NormalizedCredential, Error> {
    let decoded = decode(input, options)?;
    log::debug!("normalized {} credential", decoded.format);
    Ok(NormalizedCredential {
        format: decoded.format,
        raw: input.to_vec(),
        payload: decoded.payload,
        claims: decoded.claims,
    })
}

/// Classify `input` without keeping the decoded result.
pub fn detect_format(input: &[u8]) -> CredentialFormat {
    match decode(input, &VerifierOptions::default()) {
        Ok(decoded) => decoded.format,
        Err(err) => {
            log::debug!("format detection failed: {}", err);
            CredentialFormat::Unknown
        }
    }
}

impl NormalizedCredential {
    /// Signature material decoded again from the raw input.
    pub fn signature_material(&self, options: &VerifierOptions) -> Result<SignatureMaterial, Error> {
        let decoded = decode(&self.raw, options)?;
        if decoded.format != self.format {
            return Err(Error::malformed("raw input no longer matches its format"));
        }
        Ok(decoded.material)
    }
}

fn decode(input: &[u8], options: &VerifierOptions) -> Result<Decoded, Error> {
    let text = std::str::from_utf8(input).map_err(|_| Error::malformed("input is not UTF-8"))?;
    decode_text(text, options, options.unwrap_base64)
}

fn decode_text(text: &str, options: &VerifierOptions, unwrap: bool) -> Result<Decoded, Error> {
    let text = text.trim();
    if text.starts_with('{') {
        if let Ok(json) = serde_json::from_str::<Value>(text) {
            return decode_json_ld(json, options);
        }
    }
    if shc::strip_prefix(text).is_some() {
        return decode_shc(text, options);
    }
    if dcc::strip_prefix(text).is_some() {
        return decode_dcc(text, options);
    }
    if unwrap {
        if let Some(inner) = unwrap_base64(text) {
            log::debug!("retrying detection on base64-decoded input");
            return decode_text(&inner, options, false);
        }
    }
    Err(Error::malformed("unrecognized credential encoding"))
}

fn unwrap_base64(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let bytes = base64url::decode(text).ok()?;
    String::from_utf8(bytes).ok()
}

/// The credential object, unwrapping a `verifiableCredential` member that
/// holds exactly one credential.
fn credential_object(json: Value) -> Result<Map<String, Value>, Error> {
    let mut object = match json {
        Value::Object(object) => object,
        _ => return Err(Error::malformed("credential is not a JSON object")),
    };
    if !object.contains_key("credentialSubject") {
        match object.remove("verifiableCredential") {
            Some(Value::Object(inner)) => object = inner,
            Some(Value::Array(mut inner)) if inner.len() == 1 => match inner.pop() {
                Some(Value::Object(single)) => object = single,
                _ => return Err(Error::malformed("verifiableCredential is not an object")),
            },
            Some(Value::Array(inner)) => {
                return Err(Error::malformed(format!(
                    "presentation holds {} credentials",
                    inner.len()
                )))
            }
            Some(_) => return Err(Error::malformed("verifiableCredential is not an object")),
            None => {}
        }
    }
    for member in ["credentialSubject", "issuer"] {
        match object.get(member) {
            None | Some(Value::Null) => {
                return Err(Error::malformed(format!("credential has no {}", member)))
            }
            _ => {}
        }
    }
    match object.get("credentialSubject") {
        Some(Value::Object(_)) => Ok(object),
        Some(Value::Array(subjects)) if !subjects.is_empty() => Ok(object),
        _ => Err(Error::malformed("credentialSubject is not an object")),
    }
}

fn decode_json_ld(json: Value, options: &VerifierOptions) -> Result<Decoded, Error> {
    let payload = credential_object(json)?;
    let body = Value::Object(payload.clone());
    let credential = Credential::from_json(&body)?;
    let parse = |date: &Option<String>| {
        date.as_deref()
            .map(|date| vc::parse_date(date, &options.date_formats))
            .transpose()
    };
    let claims = Claims {
        issuer: Some(credential.issuer.id().to_string()),
        issued_at: parse(&credential.issuance_date)?,
        expires_at: parse(&credential.expiration_date)?,
        not_before: None,
        subject_id: credential.subject_id().map(str::to_string),
    };
    let material = SignatureMaterial::JsonLd {
        unsigned: canonical::strip_for_signing(&body, &options.obfuscation_field),
        signature: canonical::signature_value(&body).map(str::to_string),
        verification_method: credential
            .proof
            .as_ref()
            .and_then(|proof| proof.verification_method.clone()),
        issuer: credential.issuer.id().to_string(),
    };
    Ok(Decoded {
        format: CredentialFormat::JsonLdVc,
        payload,
        claims,
        material,
    })
}

fn decode_shc(text: &str, options: &VerifierOptions) -> Result<Decoded, Error> {
    let parts = shc::decode(text)?;
    let payload = shc::payload_json(&parts, options.max_decompressed_len)?;
    let issuer = payload
        .get("iss")
        .and_then(Value::as_str)
        .filter(|iss| !iss.is_empty())
        .ok_or_else(|| Error::malformed("health card has no iss"))?
        .to_string();
    let date = |name: &str| payload.get(name).and_then(numeric_date);
    let claims = Claims {
        issuer: Some(issuer.clone()),
        issued_at: date("iat").or_else(|| date("nbf")),
        expires_at: date("exp"),
        not_before: date("nbf"),
        subject_id: None,
    };
    Ok(Decoded {
        format: CredentialFormat::SmartHealthCard,
        payload,
        claims,
        material: SignatureMaterial::Jws { parts, issuer },
    })
}

fn decode_dcc(text: &str, options: &VerifierOptions) -> Result<Decoded, Error> {
    let decoded = dcc::decode(text, options.max_decompressed_len)?;
    let cwt = &decoded.cwt;
    let issuer = cwt
        .iss
        .clone()
        .filter(|iss| !iss.is_empty())
        .ok_or_else(|| Error::malformed("certificate has no issuer claim"))?;
    let payload = cwt.to_json();
    let subject_id = payload
        .get("sub")
        .and_then(Value::as_str)
        .or_else(|| cwt.hcert.as_ref().and_then(dcc::certificate_id))
        .map(str::to_string);
    let claims = Claims {
        issuer: Some(issuer),
        issued_at: cwt.iat.and_then(timestamp),
        expires_at: cwt.exp.and_then(timestamp),
        not_before: cwt.nbf.and_then(timestamp),
        subject_id,
    };
    let key_id = cose::key_id(&decoded.sign1).map(<[u8]>::to_vec);
    Ok(Decoded {
        format: CredentialFormat::EuDcc,
        payload,
        claims,
        material: SignatureMaterial::Cose {
            sign1: decoded.sign1,
            key_id,
        },
    })
}
