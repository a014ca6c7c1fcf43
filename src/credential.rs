//! The format-independent credential representation.
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use coset::CoseSign1;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dcc;
use crate::jws::CompactParts;
use crate::shc;
use crate::vc::Credential;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialFormat {
    #[serde(rename = "jsonld-vc")]
    JsonLdVc,
    #[serde(rename = "smart-health-card")]
    SmartHealthCard,
    #[serde(rename = "eu-dcc")]
    EuDcc,
    #[serde(rename = "unknown")]
    Unknown,
}

impl CredentialFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonLdVc => "jsonld-vc",
            Self::SmartHealthCard => "smart-health-card",
            Self::EuDcc => "eu-dcc",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard claims, populated from the VC members, the JWT claims of a
/// health card or the CWT claims of a DCC.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
}

/// Claims shown to a person checking a credential.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DisplayClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// What a signature check needs, decoded afresh from the raw input.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureMaterial {
    JsonLd {
        /// The credential with `proof.signatureValue` and the obfuscation
        /// descriptors removed.
        unsigned: Value,
        signature: Option<String>,
        verification_method: Option<String>,
        issuer: String,
    },
    Jws {
        parts: CompactParts,
        issuer: String,
    },
    Cose {
        sign1: CoseSign1,
        key_id: Option<Vec<u8>>,
    },
}

/// A decoded credential. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCredential {
    pub(crate) format: CredentialFormat,
    pub(crate) raw: Vec<u8>,
    pub(crate) payload: Map<String, Value>,
    pub(crate) claims: Claims,
}

impl NormalizedCredential {
    pub fn format(&self) -> CredentialFormat {
        self.format
    }

    /// The input exactly as supplied.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claims.issuer.as_deref()
    }

    /// Typed view of a JSON-LD credential.
    pub fn credential(&self) -> Option<Credential> {
        match self.format {
            CredentialFormat::JsonLdVc => {
                Credential::from_json(&Value::Object(self.payload.clone())).ok()
            }
            _ => None,
        }
    }

    pub fn display_claims(&self) -> DisplayClaims {
        let mut display = DisplayClaims {
            issuer: self.claims.issuer.clone(),
            issued_at: self.claims.issued_at,
            expires_at: self.claims.expires_at,
            ..Default::default()
        };
        match self.format {
            CredentialFormat::JsonLdVc => {
                if let Some(credential) = self.credential() {
                    display.subject_name = credential.subject_name();
                    display.birth_date = credential.birth_date().map(str::to_string);
                    if let Some(name) = credential.issuer.name() {
                        display.issuer = Some(name.to_string());
                    }
                }
            }
            CredentialFormat::SmartHealthCard => {
                if let Some(patient) = shc::patient(&self.payload) {
                    display.subject_name = shc::patient_name(patient);
                    display.birth_date = patient
                        .get("birthDate")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
            }
            CredentialFormat::EuDcc => {
                if let Some(hcert) = self.payload.get("hcert") {
                    display.subject_name = dcc::holder_name(hcert);
                    display.birth_date = dcc::birth_date(hcert).map(str::to_string);
                }
            }
            CredentialFormat::Unknown => {}
        }
        display
    }
}

/// Seconds since the epoch as a UTC date. Out-of-range values give `None`.
pub fn timestamp(seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

/// A JSON numeric date (RFC 7519), integer or fractional, rounded to the
/// nearest second.
pub fn numeric_date(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(seconds) = value.as_u64() {
        return timestamp(seconds);
    }
    let seconds = value.as_f64()?.round();
    if seconds.is_finite() && seconds >= 0.0 && seconds < i64::MAX as f64 {
        timestamp(seconds as u64)
    } else {
        None
    }
}
