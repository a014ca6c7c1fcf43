//! Typed view of a JSON-LD Verifiable Credential.
//!
//! Only the members needed to identify the issuer, the subject and the
//! signature are typed. Everything else stays in the payload map.
use std::convert::TryFrom;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DecodeStage, Error};
use crate::one_or_many::OneOrMany;

pub const DEFAULT_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(rename = "@context")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<OneOrMany<Context>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<OneOrMany<String>>,
    /// An object, or an array of objects for several subjects.
    pub credential_subject: Value,
    pub issuer: Issuer,
    #[serde(alias = "validFrom")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<String>,
    #[serde(alias = "validUntil")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Context {
    URI(String),
    Object(Map<String, Value>),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
#[serde(try_from = "IssuerUnchecked")]
pub enum Issuer {
    URI(String),
    Object(ObjectWithId),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum IssuerUnchecked {
    URI(String),
    Object(ObjectWithId),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ObjectWithId {
    pub id: String,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_value: Option<String>,
    #[serde(flatten)]
    pub property_set: Map<String, Value>,
}

impl TryFrom<IssuerUnchecked> for Issuer {
    type Error = &'static str;
    fn try_from(issuer: IssuerUnchecked) -> Result<Self, Self::Error> {
        // must be either URI or object containing id property
        match issuer {
            IssuerUnchecked::URI(uri) => {
                if uri.contains(':') {
                    Ok(Issuer::URI(uri))
                } else {
                    Err("Issuer string is not a URI")
                }
            }
            IssuerUnchecked::Object(object) => Ok(Issuer::Object(object)),
        }
    }
}

impl Issuer {
    pub fn id(&self) -> &str {
        match self {
            Self::URI(uri) => uri,
            Self::Object(object) => &object.id,
        }
    }

    /// `name` of an issuer given as an object.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::URI(_) => None,
            Self::Object(object) => object.property_set.get("name").and_then(Value::as_str),
        }
    }
}

impl Credential {
    pub fn from_json(json: &Value) -> Result<Self, Error> {
        Credential::deserialize(json).map_err(|e| Error::malformed(e.to_string()))
    }

    /// The single credential subject. Credentials with several subjects are
    /// reported by their first one.
    pub fn subject(&self) -> Option<&Value> {
        match &self.credential_subject {
            Value::Array(subjects) => subjects.first(),
            Value::Object(_) => Some(&self.credential_subject),
            _ => None,
        }
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.subject()?.get("id").and_then(Value::as_str)
    }

    pub fn subject_name(&self) -> Option<String> {
        let subject = self.subject()?;
        if let Some(name) = subject.get("name").and_then(Value::as_str) {
            return Some(name.to_string());
        }
        let parts: Vec<&str> = ["givenName", "familyName"]
            .iter()
            .filter_map(|key| subject.get(*key).and_then(Value::as_str))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    pub fn birth_date(&self) -> Option<&str> {
        self.subject()?.get("birthDate").and_then(Value::as_str)
    }
}

/// Parse a VC date: RFC 3339 first, then each of `formats` as a date-time
/// and then as a plain date (midnight UTC). There is no fallback value.
pub fn parse_date(date: &str, formats: &[String]) -> Result<DateTime<Utc>, Error> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in formats {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(date, format) {
            return Ok(DateTime::from_naive_utc_and_offset(parsed, Utc));
        }
        if let Some(midnight) = NaiveDate::parse_from_str(date, format)
            .ok()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
        {
            return Ok(DateTime::from_naive_utc_and_offset(midnight, Utc));
        }
    }
    Err(Error::decode(
        DecodeStage::Date,
        format!("unrecognized date '{}'", date),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::VerifierOptions;
    use serde_json::json;

    #[test]
    fn credential_from_json() {
        let credential = Credential::from_json(&json!({
            "@context": [DEFAULT_CONTEXT, { "name": "https://schema.org/name" }],
            "type": ["VerifiableCredential", "HealthCredential"],
            "issuer": { "id": "did:example:issuer", "name": "Example Clinic" },
            "issuanceDate": "2021-06-01T00:00:00Z",
            "credentialSubject": { "id": "did:example:subject", "givenName": "Jane", "familyName": "Doe" },
            "proof": {
                "type": "EcdsaSecp256r1Signature2019",
                "verificationMethod": "did:example:issuer#key-1",
                "signatureValue": "sig"
            }
        }))
        .unwrap();
        assert!(matches!(credential.type_, Some(OneOrMany::Many(ref types)) if types.len() == 2));
        assert_eq!(credential.issuer.id(), "did:example:issuer");
        assert_eq!(credential.issuer.name(), Some("Example Clinic"));
        assert_eq!(credential.subject_id(), Some("did:example:subject"));
        assert_eq!(credential.subject_name().as_deref(), Some("Jane Doe"));
        let proof = credential.proof.unwrap();
        assert_eq!(proof.signature_value.as_deref(), Some("sig"));
        assert_eq!(
            proof.verification_method.as_deref(),
            Some("did:example:issuer#key-1")
        );
    }

    #[test]
    fn required_members() {
        let no_subject = json!({ "issuer": "did:example:issuer" });
        assert!(matches!(
            Credential::from_json(&no_subject),
            Err(Error::MalformedInput(_))
        ));
        let no_issuer = json!({ "credentialSubject": {} });
        assert!(Credential::from_json(&no_issuer).is_err());
        let bad_issuer = json!({ "issuer": "example", "credentialSubject": {} });
        assert!(Credential::from_json(&bad_issuer).is_err());
    }

    #[test]
    fn dates() {
        let formats = VerifierOptions::default().date_formats;
        let expected = "2021-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(parse_date("2021-06-01T00:00:00Z", &formats).unwrap(), expected);
        assert_eq!(parse_date("2021-06-01T02:00:00+02:00", &formats).unwrap(), expected);
        assert_eq!(parse_date("2021-06-01T00:00:00.000", &formats).unwrap(), expected);
        assert_eq!(parse_date("2021-06-01", &formats).unwrap(), expected);
        assert_eq!(
            parse_date("01/06/2021", &["%d/%m/%Y".to_string()]).unwrap(),
            expected
        );
        assert!(matches!(
            parse_date("June 1st", &formats),
            Err(Error::Decode {
                stage: DecodeStage::Date,
                ..
            })
        ));
    }
}
