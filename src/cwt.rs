//! CBOR Web Token claim sets (RFC 8392) carried in COSE payloads.
use ciborium::value::{Integer, Value as CborValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::base64url;

pub const ISSUER: i64 = 1;
pub const SUBJECT: i64 = 2;
pub const EXPIRATION: i64 = 4;
pub const NOT_BEFORE: i64 = 5;
pub const ISSUED_AT: i64 = 6;
/// EU DCC health certificate container; the certificate itself is under key 1.
pub const HCERT: i64 = -260;
pub const HCERT_V1: i64 = 1;

const CWT_TAG: u64 = 61;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Cwt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// The embedded health certificate, converted to JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hcert: Option<Value>,
}

impl Cwt {
    /// JSON view of the claim set. The subject is shown as text when it is
    /// UTF-8 and as base64url otherwise.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(iss) = &self.iss {
            map.insert("iss".to_string(), Value::from(iss.as_str()));
        }
        if let Some(sub) = &self.sub {
            let sub = match std::str::from_utf8(sub) {
                Ok(text) => text.to_string(),
                Err(_) => base64url::encode(sub),
            };
            map.insert("sub".to_string(), Value::from(sub));
        }
        for (name, claim) in [("exp", self.exp), ("nbf", self.nbf), ("iat", self.iat)] {
            if let Some(seconds) = claim {
                map.insert(name.to_string(), Value::from(seconds));
            }
        }
        if let Some(hcert) = &self.hcert {
            map.insert("hcert".to_string(), hcert.clone());
        }
        map
    }
}

/// Decode a COSE payload into a claim set.
///
/// Returns `None` when the bytes are not CBOR or do not hold a map (a map
/// wrapped in a byte string or in the CWT tag is accepted). Individual
/// claims of the wrong type are skipped.
pub fn decode(payload: &[u8]) -> Option<Cwt> {
    let value: CborValue = match ciborium::de::from_reader(payload) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("CWT payload is not CBOR: {}", e);
            return None;
        }
    };
    decode_value(&value)
}

pub fn decode_value(value: &CborValue) -> Option<Cwt> {
    let entries = match value {
        CborValue::Map(entries) => entries,
        CborValue::Bytes(inner) => return decode(inner),
        CborValue::Tag(CWT_TAG, inner) => return decode_value(inner),
        _ => return None,
    };
    let mut cwt = Cwt::default();
    for (key, claim) in entries {
        let key = match key.as_integer().map(i128::from) {
            Some(key) => key,
            None => continue,
        };
        match i64::try_from(key) {
            Ok(ISSUER) => cwt.iss = claim.as_text().map(str::to_string),
            Ok(SUBJECT) => {
                cwt.sub = match claim {
                    CborValue::Bytes(bytes) => Some(bytes.clone()),
                    CborValue::Text(text) => Some(text.as_bytes().to_vec()),
                    _ => None,
                }
            }
            Ok(EXPIRATION) => cwt.exp = numeric_claim("exp", claim),
            Ok(NOT_BEFORE) => cwt.nbf = numeric_claim("nbf", claim),
            Ok(ISSUED_AT) => cwt.iat = numeric_claim("iat", claim),
            Ok(HCERT) => cwt.hcert = health_certificate(claim),
            _ => {}
        }
    }
    Some(cwt)
}

/// Seconds since the epoch from an unsigned integer or a double. Doubles are
/// rounded to the nearest second; negative, non-finite and out-of-range
/// values are dropped.
fn numeric_claim(name: &str, value: &CborValue) -> Option<u64> {
    match value {
        CborValue::Integer(i) => match u64::try_from(*i) {
            Ok(seconds) => Some(seconds),
            Err(_) => {
                log::warn!("dropping negative '{}' claim", name);
                None
            }
        },
        CborValue::Float(f) => {
            let rounded = f.round();
            if f.is_finite() && rounded >= 0.0 && rounded < u64::MAX as f64 {
                Some(rounded as u64)
            } else {
                log::warn!("dropping out-of-range '{}' claim {}", name, f);
                None
            }
        }
        CborValue::Tag(_, inner) => numeric_claim(name, inner),
        _ => None,
    }
}

fn health_certificate(value: &CborValue) -> Option<Value> {
    let entries = value.as_map()?;
    entries
        .iter()
        .find(|(key, _)| key.as_integer().map(i128::from) == Some(HCERT_V1 as i128))
        .map(|(_, certificate)| cbor_to_json(certificate))
}

/// Convert a CBOR value to JSON. Byte strings become base64url text; map
/// keys that are not text use their decimal or JSON form.
pub fn cbor_to_json(value: &CborValue) -> Value {
    match value {
        CborValue::Integer(i) => integer_to_json(*i),
        CborValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CborValue::Text(text) => Value::String(text.clone()),
        CborValue::Bytes(bytes) => Value::String(base64url::encode(bytes)),
        CborValue::Bool(b) => Value::Bool(*b),
        CborValue::Null => Value::Null,
        CborValue::Tag(_, inner) => cbor_to_json(inner),
        CborValue::Array(items) => Value::Array(items.iter().map(cbor_to_json).collect()),
        CborValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (map_key(key), cbor_to_json(value)))
                .collect(),
        ),
        _ => Value::Null,
    }
}

fn integer_to_json(i: Integer) -> Value {
    if let Ok(n) = i64::try_from(i) {
        Value::from(n)
    } else if let Ok(n) = u64::try_from(i) {
        Value::from(n)
    } else {
        Value::String(i128::from(i).to_string())
    }
}

fn map_key(key: &CborValue) -> String {
    match key {
        CborValue::Text(text) => text.clone(),
        CborValue::Integer(i) => i128::from(*i).to_string(),
        other => cbor_to_json(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &CborValue) -> Vec<u8> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(value, &mut bytes).unwrap();
        bytes
    }

    fn claims(entries: Vec<(i64, CborValue)>) -> Vec<u8> {
        encode(&CborValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (CborValue::Integer(k.into()), v))
                .collect(),
        ))
    }

    #[test]
    fn issuer_expiry_issued_at() {
        let payload = claims(vec![
            (1, CborValue::Text("AT".to_string())),
            (4, CborValue::Integer(1700000000.into())),
            (6, CborValue::Integer(1690000000.into())),
        ]);
        let cwt = decode(&payload).unwrap();
        assert_eq!(
            cwt,
            Cwt {
                iss: Some("AT".to_string()),
                exp: Some(1700000000),
                iat: Some(1690000000),
                nbf: None,
                sub: None,
                hcert: None,
            }
        );
    }

    #[test]
    fn integer_and_float_claims_agree() {
        let from_int = decode(&claims(vec![
            (4, CborValue::Integer(1700000000.into())),
            (5, CborValue::Integer(1600000000.into())),
            (6, CborValue::Integer(1690000000.into())),
        ]))
        .unwrap();
        let from_float = decode(&claims(vec![
            (4, CborValue::Float(1700000000.0)),
            (5, CborValue::Float(1600000000.0)),
            (6, CborValue::Float(1690000000.0)),
        ]))
        .unwrap();
        assert_eq!(from_int, from_float);
        assert_eq!(from_float.nbf, Some(1600000000));
    }

    #[test]
    fn fractional_seconds_round_to_nearest() {
        let cwt = decode(&claims(vec![
            (4, CborValue::Float(1700000000.4)),
            (6, CborValue::Float(1690000000.6)),
        ]))
        .unwrap();
        assert_eq!(cwt.exp, Some(1700000000));
        assert_eq!(cwt.iat, Some(1690000001));
    }

    #[test]
    fn invalid_numeric_claims_are_dropped() {
        let cwt = decode(&claims(vec![
            (1, CborValue::Text("DE".to_string())),
            (4, CborValue::Float(-5.0)),
            (5, CborValue::Float(f64::NAN)),
            (6, CborValue::Integer((-1).into())),
        ]))
        .unwrap();
        assert_eq!(cwt.iss.as_deref(), Some("DE"));
        assert_eq!((cwt.exp, cwt.nbf, cwt.iat), (None, None, None));
    }

    #[test]
    fn non_map_payloads() {
        assert_eq!(decode(&encode(&CborValue::Text("x".to_string()))), None);
        assert_eq!(decode(&encode(&CborValue::Array(vec![]))), None);
        assert_eq!(decode(b""), None);
        assert_eq!(decode(&[0xff, 0x00, 0x13]), None);
    }

    #[test]
    fn wrapped_maps() {
        let inner = claims(vec![(1, CborValue::Text("AT".to_string()))]);
        let wrapped = encode(&CborValue::Bytes(inner.clone()));
        assert_eq!(decode(&wrapped).unwrap().iss.as_deref(), Some("AT"));
        let tagged = encode(&CborValue::Tag(
            61,
            Box::new(ciborium::de::from_reader(inner.as_slice()).unwrap()),
        ));
        assert_eq!(decode(&tagged).unwrap().iss.as_deref(), Some("AT"));
    }

    #[test]
    fn health_certificate_and_subject() {
        let hcert = CborValue::Map(vec![(
            CborValue::Integer(1.into()),
            CborValue::Map(vec![
                (
                    CborValue::Text("ver".to_string()),
                    CborValue::Text("1.3.0".to_string()),
                ),
                (
                    CborValue::Text("nam".to_string()),
                    CborValue::Map(vec![(
                        CborValue::Text("fn".to_string()),
                        CborValue::Text("Musterfrau".to_string()),
                    )]),
                ),
            ]),
        )]);
        let cwt = decode(&claims(vec![
            (2, CborValue::Bytes(vec![0xde, 0xad])),
            (-260, hcert),
        ]))
        .unwrap();
        assert_eq!(cwt.sub, Some(vec![0xde, 0xad]));
        let hcert = cwt.hcert.as_ref().unwrap();
        assert_eq!(hcert["nam"]["fn"], "Musterfrau");
        let json = cwt.to_json();
        assert_eq!(json["sub"], base64url::encode([0xde, 0xad]));
        assert_eq!(json["hcert"]["ver"], "1.3.0");
    }
}
