//! SMART Health Card QR payloads.
//!
//! A card is a compact JWS whose characters are written as pairs of decimal
//! digits (`char = nn + 45`) behind the `shc:/` prefix. Long cards may be
//! split across several QR codes as `shc:/<index>/<total>/<digits>`.
use serde_json::{Map, Value};

use crate::error::{DecodeStage, Error};
use crate::inflate;
use crate::jws::{self, CompactParts};

pub const PREFIX: &str = "shc:/";

const OFFSET: u8 = 45;
/// Largest pair value, mapping to `z`.
const MAX_PAIR: u8 = b'z' - OFFSET;
const MAX_CHUNKS: usize = 99;

/// The input after a case-insensitive `shc:/` prefix.
pub fn strip_prefix(input: &str) -> Option<&str> {
    match input.get(..PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(PREFIX) => Some(&input[PREFIX.len()..]),
        _ => None,
    }
}

/// Decode digit pairs into the compact JWS text.
pub fn decode_numeric(digits: &str) -> Result<String, Error> {
    if digits.is_empty() {
        return Err(Error::decode(DecodeStage::NumericQr, "empty payload"));
    }
    if digits.len() % 2 != 0 {
        return Err(Error::decode(
            DecodeStage::NumericQr,
            format!("odd number of digits ({})", digits.len()),
        ));
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| match pair {
            [a @ b'0'..=b'9', b @ b'0'..=b'9'] => {
                let n = (a - b'0') * 10 + (b - b'0');
                if n > MAX_PAIR {
                    Err(Error::decode(
                        DecodeStage::NumericQr,
                        format!("digit pair {} out of range", n),
                    ))
                } else {
                    Ok(char::from(n + OFFSET))
                }
            }
            _ => Err(Error::decode(DecodeStage::NumericQr, "non-digit character")),
        })
        .collect()
}

/// Encode a compact JWS as digit pairs, without the prefix.
pub fn encode_numeric(jws: &str) -> Result<String, Error> {
    jws.bytes()
        .map(|c| match c.checked_sub(OFFSET) {
            Some(n) if n <= MAX_PAIR => Ok(format!("{:02}", n)),
            _ => Err(Error::decode(
                DecodeStage::NumericQr,
                format!("character '{}' cannot be encoded", char::from(c)),
            )),
        })
        .collect()
}

fn split_chunk(chunk: &str) -> Option<(usize, usize, &str)> {
    let mut parts = chunk.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(index), Some(total), Some(digits)) => {
            Some((index.parse().ok()?, total.parse().ok()?, digits))
        }
        _ => None,
    }
}

/// The digit payload of a single-QR card. Chunked input (`i/n/...`) is only
/// accepted when it consists of one chunk.
pub fn single_payload(body: &str) -> Result<&str, Error> {
    if !body.contains('/') {
        return Ok(body);
    }
    match split_chunk(body) {
        Some((1, 1, digits)) => Ok(digits),
        Some((_, total, _)) => Err(Error::malformed(format!(
            "health card is split across {} QR codes",
            total
        ))),
        None => Err(Error::decode(DecodeStage::NumericQr, "invalid chunk header")),
    }
}

/// Reassemble a card split across several QR codes, in any order.
pub fn combine_chunks<S: AsRef<str>>(chunks: &[S]) -> Result<String, Error> {
    let mut ordered: Vec<Option<&str>> = Vec::new();
    for chunk in chunks {
        let chunk = chunk.as_ref().trim();
        let body = strip_prefix(chunk)
            .ok_or_else(|| Error::malformed("chunk is not a health card"))?;
        let (index, total, digits) = if body.contains('/') {
            split_chunk(body)
                .ok_or_else(|| Error::decode(DecodeStage::NumericQr, "invalid chunk header"))?
        } else {
            (1, 1, body)
        };
        if total == 0 || total > MAX_CHUNKS {
            return Err(Error::decode(
                DecodeStage::NumericQr,
                format!("invalid chunk count {}", total),
            ));
        }
        if ordered.is_empty() {
            ordered = vec![None; total];
        }
        if total != ordered.len() || index == 0 || index > total {
            return Err(Error::decode(
                DecodeStage::NumericQr,
                format!("chunk {}/{} does not belong to a {}-part card", index, total, ordered.len()),
            ));
        }
        ordered[index - 1] = Some(digits);
    }
    if ordered.is_empty() {
        return Err(Error::malformed("no chunks"));
    }
    let mut combined = String::from(PREFIX);
    for (i, digits) in ordered.into_iter().enumerate() {
        let digits = digits.ok_or_else(|| {
            Error::decode(DecodeStage::NumericQr, format!("missing chunk {}", i + 1))
        })?;
        combined.push_str(digits);
    }
    Ok(combined)
}

/// Decode the compact JWS carried by a `shc:/` string.
pub fn decode(input: &str) -> Result<CompactParts, Error> {
    let body = strip_prefix(input).ok_or_else(|| Error::malformed("missing shc:/ prefix"))?;
    let token = decode_numeric(single_payload(body)?)?;
    jws::decode_compact(&token)
}

/// The JSON payload, inflated when the header says `zip: "DEF"`.
pub fn payload_json(parts: &CompactParts, max_len: usize) -> Result<Map<String, Value>, Error> {
    let bytes = if parts.header.is_deflated() {
        inflate::inflate_raw(&parts.payload, max_len)?
    } else {
        parts.payload.clone()
    };
    match serde_json::from_slice(&bytes)? {
        Value::Object(map) if !map.is_empty() => Ok(map),
        _ => Err(Error::malformed("health card payload is not a JSON object")),
    }
}

/// The first FHIR `Patient` resource in the card's bundle.
pub fn patient(payload: &Map<String, Value>) -> Option<&Value> {
    payload
        .get("vc")?
        .get("credentialSubject")?
        .get("fhirBundle")?
        .get("entry")?
        .as_array()?
        .iter()
        .filter_map(|entry| entry.get("resource"))
        .find(|resource| resource.get("resourceType").and_then(Value::as_str) == Some("Patient"))
}

/// `given... family` of the patient's first name entry.
pub fn patient_name(patient: &Value) -> Option<String> {
    let name = patient.get("name")?.as_array()?.first()?;
    let mut parts: Vec<&str> = name
        .get("given")
        .and_then(Value::as_array)
        .map(|given| given.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if let Some(family) = name.get("family").and_then(Value::as_str) {
        parts.push(family);
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
