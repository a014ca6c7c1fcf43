//! EU Digital COVID Certificate QR payloads.
//!
//! `HC1:` + base45(zlib(COSE_Sign1)), with a CWT claim set as the COSE
//! payload and the certificate itself under claim `-260`/`1`.
use std::io::Write;

use coset::CoseSign1;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value;

use crate::base45;
use crate::cose;
use crate::cwt::{self, Cwt};
use crate::error::{DecodeStage, Error};
use crate::inflate;

pub const PREFIX: &str = "HC1:";

/// Certificate groups, each a list of entries carrying a `ci` identifier.
const ENTRY_GROUPS: [&str; 3] = ["v", "t", "r"];

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDcc {
    pub sign1: CoseSign1,
    pub cwt: Cwt,
}

impl DecodedDcc {
    pub fn key_id(&self) -> Option<&[u8]> {
        cose::key_id(&self.sign1)
    }
}

pub fn strip_prefix(input: &str) -> Option<&str> {
    input.strip_prefix(PREFIX)
}

/// Recover the COSE bytes from an `HC1:` string.
pub fn unwrap_cose(input: &str, max_len: usize) -> Result<Vec<u8>, Error> {
    let body = strip_prefix(input).ok_or_else(|| Error::malformed("missing HC1: prefix"))?;
    let compressed = base45::decode(body)?;
    if inflate::is_zlib(&compressed) {
        inflate::inflate_zlib(&compressed, max_len)
    } else {
        log::debug!("HC1 payload is not zlib compressed");
        Ok(compressed)
    }
}

/// Decode an `HC1:` string down to its COSE structure and claim set.
pub fn decode(input: &str, max_len: usize) -> Result<DecodedDcc, Error> {
    let sign1 = cose::decode_sign1(&unwrap_cose(input, max_len)?)?;
    let payload = sign1
        .payload
        .as_deref()
        .ok_or_else(|| Error::decode(DecodeStage::Cose, "detached payload"))?;
    let cwt = cwt::decode(payload)
        .ok_or_else(|| Error::decode(DecodeStage::Cbor, "payload is not a CWT claim set"))?;
    Ok(DecodedDcc { sign1, cwt })
}

/// Wrap COSE bytes as an `HC1:` string.
pub fn encode(cose: &[u8]) -> Result<String, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(cose)
        .and_then(|_| encoder.finish())
        .map(|compressed| format!("{}{}", PREFIX, base45::encode(&compressed)))
        .map_err(|e| Error::decode(DecodeStage::Inflate, e))
}

/// `gn fn` from the certificate's `nam` group.
pub fn holder_name(hcert: &Value) -> Option<String> {
    let nam = hcert.get("nam")?;
    let parts: Vec<&str> = ["gn", "fn"]
        .iter()
        .filter_map(|key| nam.get(*key).and_then(Value::as_str))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

pub fn birth_date(hcert: &Value) -> Option<&str> {
    hcert.get("dob").and_then(Value::as_str)
}

/// The unique certificate identifier of the first vaccination, test or
/// recovery entry.
pub fn certificate_id(hcert: &Value) -> Option<&str> {
    ENTRY_GROUPS
        .iter()
        .filter_map(|group| hcert.get(*group)?.as_array()?.first())
        .find_map(|entry| entry.get("ci").and_then(Value::as_str))
}

/// Certificate type letter (`v`, `t` or `r`).
pub fn certificate_type(hcert: &Value) -> Option<&'static str> {
    ENTRY_GROUPS
        .iter()
        .copied()
        .find(|group| hcert.get(*group).and_then(Value::as_array).map_or(false, |a| !a.is_empty()))
}
