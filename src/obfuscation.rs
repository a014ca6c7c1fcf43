//! Selective-disclosure checks.
//!
//! An obfuscated field replaces a value in `credentialSubject` with the
//! base64url HMAC of the disclosed value. Each descriptor in the credential's
//! descriptor list names the field's dot-path, the disclosed value and the
//! HMAC key (`nonce`). A descriptor may also repeat the token as `mac`, in
//! which case it must equal the token found at the path. Verification is all-or-nothing: the first descriptor
//! that fails stops the walk and fails the whole report.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::base64url::is_base64url_char;
use crate::error::Error;
use crate::mac::verify_mac;
use crate::path;

pub const DEFAULT_FIELD: &str = "obfuscation";
pub const NOTHING_TO_CHECK: &str = "no obfuscation to check";

/// One selective-disclosure descriptor.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscatedField {
    pub path: String,
    #[serde(alias = "value")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosed_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

impl ObfuscatedField {
    /// Text the MAC was computed over. Strings are used as-is, other values
    /// as their JSON text.
    pub fn disclosed_text(&self) -> Option<String> {
        match self.disclosed_value.as_ref()? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FieldResult {
    pub path: String,
    pub verified: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ObfuscationReport {
    pub ok: bool,
    pub reason: String,
    /// Path of the descriptor that failed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_path: Option<String>,
    pub fields: Vec<FieldResult>,
}

impl ObfuscationReport {
    fn success(reason: impl Into<String>, fields: Vec<FieldResult>) -> Self {
        Self {
            ok: true,
            reason: reason.into(),
            failed_path: None,
            fields,
        }
    }

    fn failure(reason: impl Into<String>, failed_path: Option<&str>, fields: Vec<FieldResult>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
            failed_path: failed_path.map(str::to_string),
            fields,
        }
    }

    pub fn into_result(self) -> Result<(), Error> {
        match (self.ok, self.failed_path) {
            (true, _) => Ok(()),
            (false, Some(path)) => Err(Error::MacInvalid { path }),
            (false, None) => Err(Error::MalformedInput(self.reason)),
        }
    }
}

/// Whether `value` looks like an obfuscated leaf: a 42 or 43 character
/// base64url token.
pub fn is_obfuscated_token(value: &str) -> bool {
    (42..=43).contains(&value.len()) && value.chars().all(is_base64url_char)
}

/// Walk the descriptors in `credential[field]` and check each MAC.
pub fn check_obfuscation(credential: &Value, field: &str) -> ObfuscationReport {
    let descriptors = match credential.get(field) {
        None | Some(Value::Null) => return ObfuscationReport::success(NOTHING_TO_CHECK, vec![]),
        Some(Value::Array(descriptors)) if descriptors.is_empty() => {
            return ObfuscationReport::success(NOTHING_TO_CHECK, vec![])
        }
        Some(Value::Array(descriptors)) => descriptors,
        Some(_) => {
            return ObfuscationReport::failure(
                format!("'{}' is not a list of descriptors", field),
                None,
                vec![],
            )
        }
    };
    let subject = match credential.get("credentialSubject") {
        Some(subject) => subject,
        None => {
            return ObfuscationReport::failure("credential has no credentialSubject", None, vec![])
        }
    };

    let mut fields = Vec::with_capacity(descriptors.len());
    for (index, descriptor) in descriptors.iter().enumerate() {
        let descriptor: ObfuscatedField = match serde_json::from_value(descriptor.clone()) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                return ObfuscationReport::failure(
                    format!("descriptor {} is malformed: {}", index, e),
                    None,
                    fields,
                )
            }
        };
        match check_field(subject, &descriptor) {
            Ok(()) => fields.push(FieldResult {
                path: descriptor.path,
                verified: true,
            }),
            Err(reason) => {
                log::debug!("obfuscated field '{}' failed: {}", descriptor.path, reason);
                fields.push(FieldResult {
                    path: descriptor.path.clone(),
                    verified: false,
                });
                return ObfuscationReport::failure(reason, Some(&descriptor.path), fields);
            }
        }
    }
    let reason = format!("{} obfuscated field(s) verified", fields.len());
    ObfuscationReport::success(reason, fields)
}

fn check_field(subject: &Value, descriptor: &ObfuscatedField) -> Result<(), String> {
    let leaf = path::resolve(subject, &descriptor.path).map_err(|e| e.to_string())?;
    let plaintext = descriptor
        .disclosed_text()
        .ok_or_else(|| format!("'{}' has no disclosed value", descriptor.path))?;
    let nonce = descriptor
        .nonce
        .as_deref()
        .ok_or_else(|| format!("'{}' has no nonce", descriptor.path))?;
    let mac = leaf
        .as_str()
        .filter(|mac| is_obfuscated_token(mac))
        .ok_or_else(|| format!("'{}' is not an obfuscated value", descriptor.path))?;
    if descriptor.mac.as_deref().map_or(false, |expected| expected != mac) {
        return Err(format!(
            "'{}' MAC does not match the obfuscated value",
            descriptor.path
        ));
    }
    if verify_mac(&plaintext, nonce, mac) {
        Ok(())
    } else {
        Err(format!("MAC verification failed for '{}'", descriptor.path))
    }
}
