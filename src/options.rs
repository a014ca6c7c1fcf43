use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::inflate;
use crate::obfuscation;

/// Options for normalization and verification.
///
/// Every field has a default, so a partial JSON document such as
/// `{"obfuscationField": "disclosures"}` is a valid configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct VerifierOptions {
    /// `chrono` format strings tried, in order, for VC dates that are not
    /// RFC 3339.
    pub date_formats: Vec<String>,
    /// Name of the top-level member holding the obfuscation descriptors.
    pub obfuscation_field: String,
    /// Upper bound on the size of an inflated SMART Health Card or DCC
    /// payload.
    pub max_decompressed_len: usize,
    /// Try one base64 unwrap when the input is not recognized.
    pub unwrap_base64: bool,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y-%m-%dT%H:%M:%S%.f".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%d".to_string(),
            ],
            obfuscation_field: obfuscation::DEFAULT_FIELD.to_string(),
            max_decompressed_len: inflate::DEFAULT_MAX_LEN,
            unwrap_base64: true,
        }
    }
}

impl VerifierOptions {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_date_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_obfuscation_field(mut self, field: impl Into<String>) -> Self {
        self.obfuscation_field = field.into();
        self
    }

    pub fn with_max_decompressed_len(mut self, max_len: usize) -> Self {
        self.max_decompressed_len = max_len;
        self
    }

    pub fn with_base64_unwrap(mut self, unwrap_base64: bool) -> Self {
        self.unwrap_base64 = unwrap_base64;
        self
    }
}
