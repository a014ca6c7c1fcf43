//! Error types for `credverify`
use std::fmt;

use crate::base45::Base45Error;

/// Decoding step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStage {
    Base64,
    Base45,
    NumericQr,
    Inflate,
    Json,
    Cbor,
    Cose,
    Jws,
    Date,
}

impl DecodeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::Base45 => "base45",
            Self::NumericQr => "numeric QR",
            Self::Inflate => "inflate",
            Self::Json => "JSON",
            Self::Cbor => "CBOR",
            Self::Cose => "COSE",
            Self::Jws => "JWS",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error taxonomy.
///
/// Callers decide what to do with each kind: only [`ErrorKind::KeyResolution`]
/// is worth a fetch-and-retry, the cryptographic kinds are always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    MalformedInput,
    DecodeFailure,
    KeyResolution,
    InvalidKey,
    UnsupportedAlgorithm,
    SignatureInvalid,
    MacInvalid,
}

/// Error type for `credverify`.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Unrecognized or structurally invalid credential
    #[error("Unsupported credential: {0}")]
    MalformedInput(String),
    /// A specific decoding step failed
    #[error("Decode failure ({stage}): {message}")]
    Decode {
        stage: DecodeStage,
        message: String,
    },
    /// No trust material for the issuer
    #[error("No trusted key for issuer '{issuer}'{}", kid_suffix(.key_id))]
    KeyNotFound {
        issuer: String,
        key_id: Option<String>,
    },
    /// Missing curve in JWK
    #[error("Missing curve in JWK")]
    MissingCurve,
    /// Missing elliptic curve point in JWK
    #[error("Missing elliptic curve point in JWK")]
    MissingPoint,
    /// Missing modulus or exponent in RSA key
    #[error("Missing modulus or exponent in RSA key")]
    MissingModulus,
    /// Curve not implemented
    #[error("Curve not implemented: '{0}'")]
    CurveNotImplemented(String),
    /// Key type not implemented
    #[error("Key type not implemented")]
    KeyTypeNotImplemented,
    /// Key bytes rejected by the crypto backend
    #[error("Invalid public key: {0}")]
    InvalidKey(String),
    /// Algorithm in token header does not match the key
    #[error("Algorithm in header does not match key")]
    AlgorithmMismatch,
    /// Unsupported algorithm
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Cryptographic signature check failed
    #[error("Invalid signature")]
    SignatureInvalid,
    /// The proof names a key controlled by someone other than the issuer
    #[error("Verification method '{verification_method}' is not controlled by issuer '{issuer}'")]
    VerificationMethodMismatch {
        issuer: String,
        verification_method: String,
    },
    /// Selective-disclosure MAC check failed
    #[error("MAC verification failed for '{path}'")]
    MacInvalid { path: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::Decode { .. } => ErrorKind::DecodeFailure,
            Self::KeyNotFound { .. } => ErrorKind::KeyResolution,
            Self::MissingCurve
            | Self::MissingPoint
            | Self::MissingModulus
            | Self::CurveNotImplemented(_)
            | Self::KeyTypeNotImplemented
            | Self::InvalidKey(_)
            | Self::AlgorithmMismatch => ErrorKind::InvalidKey,
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::SignatureInvalid | Self::VerificationMethodMismatch { .. } => {
                ErrorKind::SignatureInvalid
            }
            Self::MacInvalid { .. } => ErrorKind::MacInvalid,
        }
    }

    pub(crate) fn decode(stage: DecodeStage, message: impl fmt::Display) -> Self {
        Self::Decode {
            stage,
            message: message.to_string(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }
}

fn kid_suffix(key_id: &Option<String>) -> String {
    match key_id {
        Some(kid) => format!(" (kid '{}')", kid),
        None => String::new(),
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Error {
        Error::decode(DecodeStage::Base64, err)
    }
}

impl From<Base45Error> for Error {
    fn from(err: Base45Error) -> Error {
        Error::decode(DecodeStage::Base45, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::decode(DecodeStage::Json, err)
    }
}

impl From<coset::CoseError> for Error {
    fn from(err: coset::CoseError) -> Error {
        Error::decode(DecodeStage::Cose, err)
    }
}

impl From<p256::elliptic_curve::Error> for Error {
    fn from(err: p256::elliptic_curve::Error) -> Error {
        Error::InvalidKey(err.to_string())
    }
}

#[cfg(feature = "rsa")]
impl From<rsa::errors::Error> for Error {
    fn from(err: rsa::errors::Error) -> Error {
        Error::InvalidKey(err.to_string())
    }
}

impl From<Error> for String {
    fn from(err: Error) -> String {
        format!("{}", err)
    }
}
