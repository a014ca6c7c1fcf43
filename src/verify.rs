//! Verdict assembly: signature and selective-disclosure checks for a
//! normalized credential, with keys taken from a [`TrustKeyStore`].
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical;
use crate::cose;
use crate::credential::{CredentialFormat, DisplayClaims, NormalizedCredential, SignatureMaterial};
use crate::error::{Error, ErrorKind};
use crate::jwk::JWK;
use crate::normalize;
use crate::obfuscation::{self, ObfuscationReport};
use crate::options::VerifierOptions;
use crate::trust::{dcc_kid, TrustKeyStore};

/// Outcome of the issuer signature check.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SignatureCheck {
    Verified,
    Failed { kind: ErrorKind, reason: String },
}

impl SignatureCheck {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl From<Result<(), Error>> for SignatureCheck {
    fn from(result: Result<(), Error>) -> Self {
        match result {
            Ok(()) => Self::Verified,
            Err(err) => Self::Failed {
                kind: err.kind(),
                reason: err.to_string(),
            },
        }
    }
}

/// Facts about one credential. Expiry and issuer policy are left to the
/// caller.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub format: CredentialFormat,
    pub valid: bool,
    pub signature: SignatureCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscation: Option<ObfuscationReport>,
    pub claims: DisplayClaims,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Verdict {
    /// Verdict for input that could not be normalized.
    pub fn rejected(err: &Error) -> Self {
        Self {
            format: CredentialFormat::Unknown,
            valid: false,
            signature: SignatureCheck::Failed {
                kind: err.kind(),
                reason: err.to_string(),
            },
            obfuscation: None,
            claims: DisplayClaims::default(),
            errors: vec![err.to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Verifier {
    store: Arc<TrustKeyStore>,
    options: VerifierOptions,
}

impl Verifier {
    pub fn new(store: Arc<TrustKeyStore>) -> Self {
        Self {
            store,
            options: VerifierOptions::default(),
        }
    }

    pub fn with_options(mut self, options: VerifierOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &TrustKeyStore {
        &self.store
    }

    pub fn options(&self) -> &VerifierOptions {
        &self.options
    }

    /// Normalize then verify raw input.
    pub fn verify_input(&self, input: &[u8]) -> Result<Verdict, Error> {
        let credential = normalize::normalize_with(input, &self.options)?;
        Ok(self.verify(&credential))
    }

    pub fn verify(&self, credential: &NormalizedCredential) -> Verdict {
        let signature = SignatureCheck::from(self.verify_signature(credential));
        let obfuscation = match credential.format() {
            CredentialFormat::JsonLdVc => Some(obfuscation::check_obfuscation(
                &Value::Object(credential.payload().clone()),
                &self.options.obfuscation_field,
            )),
            _ => None,
        };
        let mut errors = Vec::new();
        if let SignatureCheck::Failed { reason, .. } = &signature {
            errors.push(reason.clone());
        }
        if let Some(report) = obfuscation.as_ref().filter(|report| !report.ok) {
            errors.push(report.reason.clone());
        }
        let verdict = Verdict {
            format: credential.format(),
            valid: errors.is_empty(),
            signature,
            obfuscation,
            claims: credential.display_claims(),
            errors,
        };
        log::debug!(
            "{} credential from {:?}: valid={}",
            verdict.format,
            credential.issuer(),
            verdict.valid
        );
        verdict
    }

    /// Verify several credentials at once on at most
    /// [`std::thread::available_parallelism`] threads. Verdicts keep the
    /// input order. The store is only read.
    pub fn verify_batch(&self, credentials: &[NormalizedCredential]) -> Vec<Verdict> {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .min(credentials.len());
        if workers < 2 {
            return credentials.iter().map(|c| self.verify(c)).collect();
        }
        let chunk_size = (credentials.len() + workers - 1) / workers;
        std::thread::scope(|scope| {
            let handles: Vec<_> = credentials
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || chunk.iter().map(|c| self.verify(c)).collect::<Vec<_>>())
                })
                .collect();
            let mut verdicts = Vec::with_capacity(credentials.len());
            for handle in handles {
                match handle.join() {
                    Ok(chunk) => verdicts.extend(chunk),
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
            verdicts
        })
    }

    /// Check only the issuer signature, re-deriving the material from the
    /// raw input.
    pub fn verify_signature(&self, credential: &NormalizedCredential) -> Result<(), Error> {
        match credential.signature_material(&self.options)? {
            SignatureMaterial::JsonLd {
                unsigned,
                signature,
                verification_method,
                issuer,
            } => {
                let signature = signature
                    .ok_or_else(|| Error::malformed("credential has no proof.signatureValue"))?;
                let key = self.did_key(&issuer, verification_method.as_deref())?;
                canonical::try_verify(&unsigned, &signature, &key)
            }
            SignatureMaterial::Jws { parts, issuer } => {
                let kid = parts.header.key_id.as_deref();
                let key = self
                    .store
                    .lookup_jwk(&issuer, kid)
                    .ok_or_else(|| Error::KeyNotFound {
                        issuer: issuer.clone(),
                        key_id: kid.map(str::to_string),
                    })?;
                parts.verify(&key)
            }
            SignatureMaterial::Cose { sign1, key_id } => {
                let issuer = credential.issuer().unwrap_or_default().to_string();
                let kid = key_id.as_deref().map(dcc_kid).ok_or_else(|| Error::KeyNotFound {
                    issuer: issuer.clone(),
                    key_id: None,
                })?;
                let record = self
                    .store
                    .lookup_dcc(&kid)
                    .ok_or_else(|| Error::KeyNotFound {
                        issuer,
                        key_id: Some(kid),
                    })?;
                cose::verify_sign1(&sign1, &record.verification_key()?)
            }
        }
    }

    /// Key for a JSON-LD proof. The verification method must be the issuer
    /// DID or a fragment of it.
    fn did_key(&self, issuer: &str, verification_method: Option<&str>) -> Result<JWK, Error> {
        if let Some(vm) = verification_method {
            let controller = vm.split_once('#').map_or(vm, |(did, _)| did);
            if controller != issuer {
                return Err(Error::VerificationMethodMismatch {
                    issuer: issuer.to_string(),
                    verification_method: vm.to_string(),
                });
            }
        }
        let did_url = verification_method.unwrap_or(issuer);
        self.store
            .lookup_did(did_url)
            .or_else(|| self.store.lookup_did(issuer))
            .ok_or_else(|| Error::KeyNotFound {
                issuer: issuer.to_string(),
                key_id: verification_method.map(str::to_string),
            })
    }
}
