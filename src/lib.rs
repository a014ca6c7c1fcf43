//! The `credverify` library checks digital health credentials presented in
//! one of three encodings:
//! - [W3C Verifiable Credentials][vc-data-model] in JSON-LD form, signed with
//!   ECDSA P-256 over a sorted-key JSON canonicalization and optionally
//!   carrying selectively-disclosed (obfuscated) subject fields;
//! - [SMART Health Cards][shc], compact JWS tokens carried in `shc:/` numeric
//!   QR payloads; and
//! - [EU Digital COVID Certificates][dcc], COSE_Sign1 / CWT tokens carried in
//!   `HC1:` base45 payloads.
//!
//! [vc-data-model]: <https://www.w3.org/TR/vc-data-model/>
//! [shc]: <https://spec.smarthealth.cards/>
//! [dcc]: <https://github.com/ehn-dcc-development/hcert-spec>
//!
//! # Basic Usage
//!
//! Issuer keys are loaded into a [`TrustKeyStore`] by the caller. A
//! [`Verifier`] then normalizes raw input and reports a [`Verdict`].
//!
//! ```
//! use std::sync::Arc;
//! use credverify::{ErrorKind, SignatureCheck, TrustKeyStore, Verifier};
//!
//! let credential = r#"{
//!     "issuer": "did:example:clinic",
//!     "credentialSubject": { "name": "Jane Doe" },
//!     "proof": { "type": "EcdsaSecp256r1Signature2019", "signatureValue": "AA" }
//! }"#;
//!
//! let verifier = Verifier::new(Arc::new(TrustKeyStore::new()));
//! let verdict = verifier.verify_input(credential.as_bytes()).unwrap();
//!
//! // No key was loaded for the issuer, so the signature cannot be checked.
//! assert!(!verdict.valid);
//! assert!(matches!(
//!     verdict.signature,
//!     SignatureCheck::Failed { kind: ErrorKind::KeyResolution, .. }
//! ));
//! assert_eq!(verdict.claims.subject_name.as_deref(), Some("Jane Doe"));
//! ```
//!
//! Nothing in this crate performs I/O. Issuer directories are fetched by the
//! caller and merged with [`TrustKeyStore::merge_json`].
//!
//! # Features
//!
//! - `rsa` (default): PS256 and RS256 verification for DCC and JWK keys.

pub mod base45;
pub mod base64url;
pub mod canonical;
pub mod cose;
pub mod credential;
pub mod cwt;
pub mod dcc;
pub mod error;
pub mod inflate;
pub mod jwk;
pub mod jws;
pub mod mac;
pub mod normalize;
pub mod obfuscation;
pub mod one_or_many;
pub mod options;
pub mod path;
pub mod shc;
pub mod trust;
pub mod vc;
pub mod verify;

pub use credential::{Claims, CredentialFormat, DisplayClaims, NormalizedCredential};
pub use error::{DecodeStage, Error, ErrorKind};
pub use jwk::JWK;
pub use normalize::{detect_format, normalize, normalize_str, normalize_with};
pub use obfuscation::{check_obfuscation, ObfuscationReport};
pub use options::VerifierOptions;
pub use trust::{TrustKeyStore, TrustMaterial, TrustRecord};
pub use verify::{SignatureCheck, Verdict, Verifier};
