//! In-memory cache of issuer trust material.
//!
//! The store never fetches anything. Callers that miss on a lookup retrieve
//! keys from an issuer directory themselves and feed them back through
//! [`TrustKeyStore::merge`] or one of the `merge_*` helpers.
use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cose::VerificationKey;
use crate::credential::CredentialFormat;
use crate::error::Error;
use crate::jwk::{JwkSet, JWK};

/// Key record for DCC signer certificates, keyed by `kid`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DccKeyRecord {
    /// Base64 key identifier, as carried in the COSE header.
    pub kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
    /// Base64 DER `SubjectPublicKeyInfo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwk: Option<JWK>,
}

impl DccKeyRecord {
    pub fn verification_key(&self) -> Result<VerificationKey, Error> {
        if let Some(jwk) = &self.jwk {
            return VerificationKey::from_jwk(jwk);
        }
        let public_key = self
            .public_key
            .as_deref()
            .ok_or_else(|| Error::InvalidKey(format!("no public key for kid '{}'", self.kid)))?;
        VerificationKey::from_spki_der(&STANDARD.decode(public_key)?)
    }
}

/// One unit of trust material, as merged into the store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrustRecord {
    /// A public key for a DID or DID URL.
    Did { did: String, key: JWK },
    /// The JWK set published by a health card issuer.
    JwkSet { issuer: String, keys: JwkSet },
    Dcc(DccKeyRecord),
}

/// Result of [`TrustKeyStore::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrustMaterial {
    Jwk(JWK),
    JwkSet(JwkSet),
    Dcc(DccKeyRecord),
}

#[derive(Debug, Default)]
struct TrustCache {
    dids: HashMap<String, JWK>,
    issuers: HashMap<String, JwkSet>,
    dcc: HashMap<String, DccKeyRecord>,
}

/// Thread-safe trust cache, shared between verifications with `Arc`.
#[derive(Debug, Default)]
pub struct TrustKeyStore {
    cache: RwLock<TrustCache>,
}

/// Issuer URLs compare without a trailing `/`.
pub fn normalize_issuer(issuer: &str) -> &str {
    issuer.trim_end_matches('/')
}

/// The string form of a COSE `kid`, as used for [`DccKeyRecord::kid`].
pub fn dcc_kid(kid: &[u8]) -> String {
    STANDARD.encode(kid)
}

/// Whether `id` is `did` itself or one of its fragments.
fn within_did(did: &str, id: &str) -> bool {
    id == did || id.strip_prefix(did).map_or(false, |rest| rest.starts_with('#'))
}

impl TrustKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = TrustRecord>) -> Self {
        let store = Self::new();
        store.merge(records);
        store
    }

    /// Trust material for `issuer_identifier`: a DID (URL), an issuer URL or
    /// a DCC key identifier depending on `format`.
    pub fn lookup(&self, issuer_identifier: &str, format: CredentialFormat) -> Option<TrustMaterial> {
        match format {
            CredentialFormat::JsonLdVc => self.lookup_did(issuer_identifier).map(TrustMaterial::Jwk),
            CredentialFormat::SmartHealthCard => {
                let cache = self.cache.read();
                cache
                    .issuers
                    .get(normalize_issuer(issuer_identifier))
                    .cloned()
                    .map(TrustMaterial::JwkSet)
            }
            CredentialFormat::EuDcc => self.lookup_dcc(issuer_identifier).map(TrustMaterial::Dcc),
            CredentialFormat::Unknown => None,
        }
    }

    /// Key for a DID URL, falling back to the DID without its fragment.
    pub fn lookup_did(&self, did_url: &str) -> Option<JWK> {
        let cache = self.cache.read();
        if let Some(key) = cache.dids.get(did_url) {
            return Some(key.clone());
        }
        let (did, _fragment) = did_url.split_once('#')?;
        cache.dids.get(did).cloned()
    }

    /// Key `kid` of the issuer's JWK set. Without a `kid`, a set holding a
    /// single key yields that key.
    pub fn lookup_jwk(&self, issuer: &str, kid: Option<&str>) -> Option<JWK> {
        let cache = self.cache.read();
        let set = cache.issuers.get(normalize_issuer(issuer))?;
        match kid {
            Some(kid) => set.find(kid).cloned(),
            None if set.keys.len() == 1 => set.keys.first().cloned(),
            None => None,
        }
    }

    pub fn lookup_dcc(&self, kid: &str) -> Option<DccKeyRecord> {
        self.cache.read().dcc.get(kid).cloned()
    }

    /// Insert or replace records by natural key. Returns the number of
    /// records that changed the store.
    pub fn merge(&self, records: impl IntoIterator<Item = TrustRecord>) -> usize {
        let mut cache = self.cache.write();
        let mut changed = 0;
        for record in records {
            let did_change = match record {
                TrustRecord::Did { did, key } => {
                    cache.dids.insert(did, key.clone()).as_ref() != Some(&key)
                }
                TrustRecord::JwkSet { issuer, keys } => cache
                    .issuers
                    .entry(normalize_issuer(&issuer).to_string())
                    .or_default()
                    .merge(keys),
                TrustRecord::Dcc(record) => {
                    cache.dcc.insert(record.kid.clone(), record.clone()).as_ref() != Some(&record)
                }
            };
            if did_change {
                changed += 1;
            }
        }
        if changed > 0 {
            log::debug!("merged {} trust record(s)", changed);
        }
        changed
    }

    /// Parse a raw issuer-directory payload and merge it.
    ///
    /// * JSON-LD: the DID document of `issuer_identifier` with
    ///   `verificationMethod[].publicKeyJwk`, or an object mapping that DID
    ///   and its DID URLs to JWKs.
    /// * SMART Health Card: a JWK set (`{"keys": [...]}`) for `issuer`.
    /// * EU DCC: a list of key records, bare or under `keys`.
    pub fn merge_json(
        &self,
        issuer_identifier: &str,
        format: CredentialFormat,
        json: &Value,
    ) -> Result<usize, Error> {
        match format {
            CredentialFormat::JsonLdVc if json.get("verificationMethod").is_some() => {
                self.merge_did_document(issuer_identifier, json)
            }
            CredentialFormat::JsonLdVc => {
                let keys: HashMap<String, JWK> = serde_json::from_value(json.clone())?;
                if let Some(foreign) = keys.keys().find(|id| !within_did(issuer_identifier, id)) {
                    return Err(Error::malformed(format!(
                        "key '{}' is not under DID '{}'",
                        foreign, issuer_identifier
                    )));
                }
                Ok(self.merge(
                    keys.into_iter()
                        .map(|(did, key)| TrustRecord::Did { did, key }),
                ))
            }
            CredentialFormat::SmartHealthCard => self.merge_jwks(issuer_identifier, json),
            CredentialFormat::EuDcc => self.merge_dcc_records(json),
            CredentialFormat::Unknown => Err(Error::malformed("unknown credential format")),
        }
    }

    /// Merge the keys of the DID document fetched for `did`. The document and
    /// every method it lists must belong to `did`.
    pub fn merge_did_document(&self, did: &str, document: &Value) -> Result<usize, Error> {
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed("DID document has no id"))?;
        if id != did {
            return Err(Error::malformed(format!(
                "DID document '{}' was fetched for '{}'",
                id, did
            )));
        }
        let methods = document
            .get("verificationMethod")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::malformed("DID document has no verificationMethod"))?;
        let mut records = Vec::with_capacity(methods.len());
        for method in methods {
            let jwk = match method.get("publicKeyJwk") {
                Some(jwk) => jwk,
                None => continue,
            };
            let id = match method.get("id").and_then(Value::as_str) {
                Some(id) if id.starts_with('#') => format!("{}{}", did, id),
                Some(id) if within_did(did, id) => id.to_string(),
                Some(id) => {
                    return Err(Error::malformed(format!(
                        "verification method '{}' is not under DID '{}'",
                        id, did
                    )))
                }
                None => did.to_string(),
            };
            records.push(TrustRecord::Did {
                did: id,
                key: serde_json::from_value(jwk.clone())?,
            });
        }
        if methods.len() == 1 {
            if let Some(TrustRecord::Did { key, .. }) = records.first() {
                let key = key.clone();
                records.push(TrustRecord::Did {
                    did: did.to_string(),
                    key,
                });
            }
        }
        Ok(self.merge(records))
    }

    pub fn merge_jwks(&self, issuer: &str, jwks: &Value) -> Result<usize, Error> {
        let keys: JwkSet = serde_json::from_value(jwks.clone())?;
        Ok(self.merge([TrustRecord::JwkSet {
            issuer: issuer.to_string(),
            keys,
        }]))
    }

    pub fn merge_dcc_records(&self, json: &Value) -> Result<usize, Error> {
        let list = json.get("keys").unwrap_or(json);
        let records: Vec<DccKeyRecord> = serde_json::from_value(list.clone())?;
        Ok(self.merge(records.into_iter().map(TrustRecord::Dcc)))
    }

    /// Drop all cached trust material.
    pub fn reset(&self) {
        let mut cache = self.cache.write();
        *cache = TrustCache::default();
        log::debug!("trust store reset");
    }

    /// Every record in the store, for persistence by the caller.
    pub fn snapshot(&self) -> Vec<TrustRecord> {
        let cache = self.cache.read();
        let mut records: Vec<TrustRecord> = Vec::with_capacity(self.len_locked(&cache));
        records.extend(cache.dids.iter().map(|(did, key)| TrustRecord::Did {
            did: did.clone(),
            key: key.clone(),
        }));
        records.extend(cache.issuers.iter().map(|(issuer, keys)| TrustRecord::JwkSet {
            issuer: issuer.clone(),
            keys: keys.clone(),
        }));
        records.extend(cache.dcc.values().cloned().map(TrustRecord::Dcc));
        records
    }

    pub fn len(&self) -> usize {
        self.len_locked(&self.cache.read())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn len_locked(&self, cache: &TrustCache) -> usize {
        cache.dids.len() + cache.issuers.len() + cache.dcc.len()
    }
}
