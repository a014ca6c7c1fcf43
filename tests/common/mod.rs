#![allow(dead_code)]
use std::io::Write;

use ciborium::value::Value as CborValue;
use coset::{iana, CborSerializable, CoseSign1Builder, HeaderBuilder, TaggedCborSerializable};
use credverify::{base64url, canonical, dcc, mac, obfuscation, shc, JWK};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use serde_json::{json, Value};

pub const CLINIC_DID: &str = "did:example:clinic";
pub const SHC_ISSUER: &str = "https://spec.smarthealth.cards/examples/issuer";

pub fn p256_key() -> (SigningKey, JWK) {
    let key = SigningKey::random(&mut rand::rngs::OsRng);
    let jwk = JWK::from_p256(&p256::PublicKey::from(key.verifying_key()));
    (key, jwk)
}

pub fn vaccination_credential() -> Value {
    json!({
        "@context": ["https://www.w3.org/2018/credentials/v1"],
        "id": "urn:uuid:3f1e8a52-6d2b-4b1c-9a0e-51d7d3b0c2aa",
        "type": ["VerifiableCredential", "VaccinationCertificate"],
        "issuer": { "id": CLINIC_DID, "name": "Example Clinic" },
        "issuanceDate": "2021-06-01T10:00:00Z",
        "expirationDate": "2022-06-01T10:00:00Z",
        "credentialSubject": {
            "id": "did:example:holder",
            "name": "Jane Doe",
            "birthDate": "1980-04-12",
            "recipient": {
                "gender": "female",
                "address": { "city": "Springfield", "postalCode": "12345" }
            },
            "vaccine": { "lotNumber": "LOT-0042", "dose": 2 }
        },
        "proof": {
            "type": "EcdsaSecp256r1Signature2019",
            "created": "2021-06-01T10:00:00Z",
            "verificationMethod": "did:example:clinic#key-1"
        }
    })
}

/// Replace each path in `credentialSubject` with its MAC and add the
/// descriptors under `obfuscation`.
pub fn obfuscate(credential: &mut Value, paths: &[&str]) {
    let mut descriptors = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        let nonce = format!("nonce-{}-{}", i, path);
        let keys: Vec<&str> = path.split('.').collect();
        let mut target = &mut credential["credentialSubject"];
        for key in &keys[..keys.len() - 1] {
            target = &mut target[*key];
        }
        let last = keys[keys.len() - 1];
        let value = target[last].clone();
        let text = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        target[last] = json!(mac::compute_mac(&text, nonce.as_bytes()).unwrap());
        descriptors.push(json!({
            "path": path,
            "disclosedValue": value,
            "nonce": base64url::encode(nonce.as_bytes()),
        }));
    }
    credential[obfuscation::DEFAULT_FIELD] = Value::Array(descriptors);
}

/// Sign the credential in place, as its issuer would.
pub fn sign_credential(key: &SigningKey, credential: &mut Value) {
    let unsigned = canonical::strip_for_signing(credential, obfuscation::DEFAULT_FIELD);
    let data = canonical::canonical_bytes(&unsigned).unwrap();
    let sig: Signature = key.sign(&data);
    credential["proof"]["signatureValue"] = json!(base64url::encode(sig.to_der().as_bytes()));
}

pub fn health_card_payload() -> Value {
    json!({
        "iss": SHC_ISSUER,
        "nbf": 1620847989.837,
        "vc": {
            "type": [
                "https://smarthealth.cards#health-card",
                "https://smarthealth.cards#immunization",
                "https://smarthealth.cards#covid19"
            ],
            "credentialSubject": {
                "fhirVersion": "4.0.1",
                "fhirBundle": {
                    "resourceType": "Bundle",
                    "type": "collection",
                    "entry": [{
                        "fullUrl": "resource:0",
                        "resource": {
                            "resourceType": "Patient",
                            "name": [{ "family": "Anyperson", "given": ["John", "B."] }],
                            "birthDate": "1951-01-20"
                        }
                    }, {
                        "fullUrl": "resource:1",
                        "resource": {
                            "resourceType": "Immunization",
                            "status": "completed",
                            "vaccineCode": {
                                "coding": [{ "system": "http://hl7.org/fhir/sid/cvx", "code": "207" }]
                            },
                            "patient": { "reference": "resource:0" },
                            "occurrenceDateTime": "2021-01-01"
                        }
                    }]
                }
            }
        }
    })
}

/// A deflated ES256 compact JWS, as found inside a health card.
pub fn health_card_jws(key: &SigningKey, kid: &str, payload: &Value) -> String {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(serde_json::to_vec(payload).unwrap().as_slice())
        .unwrap();
    let deflated = encoder.finish().unwrap();
    let header = json!({ "zip": "DEF", "alg": "ES256", "kid": kid });
    let signing_input = format!(
        "{}.{}",
        base64url::encode(serde_json::to_vec(&header).unwrap()),
        base64url::encode(deflated)
    );
    let sig: Signature = key.sign(signing_input.as_bytes());
    format!("{}.{}", signing_input, base64url::encode(sig.to_bytes()))
}

pub fn health_card(key: &SigningKey, kid: &str, payload: &Value) -> String {
    let jws = health_card_jws(key, kid, payload);
    format!("{}{}", shc::PREFIX, shc::encode_numeric(&jws).unwrap())
}

fn text(s: &str) -> CborValue {
    CborValue::Text(s.to_string())
}

/// CWT claims for a vaccination certificate issued by `iss`.
pub fn dcc_claims(iss: &str) -> Vec<u8> {
    let vaccination = CborValue::Map(vec![
        (text("tg"), text("840539006")),
        (text("vp"), text("1119349007")),
        (text("dn"), CborValue::Integer(2.into())),
        (text("sd"), CborValue::Integer(2.into())),
        (text("dt"), text("2021-02-18")),
        (text("co"), text("AT")),
        (text("ci"), text("URN:UVCI:01:AT:10807843F94AEE0EE5093FBC254BD813#B")),
    ]);
    let certificate = CborValue::Map(vec![
        (text("ver"), text("1.3.0")),
        (
            text("nam"),
            CborValue::Map(vec![
                (text("fn"), text("Musterfrau-Gößinger")),
                (text("gn"), text("Gabriele")),
            ]),
        ),
        (text("dob"), text("1998-02-26")),
        (text("v"), CborValue::Array(vec![vaccination])),
    ]);
    let claims = CborValue::Map(vec![
        (CborValue::Integer(1.into()), text(iss)),
        (CborValue::Integer(4.into()), CborValue::Integer(1700000000.into())),
        (CborValue::Integer(6.into()), CborValue::Integer(1690000000.into())),
        (
            CborValue::Integer((-260).into()),
            CborValue::Map(vec![(CborValue::Integer(1.into()), certificate)]),
        ),
    ]);
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&claims, &mut bytes).unwrap();
    bytes
}

/// An `HC1:` string signed with ES256 under `kid`.
pub fn dcc_certificate(key: &SigningKey, kid: &[u8], claims: Vec<u8>) -> String {
    let protected = HeaderBuilder::new()
        .algorithm(iana::Algorithm::ES256)
        .key_id(kid.to_vec())
        .build();
    let sign1 = CoseSign1Builder::new()
        .protected(protected)
        .payload(claims)
        .create_signature(b"", |data| {
            let sig: Signature = key.sign(data);
            sig.to_bytes().to_vec()
        })
        .build();
    dcc::encode(&sign1.to_tagged_vec().unwrap()).unwrap()
}

/// Same, but with the COSE structure left untagged.
pub fn dcc_certificate_untagged(key: &SigningKey, kid: &[u8], claims: Vec<u8>) -> String {
    let protected = HeaderBuilder::new()
        .algorithm(iana::Algorithm::ES256)
        .key_id(kid.to_vec())
        .build();
    let sign1 = CoseSign1Builder::new()
        .protected(protected)
        .payload(claims)
        .create_signature(b"", |data| {
            let sig: Signature = key.sign(data);
            sig.to_bytes().to_vec()
        })
        .build();
    dcc::encode(&sign1.to_vec().unwrap()).unwrap()
}
