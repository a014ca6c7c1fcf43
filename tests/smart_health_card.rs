mod common;

use std::sync::Arc;

use common::*;
use credverify::{
    detect_format, normalize_str, shc, CredentialFormat, Error, ErrorKind, SignatureCheck,
    TrustKeyStore, Verifier,
};
use serde_json::json;

const KID: &str = "3Kfdg-XwP-7gXyywtUfUADwBumDOPKMQx-iELL11W9s";

fn issuer_store(jwk: &credverify::JWK) -> Arc<TrustKeyStore> {
    let mut jwk = jwk.clone();
    jwk.key_id = Some(KID.to_string());
    jwk.algorithm = Some("ES256".to_string());
    jwk.public_key_use = Some("sig".to_string());
    let store = TrustKeyStore::new();
    let jwks = json!({ "keys": [jwk] });
    assert_eq!(
        store
            .merge_json(SHC_ISSUER, CredentialFormat::SmartHealthCard, &jwks)
            .unwrap(),
        1
    );
    Arc::new(store)
}

#[test]
fn card_verifies() {
    let (key, jwk) = p256_key();
    let card = health_card(&key, KID, &health_card_payload());
    assert_eq!(detect_format(card.as_bytes()), CredentialFormat::SmartHealthCard);

    let verdict = Verifier::new(issuer_store(&jwk))
        .verify_input(card.as_bytes())
        .unwrap();
    assert_eq!(verdict.format, CredentialFormat::SmartHealthCard);
    assert!(verdict.valid, "{:?}", verdict.errors);
    assert!(verdict.obfuscation.is_none());
    assert_eq!(verdict.claims.issuer.as_deref(), Some(SHC_ISSUER));
    assert_eq!(
        verdict.claims.subject_name.as_deref(),
        Some("John B. Anyperson")
    );
    assert_eq!(verdict.claims.birth_date.as_deref(), Some("1951-01-20"));
    // nbf 1620847989.837 rounds to the next second.
    assert_eq!(verdict.claims.issued_at.unwrap().timestamp(), 1620847990);
}

#[test]
fn normalized_payload_is_inflated() {
    let (key, _) = p256_key();
    let card = health_card(&key, KID, &health_card_payload());
    let credential = normalize_str(&card).unwrap();
    assert_eq!(credential.payload()["vc"]["credentialSubject"]["fhirVersion"], "4.0.1");
    assert_eq!(credential.raw(), card.as_bytes());
}

#[test]
fn issuer_with_trailing_slash() {
    let (key, jwk) = p256_key();
    let mut payload = health_card_payload();
    payload["iss"] = json!(format!("{}/", SHC_ISSUER));
    let card = health_card(&key, KID, &payload);
    let verdict = Verifier::new(issuer_store(&jwk))
        .verify_input(card.as_bytes())
        .unwrap();
    assert!(verdict.valid, "{:?}", verdict.errors);
}

#[test]
fn unknown_kid_needs_key_resolution() {
    let (key, jwk) = p256_key();
    let card = health_card(&key, "some-other-kid", &health_card_payload());
    let verdict = Verifier::new(issuer_store(&jwk))
        .verify_input(card.as_bytes())
        .unwrap();
    assert!(!verdict.valid);
    assert!(matches!(
        verdict.signature,
        SignatureCheck::Failed {
            kind: ErrorKind::KeyResolution,
            ..
        }
    ));
}

#[test]
fn signature_from_another_key_fails() {
    let (key, _) = p256_key();
    let (_, other_jwk) = p256_key();
    let card = health_card(&key, KID, &health_card_payload());
    let verdict = Verifier::new(issuer_store(&other_jwk))
        .verify_input(card.as_bytes())
        .unwrap();
    assert!(matches!(
        verdict.signature,
        SignatureCheck::Failed {
            kind: ErrorKind::SignatureInvalid,
            ..
        }
    ));
}

#[test]
fn tampered_digits_fail() {
    let (key, jwk) = p256_key();
    let jws = health_card_jws(&key, KID, &health_card_payload());
    // Swap the last character of the signature for a different one.
    let mut tampered = jws[..jws.len() - 1].to_string();
    tampered.push(if jws.ends_with('A') { 'B' } else { 'A' });
    let card = format!("shc:/{}", shc::encode_numeric(&tampered).unwrap());
    let verdict = Verifier::new(issuer_store(&jwk)).verify_input(card.as_bytes());
    match verdict {
        Ok(verdict) => assert!(!verdict.valid),
        Err(err) => assert_eq!(err.kind(), ErrorKind::DecodeFailure),
    }
}

#[test]
fn chunked_cards() {
    let (key, jwk) = p256_key();
    let jws = health_card_jws(&key, KID, &health_card_payload());
    let digits = shc::encode_numeric(&jws).unwrap();
    let (first, second) = digits.split_at(digits.len() / 2 / 2 * 2);
    let chunks = [
        format!("shc:/2/2/{}", second),
        format!("shc:/1/2/{}", first),
    ];

    // A single chunk of a multi-part card is not a complete credential.
    assert!(matches!(
        normalize_str(&chunks[1]),
        Err(Error::MalformedInput(_))
    ));

    let combined = shc::combine_chunks(&chunks).unwrap();
    let verdict = Verifier::new(issuer_store(&jwk))
        .verify_input(combined.as_bytes())
        .unwrap();
    assert!(verdict.valid, "{:?}", verdict.errors);
}

#[test]
fn invalid_digit_pairs() {
    for card in ["shc:/", "shc:/123", "shc:/99", "shc:/12ab"] {
        let err = normalize_str(card).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure, "{}", card);
    }
}

#[test]
fn card_without_issuer_is_malformed() {
    let (key, _) = p256_key();
    let mut payload = health_card_payload();
    payload.as_object_mut().unwrap().remove("iss");
    let card = health_card(&key, KID, &payload);
    assert!(matches!(normalize_str(&card), Err(Error::MalformedInput(_))));
}
