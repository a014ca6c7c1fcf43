mod common;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use common::*;
use credverify::{detect_format, normalize, normalize_with, CredentialFormat, Error, VerifierOptions};

#[test]
fn each_format_is_recognized() {
    let (key, _) = p256_key();
    let vc = vaccination_credential().to_string();
    let card = health_card(&key, "kid", &health_card_payload());
    let hc1 = dcc_certificate(&key, b"kid", dcc_claims("AT"));

    assert_eq!(detect_format(vc.as_bytes()), CredentialFormat::JsonLdVc);
    assert_eq!(detect_format(card.as_bytes()), CredentialFormat::SmartHealthCard);
    assert_eq!(detect_format(hc1.as_bytes()), CredentialFormat::EuDcc);
    assert_eq!(
        detect_format(format!("  {}\n", card).as_bytes()),
        CredentialFormat::SmartHealthCard
    );
    assert_eq!(
        detect_format(card.to_uppercase().as_bytes()),
        CredentialFormat::SmartHealthCard
    );
}

#[test]
fn wrapped_inputs_are_unwrapped_once() {
    let (key, _) = p256_key();
    let vc = vaccination_credential().to_string();
    let card = health_card(&key, "kid", &health_card_payload());

    assert_eq!(
        detect_format(STANDARD.encode(&vc).as_bytes()),
        CredentialFormat::JsonLdVc
    );
    assert_eq!(
        detect_format(URL_SAFE_NO_PAD.encode(&card).as_bytes()),
        CredentialFormat::SmartHealthCard
    );
    let twice = STANDARD.encode(STANDARD.encode(&vc));
    assert_eq!(detect_format(twice.as_bytes()), CredentialFormat::Unknown);

    let options = VerifierOptions::default().with_base64_unwrap(false);
    assert!(matches!(
        normalize_with(STANDARD.encode(&vc).as_bytes(), &options),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn garbage_is_unknown() {
    let inputs: [&[u8]; 8] = [
        b"",
        b"   ",
        b"hello world",
        b"{not json",
        b"[1, 2, 3]",
        br#"{"name": "not a credential"}"#,
        b"\xff\xfe\x00",
        b"HC2:NCFOXN%TS3DH",
    ];
    for input in inputs {
        assert_eq!(detect_format(input), CredentialFormat::Unknown, "{:?}", input);
        assert!(normalize(input).is_err());
    }
}

#[test]
fn oversized_payloads_are_refused() {
    let (key, _) = p256_key();
    let hc1 = dcc_certificate(&key, b"kid", dcc_claims("AT"));
    let options = VerifierOptions::default().with_max_decompressed_len(16);
    let err = normalize_with(hc1.as_bytes(), &options).unwrap_err();
    assert_eq!(err.kind(), credverify::ErrorKind::DecodeFailure);
}
