//! Known Answer / envelope-only tests

use std::sync::Arc;

use tiered_envelope::wire::{self, Envelope, FIELD_SEPARATOR};
use tiered_envelope::{
    CipherKey, Engine, EngineConfig, InMemoryPreferences, Mode, SoftwareKeyStore, SymmetricKey, IV_BYTES,
    MAC_BYTES, PBKDF2_ITERATIONS, SALT_BYTES,
};

/// PBKDF2-SHA256("password", [0x01; 32], 10 000) key, iv [0x02; 16], plaintext "abc".
const PASSWORD_KAT: &str = "2AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=]AgICAgICAgICAgICAgICAg==]\
tUUEW77cyOO0ebOAUpK4zT1xiT2iiBYVPDZ07x2SnJpP/4dzcnfEnq1tcUX1Ae2d";

/// Key [0x07; 32], iv 00..0f, plaintext "hello tiers".
const CBC_HMAC_KAT: &str = "046186ab6773b06134d55900684fab64\
2a103af952b0089bdbf49365ff0ead607da86e8abf28e8c59849558f44e1a8b1";

fn engine(min: i32, platform: i32) -> Engine {
    Engine::with_config(
        EngineConfig::new(min, platform),
        Arc::new(SoftwareKeyStore::in_memory()),
        Arc::new(InMemoryPreferences::new()),
    )
    .unwrap()
}

#[test]
fn test_mode_tags() {
    assert_eq!(Mode::AesKeystore.tag(), '0');
    assert_eq!(Mode::RsaKeystore.tag(), '1');
    assert_eq!(Mode::PasswordDerived.tag(), '2');
    assert_eq!(FIELD_SEPARATOR, ']');
}

#[test]
fn test_wire_encoding_known_answers() {
    let aes = Envelope::new(Mode::AesKeystore, vec![(0u8..16).collect(), vec![0xaa; 48]]);
    assert_eq!(
        wire::encode(&aes).unwrap(),
        "0AAECAwQFBgcICQoLDA0ODw==]qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq"
    );

    let rsa = Envelope::new(Mode::RsaKeystore, vec![vec![0xff; 4], vec![0], vec![0x10, 0x20]]);
    assert_eq!(wire::encode(&rsa).unwrap(), "1/////w==]AA==]ECA=");
}

#[test]
fn test_cbc_hmac_known_answer() {
    let key = SymmetricKey::from_bytes(&[0x07; 32]).unwrap();
    let iv: [u8; IV_BYTES] = core::array::from_fn(|i| i as u8);
    let ct = key.seal(&iv, b"hello tiers").unwrap();
    assert_eq!(hex::encode(&ct), CBC_HMAC_KAT);
    assert_eq!(key.open(&iv, &ct).unwrap(), b"hello tiers");
}

#[test]
fn test_password_envelope_known_answer() {
    // envelopes do not carry the count; the vector only holds at this value
    assert_eq!(PBKDF2_ITERATIONS, 10_000);
    let e = engine(0, 0);
    assert_eq!(e.decrypt_with_password(PASSWORD_KAT, "password").unwrap(), "abc");
    assert!(e.decrypt_with_password(PASSWORD_KAT, "Password").unwrap_err().is_crypto());
}

#[test]
fn test_envelope_structure_per_mode() {
    let e = engine(2, 2);
    let info = wire::inspect(&e.encrypt("abc").unwrap()).unwrap();
    assert_eq!(info.mode, Mode::AesKeystore);
    assert_eq!(info.field_lengths, vec![IV_BYTES, 16 + MAC_BYTES]);

    let e = engine(1, 1);
    let info = wire::inspect(&e.encrypt("abc").unwrap()).unwrap();
    assert_eq!(info.mode, Mode::RsaKeystore);
    assert_eq!(info.field_lengths, vec![256, IV_BYTES, 16 + MAC_BYTES]);

    let e = engine(0, 0);
    let info = wire::inspect(&e.encrypt("abc").unwrap()).unwrap();
    assert_eq!(info.mode, Mode::PasswordDerived);
    assert_eq!(info.field_lengths, vec![SALT_BYTES, IV_BYTES, 16 + MAC_BYTES]);
}

#[test]
fn test_envelope_is_single_ascii_line() {
    let e = engine(0, 2);
    let env = e.encrypt(&"ünïcödé ".repeat(50)).unwrap();
    assert!(env.is_ascii());
    assert!(!env.contains('\n'));
    assert!(!env.contains('\r'));
}

#[test]
fn test_wrong_arity_is_format_error_not_crypto() {
    let e = engine(0, 2);
    let env = e.encrypt("abc").unwrap();

    // drop the ciphertext field
    let (head, _) = env.rsplit_once(FIELD_SEPARATOR).unwrap();
    assert!(e.decrypt(head).unwrap_err().is_format());

    // extra field
    let extra = format!("{}]AAAA", env);
    assert!(e.decrypt(&extra).unwrap_err().is_format());

    // retagged as a three-field mode
    let retagged = format!("2{}", &env[1..]);
    assert!(e.decrypt(&retagged).unwrap_err().is_format());
}

#[test]
fn test_malformed_inputs() {
    let e = engine(0, 2);
    for bad in ["0", "9xyz", "x]y]z", "0!!!!]AAAA", "2AAAA]AAAA]A"] {
        let err = e.decrypt(bad).unwrap_err();
        assert!(err.is_format(), "{:?} gave {:?}", bad, err);
    }
}
