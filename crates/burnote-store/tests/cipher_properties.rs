mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use burnote_store::{CipherEngine, Error};
use proptest::prelude::*;

fn engine() -> CipherEngine {
    CipherEngine::new(common::fast_kdf()).unwrap()
}

#[test]
fn distinct_passwords_do_not_verify() {
    let engine = engine();
    let record = engine.hash_password("correct horse").unwrap();
    assert!(engine.verify_password("correct horse", &record).unwrap());
    assert!(!engine.verify_password("correct horse ", &record).unwrap());
    assert!(!engine.verify_password("Correct horse", &record).unwrap());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn encrypt_decrypt_round_trips(
        payload in proptest::collection::vec(any::<u8>(), 1..512),
        key in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let engine = engine();
        let blob = engine.encrypt(&payload, &key).unwrap();
        let plaintext = engine.decrypt(&blob, &key).unwrap();
        prop_assert_eq!(plaintext.as_slice(), payload.as_slice());
    }

    #[test]
    fn any_flipped_bit_fails_authentication(
        payload in proptest::collection::vec(any::<u8>(), 1..128),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let engine = engine();
        let key = b"property-master-key";
        let blob = engine.encrypt(&payload, key).unwrap();

        let mut raw = STANDARD.decode(&blob).unwrap();
        let idx = position.index(raw.len());
        raw[idx] ^= 1 << bit;
        let tampered = STANDARD.encode(&raw);

        prop_assert!(matches!(
            engine.decrypt(&tampered, key),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn wrong_key_fails_authentication(
        payload in proptest::collection::vec(any::<u8>(), 1..128),
        suffix in 1u8..=255,
    ) {
        let engine = engine();
        let key = b"the-right-key".to_vec();
        let mut wrong = key.clone();
        wrong.push(suffix);

        let blob = engine.encrypt(&payload, &key).unwrap();
        prop_assert!(matches!(
            engine.decrypt(&blob, &wrong),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn password_hash_verifies_only_its_password(
        password in "[ -~]{1,32}",
        other in "[ -~]{1,32}",
    ) {
        let engine = engine();
        let record = engine.hash_password(&password).unwrap();
        prop_assert!(engine.verify_password(&password, &record).unwrap());
        if other != password {
            prop_assert!(!engine.verify_password(&other, &record).unwrap());
        }
    }
}
