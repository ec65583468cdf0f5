use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use disappr_core::crypto::{seal, unseal, CipherError, EncryptionKey, KEY_LENGTH, NONCE_LENGTH};

fn sample_plaintexts() -> Vec<Vec<u8>> {
    let mut samples = vec![
        Vec::new(),
        b"hello".to_vec(),
        "snowman \u{2603} and friends".as_bytes().to_vec(),
        vec![0u8; 1],
        vec![0xff; 255],
    ];
    for len in [15usize, 16, 17, 1023, 4096] {
        samples.push((0..len).map(|i| (i * 31 % 251) as u8).collect());
    }
    samples
}

#[test]
fn test_round_trip_many_inputs_and_keys() {
    for _ in 0..8 {
        let key = EncryptionKey::generate().expect("key generation should succeed");
        for plaintext in sample_plaintexts() {
            let sealed = seal(&plaintext, key.as_bytes()).expect("seal should succeed");
            let opened = unseal(&sealed, key.as_bytes()).expect("unseal should succeed");
            assert_eq!(opened.as_slice(), plaintext.as_slice());
        }
    }
}

#[test]
fn test_key_size_guard_for_all_wrong_lengths() {
    let sealed = seal(b"hello", &[7u8; KEY_LENGTH]).expect("seal should succeed");

    for len in (0..=64).filter(|len| *len != KEY_LENGTH) {
        let key = vec![7u8; len];
        assert!(
            matches!(
                seal(b"hello", &key),
                Err(CipherError::InvalidKeySize { actual, .. }) if actual == len
            ),
            "seal accepted a {}-byte key",
            len
        );
        assert!(
            matches!(
                unseal(&sealed, &key),
                Err(CipherError::InvalidKeySize { actual, .. }) if actual == len
            ),
            "unseal accepted a {}-byte key",
            len
        );
    }
}

#[test]
fn test_flipping_any_ciphertext_byte_fails_authentication() {
    let key = [3u8; KEY_LENGTH];
    let sealed = seal(b"attack at dawn", &key).expect("seal should succeed");
    let blob = STANDARD.decode(&sealed).expect("blob should be base64");

    for index in NONCE_LENGTH..blob.len() {
        let mut tampered = blob.clone();
        tampered[index] ^= 0x01;
        let result = unseal(&STANDARD.encode(&tampered), &key);
        assert!(
            matches!(result, Err(CipherError::Authentication)),
            "tampering byte {} was not detected",
            index
        );
    }
}

#[test]
fn test_flipping_nonce_byte_fails_authentication() {
    let key = [3u8; KEY_LENGTH];
    let sealed = seal(b"attack at dawn", &key).expect("seal should succeed");
    let mut blob = STANDARD.decode(&sealed).expect("blob should be base64");
    blob[0] ^= 0x80;

    let result = unseal(&STANDARD.encode(&blob), &key);
    assert!(matches!(result, Err(CipherError::Authentication)));
}

#[test]
fn test_nonces_never_repeat() {
    let key = [5u8; KEY_LENGTH];
    let mut blobs = HashSet::new();
    let mut nonces = HashSet::new();

    for _ in 0..2000 {
        let sealed = seal(b"same plaintext", &key).expect("seal should succeed");
        let blob = STANDARD.decode(&sealed).expect("blob should be base64");
        nonces.insert(blob[..NONCE_LENGTH].to_vec());
        blobs.insert(sealed);
    }

    assert_eq!(blobs.len(), 2000);
    assert_eq!(nonces.len(), 2000);
}
