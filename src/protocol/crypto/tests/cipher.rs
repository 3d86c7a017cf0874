use crate::protocol::crypto::*;

const KEY: [u8; 16] = [0x2b; 16];
const IV: [u8; 16] = [0x11; 16];

#[test]
fn test_round_trip_whole_blocks() {
    let cipher = AudioCipher::new(&KEY, &IV).unwrap();
    let plain: Vec<u8> = (0..64).map(|i| i as u8).collect();

    let mut data = plain.clone();
    cipher.encrypt_in_place(&mut data);
    assert_ne!(data, plain);
    cipher.decrypt_in_place(&mut data);

    assert_eq!(data, plain);
}

#[test]
fn test_trailing_partial_block_is_clear() {
    let cipher = AudioCipher::new(&KEY, &IV).unwrap();
    let plain: Vec<u8> = (0..37).map(|i| i as u8).collect();

    let mut data = plain.clone();
    cipher.encrypt_in_place(&mut data);
    assert_eq!(&data[32..], &plain[32..]);
    cipher.decrypt_in_place(&mut data);

    assert_eq!(data, plain);
}

#[test]
fn test_short_payload_untouched() {
    let cipher = AudioCipher::new(&KEY, &IV).unwrap();
    let mut data = vec![1, 2, 3];
    cipher.decrypt_in_place(&mut data);
    assert_eq!(data, vec![1, 2, 3]);
}

#[test]
fn test_iv_restarts_per_packet() {
    let cipher = AudioCipher::new(&KEY, &IV).unwrap();
    let mut first = vec![0xAA; 32];
    let mut second = vec![0xAA; 32];

    cipher.encrypt_in_place(&mut first);
    cipher.encrypt_in_place(&mut second);

    assert_eq!(first, second);
}

#[test]
fn test_rejects_bad_key_length() {
    assert!(matches!(
        AudioCipher::new(&[0u8; 15], &IV),
        Err(CryptoError::InvalidKeyLength {
            expected: 16,
            actual: 15
        })
    ));
    assert!(AudioCipher::new(&KEY, &[0u8; 8]).is_err());
}
