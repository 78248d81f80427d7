//! Hashing, the ECB stream mode and authenticated channel framing.
//!
//! MeshCore channel framing is `mac(2) || ciphertext` where the ciphertext
//! is AES-128-ECB over the zero-padded plaintext and the MAC is HMAC-SHA256
//! over the ciphertext, truncated to two bytes. Decryption returns the
//! padded plaintext; callers strip trailing zeros according to their own
//! framing (channel texts are NUL-terminated anyway).

use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::CryptoError;

/// AES-128 key length in bytes.
pub const CIPHER_KEY_LEN: usize = 16;
/// AES block length in bytes.
pub const CIPHER_BLOCK_LEN: usize = 16;
/// Truncated MAC length in bytes.
pub const MAC_LEN: usize = 2;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 digest of `msg`.
#[must_use]
pub fn sha256(msg: &[u8]) -> [u8; 32] {
    Sha256::digest(msg).into()
}

/// HMAC-SHA256 of `msg` keyed by `key`.
#[must_use]
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

/// Encrypt `plain` with AES-128-ECB, zero-padding the final partial block.
///
/// The output length is `plain.len()` rounded up to a whole number of
/// blocks; an empty input produces an empty output.
#[must_use]
pub fn ecb_encrypt(key: &[u8; CIPHER_KEY_LEN], plain: &[u8]) -> Vec<u8> {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut out = Vec::with_capacity(plain.len().div_ceil(CIPHER_BLOCK_LEN) * CIPHER_BLOCK_LEN);

    for chunk in plain.chunks(CIPHER_BLOCK_LEN) {
        let mut block = [0u8; CIPHER_BLOCK_LEN];
        block[..chunk.len()].copy_from_slice(chunk);
        let ga = GenericArray::from_mut_slice(&mut block);
        cipher.encrypt_block(ga);
        out.extend_from_slice(&block);
    }

    out
}

/// Decrypt an AES-128-ECB stream.
///
/// # Errors
///
/// [`CryptoError::BadCipherLength`] when the input is not a whole number of
/// blocks.
pub fn ecb_decrypt(key: &[u8; CIPHER_KEY_LEN], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() % CIPHER_BLOCK_LEN != 0 {
        return Err(CryptoError::BadCipherLength(data.len()));
    }

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut out = data.to_vec();
    for block in out.chunks_mut(CIPHER_BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    Ok(out)
}

/// Encrypt `plain` and prepend the truncated HMAC over the ciphertext.
///
/// Output layout: `mac(2) || ciphertext`.
#[must_use]
pub fn encrypt_then_mac(key: &[u8; CIPHER_KEY_LEN], plain: &[u8]) -> Vec<u8> {
    let ciphertext = ecb_encrypt(key, plain);
    let mac = hmac_sha256(key, &ciphertext);

    let mut out = Vec::with_capacity(MAC_LEN + ciphertext.len());
    out.extend_from_slice(&mac[..MAC_LEN]);
    out.extend_from_slice(&ciphertext);
    out
}

/// Verify the truncated MAC of a framed message and decrypt it.
///
/// # Errors
///
/// - [`CryptoError::FrameTooShort`] when the frame cannot hold a MAC and at
///   least one block
/// - [`CryptoError::MacMismatch`] when authentication fails
/// - [`CryptoError::BadCipherLength`] when the ciphertext is ragged
///
/// # Security
///
/// The MAC comparison is constant time in the secret-derived value; the
/// caller treats every error identically ("not my message").
pub fn mac_then_decrypt(key: &[u8; CIPHER_KEY_LEN], framed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if framed.len() <= MAC_LEN {
        return Err(CryptoError::FrameTooShort);
    }

    let (mac, ciphertext) = framed.split_at(MAC_LEN);
    let expected = hmac_sha256(key, ciphertext);

    if expected[..MAC_LEN].ct_eq(mac).unwrap_u8() != 1 {
        return Err(CryptoError::MacMismatch);
    }

    ecb_decrypt(key, ciphertext)
}
