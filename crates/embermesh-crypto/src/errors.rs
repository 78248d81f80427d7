//! Crypto error type.

use thiserror::Error;

/// Errors from the primitive wrappers.
///
/// Authentication failures deliberately carry no detail: to the receive path
/// a bad MAC and a foreign channel look the same.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Ciphertext length is not a whole number of AES blocks.
    #[error("ciphertext length {0} is not a multiple of the cipher block size")]
    BadCipherLength(usize),

    /// Framed message is too short to hold a MAC.
    #[error("framed message too short")]
    FrameTooShort,

    /// MAC verification failed.
    #[error("message authentication failed")]
    MacMismatch,

    /// Public key bytes do not form a valid curve point.
    #[error("invalid ed25519 public key")]
    InvalidPublicKey,

    /// Text decoding (base64/hex) failed.
    #[error("invalid {0} encoding")]
    InvalidEncoding(&'static str),
}
