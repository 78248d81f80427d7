//! Text decodings for configured channel secrets.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::errors::CryptoError;

/// Decode standard base64 (the public channel PSK format).
///
/// # Errors
///
/// [`CryptoError::InvalidEncoding`] when the input is not valid base64.
pub fn base64_decode(input: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD.decode(input.trim()).map_err(|_| CryptoError::InvalidEncoding("base64"))
}

/// Decode a hex string (the private channel key format).
///
/// # Errors
///
/// [`CryptoError::InvalidEncoding`] when the input is not valid hex.
pub fn hex_decode(input: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(input.trim()).map_err(|_| CryptoError::InvalidEncoding("hex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_psk_decodes_to_cipher_key() {
        let secret = base64_decode("izOH6cXN6mrJ5e26oRXNcg==").unwrap();
        assert_eq!(secret.len(), 16);
    }

    #[test]
    fn hex_key_decodes() {
        let secret = hex_decode("00112233445566778899AABBCCDDEEFF").unwrap();
        assert_eq!(secret.len(), 16);
        assert_eq!(secret[0], 0x00);
        assert_eq!(secret[15], 0xFF);
    }

    #[test]
    fn bad_encodings_are_rejected() {
        assert!(base64_decode("!!not base64!!").is_err());
        assert!(hex_decode("xyz").is_err());
    }
}
