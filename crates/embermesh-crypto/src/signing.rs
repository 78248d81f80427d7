//! Ed25519 identity keys in MeshCore's persisted form.
//!
//! MeshCore stores the private key as 64 bytes: the 32-byte seed followed by
//! the 32-byte public key. Signing rebuilds the dalek signing key from the
//! seed half, so keys generated here interoperate with identities persisted
//! by the reference firmware.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

/// Ed25519 public key length.
pub const PUBLIC_KEY_LEN: usize = 32;
/// MeshCore private key length (seed || public).
pub const PRIVATE_KEY_LEN: usize = 64;
/// Keypair seed length.
pub const SEED_LEN: usize = 32;
/// Signature length.
pub const SIGNATURE_LEN: usize = 64;

/// An ed25519 identity keypair.
///
/// The private half is zeroed on drop.
#[derive(Clone)]
pub struct Keypair {
    /// Public key bytes.
    pub public: [u8; PUBLIC_KEY_LEN],
    private: [u8; PRIVATE_KEY_LEN],
}

impl Keypair {
    /// Rebuild a keypair from persisted parts.
    #[must_use]
    pub fn from_parts(public: [u8; PUBLIC_KEY_LEN], private: [u8; PRIVATE_KEY_LEN]) -> Self {
        Self { public, private }
    }

    /// The 64-byte private key in MeshCore layout (seed || public).
    #[must_use]
    pub fn private(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.private
    }

    fn seed(&self) -> [u8; SEED_LEN] {
        let mut seed = [0u8; SEED_LEN];
        seed.copy_from_slice(&self.private[..SEED_LEN]);
        seed
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

impl core::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Keypair").field("public", &self.public).finish_non_exhaustive()
    }
}

/// Derive a keypair from 32 entropy bytes.
///
/// Deterministic: the same seed always yields the same keypair.
#[must_use]
pub fn keypair_from_seed(seed: &[u8; SEED_LEN]) -> Keypair {
    let signing = SigningKey::from_bytes(seed);
    let public = signing.verifying_key().to_bytes();

    let mut private = [0u8; PRIVATE_KEY_LEN];
    private[..SEED_LEN].copy_from_slice(seed);
    private[SEED_LEN..].copy_from_slice(&public);

    Keypair { public, private }
}

/// Sign `msg` with the keypair.
#[must_use]
pub fn sign(keypair: &Keypair, msg: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut seed = keypair.seed();
    let signing = SigningKey::from_bytes(&seed);
    seed.zeroize();
    signing.sign(msg).to_bytes()
}

/// Verify `sig` over `msg` against a public key.
///
/// Invalid public key bytes verify as false rather than erroring; to the
/// receive path a garbage key is just a bad signature.
#[must_use]
pub fn verify(public: &[u8; PUBLIC_KEY_LEN], msg: &[u8], sig: &[u8; SIGNATURE_LEN]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public) else {
        return false;
    };
    key.verify(msg, &Signature::from_bytes(sig)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_is_deterministic() {
        let seed = [7u8; SEED_LEN];
        let a = keypair_from_seed(&seed);
        let b = keypair_from_seed(&seed);
        assert_eq!(a.public, b.public);
        assert_eq!(a.private(), b.private());
    }

    #[test]
    fn private_key_layout_is_seed_then_public() {
        let seed = [9u8; SEED_LEN];
        let keypair = keypair_from_seed(&seed);
        assert_eq!(&keypair.private()[..SEED_LEN], &seed);
        assert_eq!(&keypair.private()[SEED_LEN..], &keypair.public);
    }

    #[test]
    fn sign_verify_round_trip() {
        let keypair = keypair_from_seed(&[3u8; SEED_LEN]);
        let msg = b"advert signing data";
        let sig = sign(&keypair, msg);
        assert!(verify(&keypair.public, msg, &sig));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let keypair = keypair_from_seed(&[3u8; SEED_LEN]);
        let sig = sign(&keypair, b"advert signing data");
        assert!(!verify(&keypair.public, b"advert signing datA", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let keypair = keypair_from_seed(&[3u8; SEED_LEN]);
        let other = keypair_from_seed(&[4u8; SEED_LEN]);
        let sig = sign(&keypair, b"msg");
        assert!(!verify(&other.public, b"msg", &sig));
    }

    #[test]
    fn persisted_round_trip_signs_identically() {
        let keypair = keypair_from_seed(&[11u8; SEED_LEN]);
        let restored = Keypair::from_parts(keypair.public, *keypair.private());
        assert_eq!(sign(&keypair, b"x"), sign(&restored, b"x"));
    }
}
