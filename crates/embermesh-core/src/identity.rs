//! Node identity: the persisted ed25519 keypair.
//!
//! Generated from 32 environment-provided entropy bytes on first boot and
//! persisted behind the `0xC5` magic; every later boot reuses the stored
//! keypair, so the node hash is stable for the node's lifetime.

use tracing::{info, warn};
use zeroize::Zeroizing;

use embermesh_crypto::{Keypair, keypair_from_seed};

use crate::env::Env;
use crate::storage::{NvStorage, Region};

/// Magic byte guarding the persisted identity region.
pub const IDENTITY_MAGIC: u8 = 0xC5;

/// Node hash substituted for the reserved values 0x00 and 0xFF.
pub const FALLBACK_NODE_HASH: u8 = 0x7C;

const IDENTITY_LEN: usize = 1 + 32 + 64;

/// The node's ed25519 identity.
#[derive(Debug, Clone)]
pub struct Identity {
    keypair: Keypair,
}

impl Identity {
    /// Load the persisted identity, or generate and persist a fresh one.
    ///
    /// Entropy quality is the environment's problem; the reference firmware
    /// documents its sources as weak and platform integrators are expected
    /// to plug in a CSPRNG. A corrupt region (bad magic, short read) is
    /// treated as absence and regenerated.
    pub fn load_or_generate(storage: &mut dyn NvStorage, env: &dyn Env) -> Self {
        if let Some(identity) = Self::load(storage) {
            info!("loaded persisted identity");
            return identity;
        }

        let mut seed = Zeroizing::new([0u8; 32]);
        env.fill_random(&mut *seed);
        let keypair = keypair_from_seed(&seed);

        let identity = Self { keypair };
        identity.persist(storage);
        info!(node_hash = format_args!("{:02X}", identity.raw_hash()), "generated new identity");
        identity
    }

    fn load(storage: &mut dyn NvStorage) -> Option<Self> {
        let bytes = storage.read(Region::Identity)?;
        if bytes.len() < IDENTITY_LEN || bytes[0] != IDENTITY_MAGIC {
            return None;
        }

        let mut public = [0u8; 32];
        public.copy_from_slice(&bytes[1..33]);
        let mut private = [0u8; 64];
        private.copy_from_slice(&bytes[33..97]);

        Some(Self { keypair: Keypair::from_parts(public, private) })
    }

    fn persist(&self, storage: &mut dyn NvStorage) {
        let mut bytes = Vec::with_capacity(IDENTITY_LEN);
        bytes.push(IDENTITY_MAGIC);
        bytes.extend_from_slice(&self.keypair.public);
        bytes.extend_from_slice(self.keypair.private());

        if let Err(err) = storage.write(Region::Identity, &bytes) {
            warn!(%err, "failed to persist identity; continuing with volatile keys");
        }
    }

    /// The identity keypair.
    #[must_use]
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// The node's public key.
    #[must_use]
    pub fn public_key(&self) -> &[u8; 32] {
        &self.keypair.public
    }

    /// First public key byte, before sanitization.
    #[must_use]
    pub fn raw_hash(&self) -> u8 {
        self.keypair.public[0]
    }

    /// The sanitized one-byte node hash.
    #[must_use]
    pub fn node_hash(&self) -> u8 {
        sanitize_node_hash(self.raw_hash())
    }
}

/// Replace the reserved hash values with the fixed fallback.
#[must_use]
pub fn sanitize_node_hash(hash: u8) -> u8 {
    if hash == 0x00 || hash == 0xFF { FALLBACK_NODE_HASH } else { hash }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeEnv, MemStorage};

    #[test]
    fn first_boot_generates_and_persists() {
        let env = FakeEnv::new();
        let mut storage = MemStorage::default();

        let identity = Identity::load_or_generate(&mut storage, &env);
        let stored = storage.read(Region::Identity).unwrap();
        assert_eq!(stored[0], IDENTITY_MAGIC);
        assert_eq!(&stored[1..33], identity.public_key());
    }

    #[test]
    fn second_boot_reuses_identity() {
        let env = FakeEnv::new();
        let mut storage = MemStorage::default();

        let first = Identity::load_or_generate(&mut storage, &env);
        let second = Identity::load_or_generate(&mut storage, &env);
        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn corrupt_magic_regenerates() {
        let env = FakeEnv::new();
        let mut storage = MemStorage::default();
        storage.write(Region::Identity, &[0u8; 97]).unwrap();

        let identity = Identity::load_or_generate(&mut storage, &env);
        let stored = storage.read(Region::Identity).unwrap();
        assert_eq!(stored[0], IDENTITY_MAGIC);
        assert_eq!(&stored[1..33], identity.public_key());
    }

    #[test]
    fn reserved_hashes_are_sanitized() {
        assert_eq!(sanitize_node_hash(0x00), FALLBACK_NODE_HASH);
        assert_eq!(sanitize_node_hash(0xFF), FALLBACK_NODE_HASH);
        assert_eq!(sanitize_node_hash(0x5A), 0x5A);
    }
}
