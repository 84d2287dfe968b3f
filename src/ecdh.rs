// ecdh.rs - wrapping library for curve25519 dh operations
// Copyright (C) 2018  David Stainton.

use std::fmt;

use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use x25519_dalek_ng::{PublicKey as DalekPublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::constants::{GROUP_ELEMENT_SIZE, HASH_SHARED_KEY_PREFIX, KEY_SIZE};
use super::error::{CryptoError, DecodeError};

/// A symmetric key: a per-hop layer key, a per-onion master key, or
/// the key shared between the sender and one hop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Generate a fresh random key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<SymmetricKey, CryptoError> {
        let mut key = SymmetricKey([0u8; KEY_SIZE]);
        rng.try_fill_bytes(&mut key.0)?;
        Ok(key)
    }

    pub fn from_bytes(b: [u8; KEY_SIZE]) -> SymmetricKey {
        SymmetricKey(b)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &SymmetricKey) -> bool {
        self.0[..].ct_eq(&other.0[..]).unwrap_u8() == 1
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SymmetricKey(..)")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey {
    key: DalekPublicKey,
}

impl PublicKey {
    pub fn from_bytes(b: &[u8]) -> Result<PublicKey, DecodeError> {
        if b.len() != GROUP_ELEMENT_SIZE {
            return Err(DecodeError::Truncated("public key"));
        }
        let mut raw = [0u8; GROUP_ELEMENT_SIZE];
        raw.copy_from_slice(b);
        Ok(PublicKey {
            key: DalekPublicKey::from(raw),
        })
    }

    pub fn as_bytes(&self) -> &[u8; GROUP_ELEMENT_SIZE] {
        self.key.as_bytes()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.key.as_bytes().to_vec()
    }
}

#[derive(Clone)]
pub struct PrivateKey {
    public_key: PublicKey,
    secret: StaticSecret,
}

impl PrivateKey {
    /// Generate a key pair, failing only if the entropy source does.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<PrivateKey, CryptoError> {
        let mut raw = [0u8; KEY_SIZE];
        rng.try_fill_bytes(&mut raw)?;
        let key = PrivateKey::from_bytes(raw);
        raw.zeroize();
        Ok(key)
    }

    pub fn from_bytes(b: [u8; KEY_SIZE]) -> PrivateKey {
        let secret = StaticSecret::from(b);
        PrivateKey {
            public_key: PublicKey {
                key: DalekPublicKey::from(&secret),
            },
            secret,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.secret.to_bytes()
    }

    /// Exp calculates the raw shared secret with the provided public key.
    pub fn exp(&self, public_key: &PublicKey) -> [u8; GROUP_ELEMENT_SIZE] {
        *self.secret.diffie_hellman(&public_key.key).as_bytes()
    }

    /// Derive the symmetric key shared with the holder of `public_key`.
    pub fn shared_key(&self, public_key: &PublicKey) -> SymmetricKey {
        let shared_secret = self.secret.diffie_hellman(&public_key.key);
        let mut h = Sha256::new();
        h.update(HASH_SHARED_KEY_PREFIX);
        h.update(shared_secret.as_bytes());
        SymmetricKey(h.finalize().into())
    }
}

/// Derive the symmetric key shared between `own_private` and the holder
/// of `peer_public`. Commutative across the two key pairs.
pub fn derive_shared_secret(own_private: &PrivateKey, peer_public: &PublicKey) -> SymmetricKey {
    own_private.shared_key(peer_public)
}
