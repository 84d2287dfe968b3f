// internal_crypto.rs - tulip symmetric cipher and digest primitives
// Copyright (C) 2018  David Stainton.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest as Sha2Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};

use super::codec::put_u32;
use super::constants::{CIPHERTEXT_OVERHEAD, HASH_SIZE, NONCE_SIZE};
use super::ecdh::SymmetricKey;
use super::error::CryptoError;

pub type Digest = [u8; HASH_SIZE];

/// Authenticated encryption under `key` with a fresh random nonce.
/// The output is self-contained: `nonce || ciphertext || tag`.
pub fn encrypt<R: RngCore + CryptoRng>(rng: &mut R, key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.try_fill_bytes(&mut nonce)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let body = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)?;
    let mut out = Vec::with_capacity(NONCE_SIZE + body.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Inverse of `encrypt`. A wrong key, a truncated input or any
/// modified byte yields `CryptoError::Authentication`.
pub fn decrypt(key: &SymmetricKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < CIPHERTEXT_OVERHEAD {
        return Err(CryptoError::Authentication);
    }
    let nonce = array_ref![ciphertext, 0, NONCE_SIZE];
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(&nonce[..]), &ciphertext[NONCE_SIZE..])
        .map_err(|_| CryptoError::Authentication)
}

pub fn hash(input: &[u8]) -> Digest {
    Sha256::digest(input).into()
}

/// Digest of a list of blocks, each framed by its length.
pub fn hash_blocks(blocks: &[Vec<u8>]) -> Digest {
    let mut h = Sha256::new();
    let mut len = Vec::with_capacity(4);
    for block in blocks {
        len.clear();
        put_u32(&mut len, block.len() as u32);
        h.update(&len);
        h.update(block);
    }
    h.finalize().into()
}

/// Digest of a digest table, used as the header tag binding it.
pub fn hash_digests(digests: &[Digest]) -> Digest {
    let mut h = Sha256::new();
    for d in digests {
        h.update(d);
    }
    h.finalize().into()
}

pub fn digest_eq(a: &Digest, b: &Digest) -> bool {
    a[..].ct_eq(&b[..]).unwrap_u8() == 1
}

/// Constant-time membership test; the position of a match is not leaked.
pub fn contains_digest(table: &[Digest], needle: &Digest) -> bool {
    let found = table
        .iter()
        .fold(Choice::from(0u8), |acc, d| acc | d[..].ct_eq(&needle[..]));
    found.unwrap_u8() == 1
}
