// content.rs - nested encryption of the onion payload
// Copyright (C) 2018  David Stainton.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! The content is wrapped once per hop. Every hop peels its own layer
//! with its layer key, except the last gatekeeper: the layer it removes
//! is keyed with the onion's master key, which it can only learn from
//! an unexhausted sepal.

use rand_core::{CryptoRng, RngCore};

use super::codec::{put_bytes, put_short_str, Reader};
use super::ecdh::SymmetricKey;
use super::error::{CryptoError, DecodeError, FormError};
use super::internal_crypto::{decrypt, encrypt};

/// The plaintext delivered to the recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// The sender's address.
    pub from: String,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new<S: Into<String>, B: Into<Vec<u8>>>(from: S, body: B) -> Message {
        Message {
            from: from.into(),
            body: body.into(),
        }
    }
}

/// Frame `message` and null-pad it to exactly `size` bytes.
pub fn pad_message(message: &Message, size: usize) -> Result<Vec<u8>, FormError> {
    if message.from.len() > u16::MAX as usize || message.body.len() > u32::MAX as usize {
        return Err(FormError::MessageTooLong {
            got: message.from.len() + message.body.len(),
            limit: size,
        });
    }
    let mut out = Vec::with_capacity(size);
    put_short_str(&mut out, &message.from);
    put_bytes(&mut out, &message.body);
    if out.len() > size {
        return Err(FormError::MessageTooLong { got: out.len(), limit: size });
    }
    out.resize(size, 0u8);
    Ok(out)
}

pub fn unpad_message(padded: &[u8]) -> Result<Message, DecodeError> {
    let mut r = Reader::new(padded);
    let from = r.short_str("message sender")?;
    let body = r.bytes("message body")?.to_vec();
    if r.rest().iter().any(|b| *b != 0) {
        return Err(DecodeError::TrailingBytes("message padding"));
    }
    Ok(Message { from, body })
}

/// Build `Content[1..=l]` innermost-out. `layer_keys[i - 1]` is the key of
/// layer `i`; layer `l - 1` is wrapped with `master_key` instead. Paths
/// always have at least three layers, see `OnionParams::validate`.
pub fn build_content<R: RngCore + CryptoRng>(
    rng: &mut R,
    layer_keys: &[SymmetricKey],
    master_key: &SymmetricKey,
    padded: &[u8],
) -> Result<Vec<Vec<u8>>, CryptoError> {
    let l = layer_keys.len();
    let mut content = Vec::with_capacity(l);
    let mut current = encrypt(rng, &layer_keys[l - 1], padded)?;
    content.push(current.clone());
    current = encrypt(rng, master_key, &current)?;
    content.push(current.clone());
    for key in layer_keys[..l - 2].iter().rev() {
        current = encrypt(rng, key, &current)?;
        content.push(current.clone());
    }
    content.reverse();
    Ok(content)
}

pub fn peel_content(content: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
    decrypt(key, content)
}
