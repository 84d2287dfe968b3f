// header.rs - nested encryption of the per-hop routing headers
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

//! Each header is three fields. `e` is readable only by the hop it is
//! addressed to and carries that hop's `CypherText`; `a` is the hop's
//! digest table in the clear, bound by the tag inside `e`;
//! `next_header` is encrypted under the layer key revealed by `e` and
//! yields the next hop's address and serialized header.

use rand_core::{CryptoRng, RngCore};

use super::codec::{put_bytes, put_short_str, put_u32, put_u8, Reader};
use super::constants::{HASH_SIZE, KEY_SIZE, ROLE_GATEKEEPER, ROLE_LAST_GATEKEEPER, ROLE_MIXER, ROLE_RECIPIENT};
use super::ecdh::{PrivateKey, PublicKey, SymmetricKey};
use super::error::{CryptoError, DecodeError, PeelError, PeelStage};
use super::internal_crypto::{decrypt, encrypt, hash, hash_digests, Digest};
use super::params::OnionParams;

/// The part a hop plays for a given onion, decided once when its
/// header is decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Mixer,
    Gatekeeper,
    LastGatekeeper,
    /// The final hop, carrying its own address.
    Recipient(String),
}

impl Role {
    /// The role of layer `layer` (1-based) on a path with the given shape.
    pub fn for_layer(params: &OnionParams, layer: usize, recipient: &str) -> Role {
        if layer == params.recipient_layer() {
            Role::Recipient(recipient.to_owned())
        } else if params.is_mixer(layer) {
            Role::Mixer
        } else if layer == params.last_gatekeeper() {
            Role::LastGatekeeper
        } else {
            Role::Gatekeeper
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Role::Mixer => put_u8(out, ROLE_MIXER),
            Role::Gatekeeper => put_u8(out, ROLE_GATEKEEPER),
            Role::LastGatekeeper => put_u8(out, ROLE_LAST_GATEKEEPER),
            Role::Recipient(address) => {
                put_u8(out, ROLE_RECIPIENT);
                put_short_str(out, address);
            }
        }
    }

    fn decode(r: &mut Reader) -> Result<Role, DecodeError> {
        match r.u8("role")? {
            ROLE_MIXER => Ok(Role::Mixer),
            ROLE_GATEKEEPER => Ok(Role::Gatekeeper),
            ROLE_LAST_GATEKEEPER => Ok(Role::LastGatekeeper),
            ROLE_RECIPIENT => Ok(Role::Recipient(r.short_str("recipient address")?)),
            other => Err(DecodeError::UnknownRole(other)),
        }
    }
}

/// The decrypted contents of a header's `e` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CypherText {
    /// Digest of the hop's digest table, or of the content at the recipient.
    pub tag: Digest,
    pub role: Role,
    pub layer: u32,
    /// The hop's layer key.
    pub key: SymmetricKey,
    pub metadata: Vec<u8>,
}

impl CypherText {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.tag);
        self.role.encode(&mut out);
        put_u32(&mut out, self.layer);
        out.extend_from_slice(self.key.as_bytes());
        put_bytes(&mut out, &self.metadata);
        out
    }

    pub fn from_bytes(b: &[u8]) -> Result<CypherText, DecodeError> {
        let mut r = Reader::new(b);
        let tag = *array_ref![r.take(HASH_SIZE, "tag")?, 0, HASH_SIZE];
        let role = Role::decode(&mut r)?;
        let layer = r.u32("layer")?;
        let key = SymmetricKey::from_bytes(*array_ref![r.take(KEY_SIZE, "layer key")?, 0, KEY_SIZE]);
        let metadata = r.bytes("metadata")?.to_vec();
        r.finish("cypher text")?;
        Ok(CypherText {
            tag,
            role,
            layer,
            key,
            metadata,
        })
    }
}

/// The decrypted contents of a header's `next_header` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingInfo {
    pub address: String,
    pub header: Vec<u8>,
}

impl RoutingInfo {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_short_str(&mut out, &self.address);
        put_bytes(&mut out, &self.header);
        out
    }

    pub fn from_bytes(b: &[u8]) -> Result<RoutingInfo, DecodeError> {
        let mut r = Reader::new(b);
        let address = r.short_str("next hop address")?;
        let header = r.bytes("next header")?.to_vec();
        r.finish("routing info")?;
        Ok(RoutingInfo { address, header })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub e: Vec<u8>,
    pub a: Vec<Digest>,
    pub next_header: Vec<u8>,
}

impl Header {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    pub fn from_bytes(b: &[u8]) -> Result<Header, DecodeError> {
        let mut r = Reader::new(b);
        let header = Header::read(&mut r)?;
        r.finish("header")?;
        Ok(header)
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        put_bytes(out, &self.e);
        put_u32(out, self.a.len() as u32);
        for digest in &self.a {
            out.extend_from_slice(digest);
        }
        put_bytes(out, &self.next_header);
    }

    pub(crate) fn read(r: &mut Reader) -> Result<Header, DecodeError> {
        let e = r.bytes("header e")?.to_vec();
        let count = r.u32("digest table length")? as usize;
        if count > r.remaining() / HASH_SIZE {
            return Err(DecodeError::Truncated("digest table"));
        }
        let mut a = Vec::with_capacity(count);
        for _ in 0..count {
            a.push(*array_ref![r.take(HASH_SIZE, "digest table")?, 0, HASH_SIZE]);
        }
        let next_header = r.bytes("next header")?.to_vec();
        Ok(Header { e, a, next_header })
    }
}

/// A header as seen by the hop it is addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedHeader {
    pub cypher_text: CypherText,
    /// The next hop, absent at the recipient.
    pub next: Option<RoutingInfo>,
}

/// Build `Header[1..=l]` innermost-out.
///
/// # Arguments
///
/// * `path` - the address of every layer, the recipient's last
/// * `peer_keys` - the public key of every layer
/// * `layer_keys` - the layer key of every layer
/// * `content` - `Content[1..=l]`
/// * `digest_tables` - the digest table of every mixer and gatekeeper
/// * `metadata` - opaque per-layer metadata
#[allow(clippy::too_many_arguments)]
pub fn build_headers<R: RngCore + CryptoRng>(
    rng: &mut R,
    params: &OnionParams,
    path: &[String],
    sender: &PrivateKey,
    peer_keys: &[PublicKey],
    layer_keys: &[SymmetricKey],
    content: &[Vec<u8>],
    digest_tables: &[Vec<Digest>],
    metadata: &[Vec<u8>],
) -> Result<Vec<Header>, CryptoError> {
    let l = params.num_layers();
    let recipient = &path[l - 1];
    let mut headers: Vec<Header> = Vec::with_capacity(l);

    for layer in (1..=l).rev() {
        let i = layer - 1;
        let role = Role::for_layer(params, layer, recipient);
        let (tag, a) = match role {
            Role::Recipient(_) => (hash(&content[i]), Vec::new()),
            _ => (hash_digests(&digest_tables[i]), digest_tables[i].clone()),
        };
        let cypher_text = CypherText {
            tag,
            role,
            layer: layer as u32,
            key: layer_keys[i].clone(),
            metadata: metadata[i].clone(),
        };
        let shared_key = sender.shared_key(&peer_keys[i]);
        let e = encrypt(rng, &shared_key, &cypher_text.to_bytes())?;

        let next_header = match headers.last() {
            Some(next) => {
                let routing = RoutingInfo {
                    address: path[i + 1].clone(),
                    header: next.to_bytes(),
                };
                encrypt(rng, &layer_keys[i], &routing.to_bytes())?
            }
            None => Vec::new(),
        };
        headers.push(Header { e, a, next_header });
    }

    headers.reverse();
    Ok(headers)
}

/// Decrypt `header` with the key shared with the sender and, unless this
/// is the recipient's header, the routing information it points to.
pub fn decode_header(header: &Header, shared_key: &SymmetricKey) -> Result<DecodedHeader, PeelError> {
    let plaintext = decrypt(shared_key, &header.e).map_err(|err| PeelError::new(None, PeelStage::Header, err))?;
    let cypher_text = CypherText::from_bytes(&plaintext).map_err(|err| PeelError::new(None, PeelStage::Header, err))?;
    let layer = Some(cypher_text.layer);

    let next = if header.next_header.is_empty() {
        None
    } else {
        let routing = decrypt(&cypher_text.key, &header.next_header).map_err(|err| PeelError::new(layer, PeelStage::Routing, err))?;
        Some(RoutingInfo::from_bytes(&routing).map_err(|err| PeelError::new(layer, PeelStage::Routing, err))?)
    };

    Ok(DecodedHeader { cypher_text, next })
}
