// server.rs - tulip onion peeling
// Copyright (C) 2018  David Anthony Stainton.
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

//! The relay side of the protocol.
//!
//! Every hop processes an incoming onion the same way: decrypt its
//! header with the key it shares with the sender, check that the
//! header's digest table is the one the sender committed to, check the
//! sepal against that table, peel the sepal and peel the content.
//!
//! If peeling fails for any reason the onion MUST be discarded; a
//! `PeelError` never carries a partially peeled onion.
//!
//! Mixers additionally decide how their sepal is trimmed: an ordinary
//! `advance`, or a `bruise` that spends one unit of the onion's
//! tolerance. The last gatekeeper recovers the master key from the sepal
//! and can only peel the content if the tolerance was not exhausted.

use tracing::{debug, trace};

use super::content::{peel_content, unpad_message, Message};
use super::ecdh::{PrivateKey, PublicKey, SymmetricKey};
use super::error::{DecodeError, PeelError, PeelErrorKind, PeelStage};
use super::header::{decode_header, Header, Role};
use super::internal_crypto::{digest_eq, hash, hash_digests};
use super::onion::Onion;
use super::sepal::{recover_master_key, Sepal};

/// A mixer's peeled onion, waiting for the mixer to trim its sepal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMix {
    header: Header,
    content: Vec<u8>,
    sepal: Sepal,
}

impl PendingMix {
    /// The peeled, untrimmed sepal.
    pub fn sepal(&self) -> &Sepal {
        &self.sepal
    }

    /// Trim without bruising.
    pub fn advance(self) -> Onion {
        Onion {
            header: self.header,
            content: self.content,
            sepal: self.sepal.advance(),
        }
    }

    /// Trim by bruising.
    pub fn bruise(self) -> Onion {
        Onion {
            header: self.header,
            content: self.content,
            sepal: self.sepal.bruise(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeelOutcome {
    /// Mixer: choose `advance` or `bruise` before forwarding.
    Mix(PendingMix),
    /// Gatekeeper: forward as is.
    Forward(Onion),
    /// Recipient: the delivered message.
    Deliver(Message),
}

/// The result of peeling one layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peeled {
    pub layer: u32,
    pub role: Role,
    pub metadata: Vec<u8>,
    /// Where the peeled onion goes; `None` at the recipient.
    pub next_hop: Option<String>,
    pub outcome: PeelOutcome,
}

impl Peeled {
    /// The onion to forward and its destination. Mixers trim with
    /// `bruise` when asked to, and `advance` otherwise.
    pub fn into_next(self, bruise: bool) -> Option<(String, Onion)> {
        let onion = match self.outcome {
            PeelOutcome::Mix(pending) if bruise => pending.bruise(),
            PeelOutcome::Mix(pending) => pending.advance(),
            PeelOutcome::Forward(onion) => onion,
            PeelOutcome::Deliver(_) => return None,
        };
        self.next_hop.map(|next_hop| (next_hop, onion))
    }

    pub fn message(&self) -> Option<&Message> {
        match &self.outcome {
            PeelOutcome::Deliver(message) => Some(message),
            _ => None,
        }
    }
}

/// Peel one layer of a base64 encoded onion.
///
/// # Arguments
///
/// * `wire` - the onion as received from the transport
/// * `shared_key` - the key this hop shares with the onion's sender
///
/// # Errors
///
/// A `PeelError` naming the failed stage and, once the header has been
/// decrypted, the layer. Its kind is `Authentication` for a wrong key or
/// tampered ciphertext, `Deserialization` for malformed structures,
/// `TagMismatch` for a substituted digest table, `SepalIntegrity` for a
/// sepal outside the table and `CheckpointFailed` when the last
/// gatekeeper finds the null marker.
pub fn peel_onion(wire: &str, shared_key: &SymmetricKey) -> Result<Peeled, PeelError> {
    let onion = Onion::from_base64(wire).map_err(|err| PeelError::new(None, PeelStage::Wire, err))?;
    peel(&onion, shared_key)
}

/// `peel_onion` for a hop holding its own private key and the sender's
/// public key.
pub fn peel_onion_with_keys(wire: &str, private_key: &PrivateKey, sender: &PublicKey) -> Result<Peeled, PeelError> {
    peel_onion(wire, &private_key.shared_key(sender))
}

/// Peel one layer of a decoded onion.
pub fn peel(onion: &Onion, shared_key: &SymmetricKey) -> Result<Peeled, PeelError> {
    let decoded = decode_header(&onion.header, shared_key)?;
    let cypher_text = decoded.cypher_text;
    let layer = Some(cypher_text.layer);
    trace!(layer = cypher_text.layer, role = ?cypher_text.role, "decoded header");

    if let Role::Recipient(_) = cypher_text.role {
        let padded = peel_content(&onion.content, &cypher_text.key).map_err(|err| PeelError::new(layer, PeelStage::Content, err))?;
        if !digest_eq(&cypher_text.tag, &hash(&onion.content)) {
            return Err(PeelError::new(layer, PeelStage::Content, PeelErrorKind::TagMismatch));
        }
        let message = unpad_message(&padded).map_err(|err| PeelError::new(layer, PeelStage::Message, err))?;
        debug!(layer = cypher_text.layer, "delivered onion");
        return Ok(Peeled {
            layer: cypher_text.layer,
            role: cypher_text.role,
            metadata: cypher_text.metadata,
            next_hop: None,
            outcome: PeelOutcome::Deliver(message),
        });
    }

    let next = decoded
        .next
        .ok_or_else(|| PeelError::new(layer, PeelStage::Routing, DecodeError::Truncated("next header")))?;

    if !digest_eq(&cypher_text.tag, &hash_digests(&onion.header.a)) {
        return Err(PeelError::new(layer, PeelStage::Sepal, PeelErrorKind::TagMismatch));
    }
    if !onion.sepal.verify(&onion.header.a) {
        return Err(PeelError::new(layer, PeelStage::Sepal, PeelErrorKind::SepalIntegrity));
    }
    let sepal = onion
        .sepal
        .peel(&cypher_text.key)
        .map_err(|err| PeelError::new(layer, PeelStage::Sepal, err))?;

    let content = match cypher_text.role {
        Role::LastGatekeeper => {
            let master_key = recover_master_key(&sepal).map_err(|kind| {
                debug!(layer = cypher_text.layer, error = %kind, "master key recovery failed");
                PeelError::new(layer, PeelStage::MasterKey, kind)
            })?;
            peel_content(&onion.content, &master_key)
        }
        _ => peel_content(&onion.content, &cypher_text.key),
    }
    .map_err(|err| PeelError::new(layer, PeelStage::Content, err))?;

    let header = Header::from_bytes(&next.header).map_err(|err| PeelError::new(layer, PeelStage::Routing, err))?;

    let outcome = match cypher_text.role {
        Role::Mixer => PeelOutcome::Mix(PendingMix { header, content, sepal }),
        Role::Gatekeeper => PeelOutcome::Forward(Onion { header, content, sepal }),
        _ => PeelOutcome::Forward(Onion {
            header,
            content,
            sepal: Sepal::default(),
        }),
    };
    debug!(
        layer = cypher_text.layer,
        role = ?cypher_text.role,
        blocks = sepal_len(&outcome),
        "peeled onion"
    );

    Ok(Peeled {
        layer: cypher_text.layer,
        role: cypher_text.role,
        metadata: cypher_text.metadata,
        next_hop: Some(next.address),
        outcome,
    })
}

fn sepal_len(outcome: &PeelOutcome) -> usize {
    match outcome {
        PeelOutcome::Mix(pending) => pending.sepal.len(),
        PeelOutcome::Forward(onion) => onion.sepal.len(),
        PeelOutcome::Deliver(_) => 0,
    }
}
