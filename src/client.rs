// client.rs - tulip onion formation
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

//! The sender's side: forming every variant of an onion up front.

use rand_core::{CryptoRng, RngCore};
use tracing::debug;

use super::constants::MAX_ADDRESS_SIZE;
use super::content::{build_content, pad_message, Message};
use super::ecdh::{PrivateKey, PublicKey, SymmetricKey};
use super::error::FormError;
use super::header::build_headers;
use super::internal_crypto::Digest;
use super::onion::Onion;
use super::params::OnionParams;
use super::sepal::{build_sepal, Sepal};

/// A hop on the onion's path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hop {
    pub address: String,
    pub public_key: PublicKey,
}

impl Hop {
    pub fn new<S: Into<String>>(address: S, public_key: PublicKey) -> Hop {
        Hop {
            address: address.into(),
            public_key,
        }
    }
}

/// Every onion a sender's path can produce.
#[derive(Clone, Debug)]
pub struct FormedOnion {
    /// Address of the first mixer, where `layers[0][0]` is sent.
    pub first_hop: String,
    /// `layers[i - 1]` holds every reachable onion of layer `i`: one
    /// per distinct sepal state, in digest order.
    pub layers: Vec<Vec<Onion>>,
    /// The digest table of every mixer and gatekeeper, indexed by layer - 1.
    pub digest_tables: Vec<Vec<Digest>>,
}

impl FormedOnion {
    /// The onion handed to the first mixer.
    pub fn first(&self) -> &Onion {
        &self.layers[0][0]
    }

    /// The onions of `layer` (1-based).
    ///
    /// # Panics
    ///
    /// If `layer` is not within `1..=layers.len()`.
    pub fn variants(&self, layer: usize) -> &[Onion] {
        &self.layers[layer - 1]
    }

    /// The digest table of a mixer or gatekeeper `layer` (1-based).
    /// Panics outside `1..=digest_tables.len()`.
    pub fn digest_table(&self, layer: usize) -> &[Digest] {
        &self.digest_tables[layer - 1]
    }

    pub fn num_variants(&self) -> usize {
        self.layers.iter().map(|variants| variants.len()).sum()
    }
}

/// Form an onion carrying `message` along `mixers`, then `gatekeepers`,
/// to `recipient`.
///
/// # Arguments
///
/// * `rng` - the entropy source for every key and nonce
/// * `params` - the path shape and bruise threshold
/// * `sender` - the sender's key pair; each hop derives its shared key
///   from the sender's public key
/// * `metadata` - one opaque entry per layer, or empty for none
///
/// # Errors
///
/// * `FormError::InvalidParameters` - `params` do not validate
/// * `FormError::PathLength` - hop or metadata counts disagree with `params`
/// * `FormError::AddressTooLong` - a hop address does not fit its length prefix
/// * `FormError::MessageTooLong` - the message does not fit the padded payload
/// * `FormError::Crypto` - the entropy source failed
#[allow(clippy::too_many_arguments)]
pub fn form_onion<R: RngCore + CryptoRng>(
    rng: &mut R,
    params: &OnionParams,
    sender: &PrivateKey,
    mixers: &[Hop],
    gatekeepers: &[Hop],
    recipient: &Hop,
    message: &Message,
    metadata: &[Vec<u8>],
) -> Result<FormedOnion, FormError> {
    params.validate()?;
    let l = params.num_layers();
    if mixers.len() != params.mixers {
        return Err(FormError::PathLength {
            what: "mixers",
            expected: params.mixers,
            got: mixers.len(),
        });
    }
    if gatekeepers.len() != params.gatekeepers {
        return Err(FormError::PathLength {
            what: "gatekeepers",
            expected: params.gatekeepers,
            got: gatekeepers.len(),
        });
    }
    for hop in mixers.iter().chain(gatekeepers.iter()).chain(Some(recipient)) {
        if hop.address.len() > MAX_ADDRESS_SIZE {
            return Err(FormError::AddressTooLong {
                got: hop.address.len(),
                limit: MAX_ADDRESS_SIZE,
            });
        }
    }
    let metadata = match metadata.len() {
        0 => vec![Vec::new(); l],
        n if n == l => metadata.to_vec(),
        n => {
            return Err(FormError::PathLength {
                what: "metadata",
                expected: l,
                got: n,
            })
        }
    };

    let hops: Vec<&Hop> = mixers.iter().chain(gatekeepers.iter()).chain(Some(recipient)).collect();
    let path: Vec<String> = hops.iter().map(|hop| hop.address.clone()).collect();
    let peer_keys: Vec<PublicKey> = hops.iter().map(|hop| hop.public_key).collect();

    let master_key = SymmetricKey::generate(rng)?;
    let layer_keys = (0..l).map(|_| SymmetricKey::generate(rng)).collect::<Result<Vec<_>, _>>()?;

    let padded = pad_message(message, params.payload_size)?;
    let content = build_content(rng, &layer_keys, &master_key, &padded)?;
    let sepal_table = build_sepal(rng, params, &master_key, &layer_keys)?;
    let digest_tables = sepal_table.digest_tables();
    let headers = build_headers(
        rng,
        params,
        &path,
        sender,
        &peer_keys,
        &layer_keys,
        &content,
        &digest_tables,
        &metadata,
    )?;

    let mut layers = Vec::with_capacity(l);
    for layer in 1..l {
        let variants = sepal_table
            .candidates(layer)
            .map(|candidate| Onion {
                header: headers[layer - 1].clone(),
                content: content[layer - 1].clone(),
                sepal: candidate.sepal.clone(),
            })
            .collect::<Vec<_>>();
        layers.push(variants);
    }
    layers.push(vec![Onion {
        header: headers[l - 1].clone(),
        content: content[l - 1].clone(),
        sepal: Sepal::default(),
    }]);

    let formed = FormedOnion {
        first_hop: path[0].clone(),
        layers,
        digest_tables,
    };
    debug!(
        layers = l,
        variants = formed.num_variants(),
        bruise_threshold = params.bruise_threshold,
        "formed onion"
    );
    Ok(formed)
}
