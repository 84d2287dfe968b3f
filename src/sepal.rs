// sepal.rs - the bruise-tolerant sepal
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

//! The sepal carries the onion's master key to the last gatekeeper,
//! provided the mixers did not bruise the onion too often.
//!
//! The sender lays out `l1 + 1` base blocks: `d` copies of the master
//! key followed by `l1 - d + 1` copies of the null marker, each wrapped
//! in one encryption layer per mixer and gatekeeper. Every mixer peels
//! one layer off every block and then drops one block, either the
//! first (a bruise) or the last (an ordinary advance). After `b`
//! bruises across the mixer segment the surviving block is base block
//! `b`, so the master key survives exactly when `b < d`.
//!
//! Because any hop may see any of the reachable block windows, the
//! sender enumerates all of them and every hop's header carries the
//! sorted table of their digests.

use std::collections::{BTreeMap, BTreeSet};

use rand_core::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;

use super::codec::{put_bytes, put_u32, Reader};
use super::constants::{KEY_SIZE, NULL_MARKER};
use super::ecdh::SymmetricKey;
use super::error::{CryptoError, DecodeError, PeelErrorKind};
use super::internal_crypto::{contains_digest, decrypt, encrypt, hash_blocks, Digest};
use super::params::OnionParams;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sepal {
    pub blocks: Vec<Vec<u8>>,
}

impl Sepal {
    pub fn new(blocks: Vec<Vec<u8>>) -> Sepal {
        Sepal { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn digest(&self) -> Digest {
        hash_blocks(&self.blocks)
    }

    /// Check the sepal against a hop's digest table.
    pub fn verify(&self, table: &[Digest]) -> bool {
        contains_digest(table, &self.digest())
    }

    /// Remove one encryption layer from every block. Empty blocks are
    /// placeholders and pass through unchanged.
    pub fn peel(&self, key: &SymmetricKey) -> Result<Sepal, CryptoError> {
        let blocks = self
            .blocks
            .iter()
            .map(|block| if block.is_empty() { Ok(Vec::new()) } else { decrypt(key, block) })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Sepal { blocks })
    }

    /// Drop the first block, spending one unit of the bruise budget.
    pub fn bruise(mut self) -> Sepal {
        if !self.blocks.is_empty() {
            self.blocks.remove(0);
        }
        self
    }

    /// Drop the last block.
    pub fn advance(mut self) -> Sepal {
        self.blocks.pop();
        self
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        put_u32(out, self.blocks.len() as u32);
        for block in &self.blocks {
            put_bytes(out, block);
        }
    }

    pub(crate) fn read(r: &mut Reader) -> Result<Sepal, DecodeError> {
        let count = r.u32("sepal block count")? as usize;
        // each block costs at least its length prefix
        if count > r.remaining() / 4 {
            return Err(DecodeError::Truncated("sepal"));
        }
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            blocks.push(r.bytes("sepal block")?.to_vec());
        }
        Ok(Sepal { blocks })
    }
}

/// Extract the master key from a fully peeled sepal. The null marker
/// means the onion was bruised past its tolerance.
pub fn recover_master_key(sepal: &Sepal) -> Result<SymmetricKey, PeelErrorKind> {
    if sepal.blocks.len() != 1 {
        return Err(PeelErrorKind::SepalIntegrity);
    }
    let block = &sepal.blocks[0];
    if block.len() != KEY_SIZE {
        return Err(PeelErrorKind::Deserialization(DecodeError::Truncated("master key")));
    }
    if block[..].ct_eq(&NULL_MARKER[..]).unwrap_u8() == 1 {
        return Err(PeelErrorKind::CheckpointFailed);
    }
    Ok(SymmetricKey::from_bytes(*array_ref![block, 0, KEY_SIZE]))
}

/// One reachable sepal state at a given layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SepalCandidate {
    /// Bruises applied by the preceding mixers to reach this state.
    pub bruises: usize,
    pub sepal: Sepal,
}

/// The window `[lo, hi)` of base blocks still present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Window {
    lo: usize,
    hi: usize,
}

/// Every reachable sepal state of an onion, keyed by (layer, digest).
#[derive(Clone, Debug)]
pub struct SepalTable {
    layers: Vec<BTreeMap<Digest, SepalCandidate>>,
}

impl SepalTable {
    /// Number of layers carrying a sepal.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// The sorted digest table of `layer` (1-based).
    ///
    /// # Panics
    ///
    /// If `layer` is not within `1..=num_layers()`.
    pub fn digest_table(&self, layer: usize) -> Vec<Digest> {
        self.layers[layer - 1].keys().copied().collect()
    }

    /// The reachable sepals of `layer` (1-based), in digest order.
    /// Panics like `digest_table`.
    pub fn candidates(&self, layer: usize) -> impl Iterator<Item = &SepalCandidate> {
        self.layers[layer - 1].values()
    }

    /// The state of `layer` with the given digest, if it is reachable.
    pub fn lookup(&self, layer: usize, digest: &Digest) -> Option<&SepalCandidate> {
        layer
            .checked_sub(1)
            .and_then(|i| self.layers.get(i))
            .and_then(|candidates| candidates.get(digest))
    }

    /// Every digest table, indexed by layer - 1.
    pub fn digest_tables(&self) -> Vec<Vec<Digest>> {
        (1..=self.layers.len()).map(|layer| self.digest_table(layer)).collect()
    }
}

/// Build the sepal of an onion and the table of every state it can
/// reach. `layer_keys[i - 1]` is the key of layer `i`; only the mixer
/// and gatekeeper keys are used.
pub fn build_sepal<R: RngCore + CryptoRng>(
    rng: &mut R,
    params: &OnionParams,
    master_key: &SymmetricKey,
    layer_keys: &[SymmetricKey],
) -> Result<SepalTable, CryptoError> {
    let relays = params.num_relays();
    let num_blocks = params.num_sepal_blocks();

    // layered[j][h] is base block j as received by layer h + 1
    let mut layered: Vec<Vec<Vec<u8>>> = Vec::with_capacity(num_blocks);
    for j in 0..num_blocks {
        let base: &[u8] = if j < params.bruise_threshold {
            master_key.as_bytes()
        } else {
            &NULL_MARKER
        };
        let mut wrapped = vec![Vec::new(); relays];
        let mut current = base.to_vec();
        for h in (0..relays).rev() {
            current = encrypt(rng, &layer_keys[h], &current)?;
            wrapped[h] = current.clone();
        }
        layered.push(wrapped);
    }

    let mut layers = Vec::with_capacity(relays);
    let mut windows = BTreeSet::new();
    windows.insert(Window { lo: 0, hi: num_blocks });
    for h in 0..relays {
        let mut candidates = BTreeMap::new();
        for w in &windows {
            let sepal = Sepal::new((w.lo..w.hi).map(|j| layered[j][h].clone()).collect());
            candidates.entry(sepal.digest()).or_insert(SepalCandidate { bruises: w.lo, sepal });
        }
        layers.push(candidates);

        if params.is_mixer(h + 1) {
            windows = windows
                .iter()
                .flat_map(|w| vec![Window { lo: w.lo + 1, hi: w.hi }, Window { lo: w.lo, hi: w.hi - 1 }])
                .collect();
        }
    }

    Ok(SepalTable { layers })
}
