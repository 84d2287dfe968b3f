// params.rs - tulip onion path parameters
// Copyright (C) 2018  David Stainton.

use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_PAYLOAD_SIZE, MESSAGE_BODY_LEN_SIZE, MESSAGE_FROM_LEN_SIZE};
use super::error::FormError;

/// The shape of an onion's path. Fixed for the lifetime of an onion.
///
/// Layers are numbered from 1: layers `1..=mixers` are mixers,
/// the following `gatekeepers` layers are gatekeepers (the last of
/// them being the last gatekeeper) and the final layer is the
/// recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnionParams {
    /// Mixer hop count, `l1`.
    pub mixers: usize,
    /// Gatekeeper hop count, `l2`.
    pub gatekeepers: usize,
    /// Bruise tolerance `d`: up to `d - 1` bruises still let the last
    /// gatekeeper recover the master key.
    pub bruise_threshold: usize,
    /// Size of the padded plaintext message.
    pub payload_size: usize,
}

impl Default for OnionParams {
    fn default() -> OnionParams {
        OnionParams {
            mixers: 5,
            gatekeepers: 5,
            bruise_threshold: 3,
            payload_size: DEFAULT_PAYLOAD_SIZE,
        }
    }
}

impl OnionParams {
    pub fn new(mixers: usize, gatekeepers: usize, bruise_threshold: usize) -> Result<OnionParams, FormError> {
        let params = OnionParams {
            mixers,
            gatekeepers,
            bruise_threshold,
            ..OnionParams::default()
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_payload_size(mut self, payload_size: usize) -> OnionParams {
        self.payload_size = payload_size;
        self
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.mixers == 0 {
            return Err(FormError::InvalidParameters("at least one mixer is required"));
        }
        if self.gatekeepers == 0 {
            return Err(FormError::InvalidParameters("at least one gatekeeper is required"));
        }
        if self.bruise_threshold == 0 || self.bruise_threshold > self.mixers {
            return Err(FormError::InvalidParameters("bruise threshold must be within 1..=mixers"));
        }
        if self.payload_size < MESSAGE_FROM_LEN_SIZE + MESSAGE_BODY_LEN_SIZE {
            return Err(FormError::InvalidParameters("payload size cannot hold the message framing"));
        }
        // layer numbers travel as u32 inside the headers
        match self.mixers.checked_add(self.gatekeepers).and_then(|relays| relays.checked_add(1)) {
            Some(layers) if layers <= u32::MAX as usize => {}
            _ => return Err(FormError::InvalidParameters("path is too long")),
        }
        Ok(())
    }

    /// Total hop count including the recipient, `l`.
    pub fn num_layers(&self) -> usize {
        self.mixers + self.gatekeepers + 1
    }

    /// Hops that carry a sepal: every mixer and gatekeeper.
    pub fn num_relays(&self) -> usize {
        self.mixers + self.gatekeepers
    }

    /// Blocks in the sepal handed to the first mixer.
    pub fn num_sepal_blocks(&self) -> usize {
        self.mixers + 1
    }

    pub fn is_mixer(&self, layer: usize) -> bool {
        layer >= 1 && layer <= self.mixers
    }

    pub fn last_gatekeeper(&self) -> usize {
        self.mixers + self.gatekeepers
    }

    pub fn recipient_layer(&self) -> usize {
        self.num_layers()
    }
}
