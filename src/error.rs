// error.rs - tulip onion error types
// Copyright (C) 2018  David Anthony Stainton.
//
// MIT License
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::fmt;

use thiserror::Error;

/// Failures of the key agreement and symmetric cipher primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("entropy source failure: {0}")]
    KeyGeneration(#[from] rand_core::Error),
    #[error("encryption failed")]
    Encryption,
    #[error("authenticated decryption failed, wrong key or tampered ciphertext")]
    Authentication,
}

/// Failures to parse a well-authenticated but malformed structure.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated {0}")]
    Truncated(&'static str),
    #[error("trailing bytes after {0}")]
    TrailingBytes(&'static str),
    #[error("unknown role tag {0:#04x}")]
    UnknownRole(u8),
    #[error("address is not valid UTF-8")]
    InvalidAddress(#[from] std::string::FromUtf8Error),
    #[error("invalid base64 encoding: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors that can be produced while forming onions.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid onion parameters: {0}")]
    InvalidParameters(&'static str),
    #[error("{what} has {got} entries, expected {expected}")]
    PathLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("address of {got} bytes exceeds the {limit} byte limit")]
    AddressTooLong { got: usize, limit: usize },
    #[error("message of {got} bytes does not fit a {limit} byte payload")]
    MessageTooLong { got: usize, limit: usize },
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// The underlying cause of a failed peel.
#[derive(Debug, Error)]
pub enum PeelErrorKind {
    #[error("authentication failed")]
    Authentication(#[source] CryptoError),
    #[error("deserialization failed")]
    Deserialization(#[from] DecodeError),
    #[error("sepal digest not found in the digest table")]
    SepalIntegrity,
    #[error("header tag does not match the authenticated data")]
    TagMismatch,
    #[error("checkpoint failed, the sepal carries the null marker")]
    CheckpointFailed,
}

impl From<CryptoError> for PeelErrorKind {
    fn from(err: CryptoError) -> PeelErrorKind {
        PeelErrorKind::Authentication(err)
    }
}

/// The sub-operation of a peel that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeelStage {
    Wire,
    Header,
    Routing,
    Sepal,
    MasterKey,
    Content,
    Message,
}

impl fmt::Display for PeelStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::PeelStage::*;
        match *self {
            Wire => write!(f, "wire decoding"),
            Header => write!(f, "header decryption"),
            Routing => write!(f, "routing decryption"),
            Sepal => write!(f, "sepal verification"),
            MasterKey => write!(f, "master key recovery"),
            Content => write!(f, "content decryption"),
            Message => write!(f, "message unpadding"),
        }
    }
}

/// A protocol error raised by `peel_onion`. The layer is known once
/// the header has been decrypted.
#[derive(Debug, Error)]
pub struct PeelError {
    pub layer: Option<u32>,
    pub stage: PeelStage,
    #[source]
    pub kind: PeelErrorKind,
}

impl fmt::Display for PeelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.layer {
            Some(layer) => write!(f, "{} failed at layer {}: {}", self.stage, layer, self.kind),
            None => write!(f, "{} failed: {}", self.stage, self.kind),
        }
    }
}

impl PeelError {
    pub fn new<K: Into<PeelErrorKind>>(layer: Option<u32>, stage: PeelStage, kind: K) -> PeelError {
        PeelError {
            layer,
            stage,
            kind: kind.into(),
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, PeelErrorKind::Authentication(_))
    }

    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, PeelErrorKind::Deserialization(_))
    }

    pub fn is_sepal_integrity(&self) -> bool {
        matches!(self.kind, PeelErrorKind::SepalIntegrity)
    }

    /// True when the last gatekeeper found the null marker, i.e. the
    /// mixers bruised the onion beyond its tolerance.
    pub fn is_checkpoint_failure(&self) -> bool {
        matches!(self.kind, PeelErrorKind::CheckpointFailed)
    }
}
