// onion.rs - tulip onion wire representation
// Copyright (C) 2018  David Stainton.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::codec::{put_bytes, Reader};
use super::error::DecodeError;
use super::header::Header;
use super::sepal::Sepal;

/// The unit transmitted between hops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Onion {
    pub header: Header,
    pub content: Vec<u8>,
    pub sepal: Sepal,
}

impl Onion {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.header.write(&mut out);
        put_bytes(&mut out, &self.content);
        self.sepal.write(&mut out);
        out
    }

    pub fn from_bytes(b: &[u8]) -> Result<Onion, DecodeError> {
        let mut r = Reader::new(b);
        let header = Header::read(&mut r)?;
        let content = r.bytes("content")?.to_vec();
        let sepal = Sepal::read(&mut r)?;
        r.finish("onion")?;
        Ok(Onion { header, content, sepal })
    }

    /// The encoding handed to the transport.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(s: &str) -> Result<Onion, DecodeError> {
        Onion::from_bytes(&STANDARD.decode(s)?)
    }
}
