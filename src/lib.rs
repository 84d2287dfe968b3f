// lib.rs - The tulip onion cryptographic library
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

//! An implementation of bruise-tolerant tulip onions
//!
//! # The Tulip Onion Format
//!
//! A sender routes a message through `l1` mixers and `l2` gatekeepers
//! to a recipient. Mixers may bruise an onion, for instance when a
//! checkpoint onion fails to arrive; as long as fewer than `d` bruises
//! occur, the last gatekeeper recovers the onion's master key from the
//! sepal and the message reaches the recipient. Otherwise the onion
//! is dropped at the last gatekeeper.
//!
//! # Features of the format
//!
//! * every hop authenticates its header, content and sepal
//! * the sender forms every reachable variant of the onion up front
//! * any hop can check the sepal without knowing the bruise history
//! * fixed size padded payloads
//!
//! # Usage
//!
//! The sender calls [`client::form_onion`] and sends
//! `formed.first().to_base64()` to `formed.first_hop`. Each hop calls
//! [`server::peel_onion`] with the key it shares with the sender; mixers
//! then `advance` or `bruise` the pending onion before forwarding it.

#[macro_use]
extern crate arrayref;

pub mod client;
pub mod constants;
pub mod content;
pub mod ecdh;
pub mod error;
pub mod header;
pub mod onion;
pub mod params;
pub mod sepal;
pub mod server;

mod codec;
mod internal_crypto;

pub use internal_crypto::{decrypt, encrypt, hash, Digest};
