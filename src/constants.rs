// constants.rs - tulip onion format constants
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

/// The size in bytes of an X25519 key.
pub const GROUP_ELEMENT_SIZE: usize = 32;

/// The size in bytes of a symmetric key, both the per-hop layer
/// keys and the per-onion master key.
pub const KEY_SIZE: usize = 32;

/// The size in bytes of the random nonce prefixed to every ciphertext.
pub const NONCE_SIZE: usize = 24;

/// The size in bytes of the AEAD authentication tag.
pub const TAG_SIZE: usize = 16;

/// Ciphertext expansion of a single encryption layer.
pub const CIPHERTEXT_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// The size in bytes of a digest.
pub const HASH_SIZE: usize = 32;

/// The sepal base value carried in place of the master key once a
/// path has exhausted its bruise budget.
pub const NULL_MARKER: [u8; KEY_SIZE] = [0u8; KEY_SIZE];

/// The default size of the padded plaintext message.
pub const DEFAULT_PAYLOAD_SIZE: usize = 2 * 1024;

/// Length prefix sizes of the message framing inside the padded payload.
pub const MESSAGE_FROM_LEN_SIZE: usize = 2;
pub const MESSAGE_BODY_LEN_SIZE: usize = 4;

/// The longest hop address a header can carry, bound by its u16
/// length prefix.
pub const MAX_ADDRESS_SIZE: usize = u16::MAX as usize;

/// Domain separation prefix for the shared key derivation.
pub const HASH_SHARED_KEY_PREFIX: &[u8] = b"tulip:shared-key:v1";

/// Role tags of the decrypted per-hop header.
pub const ROLE_MIXER: u8 = 0x0;
pub const ROLE_GATEKEEPER: u8 = 0x1;
pub const ROLE_LAST_GATEKEEPER: u8 = 0x2;
pub const ROLE_RECIPIENT: u8 = 0x3;
