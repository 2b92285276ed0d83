//! Deterministic ABI encoding for fixed-width values
//!
//! Implements the subset of `abi.encode` the commitment machine needs: every
//! fixed-width value occupies one 32-byte big-endian word, addresses are
//! right-aligned, and a dynamic `bytes` value may appear only as the terminal
//! field, encoded as a length word followed by the payload right-padded to a
//! word boundary. The on-chain consumers of these encodings decode exactly
//! this layout, so the byte output here is normative.

use alloy_primitives::{Address, B256, U256};

use crate::crypto::hashing::keccak256;

const WORD: usize = 32;

/// Incremental encoder producing `abi.encode`-compatible bytes
///
/// Values are appended in field order; [`AbiEncoder::finish`] yields the raw
/// encoding and [`AbiEncoder::hash`] its keccak-256.
#[derive(Debug, Default)]
pub struct AbiEncoder {
    out: Vec<u8>,
}

impl AbiEncoder {
    /// Create an empty encoder
    pub fn new() -> Self {
        Self { out: Vec::new() }
    }

    /// Append an address, right-aligned in one word
    pub fn address(&mut self, value: &Address) {
        let mut word = [0u8; WORD];
        word[12..].copy_from_slice(value.as_slice());
        self.out.extend_from_slice(&word);
    }

    /// Append a 256-bit unsigned integer as one big-endian word
    pub fn uint256(&mut self, value: &U256) {
        self.out.extend_from_slice(&value.to_be_bytes::<WORD>());
    }

    /// Append a `u64` widened to one word
    pub fn uint64(&mut self, value: u64) {
        let mut word = [0u8; WORD];
        word[24..].copy_from_slice(&value.to_be_bytes());
        self.out.extend_from_slice(&word);
    }

    /// Append a `u8` widened to one word
    pub fn uint8(&mut self, value: u8) {
        let mut word = [0u8; WORD];
        word[31] = value;
        self.out.extend_from_slice(&word);
    }

    /// Append a boolean as 0 or 1 in one word
    pub fn boolean(&mut self, value: bool) {
        self.uint8(u8::from(value));
    }

    /// Append a 32-byte value verbatim
    pub fn bytes32(&mut self, value: &B256) {
        self.out.extend_from_slice(value.as_slice());
    }

    /// Append a dynamic `bytes` value: length word, then the payload
    /// right-padded to a multiple of 32 bytes
    ///
    /// Must be the final field of the tuple; the head-only layout carries no
    /// offset word.
    pub fn trailing_bytes(&mut self, value: &[u8]) {
        self.uint64(value.len() as u64);
        self.out.extend_from_slice(value);
        let rem = value.len() % WORD;
        if rem != 0 {
            self.out.extend_from_slice(&vec![0u8; WORD - rem]);
        }
    }

    /// Consume the encoder and return the raw encoding
    pub fn finish(self) -> Vec<u8> {
        self.out
    }

    /// Keccak-256 of the encoding so far
    pub fn hash(&self) -> B256 {
        keccak256(&self.out)
    }
}
