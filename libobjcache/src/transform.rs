//! Reversible payload transform applied around the storage call.
//!
//! [`Rot13`] rotates ASCII Latin letters by 13 positions and leaves every
//! other byte alone. It is keyless and trivially reversible, so it offers no
//! confidentiality whatsoever. Working on bytes keeps UTF-8 text valid (ASCII
//! bytes never occur inside a multi-byte sequence) and lets binary payloads
//! round-trip as well.

use bytes::Bytes;

pub trait Transform: Send + Sync {
    /// Name used for the trace segment around [`Transform::encode`].
    fn encode_segment(&self) -> &'static str {
        "encode"
    }

    /// Name used for the trace segment around [`Transform::decode`].
    fn decode_segment(&self) -> &'static str {
        "decode"
    }

    fn encode(&self, payload: &[u8]) -> Bytes;

    fn decode(&self, payload: &[u8]) -> Bytes;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Rot13;

impl Rot13 {
    fn rotate(byte: u8) -> u8 {
        match byte {
            b'a'..=b'z' => (byte - b'a' + 13) % 26 + b'a',
            b'A'..=b'Z' => (byte - b'A' + 13) % 26 + b'A',
            _ => byte,
        }
    }

    pub fn apply(payload: &[u8]) -> Vec<u8> {
        payload.iter().copied().map(Self::rotate).collect()
    }
}

impl Transform for Rot13 {
    fn encode_segment(&self) -> &'static str {
        "encrypt"
    }

    fn decode_segment(&self) -> &'static str {
        "decrypt"
    }

    fn encode(&self, payload: &[u8]) -> Bytes {
        Bytes::from(Self::apply(payload))
    }

    // Rotating by 13 twice is the identity.
    fn decode(&self, payload: &[u8]) -> Bytes {
        Bytes::from(Self::apply(payload))
    }
}

/// Stores payloads untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn encode(&self, payload: &[u8]) -> Bytes {
        Bytes::copy_from_slice(payload)
    }

    fn decode(&self, payload: &[u8]) -> Bytes {
        Bytes::copy_from_slice(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransformKind {
    Rot13,
    None,
}

impl TransformKind {
    pub fn build(self) -> Box<dyn Transform> {
        match self {
            TransformKind::Rot13 => Box::new(Rot13),
            TransformKind::None => Box::new(Identity),
        }
    }
}
