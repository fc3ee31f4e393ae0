//! # oscq-codec: OSC 1.0 wire format
//!
//! Encodes and decodes OSC messages and bundles. Every decode either yields a
//! complete packet or a [`CodecError`]; there is no best-effort partial parse.
//! Address semantics are not checked here beyond the leading `/`.

pub mod error;
pub mod wire;

pub use error::CodecError;
pub use wire::{decode, decode_packet, encode, encode_message, encode_packet};

use bytes::Bytes;

/// One typed OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    /// `i`
    Int(i32),
    /// `f`
    Float(f32),
    /// `s`. OSC strings are NUL-terminated, so encoding writes only the text
    /// before the first interior NUL.
    String(String),
    /// `b`
    Blob(Bytes),
    /// `T` / `F`, no payload bytes.
    Bool(bool),
    /// `r`, packed as 0xRRGGBBAA.
    Color(u32),
}

impl OscArg {
    /// The type-tag character this argument is written with.
    pub fn tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::String(_) => 's',
            OscArg::Blob(_) => 'b',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
            OscArg::Color(_) => 'r',
        }
    }

    /// Numeric view of the argument. Booleans count as 1.0 / 0.0.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            OscArg::Int(v) => Some(*v as f32),
            OscArg::Float(v) => Some(*v),
            OscArg::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscArg::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for OscArg {
    fn from(v: i32) -> Self {
        OscArg::Int(v)
    }
}

impl From<f32> for OscArg {
    fn from(v: f32) -> Self {
        OscArg::Float(v)
    }
}

impl From<&str> for OscArg {
    fn from(v: &str) -> Self {
        OscArg::String(v.to_string())
    }
}

impl From<bool> for OscArg {
    fn from(v: bool) -> Self {
        OscArg::Bool(v)
    }
}

/// An address plus its ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }
}

/// 64-bit NTP time tag carried by bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeTag(pub u64);

impl TimeTag {
    /// The special "execute immediately" value.
    pub const IMMEDIATE: TimeTag = TimeTag(1);
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscBundle {
    pub timetag: TimeTag,
    pub content: Vec<OscPacket>,
}

/// Anything that can arrive in a single datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl OscPacket {
    /// Flattens nested bundles into their messages, depth-first, in wire order.
    pub fn into_messages(self) -> Vec<OscMessage> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(self, out: &mut Vec<OscMessage>) {
        match self {
            OscPacket::Message(msg) => out.push(msg),
            OscPacket::Bundle(bundle) => {
                for packet in bundle.content {
                    packet.collect_into(out);
                }
            }
        }
    }
}
