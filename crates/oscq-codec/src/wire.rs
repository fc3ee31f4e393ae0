use crate::{CodecError, OscArg, OscBundle, OscMessage, OscPacket, TimeTag};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";
const MAX_BUNDLE_DEPTH: usize = 8;

#[inline(always)]
fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// Encodes one message. Strings are cut at the first interior NUL.
pub fn encode(address: &str, args: &[OscArg]) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    put_message(&mut buf, address, args);
    buf.freeze()
}

pub fn encode_message(msg: &OscMessage) -> Bytes {
    encode(&msg.address, &msg.args)
}

pub fn encode_packet(packet: &OscPacket) -> Bytes {
    let mut buf = BytesMut::with_capacity(128);
    put_packet(&mut buf, packet);
    buf.freeze()
}

fn put_packet(buf: &mut BytesMut, packet: &OscPacket) {
    match packet {
        OscPacket::Message(msg) => put_message(buf, &msg.address, &msg.args),
        OscPacket::Bundle(bundle) => {
            buf.put_slice(BUNDLE_TAG);
            buf.put_u64(bundle.timetag.0);
            for element in &bundle.content {
                // Size prefix is patched once the element length is known.
                let size_at = buf.len();
                buf.put_i32(0);
                put_packet(buf, element);
                let size = (buf.len() - size_at - 4) as i32;
                buf[size_at..size_at + 4].copy_from_slice(&size.to_be_bytes());
            }
        }
    }
}

fn put_message(buf: &mut BytesMut, address: &str, args: &[OscArg]) {
    put_str(buf, address);

    let mut tags = String::with_capacity(args.len() + 1);
    tags.push(',');
    tags.extend(args.iter().map(OscArg::tag));
    put_str(buf, &tags);

    for arg in args {
        match arg {
            OscArg::Int(v) => buf.put_i32(*v),
            OscArg::Float(v) => buf.put_f32(*v),
            OscArg::String(s) => put_str(buf, s),
            OscArg::Blob(data) => {
                buf.put_i32(data.len() as i32);
                buf.put_slice(data);
                buf.put_bytes(0, pad4(data.len()) - data.len());
            }
            OscArg::Bool(_) => {}
            OscArg::Color(rgba) => buf.put_u32(*rgba),
        }
    }
}

/// Writes `s` up to its first NUL, the OSC string terminator.
fn put_str(buf: &mut BytesMut, s: &str) {
    let raw = s.split('\0').next().unwrap_or("").as_bytes();
    buf.put_slice(raw);
    // At least one NUL terminator, then padding to the 4-byte boundary.
    buf.put_bytes(0, pad4(raw.len() + 1) - raw.len());
}

/// Decodes exactly one message. A bundle is rejected with
/// [`CodecError::UnexpectedBundle`]; use [`decode_packet`] for datagrams that may carry one.
pub fn decode(buf: &[u8]) -> Result<OscMessage, CodecError> {
    match decode_packet(buf)? {
        OscPacket::Message(msg) => Ok(msg),
        OscPacket::Bundle(_) => Err(CodecError::UnexpectedBundle),
    }
}

pub fn decode_packet(buf: &[u8]) -> Result<OscPacket, CodecError> {
    decode_at_depth(buf, 0)
}

fn decode_at_depth(buf: &[u8], depth: usize) -> Result<OscPacket, CodecError> {
    if buf.is_empty() {
        return Err(CodecError::Empty);
    }
    if buf.len() % 4 != 0 {
        return Err(CodecError::Misaligned(buf.len()));
    }

    if buf.starts_with(BUNDLE_TAG) {
        if depth >= MAX_BUNDLE_DEPTH {
            return Err(CodecError::NestingTooDeep(MAX_BUNDLE_DEPTH));
        }
        return decode_bundle(buf, depth).map(OscPacket::Bundle);
    }
    decode_message(buf).map(OscPacket::Message)
}

fn decode_bundle(buf: &[u8], depth: usize) -> Result<OscBundle, CodecError> {
    let mut reader = Reader::new(buf);
    reader.take(BUNDLE_TAG.len())?;
    let timetag = TimeTag(reader.take(8)?.get_u64());

    let mut content = Vec::new();
    while !reader.is_done() {
        let size = reader.take(4)?.get_i32();
        if size <= 0 || size % 4 != 0 {
            return Err(CodecError::InvalidElementSize(size));
        }
        let element = reader.take(size as usize)?;
        content.push(decode_at_depth(element, depth + 1)?);
    }

    Ok(OscBundle { timetag, content })
}

fn decode_message(buf: &[u8]) -> Result<OscMessage, CodecError> {
    let mut reader = Reader::new(buf);

    let address = reader.read_str()?;
    if !address.starts_with('/') {
        return Err(CodecError::InvalidAddress(address));
    }

    // Address-only messages predate type tags; treat them as argument-less.
    if reader.is_done() {
        return Ok(OscMessage::new(address, Vec::new()));
    }

    let tags = reader.read_str()?;
    let mut tag_chars = tags.chars();
    if tag_chars.next() != Some(',') {
        return Err(CodecError::MissingTypeTagComma);
    }

    let mut args = Vec::with_capacity(tags.len() - 1);
    for tag in tag_chars {
        let arg = match tag {
            'i' => OscArg::Int(reader.take(4)?.get_i32()),
            'f' => OscArg::Float(reader.take(4)?.get_f32()),
            's' => OscArg::String(reader.read_str()?),
            'b' => OscArg::Blob(reader.read_blob()?),
            'T' => OscArg::Bool(true),
            'F' => OscArg::Bool(false),
            'r' => OscArg::Color(reader.take(4)?.get_u32()),
            other => return Err(CodecError::UnknownTypeTag(other)),
        };
        args.push(arg);
    }

    if !reader.is_done() {
        return Err(CodecError::TrailingBytes(reader.remaining()));
    }

    Ok(OscMessage::new(address, args))
}

/// Bounds-checked cursor. Every read either returns the full slice or `Truncated`.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::Truncated(self.buf.len()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_str(&mut self) -> Result<String, CodecError> {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::Truncated(self.buf.len()))?;
        let raw = &rest[..nul];
        let s = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?.to_string();
        self.take(pad4(nul + 1))?;
        Ok(s)
    }

    fn read_blob(&mut self) -> Result<Bytes, CodecError> {
        let len = self.take(4)?.get_i32();
        if len < 0 {
            return Err(CodecError::InvalidElementSize(len));
        }
        let len = len as usize;
        let padded = self.take(pad4(len))?;
        Ok(Bytes::copy_from_slice(&padded[..len]))
    }
}
