//! # Codec Layer Tests: OSC 1.0 wire format
//!
//! Byte-exact encoding, round trips for every argument kind, bundles, and the
//! malformed inputs that must be rejected whole.

use bytes::Bytes;
use oscquery::codec::{
    decode, decode_packet, encode, encode_packet, CodecError, OscArg, OscBundle, OscMessage, OscPacket, TimeTag,
};
use std::time::Instant;

/// Verifies the exact bytes of a single-float message.
#[test]
fn test_encode_float_message_layout() {
    let t = Instant::now();

    let bytes = encode("/Root/Light/intensity", &[OscArg::Float(3.5)]);

    let mut expected = Vec::new();
    expected.extend_from_slice(b"/Root/Light/intensity\0\0\0"); // 21 + 3 padding
    expected.extend_from_slice(b",f\0\0");
    expected.extend_from_slice(&3.5f32.to_be_bytes());
    assert_eq!(&bytes[..], &expected[..]);
    assert_eq!(bytes.len() % 4, 0);

    println!("test_encode_float_message_layout: Testing Overhead = {:?}", t.elapsed());
}

/// A string whose length is a multiple of four still gets a full NUL word.
#[test]
fn test_aligned_string_gets_terminator_word() {
    let bytes = encode("/abc", &[]);
    assert_eq!(&bytes[..], b"/abc\0\0\0\0,\0\0\0");
}

/// Verifies that every supported argument kind survives encode then decode.
#[test]
fn test_round_trip_every_argument_kind() {
    let t = Instant::now();

    let args = vec![
        OscArg::Int(-42),
        OscArg::Float(0.25),
        OscArg::String("hello".into()),
        OscArg::Blob(Bytes::from_static(&[1, 2, 3, 4, 5])),
        OscArg::Bool(true),
        OscArg::Bool(false),
        OscArg::Color(0x11223344),
        OscArg::String(String::new()),
    ];
    let bytes = encode("/all/kinds", &args);
    let msg = decode(&bytes).expect("well-formed message");

    assert_eq!(msg.address, "/all/kinds");
    assert_eq!(msg.args, args);

    println!("test_round_trip_every_argument_kind: Testing Overhead = {:?}", t.elapsed());
}

#[test]
fn test_unknown_address_still_decodes() {
    let bytes = encode("/never/registered", &[OscArg::Int(1)]);
    assert_eq!(decode(&bytes).unwrap().address, "/never/registered");
}

/// Legacy senders omit the type tag string entirely.
#[test]
fn test_address_only_message_has_no_arguments() {
    let msg = decode(b"/ping\0\0\0").unwrap();
    assert_eq!(msg.address, "/ping");
    assert!(msg.args.is_empty());
}

/// Verifies the rejection of every malformed class instead of a partial parse.
#[test]
fn test_malformed_packets_are_rejected() {
    let t = Instant::now();

    assert_eq!(decode(b""), Err(CodecError::Empty));
    assert_eq!(decode(b"/abc\0\0"), Err(CodecError::Misaligned(6)));

    // Tag string announces an int that is not there.
    let mut missing = encode("/x", &[]).to_vec();
    missing[4..8].copy_from_slice(b",i\0\0");
    assert!(matches!(decode(&missing), Err(CodecError::Truncated(_))));

    // One argument word more than the tags announce.
    let mut trailing = encode("/x", &[OscArg::Int(7)]).to_vec();
    trailing.extend_from_slice(&[0, 0, 0, 9]);
    assert_eq!(decode(&trailing), Err(CodecError::TrailingBytes(4)));

    // No NUL anywhere.
    assert!(matches!(decode(b"/abcdefg"), Err(CodecError::Truncated(_))));

    assert!(matches!(decode(b"abc\0,\0\0\0"), Err(CodecError::InvalidAddress(_))));
    assert_eq!(decode(b"/abc\0\0\0\0i\0\0\0"), Err(CodecError::MissingTypeTagComma));
    assert_eq!(decode(b"/abc\0\0\0\0,x\0\0"), Err(CodecError::UnknownTypeTag('x')));

    println!("test_malformed_packets_are_rejected: Testing Overhead = {:?}", t.elapsed());
}

#[test]
fn test_truncated_blob_is_rejected() {
    let mut bytes = encode("/b", &[OscArg::Blob(Bytes::from_static(&[9; 8]))]).to_vec();
    bytes.truncate(bytes.len() - 4);
    assert!(matches!(decode(&bytes), Err(CodecError::Truncated(_))));
}

#[test]
fn test_string_stops_at_interior_nul() {
    let bytes = encode("/s", &[OscArg::String("ab\0cd".into())]);
    // "/s\0\0" ",s\0\0" "ab\0\0"
    assert_eq!(bytes.len(), 12);
    let msg = decode(&bytes).unwrap();
    assert_eq!(msg.args, [OscArg::String("ab".into())]);
}

/// Verifies nested bundles flatten into their messages in wire order.
#[test]
fn test_bundle_round_trip_and_flatten() {
    let t = Instant::now();

    let inner = OscPacket::Bundle(OscBundle {
        timetag: TimeTag::IMMEDIATE,
        content: vec![OscPacket::Message(OscMessage::new("/b", vec![OscArg::Int(2)]))],
    });
    let outer = OscPacket::Bundle(OscBundle {
        timetag: TimeTag(0xDEAD_BEEF_0000_0001),
        content: vec![
            OscPacket::Message(OscMessage::new("/a", vec![OscArg::Float(1.0)])),
            inner,
            OscPacket::Message(OscMessage::new("/c", vec![OscArg::String("x".into())])),
        ],
    });

    let bytes = encode_packet(&outer);
    assert!(bytes.starts_with(b"#bundle\0"));

    let decoded = decode_packet(&bytes).unwrap();
    assert_eq!(decoded, outer);

    let addresses: Vec<String> = decoded.into_messages().into_iter().map(|m| m.address).collect();
    assert_eq!(addresses, ["/a", "/b", "/c"]);

    println!("test_bundle_round_trip_and_flatten: Testing Overhead = {:?}", t.elapsed());
}

#[test]
fn test_decode_refuses_bundle() {
    let bundle = OscPacket::Bundle(OscBundle { timetag: TimeTag::IMMEDIATE, content: Vec::new() });
    assert_eq!(decode(&encode_packet(&bundle)), Err(CodecError::UnexpectedBundle));
}

#[test]
fn test_bundle_with_bad_element_size_is_rejected() {
    let mut bytes = b"#bundle\0".to_vec();
    bytes.extend_from_slice(&1u64.to_be_bytes());
    bytes.extend_from_slice(&6i32.to_be_bytes());
    bytes.extend_from_slice(b"/a\0\0,\0\0\0");
    assert_eq!(decode_packet(&bytes), Err(CodecError::InvalidElementSize(6)));

    // Size claims more than is left.
    let mut short = b"#bundle\0".to_vec();
    short.extend_from_slice(&1u64.to_be_bytes());
    short.extend_from_slice(&64i32.to_be_bytes());
    short.extend_from_slice(b"/a\0\0,\0\0\0");
    assert!(matches!(decode_packet(&short), Err(CodecError::Truncated(_))));
}

#[test]
fn test_bundle_nesting_limit() {
    let mut packet = OscPacket::Message(OscMessage::new("/deep", Vec::new()));
    for _ in 0..9 {
        packet = OscPacket::Bundle(OscBundle { timetag: TimeTag::IMMEDIATE, content: vec![packet] });
    }
    assert!(matches!(decode_packet(&encode_packet(&packet)), Err(CodecError::NestingTooDeep(_))));
}
