use thiserror::Error;

/// A packet that could not be parsed. Covers the whole malformed-packet class:
/// the receive loop drops the datagram, logs it and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed OSC packet: empty buffer")]
    Empty,

    #[error("malformed OSC packet: length {0} is not a multiple of 4")]
    Misaligned(usize),

    #[error("malformed OSC packet: truncated at byte {0}")]
    Truncated(usize),

    #[error("malformed OSC packet: address must start with '/', got {0:?}")]
    InvalidAddress(String),

    #[error("malformed OSC packet: type tag string must start with ','")]
    MissingTypeTagComma,

    #[error("malformed OSC packet: unsupported type tag '{0}'")]
    UnknownTypeTag(char),

    #[error("malformed OSC packet: {0} bytes left after the last tagged argument")]
    TrailingBytes(usize),

    #[error("malformed OSC packet: string is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed OSC packet: invalid bundle element size {0}")]
    InvalidElementSize(i32),

    #[error("malformed OSC packet: bundles nested deeper than {0}")]
    NestingTooDeep(usize),

    #[error("malformed OSC packet: expected a message, got a bundle")]
    UnexpectedBundle,
}
