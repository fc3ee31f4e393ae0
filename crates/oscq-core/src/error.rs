use crate::binding::BindingError;
use crate::coerce::CoercionError;
use oscq_codec::CodecError;
use thiserror::Error;

/// Everything the engine can report. All but `TransportBind`, `Config` and
/// `Io` are per-message conditions: the caller logs and moves on.
#[derive(Debug, Error)]
pub enum OscQueryError {
    #[error(transparent)]
    MalformedPacket(#[from] CodecError),

    #[error("binding not found for address {0}")]
    BindingNotFound(String),

    #[error("type not handled for {path}: {source}")]
    UnsupportedType {
        path: String,
        #[source]
        source: CoercionError,
    },

    #[error("{path}: '{value}' matches no declared enum value")]
    EnumMismatch { path: String, value: String },

    #[error("{path}: {source}")]
    Binding {
        path: String,
        #[source]
        source: BindingError,
    },

    #[error("{transport} transport could not bind {addr}: {source}")]
    TransportBind {
        transport: &'static str,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
