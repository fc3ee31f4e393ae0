//! OSCQuery server engine.
//!
//! A live tree of named parameters, controllable over OSC/UDP and
//! introspectable over HTTP, with change feedback pushed to WebSocket
//! subscribers.
//!
//! - [`codec`]: OSC 1.0 messages and bundles.
//! - [`engine`]: address-space model, bindings, router and configuration.
//! - [`transport`]: UDP dispatcher, HTTP/WebSocket server and lifecycle.

pub use oscq_codec as codec;
pub use oscq_core as engine;
pub use oscq_transport as transport;

pub use oscq_codec::{OscArg, OscMessage, OscPacket};
pub use oscq_core::{
    BindableTarget, BindingProvider, ControlSignal, FilterMode, FilterPolicy, MemberAccess, MemberInfo,
    MemoryComponent, MemoryObject, OscQueryError, ProtocolRouter, ServerBuilder, ServerConfig, Value,
    Quat, ValueType,
};
pub use oscq_transport::{OscQueryServer, ServerHandle, ServiceAdvertiser};
