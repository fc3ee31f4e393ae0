pub use oscq_core::{ControlSignal, ServerBuilder, ServerConfig};
pub mod discovery;
pub mod dispatcher;
pub mod http;
pub mod server;
pub mod ws;

pub use discovery::{ServiceAdvertiser, OSCJSON_SERVICE_TYPE, OSC_SERVICE_TYPE};
pub use dispatcher::{bind_udp, OscDispatcher};
pub use server::{OscQueryServer, ServerHandle};
