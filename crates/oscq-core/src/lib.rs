pub mod binding;
pub mod builder;
pub mod coerce;
pub mod config;
pub mod error;
pub mod host_info;
pub mod memory;
pub mod node;
pub mod router;
pub mod snapshot;
pub mod subscription;
pub mod value;

pub use binding::{
    BindableTarget, Binding, BindingError, BindingKind, BindingProvider, MemberAccess, MemberInfo, MemberType,
    Range,
};
pub use builder::AddressSpaceBuilder;
pub use coerce::{coerce, CoercionError};
pub use config::{FilterMode, FilterPolicy, ServerConfig};
pub use error::OscQueryError;
pub use host_info::HostInfo;
pub use memory::{MemoryComponent, MemoryObject};
pub use node::{Access, Node};
pub use router::{Dispatch, ProtocolRouter};
pub use snapshot::{Snapshot, SnapshotCell};
pub use subscription::{ConnectionId, FeedbackSink};
pub use value::{Quat, Value, ValueType};
use std::sync::Arc;

/// Messages for the server's control task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Rebuild the address space from the current root.
    Rebuild,
    Shutdown,
}

/// Collects configuration and the target graph for one server.
///
/// The root is only walked when the router is built, so targets may keep
/// changing until then.
pub struct ServerBuilder {
    pub config: ServerConfig,
    pub root: Option<Arc<dyn BindableTarget>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            root: None,
        }
    }

    /// Overrides the default server configuration.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_root(mut self, root: Arc<dyn BindableTarget>) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_filter(mut self, filter: FilterPolicy) -> Self {
        self.config.filter = filter;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn with_osc_port(mut self, port: u16) -> Self {
        self.config.osc_port = port;
        self
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.path_prefix = prefix.into();
        self
    }

    /// Creates the router and publishes the first snapshot.
    pub fn build_router(&self) -> Arc<ProtocolRouter> {
        let router = Arc::new(ProtocolRouter::new(
            self.root.clone(),
            self.config.filter.clone(),
            &self.config.path_prefix,
        ));
        router.rebuild_snapshot();
        router
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
