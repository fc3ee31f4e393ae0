use crate::error::OscQueryError;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::Path;

/// Include/exclude list applied to raw (unsanitised) names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "names")]
pub enum FilterMode {
    #[default]
    All,
    Include(BTreeSet<String>),
    Exclude(BTreeSet<String>),
}

impl FilterMode {
    pub fn include<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterMode::Include(names.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterMode::Exclude(names.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, name: &str) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Include(names) => names.contains(name),
            FilterMode::Exclude(names) => !names.contains(name),
        }
    }
}

/// Filters applied identically at every depth of the build walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterPolicy {
    pub objects: FilterMode,
    pub components: FilterMode,
    pub members: FilterMode,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Advertised server name, reported in `HOST_INFO`.
    pub name: String,
    pub host: String,
    pub osc_port: u16,
    /// HTTP query and WebSocket port.
    pub http_port: u16,
    /// Feedback tick cadence. `0` leaves ticking to the host.
    pub feedback_interval_ms: u64,
    /// Kernel receive buffer (`SO_RCVBUF`) for the OSC socket. Datagram reads
    /// are always sized for the largest UDP payload.
    pub recv_buffer_size: usize,
    /// Prepended to every address, e.g. `/scene`.
    pub path_prefix: String,
    pub filter: FilterPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "OSCQuery".to_string(),
            host: "0.0.0.0".to_string(),
            osc_port: 9010,
            http_port: 9010,
            feedback_interval_ms: 33,
            recv_buffer_size: 4096,
            path_prefix: String::new(),
            filter: FilterPolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, OscQueryError> {
        toml::from_str(raw).map_err(|e| OscQueryError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, OscQueryError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn osc_addr(&self) -> Result<SocketAddr, OscQueryError> {
        parse_addr(&self.host, self.osc_port)
    }

    pub fn http_addr(&self) -> Result<SocketAddr, OscQueryError> {
        parse_addr(&self.host, self.http_port)
    }
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr, OscQueryError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|_| OscQueryError::Config(format!("invalid listen address {host}:{port}")))
}
