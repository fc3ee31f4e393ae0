/// mDNS service type for the OSC/UDP port.
pub const OSC_SERVICE_TYPE: &str = "_osc._udp";
/// mDNS service type for the HTTP/WebSocket query port.
pub const OSCJSON_SERVICE_TYPE: &str = "_oscjson._tcp";

/// Hook for an external service-discovery implementation.
///
/// Failures are logged by the server and never stop it.
pub trait ServiceAdvertiser: Send + Sync {
    fn advertise(&self, name: &str, service_type: &str, port: u16) -> std::io::Result<()>;

    fn withdraw(&self, name: &str, service_type: &str);
}
