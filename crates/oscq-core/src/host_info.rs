use serde::Serialize;

/// Extensions this server implements, as reported under `HOST_INFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Extensions {
    pub access: bool,
    pub range: bool,
    #[serde(rename = "TYPE")]
    pub type_: bool,
    pub value: bool,
    pub listen: bool,
    pub clipmode: bool,
    pub critical: bool,
    pub tags: bool,
    pub unit: bool,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            access: true,
            range: true,
            type_: true,
            value: true,
            listen: true,
            clipmode: false,
            critical: false,
            tags: false,
            unit: false,
        }
    }
}

/// The `HOST_INFO` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct HostInfo {
    pub extensions: Extensions,
    pub name: String,
    pub osc_port: u16,
    pub osc_transport: &'static str,
}

impl HostInfo {
    pub fn new(name: impl Into<String>, osc_port: u16) -> Self {
        Self {
            extensions: Extensions::default(),
            name: name.into(),
            osc_port,
            osc_transport: "UDP",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
