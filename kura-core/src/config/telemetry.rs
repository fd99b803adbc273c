use std::collections::HashMap;

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Telemetry {
    pub stdout: Option<Stdout>,
    pub opentelemetry: Option<OpenTelemetry>,
    pub prometheus: Option<Prometheus>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Stdout {
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OpenTelemetry {
    pub endpoint: String,
    pub entity_attributes: HashMap<String, String>,
}

/// Address the `/prometheus/metrics` endpoint is served on.
#[derive(Deserialize, Debug, Clone)]
pub struct Prometheus {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    9107
}

fn default_level() -> String {
    "info".to_string()
}
