use serde::Deserialize;
use service_core::config::{configuration_directory, load_layered, TelemetrySettings};
use service_core::error::AppError;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the relay cross-origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    /// Base URL of the inference service, e.g. `https://host/api`.
    pub base_url: String,
    /// Route patterns callers may reach through the relay. `{name}` matches a
    /// single path segment.
    #[serde(default = "default_allowed_endpoints")]
    pub allowed_endpoints: Vec<String>,
}

pub fn default_allowed_endpoints() -> Vec<String> {
    vec![
        "videos".to_string(),
        "videos/generate".to_string(),
        "videos/{id}".to_string(),
    ]
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let configuration_directory = configuration_directory("relay-service")?;
    load_layered(&configuration_directory)
}
