//! Configuration management for Nimbus services.
//!
//! All configuration is driven by environment variables.

/// Global configuration for Nimbus.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NimbusConfig {
    /// Bind address for the gateway.
    pub gateway_listen: String,
    /// Default region reported by emulated services.
    pub default_region: String,
    /// Log level.
    pub log_level: String,
    /// Whether encoded responses are checked against registered shapes
    /// before they leave the process.
    pub validate_responses: bool,
}

impl Default for NimbusConfig {
    fn default() -> Self {
        Self {
            gateway_listen: "0.0.0.0:4566".to_owned(),
            default_region: "us-east-1".to_owned(),
            log_level: "info".to_owned(),
            validate_responses: false,
        }
    }
}

impl NimbusConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("DEFAULT_REGION") {
            config.default_region = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("VALIDATE_RESPONSES") {
            config.validate_responses = v == "1" || v.eq_ignore_ascii_case("true");
        }

        config
    }
}
