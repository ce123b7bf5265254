//! Configuration module for the analytics injection filter
//!
//! Configuration is loaded from Envoy plugin configuration,
//! NOT from external files. This avoids file I/O in the Wasm sandbox.

use serde::Deserialize;

/// Analytics providers this filter knows how to inject.
pub const SUPPORTED_PROVIDERS: &[&str] = &["plausible"];

/// Filter configuration loaded from Envoy plugin configuration
#[derive(Clone, Debug, Deserialize)]
pub struct FilterConfig {
    /// The analytics provider to inject. Currently available: plausible
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Domain hosting the provider's script. Empty selects the provider's
    /// official instance.
    #[serde(default)]
    pub server: String,

    /// API token for automated site registration on the provider.
    /// Accepted but not acted on yet.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Destination buffer size for each rewrite step
    #[serde(default = "default_scratch_size")]
    pub scratch_size: usize,

    /// Whether to emit per-response audit events
    #[serde(default = "default_log_events")]
    pub log_events: bool,
}

fn default_provider() -> String {
    "plausible".to_string()
}

fn default_scratch_size() -> usize {
    16 * 1024 // 16KB
}

fn default_log_events() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            server: String::new(),
            admin_token: None,
            scratch_size: default_scratch_size(),
            log_events: default_log_events(),
        }
    }
}

impl FilterConfig {
    /// Parse and validate configuration from JSON bytes (from Envoy plugin
    /// configuration)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config_str =
            std::str::from_utf8(bytes).map_err(|e| ConfigError::InvalidUtf8(e.to_string()))?;

        let config: Self = serde_json::from_str(config_str)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the filter cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(ConfigError::UnsupportedProvider(self.provider.clone()));
        }
        if self.scratch_size == 0 {
            return Err(ConfigError::ZeroScratchSize);
        }
        Ok(())
    }

    /// The script host to reference: the configured one, or the provider's
    /// official instance when none was given.
    pub fn resolved_server(&self) -> &str {
        if !self.server.is_empty() {
            return &self.server;
        }
        match self.provider.as_str() {
            "plausible" => "plausible.io",
            _ => "",
        }
    }
}

/// Configuration parsing errors
#[derive(Debug)]
pub enum ConfigError {
    InvalidUtf8(String),
    InvalidJson(String),
    UnsupportedProvider(String),
    ZeroScratchSize,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidUtf8(e) => write!(f, "Invalid UTF-8: {}", e),
            ConfigError::InvalidJson(e) => write!(f, "Invalid JSON: {}", e),
            ConfigError::UnsupportedProvider(p) => write!(
                f,
                "Provider '{}' not supported (available: {})",
                p,
                SUPPORTED_PROVIDERS.join(", ")
            ),
            ConfigError::ZeroScratchSize => write!(f, "scratch_size must be at least 1"),
        }
    }
}
