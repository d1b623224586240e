//! Configuration for the LUNA voice session manager
//!
//! Read once from the environment at process start and never mutated.

use url::Url;

use crate::{Error, Result};

/// Default live model service endpoint (Gemini Live bidirectional API)
pub const DEFAULT_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default memory provider endpoint (Mem0 REST API)
pub const DEFAULT_MEMORY_URL: &str = "https://api.mem0.ai/v1";

/// Baked-in memory provider credential used when none is configured
const DEFAULT_MEM0_API_KEY: &str = "m0-w4JvmXiUIbquFhH107n7nXYdGNU68XOvhaKDKJ7q";

/// Voice session configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Model service credential (`GEMINI_API_KEY`)
    pub gemini_api_key: Option<String>,

    /// Memory provider credential (`MEM0_API_KEY`, baked-in default if absent).
    /// `None` only when the env var is set to an empty string, which disables
    /// the provider entirely.
    pub mem0_api_key: Option<String>,

    /// Live model service endpoint (`LUNA_LIVE_URL` override)
    pub live_url: String,

    /// Memory provider endpoint (`LUNA_MEMORY_URL` override)
    pub memory_url: String,
}

impl Config {
    /// Load configuration from the environment
    #[must_use]
    pub fn load() -> Self {
        let mem0_api_key = match std::env::var("MEM0_API_KEY") {
            Ok(key) if key.is_empty() => None,
            Ok(key) => Some(key),
            Err(_) => Some(DEFAULT_MEM0_API_KEY.to_string()),
        };

        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            mem0_api_key,
            live_url: std::env::var("LUNA_LIVE_URL")
                .ok()
                .unwrap_or_else(|| DEFAULT_LIVE_URL.to_string()),
            memory_url: std::env::var("LUNA_MEMORY_URL")
                .ok()
                .unwrap_or_else(|| DEFAULT_MEMORY_URL.to_string()),
        }
    }

    /// Full live endpoint including the credential query parameter
    ///
    /// # Errors
    ///
    /// Returns `CredentialMissing` if no model service credential is configured
    pub fn live_endpoint(&self) -> Result<String> {
        let key = self.gemini_api_key.as_deref().ok_or(Error::CredentialMissing)?;
        Ok(format!("{}?key={key}", self.live_url))
    }

    /// Whether the live endpoint qualifies as a secure context.
    ///
    /// Capture devices may only be requested over encrypted transport or
    /// local loopback; anything else must fail fast before acquisition.
    #[must_use]
    pub fn is_secure_context(&self) -> bool {
        let Ok(url) = Url::parse(&self.live_url) else {
            return false;
        };

        match url.scheme() {
            "wss" | "https" => true,
            "ws" | "http" => matches!(
                url.host_str(),
                Some("localhost" | "127.0.0.1" | "[::1]" | "::1")
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_url(url: &str) -> Config {
        Config {
            gemini_api_key: Some("test-key".to_string()),
            mem0_api_key: None,
            live_url: url.to_string(),
            memory_url: DEFAULT_MEMORY_URL.to_string(),
        }
    }

    #[test]
    fn encrypted_transport_is_secure() {
        assert!(config_with_url(DEFAULT_LIVE_URL).is_secure_context());
        assert!(config_with_url("wss://203.0.113.7/session").is_secure_context());
    }

    #[test]
    fn loopback_is_secure_even_unencrypted() {
        assert!(config_with_url("ws://localhost:9090/session").is_secure_context());
        assert!(config_with_url("ws://127.0.0.1:9090/session").is_secure_context());
    }

    #[test]
    fn plain_transport_to_network_host_is_insecure() {
        assert!(!config_with_url("ws://192.168.1.4:9090/session").is_secure_context());
        assert!(!config_with_url("not a url").is_secure_context());
    }

    #[test]
    fn live_endpoint_requires_credential() {
        let mut config = config_with_url(DEFAULT_LIVE_URL);
        assert!(config.live_endpoint().unwrap().ends_with("?key=test-key"));

        config.gemini_api_key = None;
        assert!(matches!(
            config.live_endpoint(),
            Err(Error::CredentialMissing)
        ));
    }
}
