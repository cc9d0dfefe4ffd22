//! AI gateway configuration from the environment.
//!
//! Keys follow the Portkey-style convention: `PORTKEY_<NAME>` with an
//! optional `PORTKEY_<NAME>_<PROFILE>` override selected by
//! `PORTKEY_PROFILE`. AI features are enabled only when the api key, the
//! virtual key and the model are all non-blank.

use std::env;
use std::sync::OnceLock;

const DEFAULT_BASE_URL: &str = "https://api.portkey.ai/v1";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq)]
pub struct AiGatewayConfig {
    pub api_key: String,
    /// Provider routing key ("virtual key") at the gateway.
    pub virtual_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_ms: u64,
    pub profile: Option<String>,
}

impl AiGatewayConfig {
    /// Build from an arbitrary lookup function. Tests inject maps; the
    /// process-wide instance uses [`std::env::var`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let profile = lookup("PORTKEY_PROFILE").filter(|p| !p.trim().is_empty());
        let with_profile = |name: &str| -> Option<String> {
            if let Some(profile) = &profile {
                let key = format!("{name}_{}", profile.to_ascii_uppercase());
                if let Some(value) = lookup(&key).filter(|v| !v.trim().is_empty()) {
                    return Some(value);
                }
            }
            lookup(name).filter(|v| !v.trim().is_empty())
        };

        AiGatewayConfig {
            api_key: lookup("PORTKEY_API_KEY").unwrap_or_default(),
            virtual_key: with_profile("PORTKEY_VIRTUAL_KEY").unwrap_or_default(),
            model: with_profile("PORTKEY_MODEL").unwrap_or_default(),
            base_url: with_profile("PORTKEY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_ms: lookup("PORTKEY_TIMEOUT_MS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            profile,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// The process-wide instance, read once.
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<AiGatewayConfig> = OnceLock::new();
        INSTANCE.get_or_init(Self::from_env)
    }

    pub fn enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
            && !self.virtual_key.trim().is_empty()
            && !self.model.trim().is_empty()
    }
}
