use std::net::SocketAddr;

use tracing::{info, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PRO_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Process configuration, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key. `None` keeps the server running but every generation
    /// call fails with a configuration error.
    pub api_key: Option<String>,
    pub base_url: String,
    pub models: ModelSelection,
    pub bind_addr: String,
    pub port: u16,
}

/// Which model ids a request may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub default_model: String,
    pub pro_model: String,
    pub fallback_model: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            pro_model: DEFAULT_PRO_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
        }
    }
}

impl ModelSelection {
    /// Resolve a caller's `modelPreference` to a primary model id.
    ///
    /// `"pro"` (any case) or the pro model id itself selects the pro model;
    /// anything else, including no preference, selects the default.
    pub fn resolve(&self, preference: Option<&str>) -> &str {
        let pref = preference.unwrap_or("").trim().to_lowercase();
        if pref == "pro" || pref == self.pro_model.to_lowercase() {
            &self.pro_model
        } else {
            &self.default_model
        }
    }
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = non_empty("GEMINI_API_KEY");
        if api_key.is_some() {
            info!("GEMINI_API_KEY found, feedback generation enabled");
        } else {
            warn!("GEMINI_API_KEY not set, every generation request will fail");
        }

        let port = match non_empty("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid PORT value {:?}, falling back to 3000", raw);
                3000
            }),
            None => 3000,
        };

        let defaults = ModelSelection::default();
        Self {
            api_key,
            base_url: non_empty("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            models: ModelSelection {
                default_model: non_empty("GEMINI_MODEL").unwrap_or(defaults.default_model),
                pro_model: non_empty("GEMINI_PRO_MODEL").unwrap_or(defaults.pro_model),
                fallback_model: non_empty("GEMINI_FALLBACK_MODEL").unwrap_or(defaults.fallback_model),
            },
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind_addr, self.port).parse()
    }
}
