//! Transport configuration for talking to a llama.cpp server.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Environment variable holding the server base URL.
pub const ENV_BASE_URL: &str = "LLAMA_SERVER_URL";

/// Environment variable holding the API key (`--api-key` on the server).
pub const ENV_API_KEY: &str = "LLAMA_API_KEY";

/// Environment variable holding the request timeout in whole seconds.
pub const ENV_TIMEOUT_SECS: &str = "LLAMA_TIMEOUT_SECS";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// HTTP transport options shared by every request a client makes.
///
/// # Example
/// ```rust
/// use llama_server_client::options::TransportOptions;
/// use std::time::Duration;
///
/// let options = TransportOptions::new("http://127.0.0.1:8080")
///     .with_timeout(Duration::from_secs(120))
///     .with_api_key("secret");
/// assert_eq!(options.base_url, "http://127.0.0.1:8080");
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Server root, e.g. `http://localhost:8080`
    pub base_url: String,

    /// Request timeout. Applies to the whole request, streamed body included.
    pub timeout: Option<Duration>,

    /// Sent as a bearer token when the server runs with `--api-key`
    pub api_key: Option<SecretString>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl TransportOptions {
    /// Create transport options for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            api_key: None,
            proxy: None,
            extra_headers: None,
        }
    }

    /// Read options from `LLAMA_SERVER_URL`, `LLAMA_API_KEY` and
    /// `LLAMA_TIMEOUT_SECS`. Unset variables fall back to the defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        let mut options = match lookup(ENV_BASE_URL) {
            Some(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        };

        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.is_empty()) {
            options.api_key = Some(key.into());
        }

        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ClientError::Config(format!("{ENV_TIMEOUT_SECS} must be whole seconds, got {secs:?}"))
            })?;
            options.timeout = Some(Duration::from_secs(secs));
        }

        Ok(options)
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
