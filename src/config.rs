//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), with defaults for everything except
//! the credential.

use std::time::Duration;

use reqwest::Url;

use crate::error::ChatError;

/// Default backend base URL.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:4000";

/// Top-level client configuration.
///
/// Loaded once at startup via [`ClientConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP(S) base URL of the chat backend. The duplex endpoint is derived
    /// from it.
    pub api_base: Url,

    /// Bearer token, if one was provided through the environment.
    pub token: Option<String>,

    /// How long a send may wait for its reply before it resolves as an
    /// error. `None` waits forever.
    pub reply_timeout: Option<Duration>,

    /// Upper bound on the WebSocket handshake.
    pub connect_timeout: Duration,

    /// Timeout for `/chats` and `/upload` requests.
    pub request_timeout: Duration,

    /// Capacity of the session EventBus broadcast channel.
    pub event_bus_capacity: usize,
}

impl ClientConfig {
    /// Builds a configuration for `api_base` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidEndpoint`] if `api_base` is not an
    /// absolute `http`/`https` URL.
    pub fn new(api_base: &str) -> Result<Self, ChatError> {
        Ok(Self {
            api_base: parse_api_base(api_base)?,
            token: None,
            reply_timeout: Some(Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            event_bus_capacity: 1024,
        })
    }

    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// | Variable                    | Default                  |
    /// |-----------------------------|--------------------------|
    /// | `CHAT_API_BASE`             | `http://127.0.0.1:4000`  |
    /// | `CHAT_TOKEN`                | unset                    |
    /// | `CHAT_REPLY_TIMEOUT_SECS`   | `30` (`0` disables)      |
    /// | `CHAT_CONNECT_TIMEOUT_SECS` | `10`                     |
    /// | `CHAT_REQUEST_TIMEOUT_SECS` | `30`                     |
    /// | `CHAT_EVENT_BUS_CAPACITY`   | `1024`                   |
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidEndpoint`] if `CHAT_API_BASE` is set but
    /// is not an `http`/`https` URL.
    pub fn from_env() -> Result<Self, ChatError> {
        dotenvy::dotenv().ok();

        let api_base =
            std::env::var("CHAT_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let mut config = Self::new(&api_base)?;

        config.token = std::env::var("CHAT_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());
        config.reply_timeout = match parse_env("CHAT_REPLY_TIMEOUT_SECS", 30_u64) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        config.connect_timeout = Duration::from_secs(parse_env("CHAT_CONNECT_TIMEOUT_SECS", 10));
        config.request_timeout = Duration::from_secs(parse_env("CHAT_REQUEST_TIMEOUT_SECS", 30));
        config.event_bus_capacity = parse_env("CHAT_EVENT_BUS_CAPACITY", 1024);

        Ok(config)
    }

    /// Sets the reply timeout.
    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sets the token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

fn parse_api_base(raw: &str) -> Result<Url, ChatError> {
    let url = Url::parse(raw).map_err(|e| ChatError::InvalidEndpoint(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ChatError::InvalidEndpoint(format!(
            "{raw}: expected http or https, got `{other}`"
        ))),
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
