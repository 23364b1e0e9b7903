//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Variable                 | Default                 |
//! |--------------------------|-------------------------|
//! | `SERVER_URL`             | `http://localhost:8080` |
//! | `RECONNECT_DELAY_MS`     | `2000`                  |
//! | `MAX_RECONNECT_ATTEMPTS` | `5`                     |
//! | `DEFAULT_SPEED`          | `150`                   |
//! | `HTTP_TIMEOUT_SECS`      | `10`                    |
//! | `AUTO_CONNECT`           | `true`                  |

use std::time::Duration;

use crate::domain::Speed;
use crate::error::LinkError;

/// Reconnect and send defaults for one command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Reconnect attempts allowed before the channel gives up.
    pub max_reconnect_attempts: u32,
    /// Speed used by `send_default`.
    pub default_speed: Speed,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(2000),
            max_reconnect_attempts: 5,
            default_speed: Speed::default(),
        }
    }
}

/// Top-level client configuration.
///
/// Loaded once at startup via [`LinkConfig::from_env`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Backend base URL, HTTP(S) or WS(S).
    pub server_url: String,

    /// Command channel settings.
    pub channel: ChannelConfig,

    /// Timeout applied to every REST request.
    pub http_timeout: Duration,

    /// Whether the binary connects the channel at startup.
    pub auto_connect: bool,
}

impl LinkConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or does not parse.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Config`] if `SERVER_URL` is set but empty, or
    /// `DEFAULT_SPEED` is set outside `0..=255`.
    pub fn from_env() -> Result<Self, LinkError> {
        dotenvy::dotenv().ok();

        let server_url =
            std::env::var("SERVER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        if server_url.trim().is_empty() {
            return Err(LinkError::Config("SERVER_URL is empty".to_string()));
        }

        let defaults = ChannelConfig::default();
        let reconnect_delay = Duration::from_millis(parse_env(
            "RECONNECT_DELAY_MS",
            u64::try_from(defaults.reconnect_delay.as_millis()).unwrap_or(2000),
        ));
        let max_reconnect_attempts =
            parse_env("MAX_RECONNECT_ATTEMPTS", defaults.max_reconnect_attempts);

        let default_speed = match std::env::var("DEFAULT_SPEED") {
            Ok(raw) => raw
                .parse::<Speed>()
                .map_err(|e| LinkError::Config(format!("DEFAULT_SPEED: {e}")))?,
            Err(_) => defaults.default_speed,
        };

        let http_timeout = Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 10));
        let auto_connect = parse_env_bool("AUTO_CONNECT", true);

        Ok(Self {
            server_url,
            channel: ChannelConfig {
                reconnect_delay,
                max_reconnect_attempts,
                default_speed,
            },
            http_timeout,
            auto_connect,
        })
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

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    parse_bool(std::env::var(key).ok().as_deref(), default)
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
