//! WebSocket endpoint derivation.
//!
//! Callers hand the channel whatever base URL they have configured (usually
//! the backend's HTTP address). [`Endpoint::parse`] turns it into the
//! WebSocket URL of the command channel:
//!
//! | Input                  | Endpoint               |
//! |------------------------|------------------------|
//! | `http://h:p[/x]`       | `ws://h:p/ws`          |
//! | `https://h:p[/x]`      | `wss://h:p/ws`         |
//! | `ws://h:p[/x][?q]`     | `ws://h:p[/x]/ws[?q]`  |
//! | `wss://h:p/ws`         | `wss://h:p/ws`         |
//! | `other://h:p[/x]`      | `ws://h:p/ws`          |
//! | `h:p` (bare host)      | `ws://h:p/ws`          |

use std::fmt;

use serde::Serialize;

use crate::error::LinkError;

/// Well-known path of the command channel on the backend.
pub const CHANNEL_PATH: &str = "/ws";

/// WebSocket URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WsScheme {
    /// Plain `ws://`.
    Ws,
    /// TLS `wss://`.
    Wss,
}

impl WsScheme {
    /// Returns the scheme without the `://` separator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

/// Resolved WebSocket address of the command channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    scheme: WsScheme,
    authority: String,
    path: String,
    query: Option<String>,
}

impl Endpoint {
    /// Derives the channel endpoint from a caller-supplied base URL.
    ///
    /// `https` maps to `wss` and any other scheme with a host to `ws`, both
    /// on the `/ws` path of the same host. WS(S) inputs keep their path and
    /// query and get `/ws` appended to the path unless it is already the
    /// suffix. Inputs that do not parse as a URL with a host fall back to
    /// literal prefix substitution, then to a bare host.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidEndpoint`] if the input is empty.
    pub fn parse(input: &str) -> Result<Self, LinkError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LinkError::InvalidEndpoint(input.to_string()));
        }

        if let Some(endpoint) = Self::from_url(trimmed) {
            return Ok(endpoint);
        }

        Ok(Self::from_literal(trimmed))
    }

    fn from_url(input: &str) -> Option<Self> {
        let url = reqwest::Url::parse(input).ok()?;
        let host = url.host_str()?;
        // Default ports of other schemes would otherwise vanish.
        let port = match url.scheme() {
            "http" | "https" | "ws" | "wss" => url.port(),
            _ => url.port_or_known_default(),
        };
        let authority = match port {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let (scheme, path, query) = match url.scheme() {
            "https" => (WsScheme::Wss, "", None),
            "wss" => (WsScheme::Wss, url.path(), url.query()),
            "ws" => (WsScheme::Ws, url.path(), url.query()),
            _ => (WsScheme::Ws, "", None),
        };

        Some(Self {
            scheme,
            authority,
            path: with_channel_suffix(path),
            query: query.map(str::to_string),
        })
    }

    fn from_literal(input: &str) -> Self {
        let (scheme, rest) = if let Some(rest) = input.strip_prefix("https://") {
            (WsScheme::Wss, rest)
        } else if let Some(rest) = input.strip_prefix("http://") {
            (WsScheme::Ws, rest)
        } else if let Some(rest) = input.strip_prefix("wss://") {
            (WsScheme::Wss, rest)
        } else if let Some(rest) = input.strip_prefix("ws://") {
            (WsScheme::Ws, rest)
        } else {
            (WsScheme::Ws, input)
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };

        Self {
            scheme,
            authority: authority.to_string(),
            path: with_channel_suffix(path),
            query: None,
        }
    }

    /// Returns the WebSocket scheme.
    #[must_use]
    pub const fn scheme(&self) -> WsScheme {
        self.scheme
    }

    /// Returns `host[:port]`.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns the request path, always ending in `/ws`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query string of a WS(S) input, without the `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the full WebSocket URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.authority, self.path)?;
        match &self.query {
            Some(query) => write!(f, "?{query}"),
            None => Ok(()),
        }
    }
}

fn with_channel_suffix(path: &str) -> String {
    let base = path.trim_end_matches('/');
    if base.ends_with(CHANNEL_PATH) {
        base.to_string()
    } else {
        format!("{base}{CHANNEL_PATH}")
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn derive(input: &str) -> String {
        match Endpoint::parse(input) {
            Ok(endpoint) => endpoint.url(),
            Err(e) => panic!("{input} failed to parse: {e}"),
        }
    }

    #[test]
    fn http_maps_to_ws() {
        assert_eq!(derive("http://10.0.0.5:3000"), "ws://10.0.0.5:3000/ws");
    }

    #[test]
    fn https_maps_to_wss() {
        assert_eq!(derive("https://10.0.0.5:3000"), "wss://10.0.0.5:3000/ws");
    }

    #[test]
    fn ws_schemes_are_kept() {
        assert_eq!(derive("ws://10.0.0.5:3000"), "ws://10.0.0.5:3000/ws");
        assert_eq!(derive("wss://10.0.0.5:3000"), "wss://10.0.0.5:3000/ws");
    }

    #[test]
    fn bare_host_is_wrapped() {
        assert_eq!(derive("10.0.0.5:3000"), "ws://10.0.0.5:3000/ws");
        assert_eq!(derive("localhost:3000"), "ws://localhost:3000/ws");
    }

    #[test]
    fn existing_suffix_is_not_doubled() {
        assert_eq!(derive("ws://10.0.0.5:3000/ws"), "ws://10.0.0.5:3000/ws");
        assert_eq!(derive("ws://10.0.0.5:3000/ws/"), "ws://10.0.0.5:3000/ws");
        assert_eq!(derive("10.0.0.5:3000/ws"), "ws://10.0.0.5:3000/ws");
    }

    #[test]
    fn http_path_is_replaced() {
        assert_eq!(derive("https://example.com/api/"), "wss://example.com/ws");
    }

    #[test]
    fn ws_path_is_extended() {
        assert_eq!(derive("ws://example.com/rover"), "ws://example.com/rover/ws");
    }

    #[test]
    fn other_schemes_map_to_ws() {
        assert_eq!(derive("tcp://10.0.0.5:3000"), "ws://10.0.0.5:3000/ws");
        assert_eq!(derive("ftp://rover.local:21/x"), "ws://rover.local:21/ws");
    }

    #[test]
    fn ws_query_is_kept() {
        assert_eq!(
            derive("ws://10.0.0.5:1/ws?token=abc"),
            "ws://10.0.0.5:1/ws?token=abc"
        );
        assert_eq!(
            derive("wss://rover.local/api/?token=abc&v=2"),
            "wss://rover.local/api/ws?token=abc&v=2"
        );
        assert_eq!(derive("https://rover.local/api?token=abc"), "wss://rover.local/ws");
    }

    #[test]
    fn unparseable_http_falls_back_to_prefix_substitution() {
        assert_eq!(derive("http://bad host:1"), "ws://bad host:1/ws");
        assert_eq!(derive("https://bad host"), "wss://bad host/ws");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(Endpoint::parse("   ").is_err());
    }

    #[test]
    fn accessors_expose_parts() {
        let Ok(endpoint) = Endpoint::parse("https://rover.local:8443") else {
            panic!("parse failed");
        };
        assert_eq!(endpoint.scheme(), WsScheme::Wss);
        assert_eq!(endpoint.authority(), "rover.local:8443");
        assert_eq!(endpoint.path(), "/ws");
    }
}
