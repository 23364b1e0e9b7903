//! HTTP client for the backend's vehicle endpoints.
//!
//! [`RestClient`] is the request/response alternative to the command
//! channel. It accepts the same [`Command`] vocabulary and [`Speed`] range.

use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;

use super::dto::{ClientList, ControlRequest, ControlResponse};
use crate::domain::{Command, Speed, VehicleStatus};
use crate::error::LinkError;

const MAX_ERROR_BODY: usize = 512;

/// Client for `POST /car/control`, `GET /car/status` and `GET /car/clients`.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    /// Creates a client for the backend at `base_url`.
    ///
    /// `base_url` may use any of `http`, `https`, `ws`, `wss` or be a bare
    /// `host:port`; WebSocket schemes are mapped to their HTTP equivalents.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidEndpoint`] if the URL cannot be parsed, or
    /// [`LinkError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LinkError> {
        let base_url = http_base(base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// Returns the HTTP base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends `command` at `speed` via `POST /car/control`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Http`] on transport failure and
    /// [`LinkError::Status`] on a non-success response.
    pub async fn send_command(
        &self,
        command: Command,
        speed: Speed,
    ) -> Result<ControlResponse, LinkError> {
        let url = self.url("/car/control")?;
        let body = ControlRequest { command, speed };
        tracing::debug!(%url, %command, %speed, "posting command");

        let response = self.http.post(url).json(&body).send().await?;
        decode(response).await
    }

    /// Fetches the vehicle status via `GET /car/status`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Http`] on transport failure and
    /// [`LinkError::Status`] on a non-success response.
    pub async fn status(&self) -> Result<VehicleStatus, LinkError> {
        let url = self.url("/car/status")?;
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    /// Lists the clients attached to the backend via `GET /car/clients`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Http`] on transport failure and
    /// [`LinkError::Status`] on a non-success response.
    pub async fn clients(&self) -> Result<ClientList, LinkError> {
        let url = self.url("/car/clients")?;
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    fn url(&self, path: &str) -> Result<Url, LinkError> {
        self.base_url
            .join(path)
            .map_err(|e| LinkError::InvalidRequest(format!("bad path {path}: {e}")))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LinkError> {
    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut = cut.saturating_sub(1);
            }
            body.truncate(cut);
        }
        tracing::warn!(status = status.as_u16(), "backend returned an error status");
        return Err(LinkError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}

/// Maps a caller-supplied base URL onto its HTTP(S) form.
fn http_base(input: &str) -> Result<Url, LinkError> {
    let trimmed = input.trim();
    let candidate = if let Some(rest) = trimmed.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("ws://") {
        format!("http://{rest}")
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some() => Ok(url),
        _ => Err(LinkError::InvalidEndpoint(input.to_string())),
    }
}
