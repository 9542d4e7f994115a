//! HTTP transport backed by reqwest.
//!
//! # Responsibilities
//! - ConfigFetcher: one GET against `{base}{fetch_path}?groupKeys=...`
//! - ChangeListener: one POST long-poll against `{base}{listener_path}`
//! - Map HTTP, decode and network failures onto `SyncError`
//! - Rotate to the next base URL on transport failure
//!
//! # Design Decisions
//! - The long-poll deadline is separate from, and longer than, the fetch timeout
//! - A client deadline firing is `SyncError::Timeout`, never a `ListenOutcome::Timeout`
//! - HTTP 304 from the listener is the server saying "nothing new"

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use crate::config::ClientEndpointConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::{ConfigSnapshot, DataGroup, ListenOutcome, ListenRequest};
use crate::transport::endpoints::Endpoints;
use crate::transport::wire::{decode_fetch, decode_listen};
use crate::transport::SyncTransport;

/// Query parameter naming each requested group.
const GROUP_KEY_PARAM: &str = "groupKeys";

/// reqwest-backed `SyncTransport`.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    endpoints: Endpoints,
    fetch_path: String,
    listener_path: String,
    fetch_timeout: Duration,
    listen_timeout: Duration,
}

impl HttpTransport {
    /// Build the transport from a validated endpoint config.
    pub fn new(config: &ClientEndpointConfig) -> SyncResult<Self> {
        let endpoints = Endpoints::new(config.endpoints())?;
        let client = Client::builder()
            .connect_timeout(config.fetch_timeout())
            .build()
            .map_err(|e| SyncError::InvalidEndpoint(format!("HTTP client setup failed: {}", e)))?;

        tracing::info!(
            endpoints = endpoints.len(),
            primary = %endpoints.current(),
            fetch_timeout_secs = config.connection_timeout,
            listen_timeout_secs = config.listen_timeout,
            "HTTP sync transport initialized"
        );

        Ok(Self {
            client,
            endpoints,
            fetch_path: config.fetch_path.clone(),
            listener_path: config.listener_path.clone(),
            fetch_timeout: config.fetch_timeout(),
            listen_timeout: config.listen_deadline(),
        })
    }

    /// Base URL the next call goes to.
    pub fn current_endpoint(&self) -> &str {
        self.endpoints.current()
    }

    fn network_failure(
        &self,
        base: &str,
        url: &str,
        timeout: Duration,
        e: reqwest::Error,
    ) -> SyncError {
        self.endpoints.rotate_from(base);
        if e.is_timeout() {
            SyncError::Timeout {
                url: url.to_string(),
                after: timeout,
            }
        } else {
            SyncError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }

    async fn read_body(
        &self,
        base: &str,
        url: &str,
        timeout: Duration,
        response: Response,
    ) -> SyncResult<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.network_failure(base, url, timeout, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn fetch(&self, groups: &[DataGroup]) -> SyncResult<ConfigSnapshot> {
        let base = self.endpoints.current().to_string();
        let url = format!("{}{}", base, self.fetch_path);
        let query: Vec<(&str, &str)> = groups
            .iter()
            .map(|g| (GROUP_KEY_PARAM, g.as_str()))
            .collect();

        tracing::debug!(url = %url, groups = ?groups, "Fetching config");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| self.network_failure(&base, &url, self.fetch_timeout, e))?;

        let body = self.read_body(&base, &url, self.fetch_timeout, response).await?;
        decode_fetch(&body)
    }

    async fn listen(&self, request: &ListenRequest) -> SyncResult<ListenOutcome> {
        let base = self.endpoints.current().to_string();
        let url = format!("{}{}", base, self.listener_path);

        tracing::debug!(url = %url, "Long-polling for changes");

        let response = self
            .client
            .post(&url)
            .json(&request.to_wire())
            .timeout(self.listen_timeout)
            .send()
            .await
            .map_err(|e| self.network_failure(&base, &url, self.listen_timeout, e))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(ListenOutcome::Timeout);
        }

        let body = self.read_body(&base, &url, self.listen_timeout, response).await?;
        decode_listen(&body)
    }
}
