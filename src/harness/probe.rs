//! The single proxied request that decides an attempt.

use std::time::Duration;

use reqwest::{Proxy, StatusCode};
use thiserror::Error;

use crate::config::ProbeConfig;

/// Why a probe did not succeed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe client")]
    Client(#[source] reqwest::Error),

    #[error("probe request failed")]
    Request(#[source] reqwest::Error),

    #[error("probe returned unexpected status {0}")]
    Status(StatusCode),
}

/// Fixed probe target and success criteria for the run.
#[derive(Debug, Clone)]
pub struct Probe {
    url: String,
    success_statuses: Vec<u16>,
    timeout: Duration,
}

impl Probe {
    pub fn new(url: impl Into<String>, success_statuses: Vec<u16>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            success_statuses,
            timeout,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            config.url.clone(),
            config.success_statuses.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn is_success(&self, status: StatusCode) -> bool {
        self.success_statuses.contains(&status.as_u16())
    }

    /// Send exactly one GET (redirects not followed) through the HTTP proxy at `127.0.0.1:port`.
    pub async fn send(&self, port: u16) -> Result<StatusCode, ProbeError> {
        let proxy = Proxy::all(format!("http://127.0.0.1:{port}")).map_err(ProbeError::Client)?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(self.timeout)
            .user_agent(concat!("ruleset-probe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ProbeError::Client)?;

        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(ProbeError::Request)?;

        let status = response.status();
        if self.is_success(status) {
            Ok(status)
        } else {
            Err(ProbeError::Status(status))
        }
    }
}
