//! HTTP client for communicating with the hub
//!
//! Talks JSON over localhost HTTP. Error bodies from the hub carry a
//! taxonomy kind; the client folds kind and message into one error so
//! command code can just print it.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;

use mr_core::api::{
    CreateInstanceRequest, CreateInstanceResponse, ErrorBody, HubStatus, InstanceStatusInfo,
    InstanceSummary, PairingInfo, SendMessageRequest, SendMessageResponse,
};
use mr_core::config::{self, HubConfig};

/// Resolve the hub address the way the daemon does: config file when
/// present, built-in default otherwise.
pub fn default_hub_address() -> String {
    let default_path = config::default_config_path();
    if default_path.exists() {
        if let Ok(config) = config::load_config::<HubConfig>(&default_path) {
            return config.bind_address;
        }
    }
    HubConfig::default().bind_address
}

/// Client for communicating with the hub daemon
pub struct HubClient {
    base_url: String,
    http: reqwest::Client,
}

impl HubClient {
    /// Create a client pointed at the configured hub address
    pub fn new() -> Self {
        Self::with_address(default_hub_address())
    }

    /// Create a client with a custom `host:port` address
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            base_url: format!("http://{}", address.into()),
            http: reqwest::Client::new(),
        }
    }

    pub async fn list_instances(&self) -> Result<Vec<InstanceSummary>> {
        let response = self
            .http
            .get(format!("{}/instances", self.base_url))
            .send()
            .await
            .context("Failed to reach hub. Is it running?")?;
        decode(response).await
    }

    pub async fn create_instance(
        &self,
        instance_id: Option<String>,
        name: Option<String>,
    ) -> Result<CreateInstanceResponse> {
        let response = self
            .http
            .post(format!("{}/instances", self.base_url))
            .json(&CreateInstanceRequest { instance_id, name })
            .send()
            .await
            .context("Failed to reach hub. Is it running?")?;
        decode(response).await
    }

    pub async fn pairing(&self, instance_id: &str) -> Result<PairingInfo> {
        let response = self
            .http
            .get(format!("{}/instances/{}/qr", self.base_url, instance_id))
            .send()
            .await
            .context("Failed to reach hub. Is it running?")?;
        decode(response).await
    }

    pub async fn instance_status(&self, instance_id: &str) -> Result<InstanceStatusInfo> {
        let response = self
            .http
            .get(format!(
                "{}/instances/{}/status",
                self.base_url, instance_id
            ))
            .send()
            .await
            .context("Failed to reach hub. Is it running?")?;
        decode(response).await
    }

    pub async fn reset_instance(&self, instance_id: &str) -> Result<CreateInstanceResponse> {
        let response = self
            .http
            .post(format!("{}/instances/{}/reset", self.base_url, instance_id))
            .send()
            .await
            .context("Failed to reach hub. Is it running?")?;
        decode(response).await
    }

    pub async fn disconnect_instance(&self, instance_id: &str) -> Result<()> {
        let response = self
            .http
            .post(format!(
                "{}/instances/{}/disconnect",
                self.base_url, instance_id
            ))
            .send()
            .await
            .context("Failed to reach hub. Is it running?")?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(decode_error(response).await)
        }
    }

    pub async fn hub_status(&self) -> Result<HubStatus> {
        let response = self
            .http
            .get(format!("{}/status", self.base_url))
            .send()
            .await
            .context("Failed to reach hub. Is it running?")?;
        decode(response).await
    }

    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<SendMessageResponse> {
        let response = self
            .http
            .post(format!("{}/send-message", self.base_url))
            .json(request)
            .send()
            .await
            .context("Failed to reach hub. Is it running?")?;
        decode(response).await
    }
}

impl Default for HubClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if response.status().is_success() {
        response
            .json()
            .await
            .context("Failed to decode hub response")
    } else {
        Err(decode_error(response).await)
    }
}

async fn decode_error(response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => anyhow!("{} ({})", body.message, body.error),
        Err(_) => anyhow!("Hub returned {}", status),
    }
}
