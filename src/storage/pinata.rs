//! Pinata pinning API + IPFS gateway blob store

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::config::BlobStoreConfig;
use crate::error::{AppError, Result};
use crate::storage::provider::is_valid_content_id;
use crate::storage::BlobStore;

/// Response of `POST /pinning/pinFileToIPFS`
#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
    #[serde(rename = "PinSize", default)]
    pin_size: u64,
}

/// Blob store that pins to IPFS through Pinata and reads through a gateway
pub struct PinataStore {
    client: reqwest::Client,
    jwt: String,
    api_url: String,
    gateway_url: String,
}

impl PinataStore {
    pub fn new(config: &BlobStoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwt: config.pinata_jwt.clone(),
            api_url: config.pinata_api_url.trim_end_matches('/').to_string(),
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn gateway(&self, content_id: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url, content_id)
    }

    fn check_id(content_id: &str) -> Result<()> {
        if !is_valid_content_id(content_id) {
            return Err(AppError::UpstreamUnavailable(format!(
                "Invalid content id: {}",
                content_id
            )));
        }
        Ok(())
    }

    /// Check that the configured JWT is accepted
    pub async fn verify_credentials(&self) -> Result<()> {
        let res = self
            .client
            .get(self.api("/data/testAuthentication"))
            .bearer_auth(&self.jwt)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Pinata unreachable: {}", e)))?;

        if !res.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "Pinata authentication failed: {}",
                res.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for PinataStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<String> {
        let size = data.len();
        let part = Part::bytes(data.to_vec())
            .file_name(name.to_string())
            .mime_str("application/octet-stream")?;
        let metadata = serde_json::json!({ "name": name }).to_string();
        let form = Form::new()
            .part("file", part)
            .text("pinataMetadata", metadata);

        let res = self
            .client
            .post(self.api("/pinning/pinFileToIPFS"))
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Pinata unreachable: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::UpstreamUnavailable(format!(
                "Pinata upload failed: [{}] {}",
                status, body
            )));
        }

        let pin: PinResponse = res
            .json()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Invalid Pinata response: {}", e)))?;

        tracing::info!(
            "Pinned {} ({} bytes, pin size {}) as {}",
            name,
            size,
            pin.pin_size,
            pin.ipfs_hash
        );
        Ok(pin.ipfs_hash)
    }

    async fn get(&self, content_id: &str) -> Result<Bytes> {
        Self::check_id(content_id)?;

        let res = self
            .client
            .get(self.gateway(content_id))
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Gateway unreachable: {}", e)))?;

        if !res.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "Failed to fetch {} from IPFS: {}",
                content_id,
                res.status()
            )));
        }

        res.bytes()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Gateway read failed: {}", e)))
    }

    async fn unpin(&self, content_id: &str) -> Result<()> {
        Self::check_id(content_id)?;

        let res = self
            .client
            .delete(self.api(&format!("/pinning/unpin/{}", content_id)))
            .bearer_auth(&self.jwt)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Pinata unreachable: {}", e)))?;

        if !res.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "Pinata unpin of {} failed: {}",
                content_id,
                res.status()
            )));
        }

        tracing::info!("Unpinned {}", content_id);
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "pinata"
    }
}
