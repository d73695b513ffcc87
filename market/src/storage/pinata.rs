//! Pinata pinning service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::traits::*;

/// Pinata connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinataConfig {
    /// Pinning API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Public gateway used to build media URIs
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Upload timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String { "https://api.pinata.cloud".to_string() }
fn default_gateway_url() -> String { "https://gateway.pinata.cloud".to_string() }
fn default_timeout() -> u64 { 300 }

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            gateway_url: default_gateway_url(),
            api_key: None,
            secret_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinResponse {
    ipfs_hash: String,
}

/// Media store that pins files to IPFS through Pinata.
pub struct PinataStore {
    config: PinataConfig,
    client: Client,
}

impl PinataStore {
    /// Create a store. Fails when credentials are missing.
    pub fn new(config: PinataConfig) -> Result<Self, StorageError> {
        let (api_key, secret_key) = match (&config.api_key, &config.secret_key) {
            (Some(k), Some(s)) if !k.is_empty() && !s.is_empty() => (k, s),
            _ => {
                return Err(StorageError::Unavailable(
                    "Pinata API key and secret key are required".to_string(),
                ))
            }
        };

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "pinata_api_key",
            header::HeaderValue::from_str(api_key)
                .map_err(|e| StorageError::Unavailable(format!("API key: {}", e)))?,
        );
        let mut secret = header::HeaderValue::from_str(secret_key)
            .map_err(|e| StorageError::Unavailable(format!("secret key: {}", e)))?;
        secret.set_sensitive(true);
        headers.insert("pinata_secret_api_key", secret);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn media_uri(&self, ipfs_hash: &str) -> String {
        format!("{}/ipfs/{}", self.config.gateway_url.trim_end_matches('/'), ipfs_hash)
    }
}

#[async_trait]
impl MediaStore for PinataStore {
    async fn upload(&self, file: &MediaFile) -> Result<String, StorageError> {
        let url = format!(
            "{}/pinning/pinFileToIPFS",
            self.config.api_url.trim_end_matches('/')
        );
        debug!(file = %file.file_name, bytes = file.bytes.len(), "Pinning media");

        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        let form = multipart::Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!(status, file = %file.file_name, "Pinning failed");
            return Err(StorageError::Server { status, message });
        }

        let pinned: PinResponse = response.json().await?;
        if pinned.ipfs_hash.is_empty() {
            return Err(StorageError::InvalidResponse("empty IpfsHash".to_string()));
        }

        let uri = self.media_uri(&pinned.ipfs_hash);
        info!(file = %file.file_name, %uri, "Media pinned");
        Ok(uri)
    }
}
