//! JSON-RPC ledger gateway.
//!
//! Speaks the Solana JSON-RPC dialect:
//! - `getProgramAccounts` with base64 account data
//! - `getLatestBlockhash`
//! - `sendTransaction` with a base64 wire transaction
//! - `getSignatureStatuses`, polled until the configured commitment

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use super::traits::*;
use crate::transaction::{to_base64, transaction_id};

/// Well-known clusters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
    Localnet,
}

impl Cluster {
    pub fn url(&self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Localnet => "http://127.0.0.1:8899",
        }
    }
}

/// How final a transaction must be before it counts as confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    fn parse(status: &str) -> Option<Self> {
        match status {
            "processed" => Some(Commitment::Processed),
            "confirmed" => Some(Commitment::Confirmed),
            "finalized" => Some(Commitment::Finalized),
            _ => None,
        }
    }

    /// Whether a reported `confirmationStatus` satisfies this level.
    pub fn is_reached_by(&self, status: Option<&str>) -> bool {
        status.and_then(Commitment::parse).is_some_and(|s| s >= *self)
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RPC gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Cluster preset, used when `url` is not set
    #[serde(default)]
    pub cluster: Cluster,

    /// Explicit RPC URL (overrides `cluster`)
    #[serde(default)]
    pub url: Option<String>,

    /// Commitment required for reads and confirmations
    #[serde(default)]
    pub commitment: Commitment,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long to wait for a submitted transaction to confirm
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_ms: u64,

    /// Delay between signature status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_request_timeout() -> u64 { 30 }
fn default_confirm_timeout() -> u64 { 60_000 }
fn default_poll_interval() -> u64 { 500 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::default(),
            url: None,
            commitment: Commitment::default(),
            request_timeout_secs: default_request_timeout(),
            confirm_timeout_ms: default_confirm_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl RpcConfig {
    /// Configuration pointing at an explicit URL.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn endpoint(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| self.cluster.url().to_string())
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `{ context, value }` wrapper used by most read methods.
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct KeyedAccount {
    pubkey: String,
    account: AccountInfo,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    /// `[payload, encoding]`
    data: (String, String),
    lamports: u64,
}

#[derive(Debug, Deserialize)]
struct BlockhashInfo {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    err: Option<Value>,
    confirmation_status: Option<String>,
}

/// Why a single JSON-RPC call failed.
#[derive(Debug)]
enum CallError {
    Transport(reqwest::Error),
    Status(u16, String),
    Rpc { code: i64, message: String },
    Parse(String),
}

impl CallError {
    /// Mapping for calls that never change ledger state.
    fn into_read_error(self) -> GatewayError {
        match self {
            CallError::Transport(e) => GatewayError::Unreachable(e.to_string()),
            CallError::Status(status, body) => {
                GatewayError::Unreachable(format!("HTTP {}: {}", status, body))
            }
            CallError::Rpc { code, message } => {
                GatewayError::InvalidResponse(format!("RPC error {}: {}", code, message))
            }
            CallError::Parse(e) => GatewayError::InvalidResponse(e),
        }
    }
}

/// Gateway backed by a JSON-RPC node.
pub struct RpcGateway {
    client: Client,
    endpoint: String,
    config: RpcConfig,
    next_id: AtomicU64,
}

impl RpcGateway {
    /// Create a new gateway for the configured endpoint.
    pub fn new(config: RpcConfig) -> Result<Self, GatewayError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GatewayError::Unreachable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a gateway for a cluster preset with default settings.
    pub fn for_cluster(cluster: Cluster) -> Result<Self, GatewayError> {
        Self::new(RpcConfig {
            cluster,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, endpoint = %self.endpoint, "RPC request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(CallError::Transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Status(status, body));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| CallError::Parse(e.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(CallError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        envelope
            .result
            .ok_or_else(|| CallError::Parse(format!("{} returned no result", method)))
    }

    async fn await_confirmation(&self, signature: Signature) -> Result<Signature, GatewayError> {
        let timeout = Duration::from_millis(self.config.confirm_timeout_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let started = tokio::time::Instant::now();

        loop {
            let params = json!([[signature.to_string()], { "searchTransactionHistory": false }]);
            match self
                .call::<WithContext<Vec<Option<SignatureStatus>>>>("getSignatureStatuses", params)
                .await
            {
                Ok(statuses) => {
                    if let Some(Some(status)) = statuses.value.into_iter().next() {
                        if let Some(err) = status.err {
                            return Err(GatewayError::Rejected(err.to_string()));
                        }
                        if self
                            .config
                            .commitment
                            .is_reached_by(status.confirmation_status.as_deref())
                        {
                            return Ok(signature);
                        }
                    }
                }
                // A failed poll says nothing about the transaction itself
                Err(e) => debug!(%signature, error = ?e, "Signature status poll failed"),
            }

            if started.elapsed() >= timeout {
                return Err(GatewayError::Timeout {
                    signature: Some(signature),
                    detail: format!(
                        "{} not {} after {}ms",
                        signature, self.config.commitment, self.config.confirm_timeout_ms
                    ),
                });
            }
            tokio::time::sleep(poll).await;
        }
    }
}

#[async_trait]
impl LedgerGateway for RpcGateway {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn list_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<ProgramAccount>, GatewayError> {
        let params = json!([
            program_id.to_string(),
            { "encoding": "base64", "commitment": self.config.commitment.as_str() }
        ]);
        let keyed: Vec<KeyedAccount> = self
            .call("getProgramAccounts", params)
            .await
            .map_err(CallError::into_read_error)?;

        keyed
            .into_iter()
            .map(|k| {
                let address: Pubkey = k
                    .pubkey
                    .parse()
                    .map_err(|e| GatewayError::InvalidResponse(format!("pubkey: {}", e)))?;
                let (payload, encoding) = k.account.data;
                if encoding != "base64" {
                    return Err(GatewayError::InvalidResponse(format!(
                        "unexpected account encoding {}",
                        encoding
                    )));
                }
                let data = base64::engine::general_purpose::STANDARD
                    .decode(payload)
                    .map_err(|e| GatewayError::InvalidResponse(format!("account data: {}", e)))?;
                Ok(ProgramAccount {
                    address,
                    data,
                    lamports: k.account.lamports,
                })
            })
            .collect()
    }

    async fn latest_blockhash(&self) -> Result<Hash, GatewayError> {
        let params = json!([{ "commitment": self.config.commitment.as_str() }]);
        let info: WithContext<BlockhashInfo> = self
            .call("getLatestBlockhash", params)
            .await
            .map_err(CallError::into_read_error)?;
        info.value
            .blockhash
            .parse()
            .map_err(|e| GatewayError::InvalidResponse(format!("blockhash: {}", e)))
    }

    async fn submit_transaction(&self, transaction: &Transaction) -> Result<Signature, GatewayError> {
        let signature = transaction_id(transaction);
        let wire = to_base64(transaction).map_err(|e| GatewayError::Rejected(e.to_string()))?;
        let params = json!([
            wire,
            { "encoding": "base64", "preflightCommitment": self.config.commitment.as_str() }
        ]);

        let reported: String = match self.call("sendTransaction", params).await {
            Ok(sig) => sig,
            Err(CallError::Transport(e)) if e.is_connect() => {
                return Err(GatewayError::Unreachable(e.to_string()));
            }
            Err(CallError::Transport(e)) => {
                warn!(%signature, error = %e, "Transaction sent but response lost");
                return Err(GatewayError::Timeout {
                    signature: Some(signature),
                    detail: e.to_string(),
                });
            }
            // A gateway in front of the node may have forwarded it already
            Err(CallError::Status(status, body)) if status >= 500 => {
                warn!(%signature, status, "Transaction sent but node answered with an error");
                return Err(GatewayError::Timeout {
                    signature: Some(signature),
                    detail: format!("HTTP {}: {}", status, body),
                });
            }
            Err(CallError::Status(status, body)) => {
                return Err(GatewayError::Unreachable(format!("HTTP {}: {}", status, body)));
            }
            Err(CallError::Rpc { code, message }) => {
                return Err(GatewayError::Rejected(format!("{} (code {})", message, code)));
            }
            Err(CallError::Parse(e)) => {
                return Err(GatewayError::Timeout {
                    signature: Some(signature),
                    detail: e,
                });
            }
        };

        if reported != signature.to_string() {
            warn!(expected = %signature, %reported, "Node reported a different signature");
        }

        let confirmed = self.await_confirmation(signature).await?;
        info!(signature = %confirmed, commitment = %self.config.commitment, "Transaction confirmed");
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_urls() {
        assert_eq!(
            RpcConfig::default().endpoint(),
            "https://api.devnet.solana.com"
        );
        assert_eq!(
            RpcConfig::with_url("http://localhost:9000").endpoint(),
            "http://localhost:9000"
        );
    }

    #[test]
    fn test_commitment_ordering() {
        let confirmed = Commitment::Confirmed;
        assert!(!confirmed.is_reached_by(None));
        assert!(!confirmed.is_reached_by(Some("processed")));
        assert!(confirmed.is_reached_by(Some("confirmed")));
        assert!(confirmed.is_reached_by(Some("finalized")));
        assert!(!Commitment::Finalized.is_reached_by(Some("confirmed")));
    }

    #[test]
    fn test_config_defaults_fill_in() {
        let config: RpcConfig = serde_json::from_str(r#"{"cluster": "mainnet-beta"}"#).unwrap();
        assert_eq!(config.cluster, Cluster::MainnetBeta);
        assert_eq!(config.commitment, Commitment::Confirmed);
        assert_eq!(config.confirm_timeout_ms, 60_000);
    }
}
