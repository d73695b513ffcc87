//! Marketplace error types.

use vidmarket_ledger::{GatewayError, Pubkey, Signature, WalletError};

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Errors returned by catalog and mint sessions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    /// Listing records from the ledger failed
    #[error("Catalog load failed: {0}")]
    LoadFailed(String),

    /// Draft is missing a field or has an unusable price
    #[error("Invalid draft: {0}")]
    InvalidDraft(String),

    /// Media could not be stored
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The ledger refused the transaction
    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    /// Submitted but not confirmed; it may still land. `signature` is the
    /// transaction id when the gateway knows it
    #[error("Transaction {} unconfirmed: {reason}", describe_signature(.signature))]
    TransactionUnconfirmed {
        signature: Option<Signature>,
        reason: String,
    },

    /// The wallet declined to sign
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Nothing was sent; the ledger could not be reached
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The catalog has not finished loading
    #[error("Catalog not ready")]
    NotReady,

    /// No record with this id in the current catalog
    #[error("Unknown record: {0}")]
    UnknownRecord(Pubkey),

    /// A purchase of this record is already underway
    #[error("Purchase already in flight: {0}")]
    PurchaseInFlight(Pubkey),

    /// Another mint is underway in this session
    #[error("Mint already in progress")]
    MintInProgress,

    /// The wallet failed for a reason other than the user declining
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Bad configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MarketError {
    /// Map a gateway failure during transaction submission.
    pub fn from_submission(err: GatewayError) -> Self {
        match err {
            GatewayError::Unreachable(msg) => MarketError::NetworkUnreachable(msg),
            GatewayError::Rejected(msg) => MarketError::TransactionRejected(msg),
            GatewayError::Timeout { signature, detail } => MarketError::TransactionUnconfirmed {
                signature,
                reason: detail,
            },
            // An unreadable answer to a send says nothing about the transaction
            GatewayError::InvalidResponse(msg) => MarketError::TransactionUnconfirmed {
                signature: None,
                reason: msg,
            },
        }
    }

    /// Whether the transaction may still land on the ledger.
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, MarketError::TransactionUnconfirmed { .. })
    }

    /// Map a gateway failure that happened before anything was sent.
    pub fn from_preparation(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(msg) => MarketError::TransactionRejected(msg),
            other => MarketError::NetworkUnreachable(other.to_string()),
        }
    }
}

fn describe_signature(signature: &Option<Signature>) -> String {
    signature
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "(signature unknown)".to_string())
}

impl From<WalletError> for MarketError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Declined(msg) => MarketError::Cancelled(msg),
            other => MarketError::Wallet(other.to_string()),
        }
    }
}

impl From<StorageError> for MarketError {
    fn from(err: StorageError) -> Self {
        MarketError::UploadFailed(err.to_string())
    }
}

impl From<ConfigError> for MarketError {
    fn from(err: ConfigError) -> Self {
        MarketError::Config(err.to_string())
    }
}
