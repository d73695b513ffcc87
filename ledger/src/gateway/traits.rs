//! Core trait for ledger gateways.
//!
//! This module defines the `LedgerGateway` trait - the seam between the
//! marketplace client and whatever node or simulator executes transactions.

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

/// Error types for gateway operations.
///
/// Callers must be able to tell "nothing happened" apart from "something
/// may have happened": only `Timeout` leaves a submitted transaction's
/// outcome unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The node could not be reached; no transaction was accepted
    #[error("Ledger unreachable: {0}")]
    Unreachable(String),

    /// A submitted transaction may have been forwarded but was not
    /// confirmed in time, or its answer was lost or unreadable
    #[error("Confirmation timed out: {detail}")]
    Timeout {
        signature: Option<Signature>,
        detail: String,
    },

    /// The node or the program refused the transaction
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// The node answered with something we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Whether a submitted transaction might still land on the ledger.
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }
}

/// A raw account owned by a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAccount {
    pub address: Pubkey,
    pub data: Vec<u8>,
    pub lamports: u64,
}

/// Core trait for ledger gateways.
///
/// Implementations are shared between sessions behind an `Arc`, so every
/// method takes `&self` and must be safe to call concurrently.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// The network endpoint this gateway talks to.
    fn endpoint(&self) -> &str;

    /// List every account owned by `program_id`.
    async fn list_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<ProgramAccount>, GatewayError>;

    /// Fetch a recent blockhash to anchor a new transaction.
    async fn latest_blockhash(&self) -> Result<Hash, GatewayError>;

    /// Submit a signed transaction and wait for confirmation.
    ///
    /// Resolves with the transaction signature once the ledger confirms it.
    /// Implementations never resubmit on their own.
    async fn submit_transaction(&self, transaction: &Transaction) -> Result<Signature, GatewayError>;
}
