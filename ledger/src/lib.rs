//! Vidmarket Ledger - client-side ledger plumbing
//!
//! Everything the marketplace client needs to talk to a Solana cluster,
//! without knowing anything about the marketplace program itself:
//! - Keys, instructions, messages and transactions from `solana-sdk`
//! - The wire form `sendTransaction` expects
//! - The `LedgerGateway` seam with a JSON-RPC implementation
//! - The `Wallet` seam with a local keypair implementation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   sign    ┌──────────────┐
//! │ Transaction  │◀──────────│    Wallet    │
//! │  (message +  │           │  (keypair /  │
//! │  signatures) │           │   external)  │
//! └──────┬───────┘           └──────────────┘
//!        │ submit
//!        ▼
//! ┌──────────────┐  JSON-RPC  ┌──────────────┐
//! │LedgerGateway │───────────▶│  RPC node    │
//! │ (RpcGateway) │            │              │
//! └──────────────┘            └──────────────┘
//! ```

pub mod gateway;
pub mod transaction;
pub mod wallet;

// Re-export main types for convenience
pub use gateway::{
    Cluster, Commitment, GatewayError, LedgerGateway, ProgramAccount, RpcConfig, RpcGateway,
};
pub use solana_sdk::hash::Hash;
pub use solana_sdk::instruction::{AccountMeta, Instruction};
pub use solana_sdk::message::Message;
pub use solana_sdk::pubkey::Pubkey;
pub use solana_sdk::signature::{Keypair, Signature, Signer};
pub use solana_sdk::system_program;
pub use solana_sdk::transaction::Transaction;
pub use transaction::{to_base64, transaction_id, WireError};
pub use wallet::{sign_with, KeypairWallet, Wallet, WalletError};
