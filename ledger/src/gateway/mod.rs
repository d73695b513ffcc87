//! Ledger gateway abstraction layer.
//!
//! Provides a trait-based interface over the ledger node:
//! - JSON-RPC node (devnet, mainnet-beta, testnet, localnet or custom URL)
//! - In-memory ledgers for testing live with the program that knows how
//!   to execute instructions (see `vidmarket::mock`)

pub mod rpc;
pub mod traits;

pub use rpc::{Cluster, Commitment, RpcConfig, RpcGateway};
pub use traits::{GatewayError, LedgerGateway, ProgramAccount};
