//! Vidmarket - pay-per-view content marketplace client
//!
//! Creators mint records that describe a piece of media and its price;
//! viewers browse the records, pay the creator and unlock playback. The
//! records live in accounts of an on-ledger program; this crate is the
//! client side of that program.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐               ┌──────────────────┐
//! │   MintSession    │               │  CatalogSession  │
//! │ draft ─▶ upload  │               │ load ─▶ purchase │
//! └───┬─────────┬────┘               └────┬────────┬────┘
//!     │         │ mint_video   pay_to_play│        │ list
//!     ▼         ▼                         ▼        ▼
//! ┌────────┐  ┌──────────────────────────────────────────┐
//! │ Media  │  │              LedgerGateway               │
//! │ Store  │  │   (records written by one session are    │
//! └────────┘  │    read back by the other via decode)    │
//!             └──────────────────────────────────────────┘
//! ```
//!
//! Both sessions sign through an injected `Wallet`. Nothing is persisted
//! beyond the session; a catalog reload forgets which records were unlocked
//! before it started.

pub mod catalog;
pub mod config;
pub mod error;
pub mod instruction;
pub mod mint;
pub mod mock;
pub mod price;
pub mod program;
pub mod record;
pub mod schema;
pub mod service;
pub mod state;
pub mod storage;

anchor_lang::declare_id!("4WpWUh3unfvEHRfmiRMDgRxcvMAaZ5hCn16KaVMDoy8x");

// Re-export main types for convenience
pub use catalog::{
    Catalog, CatalogSession, CatalogState, LoadSummary, PurchaseOutcome, PurchaseReceipt,
};
pub use config::{ConfigError, MarketConfig};
pub use error::MarketError;
pub use instruction::{MintVideo, PayToPlay};
pub use mint::{MintDraft, MintReceipt, MintSession, MintState};
pub use price::{display_to_minor, minor_to_display, PriceError, LAMPORTS_PER_SOL};
pub use program::{PaymentIntent, DEFAULT_PROGRAM_ID};
pub use record::ContentRecord;
pub use schema::{decode_record, encode_record, MalformedRecord, RecordSchema, VIDEO_RECORD_V1};
pub use service::Marketplace;
pub use state::Video;
pub use storage::{MediaFile, MediaStore, PinataConfig, PinataStore, StorageError};

pub use vidmarket_ledger as ledger;
