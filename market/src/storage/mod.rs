//! Media storage collaborators.
//!
//! Minting uploads the media first and records only the resulting URI:
//! - Pinata pinning service (IPFS) for real deployments
//! - `MockMediaStore` in `crate::mock` for tests

pub mod pinata;
pub mod traits;

pub use pinata::{PinataConfig, PinataStore};
pub use traits::{MediaFile, MediaStore, StorageError};
