//! Core trait for media stores.

use async_trait::async_trait;

/// Storage error
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Response did not carry a usable location
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Store is not configured or refuses uploads
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A media file selected for minting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Somewhere media can be uploaded to and fetched back by URI.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `file` and return the URI it can be played from.
    async fn upload(&self, file: &MediaFile) -> Result<String, StorageError>;
}
