//! Marketplace records.

use serde::{Deserialize, Serialize};
use vidmarket_ledger::Pubkey;

use crate::price;

/// A content item listed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Ledger address of the record account
    pub id: Pubkey,
    pub name: String,
    pub description: String,
    /// Where the media lives; not validated
    pub media_uri: String,
    /// Price in lamports
    pub price_minor: u64,
    /// Who gets paid
    pub creator: Pubkey,
    /// Whether this session has paid for playback
    #[serde(default)]
    pub unlocked: bool,
}

impl ContentRecord {
    /// Price formatted for display, e.g. `"2.00"`.
    pub fn display_price(&self) -> String {
        price::minor_to_display(self.price_minor)
    }

    /// Media URI, only once the record is unlocked.
    pub fn playable_uri(&self) -> Option<&str> {
        self.unlocked.then_some(self.media_uri.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(unlocked: bool) -> ContentRecord {
        ContentRecord {
            id: Pubkey::new_from_array([1; 32]),
            name: "Sunset".to_string(),
            description: "Timelapse".to_string(),
            media_uri: "https://gateway.pinata.cloud/ipfs/QmSunset".to_string(),
            price_minor: 2_000_000_000,
            creator: Pubkey::new_from_array([2; 32]),
            unlocked,
        }
    }

    #[test]
    fn test_display_price() {
        assert_eq!(record(false).display_price(), "2.00");
    }

    #[test]
    fn test_playable_uri_requires_unlock() {
        assert_eq!(record(false).playable_uri(), None);
        assert_eq!(
            record(true).playable_uri(),
            Some("https://gateway.pinata.cloud/ipfs/QmSunset")
        );
    }
}
