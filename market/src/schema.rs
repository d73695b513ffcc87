//! Record decoding.
//!
//! Record accounts hold a `Video` behind its Anchor account discriminator:
//!
//! ```text
//! ┌───────────────┬──────────┬───────────┬─────────────┬──────────┬───────────┐
//! │ discriminator │ name     │ price     │ description │ uri      │ creator   │
//! │ 8 bytes       │ u32 + N  │ u64 LE    │ u32 + N     │ u32 + N  │ 32 bytes  │
//! └───────────────┴──────────┴───────────┴─────────────┴──────────┴───────────┘
//! ```
//!
//! Accounts are allocated at a fixed size, so anything after the last field
//! is zero padding and ignored. A layout change gets a new descriptor.

use anchor_lang::{AccountDeserialize, AccountSerialize, Discriminator};
use vidmarket_ledger::Pubkey;

use crate::program::VIDEO_ACCOUNT_SPACE;
use crate::record::ContentRecord;
use crate::state::Video;

/// A record account that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed record {address}: {reason}")]
pub struct MalformedRecord {
    pub address: Pubkey,
    pub reason: String,
}

/// Versioned layout of a record account.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    /// Account struct name in the program
    pub account_name: &'static str,
    pub discriminator: &'static [u8],
    /// Bytes allocated per account
    pub space: usize,
    /// Longest text field accepted, in bytes
    pub text_limit: usize,
}

/// The `Video` account written by `mint_video`.
pub const VIDEO_RECORD_V1: RecordSchema = RecordSchema {
    account_name: "Video",
    discriminator: Video::DISCRIMINATOR,
    space: VIDEO_ACCOUNT_SPACE,
    // Accounts created inside an instruction cannot exceed 10 KiB
    text_limit: 10 * 1024,
};

impl RecordSchema {
    /// Decode account data into a locked record.
    pub fn decode(&self, address: Pubkey, data: &[u8]) -> Result<ContentRecord, MalformedRecord> {
        let malformed = |reason: String| MalformedRecord { address, reason };

        if data.len() >= self.discriminator.len() && !data.starts_with(self.discriminator) {
            return Err(malformed(format!(
                "discriminator {} is not a {} account",
                hex::encode(&data[..self.discriminator.len()]),
                self.account_name
            )));
        }

        let video = Video::try_deserialize(&mut &data[..]).map_err(|e| malformed(e.to_string()))?;
        self.check_text(&video).map_err(malformed)?;

        Ok(ContentRecord {
            id: address,
            name: video.name,
            description: video.description,
            media_uri: video.uri,
            price_minor: video.price,
            creator: video.creator,
            unlocked: false,
        })
    }

    /// Encode a record in this layout, without padding.
    pub fn encode(&self, record: &ContentRecord) -> Result<Vec<u8>, MalformedRecord> {
        let malformed = |reason: String| MalformedRecord {
            address: record.id,
            reason,
        };
        let video = Video {
            name: record.name.clone(),
            price: record.price_minor,
            description: record.description.clone(),
            uri: record.media_uri.clone(),
            creator: record.creator,
        };
        self.check_text(&video).map_err(malformed)?;

        let mut data = Vec::with_capacity(self.space);
        video
            .try_serialize(&mut data)
            .map_err(|e| malformed(e.to_string()))?;
        Ok(data)
    }

    fn check_text(&self, video: &Video) -> Result<(), String> {
        for (field, value) in [
            ("name", &video.name),
            ("description", &video.description),
            ("uri", &video.uri),
        ] {
            if value.len() > self.text_limit {
                return Err(format!(
                    "{}: length {} exceeds limit {}",
                    field,
                    value.len(),
                    self.text_limit
                ));
            }
        }
        Ok(())
    }
}

/// Decode a `Video` account.
pub fn decode_record(address: Pubkey, data: &[u8]) -> Result<ContentRecord, MalformedRecord> {
    VIDEO_RECORD_V1.decode(address, data)
}

/// Encode a record as a `Video` account.
pub fn encode_record(record: &ContentRecord) -> Result<Vec<u8>, MalformedRecord> {
    VIDEO_RECORD_V1.encode(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn sample() -> ContentRecord {
        ContentRecord {
            id: Pubkey::new_from_array([1; 32]),
            name: "Harbor at dawn".to_string(),
            description: "Four minutes of fog".to_string(),
            media_uri: "https://gateway.pinata.cloud/ipfs/QmHarbor".to_string(),
            price_minor: 2_500_000_001,
            creator: Pubkey::new_from_array([2; 32]),
            unlocked: false,
        }
    }

    #[test]
    fn test_discriminator_is_account_hash() {
        let digest = Sha256::digest(b"account:Video");
        assert_eq!(VIDEO_RECORD_V1.discriminator, &digest[..8]);
    }

    #[test]
    fn test_price_survives_encoding() {
        let record = sample();
        let decoded = decode_record(record.id, &encode_record(&record).unwrap()).unwrap();
        assert_eq!(decoded.price_minor, 2_500_000_001);
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decoded_records_start_locked() {
        let mut record = sample();
        record.unlocked = true;
        let decoded = decode_record(record.id, &encode_record(&record).unwrap()).unwrap();
        assert!(!decoded.unlocked);
    }

    #[test]
    fn test_layout() {
        let record = sample();
        let data = encode_record(&record).unwrap();
        assert_eq!(&data[..8], VIDEO_RECORD_V1.discriminator);
        assert_eq!(&data[8..12], &(record.name.len() as u32).to_le_bytes());
        let price_at = 12 + record.name.len();
        assert_eq!(&data[price_at..price_at + 8], &2_500_000_001u64.to_le_bytes());
        assert_eq!(&data[data.len() - 32..], record.creator.as_ref());
    }

    #[test]
    fn test_trailing_padding_is_ignored() {
        let record = sample();
        let mut data = encode_record(&record).unwrap();
        data.resize(VIDEO_ACCOUNT_SPACE, 0);
        assert_eq!(decode_record(record.id, &data).unwrap(), record);
    }

    #[test]
    fn test_truncated_payload() {
        let record = sample();
        let data = encode_record(&record).unwrap();
        for len in [0, 7, 8, 20, data.len() - 1] {
            let err = decode_record(record.id, &data[..len]).unwrap_err();
            assert_eq!(err.address, record.id);
        }
    }

    #[test]
    fn test_wrong_discriminator() {
        let record = sample();
        let mut data = encode_record(&record).unwrap();
        data[..8].copy_from_slice(&Sha256::digest(b"account:Listing")[..8]);
        let err = decode_record(record.id, &data).unwrap_err();
        assert!(err.reason.contains("not a Video account"));
    }

    #[test]
    fn test_invalid_utf8_name() {
        let mut data = VIDEO_RECORD_V1.discriminator.to_vec();
        data.extend_from_slice(&[2, 0, 0, 0, 0xc3, 0x28]);
        data.resize(VIDEO_ACCOUNT_SPACE, 0);
        assert!(decode_record(Pubkey::new_from_array([3; 32]), &data).is_err());
    }

    #[test]
    fn test_text_bound() {
        let schema = RecordSchema {
            text_limit: 8,
            ..VIDEO_RECORD_V1
        };
        let record = sample();
        let data = encode_record(&record).unwrap();

        let err = schema.decode(record.id, &data).unwrap_err();
        assert!(err.reason.starts_with("name:"));
        assert!(err.reason.contains("exceeds limit 8"));
        assert!(schema.encode(&record).is_err());
    }
}
