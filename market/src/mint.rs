//! Mint session.
//!
//! Turns a creator's draft into a record on the ledger: upload the media,
//! then submit `mint_video` signed by a fresh record key and the creator's
//! wallet. Any failure drops the session back to `Idle`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use vidmarket_ledger::{
    sign_with, Keypair, LedgerGateway, Message, Pubkey, Signature, Signer, Transaction, Wallet,
};

use crate::error::MarketError;
use crate::price;
use crate::instruction::MintVideo;
use crate::program::mint_video_instruction;
use crate::storage::{MediaFile, MediaStore};

/// What a creator fills in before minting.
#[derive(Debug, Clone, Default)]
pub struct MintDraft {
    pub name: String,
    /// Price as typed, in display units
    pub price_display: String,
    pub description: String,
    pub media: Option<MediaFile>,
}

/// A minted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintReceipt {
    pub record_id: Pubkey,
    pub signature: Signature,
    pub media_uri: String,
    pub price_minor: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintState {
    Idle,
    Uploading,
    Submitting,
    Minted(MintReceipt),
}

/// Draft fields after validation.
struct ValidDraft<'a> {
    name: &'a str,
    price_units: f64,
    price_minor: u64,
    description: &'a str,
    media: &'a MediaFile,
}

fn validate(draft: &MintDraft) -> Result<ValidDraft<'_>, MarketError> {
    let required = |value: &str, field: &str| {
        if value.trim().is_empty() {
            Err(MarketError::InvalidDraft(format!("{} is required", field)))
        } else {
            Ok(())
        }
    };
    required(&draft.name, "name")?;
    required(&draft.description, "description")?;

    let price_units = price::parse_display_price(&draft.price_display)
        .map_err(|e| MarketError::InvalidDraft(e.to_string()))?;
    let price_minor =
        price::display_to_minor(price_units).map_err(|e| MarketError::InvalidDraft(e.to_string()))?;

    let media = draft
        .media
        .as_ref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| MarketError::InvalidDraft("media file is required".to_string()))?;

    Ok(ValidDraft {
        name: &draft.name,
        price_units,
        price_minor,
        description: &draft.description,
        media,
    })
}

/// A creator's minting session.
pub struct MintSession {
    program_id: Pubkey,
    gateway: Arc<dyn LedgerGateway>,
    wallet: Arc<dyn Wallet>,
    store: Arc<dyn MediaStore>,
    state: RwLock<MintState>,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MintSession {
    pub fn new(
        program_id: Pubkey,
        gateway: Arc<dyn LedgerGateway>,
        wallet: Arc<dyn Wallet>,
        store: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            program_id,
            gateway,
            wallet,
            store,
            state: RwLock::new(MintState::Idle),
            busy: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> MintState {
        self.state.read().await.clone()
    }

    async fn set_state(&self, state: MintState) {
        *self.state.write().await = state;
    }

    /// Mint a record from `draft`.
    ///
    /// The record is not added to any catalog; it shows up on the next load.
    pub async fn mint(&self, draft: &MintDraft) -> Result<MintReceipt, MarketError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MarketError::MintInProgress);
        }
        let _busy = BusyGuard(&self.busy);

        let valid = match validate(draft) {
            Ok(valid) => valid,
            Err(e) => {
                debug!(error = %e, "Draft rejected");
                self.set_state(MintState::Idle).await;
                return Err(e);
            }
        };
        match self.run(&valid).await {
            Ok(receipt) => {
                self.set_state(MintState::Minted(receipt.clone())).await;
                Ok(receipt)
            }
            Err(e) => {
                warn!(name = %valid.name, error = %e, "Mint failed");
                self.set_state(MintState::Idle).await;
                Err(e)
            }
        }
    }

    async fn run(&self, draft: &ValidDraft<'_>) -> Result<MintReceipt, MarketError> {
        self.set_state(MintState::Uploading).await;
        let media_uri = self.store.upload(draft.media).await?;
        if media_uri.trim().is_empty() {
            return Err(MarketError::UploadFailed(
                "storage returned an empty URI".to_string(),
            ));
        }
        debug!(uri = %media_uri, "Media uploaded");

        self.set_state(MintState::Submitting).await;
        let record_key = Keypair::new();
        let record_id = record_key.pubkey();
        let creator = self.wallet.address();

        let args = MintVideo {
            name: draft.name.to_string(),
            price_in_sol: price::program_price_units(draft.price_minor),
            description: draft.description.to_string(),
            uri: media_uri.clone(),
        };
        debug!(
            record = %record_id,
            entered = draft.price_units,
            price = draft.price_minor,
            "Submitting mint"
        );

        let blockhash = self
            .gateway
            .latest_blockhash()
            .await
            .map_err(MarketError::from_preparation)?;
        let instruction = mint_video_instruction(&self.program_id, &record_id, &creator, &args);
        let message = Message::new_with_blockhash(&[instruction], Some(&creator), &blockhash);

        let mut transaction = Transaction::new_unsigned(message);
        sign_with(&record_key, &mut transaction)?;
        let transaction = self.wallet.sign_transaction(transaction).await?;
        if !transaction.is_signed() {
            return Err(MarketError::Wallet(
                "wallet returned an unsigned transaction".to_string(),
            ));
        }

        let signature = self
            .gateway
            .submit_transaction(&transaction)
            .await
            .map_err(MarketError::from_submission)?;

        info!(record = %record_id, %signature, price = draft.price_minor, "Record minted");
        Ok(MintReceipt {
            record_id,
            signature,
            media_uri,
            price_minor: draft.price_minor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> MintDraft {
        MintDraft {
            name: "Tidepools".to_string(),
            price_display: "0.25".to_string(),
            description: "Macro footage".to_string(),
            media: Some(MediaFile::new("tide.mp4", "video/mp4", vec![1u8, 2, 3])),
        }
    }

    #[test]
    fn test_validate_accepts_complete_draft() {
        let d = draft();
        let valid = validate(&d).unwrap();
        assert_eq!(valid.price_minor, 250_000_000);
        assert_eq!(valid.price_units, 0.25);
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let cases = [
            MintDraft { name: " ".into(), ..draft() },
            MintDraft { description: String::new(), ..draft() },
            MintDraft { price_display: String::new(), ..draft() },
            MintDraft { price_display: "free".into(), ..draft() },
            MintDraft { price_display: "-1".into(), ..draft() },
            MintDraft { media: None, ..draft() },
            MintDraft { media: Some(MediaFile::new("empty.mp4", "video/mp4", Vec::<u8>::new())), ..draft() },
        ];
        for case in &cases {
            assert!(
                matches!(validate(case), Err(MarketError::InvalidDraft(_))),
                "{case:?}"
            );
        }
    }
}
