//! Catalog session.
//!
//! Discovers records on the ledger and gates playback behind payment.
//!
//! ```text
//!            load()             ok
//!   Idle ───────────▶ Loading ─────▶ Ready ──┐
//!                        │  ▲                │ load()
//!                   err  ▼  │ load()         │
//!                    LoadFailed ◀────────────┘ (on err)
//! ```
//!
//! Each load rebuilds the catalog from scratch and publishes it as a new
//! immutable snapshot, so every record starts locked again. Payments that
//! confirm while a load is running are carried into the snapshot it
//! publishes. Readers holding an older snapshot keep seeing it unchanged.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, info, warn};
use vidmarket_ledger::{
    transaction_id, LedgerGateway, Message, Pubkey, Signature, Transaction, Wallet,
};

use crate::error::MarketError;
use crate::program::{pay_to_play_instruction, PaymentIntent};
use crate::record::ContentRecord;
use crate::schema::decode_record;

/// Lifecycle of a catalog session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogState {
    Idle,
    Loading,
    Ready,
    LoadFailed,
}

/// An immutable set of records, in ledger listing order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<ContentRecord>,
    index: HashMap<Pubkey, usize>,
}

impl Catalog {
    fn from_records(records: Vec<ContentRecord>) -> Self {
        let mut catalog = Catalog::default();
        for record in records {
            match catalog.index.get(&record.id) {
                Some(&i) => catalog.records[i] = record,
                None => {
                    catalog.index.insert(record.id, catalog.records.len());
                    catalog.records.push(record);
                }
            }
        }
        catalog
    }

    pub fn get(&self, id: &Pubkey) -> Option<&ContentRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Unlock `id` in place. Returns `false` if it is not listed.
    fn mark_unlocked(&mut self, id: &Pubkey) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.records[i].unlocked = true;
                true
            }
            None => false,
        }
    }

    /// A copy with `id` unlocked, or `None` if `id` is not listed.
    fn with_unlocked(&self, id: &Pubkey) -> Option<Catalog> {
        self.index.get(id)?;
        let mut next = self.clone();
        next.mark_unlocked(id);
        Some(next)
    }
}

/// Result of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    /// Accounts that failed to decode
    pub skipped: usize,
}

/// Proof of a confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub record: Pubkey,
    pub signature: Signature,
    pub price_minor: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Payment confirmed and the record is now playable
    Unlocked(PurchaseReceipt),
    /// Already paid for in this catalog; nothing was sent
    AlreadyUnlocked,
}

struct Published {
    catalog: Arc<Catalog>,
    state: CatalogState,
    /// Records paid for while a load runs, unlocked again in its result
    paid_during_load: HashSet<Pubkey>,
}

/// Outcome of the most recent load, shared with overlapping callers.
#[derive(Default)]
struct LoadSlot {
    last: Option<Result<LoadSummary, MarketError>>,
}

/// A viewer's session over the marketplace catalog.
pub struct CatalogSession {
    program_id: Pubkey,
    gateway: Arc<dyn LedgerGateway>,
    wallet: Arc<dyn Wallet>,
    published: RwLock<Published>,
    load_slot: AsyncMutex<LoadSlot>,
    loads_completed: AtomicU64,
    in_flight: Mutex<HashSet<Pubkey>>,
}

/// Clears an in-flight purchase mark when the purchase ends or is dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<Pubkey>>,
    id: Pubkey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl CatalogSession {
    pub fn new(
        program_id: Pubkey,
        gateway: Arc<dyn LedgerGateway>,
        wallet: Arc<dyn Wallet>,
    ) -> Self {
        Self {
            program_id,
            gateway,
            wallet,
            published: RwLock::new(Published {
                catalog: Arc::new(Catalog::default()),
                state: CatalogState::Idle,
                paid_during_load: HashSet::new(),
            }),
            load_slot: AsyncMutex::new(LoadSlot::default()),
            loads_completed: AtomicU64::new(0),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub async fn state(&self) -> CatalogState {
        self.published.read().await.state
    }

    /// The current catalog snapshot.
    pub async fn snapshot(&self) -> Arc<Catalog> {
        self.published.read().await.catalog.clone()
    }

    pub async fn record(&self, id: &Pubkey) -> Option<ContentRecord> {
        self.published.read().await.catalog.get(id).cloned()
    }

    /// Media URI for `id`, only once it has been paid for.
    pub async fn playable_uri(&self, id: &Pubkey) -> Option<String> {
        self.published
            .read()
            .await
            .catalog
            .get(id)
            .and_then(|r| r.playable_uri())
            .map(str::to_string)
    }

    /// Rebuild the catalog from the ledger.
    ///
    /// A call that overlaps a load already in progress waits for it and
    /// returns its outcome instead of listing again.
    pub async fn load(&self) -> Result<LoadSummary, MarketError> {
        let observed = self.loads_completed.load(Ordering::SeqCst);
        let mut slot = self.load_slot.lock().await;

        if self.loads_completed.load(Ordering::SeqCst) != observed {
            if let Some(last) = slot.last.clone() {
                debug!("Joined an overlapping catalog load");
                return last;
            }
        }

        let result = self.rebuild().await;
        slot.last = Some(result.clone());
        self.loads_completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn rebuild(&self) -> Result<LoadSummary, MarketError> {
        {
            let mut published = self.published.write().await;
            published.state = CatalogState::Loading;
            published.paid_during_load.clear();
        }

        let accounts = match self.gateway.list_program_accounts(&self.program_id).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(program = %self.program_id, error = %e, "Catalog load failed");
                let mut published = self.published.write().await;
                published.state = CatalogState::LoadFailed;
                published.paid_during_load.clear();
                return Err(MarketError::LoadFailed(e.to_string()));
            }
        };

        let mut records = Vec::with_capacity(accounts.len());
        let mut skipped = 0;
        for account in accounts {
            match decode_record(account.address, &account.data) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(address = %e.address, reason = %e.reason, "Skipping malformed record");
                    skipped += 1;
                }
            }
        }

        let mut catalog = Catalog::from_records(records);
        let summary = LoadSummary {
            loaded: catalog.len(),
            skipped,
        };

        {
            let mut published = self.published.write().await;
            for id in published.paid_during_load.drain() {
                if catalog.mark_unlocked(&id) {
                    debug!(record = %id, "Keeping unlock paid during load");
                }
            }
            published.catalog = Arc::new(catalog);
            published.state = CatalogState::Ready;
        }

        info!(
            program = %self.program_id,
            loaded = summary.loaded,
            skipped = summary.skipped,
            "Catalog loaded"
        );
        Ok(summary)
    }

    fn begin_purchase(&self, id: Pubkey) -> Result<InFlightGuard<'_>, MarketError> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(id) {
            return Err(MarketError::PurchaseInFlight(id));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            id,
        })
    }

    /// Pay for a record and unlock it once the payment confirms.
    pub async fn purchase(&self, id: &Pubkey) -> Result<PurchaseOutcome, MarketError> {
        let record = {
            let published = self.published.read().await;
            if published.state != CatalogState::Ready {
                return Err(MarketError::NotReady);
            }
            published
                .catalog
                .get(id)
                .cloned()
                .ok_or(MarketError::UnknownRecord(*id))?
        };
        if record.unlocked {
            return Ok(PurchaseOutcome::AlreadyUnlocked);
        }

        let _guard = self.begin_purchase(*id)?;

        // A purchase of the same id may have finished while we checked
        if self.record(id).await.is_some_and(|r| r.unlocked) {
            return Ok(PurchaseOutcome::AlreadyUnlocked);
        }

        let intent = PaymentIntent {
            record: record.id,
            creator: record.creator,
            viewer: self.wallet.address(),
            price_minor: record.price_minor,
        };
        debug!(
            record = %intent.record,
            viewer = %intent.viewer,
            price = intent.price_minor,
            "Preparing payment"
        );

        let blockhash = self
            .gateway
            .latest_blockhash()
            .await
            .map_err(MarketError::from_preparation)?;
        let instruction = pay_to_play_instruction(&self.program_id, &intent);
        let message = Message::new_with_blockhash(&[instruction], Some(&intent.viewer), &blockhash);

        let transaction = self
            .wallet
            .sign_transaction(Transaction::new_unsigned(message))
            .await
            .map_err(|e| {
                info!(record = %intent.record, error = %e, "Payment not signed");
                MarketError::from(e)
            })?;
        if !transaction.is_signed() {
            return Err(MarketError::Wallet(
                "wallet returned an unsigned transaction".to_string(),
            ));
        }

        let signature = self
            .gateway
            .submit_transaction(&transaction)
            .await
            .map_err(|e| {
                warn!(
                    record = %intent.record,
                    signature = %transaction_id(&transaction),
                    error = %e,
                    "Payment failed"
                );
                MarketError::from_submission(e)
            })?;

        self.unlock(id).await;
        info!(record = %intent.record, %signature, price = intent.price_minor, "Purchase confirmed");

        Ok(PurchaseOutcome::Unlocked(PurchaseReceipt {
            record: intent.record,
            signature,
            price_minor: intent.price_minor,
        }))
    }

    async fn unlock(&self, id: &Pubkey) {
        let mut published = self.published.write().await;
        if published.state == CatalogState::Loading {
            published.paid_during_load.insert(*id);
        }
        match published.catalog.with_unlocked(id) {
            Some(next) => published.catalog = Arc::new(next),
            None => debug!(record = %id, "Paid record no longer listed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(byte: u8) -> ContentRecord {
        ContentRecord {
            id: Pubkey::new_from_array([byte; 32]),
            name: format!("record {byte}"),
            description: String::new(),
            media_uri: format!("ipfs://{byte}"),
            price_minor: byte as u64,
            creator: Pubkey::new_from_array([0xcc; 32]),
            unlocked: false,
        }
    }

    #[test]
    fn test_catalog_keeps_listing_order() {
        let catalog = Catalog::from_records(vec![record(3), record(1), record(2)]);
        let ids: Vec<_> = catalog.iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                Pubkey::new_from_array([3; 32]),
                Pubkey::new_from_array([1; 32]),
                Pubkey::new_from_array([2; 32]),
            ]
        );
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let mut newer = record(1);
        newer.name = "newer".to_string();
        let catalog = Catalog::from_records(vec![record(1), newer]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(&Pubkey::new_from_array([1; 32])).unwrap().name, "newer");
    }

    #[test]
    fn test_mark_unlocked_ignores_unlisted() {
        let mut catalog = Catalog::from_records(vec![record(1)]);
        assert!(catalog.mark_unlocked(&Pubkey::new_from_array([1; 32])));
        assert!(!catalog.mark_unlocked(&Pubkey::new_from_array([9; 32])));
        assert!(catalog.get(&Pubkey::new_from_array([1; 32])).unwrap().unlocked);
    }

    #[test]
    fn test_with_unlocked_leaves_original_untouched() {
        let catalog = Catalog::from_records(vec![record(1), record(2)]);
        let next = catalog.with_unlocked(&Pubkey::new_from_array([1; 32])).unwrap();

        assert!(next.get(&Pubkey::new_from_array([1; 32])).unwrap().unlocked);
        assert!(!next.get(&Pubkey::new_from_array([2; 32])).unwrap().unlocked);
        assert!(!catalog.get(&Pubkey::new_from_array([1; 32])).unwrap().unlocked);
        assert!(catalog.with_unlocked(&Pubkey::new_from_array([9; 32])).is_none());
    }
}
