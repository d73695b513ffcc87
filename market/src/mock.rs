//! In-memory collaborators for testing.
//!
//! `MockLedger` runs the marketplace program against in-memory accounts and
//! balances, so sessions can be exercised end to end without a node.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use vidmarket_ledger::{
    sign_with, transaction_id, AccountMeta, GatewayError, Hash, Instruction, Keypair,
    LedgerGateway, Message, ProgramAccount, Pubkey, Signature, Signer, Transaction, Wallet,
    WalletError,
};

use crate::instruction::MintVideo;
use crate::program::{
    MarketInstruction, ERROR_INSUFFICIENT_FUNDS, ERROR_INVALID_URI, VIDEO_ACCOUNT_SPACE,
};
use crate::record::ContentRecord;
use crate::schema::{decode_record, encode_record, MalformedRecord};
use crate::storage::{MediaFile, MediaStore, StorageError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    /// Program accounts in creation order
    accounts: Vec<(Pubkey, Vec<u8>)>,
    balances: HashMap<Pubkey, u64>,
}

impl LedgerState {
    fn account(&self, address: &Pubkey) -> Option<&[u8]> {
        self.accounts
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, data)| data.as_slice())
    }

    fn balance(&self, address: &Pubkey) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }
}

/// Expand a compiled message back into instructions with their account flags.
fn decompile(message: &Message) -> Result<Vec<Instruction>, GatewayError> {
    let key = |index: u8| {
        let i = usize::from(index);
        message
            .account_keys
            .get(i)
            .map(|pubkey| (i, *pubkey))
            .ok_or_else(|| GatewayError::Rejected(format!("account index {} out of range", i)))
    };

    message
        .instructions
        .iter()
        .map(|compiled| {
            let (_, program_id) = key(compiled.program_id_index)?;
            let accounts = compiled
                .accounts
                .iter()
                .map(|&index| {
                    let (i, pubkey) = key(index)?;
                    Ok(AccountMeta {
                        pubkey,
                        is_signer: message.is_signer(i),
                        is_writable: message.is_maybe_writable(i, None),
                    })
                })
                .collect::<Result<Vec<_>, GatewayError>>()?;
            Ok(Instruction {
                program_id,
                accounts,
                data: compiled.data.clone(),
            })
        })
        .collect()
}

fn program_error(code: u32, name: &str) -> GatewayError {
    GatewayError::Rejected(format!(
        "custom program error: {:#x} ({} {})",
        code, code, name
    ))
}

/// Mock ledger for testing.
///
/// Verifies signatures and executes `mint_video` and `pay_to_play` with
/// the deployed program's rules. Failures and delays can be injected, and
/// every call is counted.
pub struct MockLedger {
    program_id: Pubkey,
    blockhash: Hash,
    state: Mutex<LedgerState>,
    list_failure: Mutex<Option<GatewayError>>,
    submit_failure: Mutex<Option<GatewayError>>,
    list_delay: Mutex<Duration>,
    submit_delay: Mutex<Duration>,
    list_count: AtomicU32,
    blockhash_count: AtomicU32,
    submit_count: AtomicU32,
}

impl MockLedger {
    /// Create an empty ledger running the program at `program_id`.
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            blockhash: Hash::new_from_array([0x42; 32]),
            state: Mutex::new(LedgerState::default()),
            list_failure: Mutex::new(None),
            submit_failure: Mutex::new(None),
            list_delay: Mutex::new(Duration::ZERO),
            submit_delay: Mutex::new(Duration::ZERO),
            list_count: AtomicU32::new(0),
            blockhash_count: AtomicU32::new(0),
            submit_count: AtomicU32::new(0),
        }
    }

    /// Delay every listing.
    pub fn with_list_delay(self, delay: Duration) -> Self {
        *lock(&self.list_delay) = delay;
        self
    }

    /// Delay every submission.
    pub fn with_submit_delay(self, delay: Duration) -> Self {
        *lock(&self.submit_delay) = delay;
        self
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Make listings fail until cleared with `None`.
    pub fn fail_listing(&self, error: Option<GatewayError>) {
        *lock(&self.list_failure) = error;
    }

    /// Make submissions fail until cleared with `None`.
    ///
    /// A `Timeout` without a signature is reported with the submitted
    /// transaction's signature.
    pub fn fail_submissions(&self, error: Option<GatewayError>) {
        *lock(&self.submit_failure) = error;
    }

    /// Store a record account directly, padded like the program pads it.
    pub fn insert_record(&self, record: &ContentRecord) -> Result<(), MalformedRecord> {
        let mut data = encode_record(record)?;
        if data.len() < VIDEO_ACCOUNT_SPACE {
            data.resize(VIDEO_ACCOUNT_SPACE, 0);
        }
        self.insert_raw(record.id, data);
        Ok(())
    }

    /// Store arbitrary account data under the program.
    pub fn insert_raw(&self, address: Pubkey, data: Vec<u8>) {
        let mut state = lock(&self.state);
        match state.accounts.iter_mut().find(|(a, _)| *a == address) {
            Some(entry) => entry.1 = data,
            None => state.accounts.push((address, data)),
        }
    }

    pub fn fund(&self, address: &Pubkey, lamports: u64) {
        let mut state = lock(&self.state);
        let balance = state.balances.entry(*address).or_insert(0);
        *balance = balance.saturating_add(lamports);
    }

    pub fn balance(&self, address: &Pubkey) -> u64 {
        lock(&self.state).balance(address)
    }

    /// Decoded record stored at `address`, if any.
    pub fn record(&self, address: &Pubkey) -> Option<ContentRecord> {
        let state = lock(&self.state);
        let data = state.account(address)?;
        decode_record(*address, data).ok()
    }

    pub fn account_count(&self) -> usize {
        lock(&self.state).accounts.len()
    }

    pub fn list_count(&self) -> u32 {
        self.list_count.load(Ordering::SeqCst)
    }

    pub fn blockhash_count(&self) -> u32 {
        self.blockhash_count.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_count.load(Ordering::SeqCst)
    }

    /// Reset all call counters.
    pub fn reset_counts(&self) {
        self.list_count.store(0, Ordering::SeqCst);
        self.blockhash_count.store(0, Ordering::SeqCst);
        self.submit_count.store(0, Ordering::SeqCst);
    }

    fn execute(&self, transaction: &Transaction) -> Result<(), GatewayError> {
        transaction
            .verify()
            .map_err(|e| GatewayError::Rejected(format!("signature verification failed: {}", e)))?;
        if transaction.message.recent_blockhash != self.blockhash {
            return Err(GatewayError::Rejected("Blockhash not found".to_string()));
        }

        // Work on a copy so a failing instruction leaves nothing behind
        let mut state = lock(&self.state);
        let mut next = state.clone();

        for instruction in decompile(&transaction.message)? {
            if instruction.program_id != self.program_id {
                return Err(GatewayError::Rejected(format!(
                    "unsupported program {}",
                    instruction.program_id
                )));
            }
            let accounts = &instruction.accounts;
            let decoded = MarketInstruction::decode(&instruction.data)
                .map_err(|e| GatewayError::Rejected(e.to_string()))?;

            match decoded {
                MarketInstruction::MintVideo(args) => mint_video(&mut next, accounts, args)?,
                MarketInstruction::PayToPlay => pay_to_play(&mut next, accounts)?,
            }
        }

        *state = next;
        Ok(())
    }
}

fn account_at(accounts: &[AccountMeta], index: usize) -> Result<Pubkey, GatewayError> {
    accounts
        .get(index)
        .map(|m| m.pubkey)
        .ok_or_else(|| GatewayError::Rejected("not enough account keys".to_string()))
}

fn signer_at(accounts: &[AccountMeta], index: usize) -> Result<Pubkey, GatewayError> {
    match accounts.get(index) {
        Some(meta) if meta.is_signer && meta.is_writable => Ok(meta.pubkey),
        Some(meta) => Err(GatewayError::Rejected(format!(
            "AccountNotSigner: {}",
            meta.pubkey
        ))),
        None => Err(GatewayError::Rejected("not enough account keys".to_string())),
    }
}

fn mint_video(
    state: &mut LedgerState,
    accounts: &[AccountMeta],
    args: MintVideo,
) -> Result<(), GatewayError> {
    let video = signer_at(accounts, 0)?;
    let creator = signer_at(accounts, 1)?;

    if args.uri.is_empty() {
        return Err(program_error(ERROR_INVALID_URI, "InvalidUri"));
    }
    if state.account(&video).is_some() {
        return Err(GatewayError::Rejected(format!(
            "account {} already in use",
            video
        )));
    }

    let record = ContentRecord {
        id: video,
        name: args.name,
        description: args.description,
        media_uri: args.uri,
        // Truncating conversion, as on-ledger
        price_minor: (args.price_in_sol * 1_000_000_000.0) as u64,
        creator,
        unlocked: false,
    };
    let mut data = encode_record(&record)
        .map_err(|e| GatewayError::Rejected(format!("AccountDidNotSerialize: {}", e.reason)))?;
    if data.len() > VIDEO_ACCOUNT_SPACE {
        return Err(GatewayError::Rejected(
            "AccountDidNotSerialize: record exceeds account space".to_string(),
        ));
    }
    data.resize(VIDEO_ACCOUNT_SPACE, 0);
    state.accounts.push((video, data));
    Ok(())
}

fn pay_to_play(state: &mut LedgerState, accounts: &[AccountMeta]) -> Result<(), GatewayError> {
    let video = account_at(accounts, 0)?;
    let player = signer_at(accounts, 1)?;
    let creator = account_at(accounts, 2)?;

    let data = state
        .account(&video)
        .ok_or_else(|| GatewayError::Rejected(format!("AccountNotInitialized: {}", video)))?;
    let record = decode_record(video, data)
        .map_err(|e| GatewayError::Rejected(format!("AccountDidNotDeserialize: {}", e)))?;

    let available = state.balance(&player);
    if available < record.price_minor {
        return Err(program_error(ERROR_INSUFFICIENT_FUNDS, "InsufficientFunds"));
    }
    state.balances.insert(player, available - record.price_minor);
    let creator_balance = state.balance(&creator);
    state
        .balances
        .insert(creator, creator_balance.saturating_add(record.price_minor));
    Ok(())
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(Pubkey::new_from_array([0x11; 32]))
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    fn endpoint(&self) -> &str {
        "mock://ledger"
    }

    async fn list_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<ProgramAccount>, GatewayError> {
        self.list_count.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.list_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = lock(&self.list_failure).clone() {
            return Err(err);
        }
        if *program_id != self.program_id {
            return Ok(Vec::new());
        }

        let state = lock(&self.state);
        Ok(state
            .accounts
            .iter()
            .map(|(address, data)| ProgramAccount {
                address: *address,
                data: data.clone(),
                lamports: 1_000_000,
            })
            .collect())
    }

    async fn latest_blockhash(&self) -> Result<Hash, GatewayError> {
        self.blockhash_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.blockhash)
    }

    async fn submit_transaction(&self, transaction: &Transaction) -> Result<Signature, GatewayError> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.submit_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let injected = lock(&self.submit_failure).clone();
        match injected {
            Some(GatewayError::Timeout { signature: None, detail }) => {
                return Err(GatewayError::Timeout {
                    signature: Some(transaction_id(transaction)),
                    detail,
                })
            }
            Some(err) => return Err(err),
            None => {}
        }

        self.execute(transaction)?;
        Ok(transaction_id(transaction))
    }
}

/// Mock wallet for testing.
///
/// Signs with its own keypair unless told to decline.
pub struct MockWallet {
    keypair: Keypair,
    declined: AtomicBool,
    sign_count: AtomicU32,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            keypair: Keypair::new(),
            declined: AtomicBool::new(false),
            sign_count: AtomicU32::new(0),
        }
    }

    /// Set whether signing requests are declined.
    pub fn with_declined(self, declined: bool) -> Self {
        self.set_declined(declined);
        self
    }

    pub fn set_declined(&self, declined: bool) {
        self.declined.store(declined, Ordering::SeqCst);
    }

    /// Number of signing requests received.
    pub fn sign_count(&self) -> u32 {
        self.sign_count.load(Ordering::SeqCst)
    }
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<Transaction, WalletError> {
        self.sign_count.fetch_add(1, Ordering::SeqCst);
        if self.declined.load(Ordering::SeqCst) {
            return Err(WalletError::Declined("User rejected the request".to_string()));
        }
        sign_with(&self.keypair, &mut transaction)?;
        Ok(transaction)
    }
}

/// Mock media store for testing.
pub struct MockMediaStore {
    base_uri: String,
    fixed_uri: Option<String>,
    available: AtomicBool,
    upload_count: AtomicU32,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self {
            base_uri: "https://gateway.mock/ipfs".to_string(),
            fixed_uri: None,
            available: AtomicBool::new(true),
            upload_count: AtomicU32::new(0),
        }
    }

    /// Return this URI for every upload.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.fixed_uri = Some(uri.into());
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Number of upload attempts.
    pub fn upload_count(&self) -> u32 {
        self.upload_count.load(Ordering::SeqCst)
    }
}

impl Default for MockMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn upload(&self, file: &MediaFile) -> Result<String, StorageError> {
        let n = self.upload_count.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.available.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("Mock store disabled".to_string()));
        }
        Ok(self
            .fixed_uri
            .clone()
            .unwrap_or_else(|| format!("{}/Qm{}{}", self.base_uri, n, file.file_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{mint_video_instruction, pay_to_play_instruction, PaymentIntent};

    async fn signed(
        ledger: &MockLedger,
        payer: &MockWallet,
        extra: Option<&Keypair>,
        ix: Instruction,
    ) -> Transaction {
        let blockhash = ledger.latest_blockhash().await.unwrap();
        let message = Message::new_with_blockhash(&[ix], Some(&payer.address()), &blockhash);
        let mut tx = Transaction::new_unsigned(message);
        if let Some(key) = extra {
            sign_with(key, &mut tx).unwrap();
        }
        payer.sign_transaction(tx).await.unwrap()
    }

    fn args(uri: &str) -> MintVideo {
        MintVideo {
            name: "Clip".to_string(),
            price_in_sol: 0.5,
            description: "A clip".to_string(),
            uri: uri.to_string(),
        }
    }

    #[tokio::test]
    async fn test_mint_then_pay() {
        let ledger = MockLedger::default();
        let creator = MockWallet::new();
        let viewer = MockWallet::new();
        let record_key = Keypair::new();

        let ix = mint_video_instruction(
            &ledger.program_id(),
            &record_key.pubkey(),
            &creator.address(),
            &args("ipfs://clip"),
        );
        let tx = signed(&ledger, &creator, Some(&record_key), ix).await;
        ledger.submit_transaction(&tx).await.unwrap();

        let record = ledger.record(&record_key.pubkey()).unwrap();
        assert_eq!(record.price_minor, 500_000_000);
        assert_eq!(record.creator, creator.address());

        ledger.fund(&viewer.address(), 600_000_000);
        let intent = PaymentIntent {
            record: record.id,
            creator: record.creator,
            viewer: viewer.address(),
            price_minor: record.price_minor,
        };
        let ix = pay_to_play_instruction(&ledger.program_id(), &intent);
        let tx = signed(&ledger, &viewer, None, ix).await;
        ledger.submit_transaction(&tx).await.unwrap();

        assert_eq!(ledger.balance(&viewer.address()), 100_000_000);
        assert_eq!(ledger.balance(&creator.address()), 500_000_000);
    }

    #[tokio::test]
    async fn test_empty_uri_is_rejected() {
        let ledger = MockLedger::default();
        let creator = MockWallet::new();
        let record_key = Keypair::new();

        let ix = mint_video_instruction(
            &ledger.program_id(),
            &record_key.pubkey(),
            &creator.address(),
            &args(""),
        );
        let tx = signed(&ledger, &creator, Some(&record_key), ix).await;
        let err = ledger.submit_transaction(&tx).await.unwrap_err();

        assert!(matches!(err, GatewayError::Rejected(ref m) if m.contains("InvalidUri")));
        assert_eq!(ledger.account_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_cosigner_is_rejected() {
        let ledger = MockLedger::default();
        let creator = MockWallet::new();
        let record_key = Keypair::new();

        let ix = mint_video_instruction(
            &ledger.program_id(),
            &record_key.pubkey(),
            &creator.address(),
            &args("ipfs://clip"),
        );
        let tx = signed(&ledger, &creator, None, ix).await;
        let err = ledger.submit_transaction(&tx).await.unwrap_err();

        assert!(matches!(err, GatewayError::Rejected(ref m) if m.contains("signature")));
    }

    #[tokio::test]
    async fn test_declining_wallet() {
        let wallet = MockWallet::new().with_declined(true);
        let ledger = MockLedger::default();
        let ix = pay_to_play_instruction(
            &ledger.program_id(),
            &PaymentIntent {
                record: Pubkey::new_from_array([1; 32]),
                creator: Pubkey::new_from_array([2; 32]),
                viewer: wallet.address(),
                price_minor: 1,
            },
        );
        let message = Message::new_with_blockhash(&[ix], Some(&wallet.address()), &Hash::default());

        let err = wallet
            .sign_transaction(Transaction::new_unsigned(message))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Declined(_)));
        assert_eq!(wallet.sign_count(), 1);
    }
}
