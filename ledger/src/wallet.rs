//! Wallet seam.
//!
//! A wallet owns the viewer's or creator's key and decides whether to
//! sign. Browser extensions, hardware wallets and local keypair files all
//! sit behind the same trait.

use std::path::Path;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use solana_sdk::signer::SignerError;
use solana_sdk::transaction::Transaction;
use tracing::debug;

/// Error types for wallet operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The user refused to sign
    #[error("Signing declined: {0}")]
    Declined(String),

    /// No wallet is connected or it stopped responding
    #[error("Wallet unavailable: {0}")]
    Unavailable(String),

    /// The key is not one of the transaction's required signers
    #[error("{0} is not a required signer of this transaction")]
    NotASigner(Pubkey),

    /// The wallet's key could not sign this transaction
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Something that can approve and sign transactions for one address.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// The address this wallet signs for.
    fn address(&self) -> Pubkey;

    /// Add this wallet's signature, leaving other signatures in place.
    async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction, WalletError>;

    /// Sign a batch. Fails on the first transaction that is not signed.
    async fn sign_all_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, WalletError> {
        let mut signed = Vec::with_capacity(transactions.len());
        for tx in transactions {
            signed.push(self.sign_transaction(tx).await?);
        }
        Ok(signed)
    }
}

/// Fill the signature slot belonging to `keypair`.
///
/// Other slots are kept, so co-signers can sign in any order.
pub fn sign_with(keypair: &Keypair, transaction: &mut Transaction) -> Result<(), WalletError> {
    let blockhash = transaction.message.recent_blockhash;
    transaction
        .try_partial_sign(&[keypair], blockhash)
        .map_err(|e| match e {
            SignerError::KeypairPubkeyMismatch => WalletError::NotASigner(keypair.pubkey()),
            other => WalletError::Signing(other.to_string()),
        })
}

/// A wallet that signs everything with a local keypair.
pub struct KeypairWallet {
    keypair: Keypair,
}

impl std::fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("address", &self.keypair.pubkey())
            .finish_non_exhaustive()
    }
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// A wallet with a throwaway key.
    pub fn generate() -> Self {
        Self::new(Keypair::new())
    }

    /// Load a Solana CLI keypair file (a JSON array of 64 numbers).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        read_keypair_file(path)
            .map(Self::new)
            .map_err(|e| WalletError::Unavailable(format!("{}: {}", path.display(), e)))
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl Wallet for KeypairWallet {
    fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<Transaction, WalletError> {
        sign_with(&self.keypair, &mut transaction)?;
        debug!(signer = %self.keypair.pubkey(), "Transaction signed");
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;
    use solana_sdk::instruction::{AccountMeta, Instruction};
    use solana_sdk::message::Message;
    use solana_sdk::system_program;

    fn transfer_from(payer: Pubkey) -> Transaction {
        let ix = Instruction::new_with_bytes(
            system_program::id(),
            &[2, 0, 0, 0],
            vec![
                AccountMeta::new(payer, true),
                AccountMeta::new(Pubkey::new_from_array([7; 32]), false),
            ],
        );
        let message =
            Message::new_with_blockhash(&[ix], Some(&payer), &Hash::new_from_array([3; 32]));
        Transaction::new_unsigned(message)
    }

    #[tokio::test]
    async fn test_keypair_wallet_signs() {
        let wallet = KeypairWallet::generate();
        let tx = transfer_from(wallet.address());

        let signed = wallet.sign_transaction(tx).await.unwrap();
        assert!(signed.is_signed());
        assert!(signed.verify().is_ok());
    }

    #[tokio::test]
    async fn test_cosigners_sign_in_any_order() {
        let payer = KeypairWallet::generate();
        let cosigner = Keypair::new();
        let ix = Instruction::new_with_bytes(
            Pubkey::new_from_array([9; 32]),
            &[],
            vec![
                AccountMeta::new(cosigner.pubkey(), true),
                AccountMeta::new(payer.address(), true),
            ],
        );
        let message = Message::new_with_blockhash(
            &[ix],
            Some(&payer.address()),
            &Hash::new_from_array([5; 32]),
        );
        let mut tx = Transaction::new_unsigned(message);

        sign_with(&cosigner, &mut tx).unwrap();
        assert!(!tx.is_signed());

        let tx = payer.sign_transaction(tx).await.unwrap();
        assert!(tx.is_signed());
        assert!(tx.verify().is_ok());
    }

    #[tokio::test]
    async fn test_foreign_transaction_is_refused() {
        let wallet = KeypairWallet::generate();
        let other = Keypair::new();
        let tx = transfer_from(other.pubkey());

        let err = wallet.sign_transaction(tx).await.unwrap_err();
        assert_eq!(err, WalletError::NotASigner(wallet.address()));
    }

    #[tokio::test]
    async fn test_sign_all() {
        let wallet = KeypairWallet::generate();
        let batch = vec![transfer_from(wallet.address()), transfer_from(wallet.address())];

        let signed = wallet.sign_all_transactions(batch).await.unwrap();
        assert_eq!(signed.len(), 2);
        assert!(signed.iter().all(|t| t.verify().is_ok()));
    }

    #[test]
    fn test_from_file() {
        let keypair = Keypair::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.json");
        let bytes: Vec<u8> = keypair.to_bytes().to_vec();
        std::fs::write(&path, serde_json::to_string(&bytes).unwrap()).unwrap();

        let wallet = KeypairWallet::from_file(&path).unwrap();
        assert_eq!(wallet.address(), keypair.pubkey());
    }

    #[test]
    fn test_missing_keypair_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = KeypairWallet::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, WalletError::Unavailable(_)));
    }
}
