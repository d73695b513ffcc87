//! Marketplace - main entry point.
//!
//! Holds the shared collaborators and hands out sessions that use them.

use std::sync::Arc;

use tracing::{info, warn};
use vidmarket_ledger::{LedgerGateway, Pubkey, RpcGateway, Wallet};

use crate::catalog::CatalogSession;
use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::mint::MintSession;
use crate::storage::{MediaStore, PinataStore};

/// Shared collaborators for one marketplace program.
pub struct Marketplace {
    program_id: Pubkey,
    gateway: Arc<dyn LedgerGateway>,
    wallet: Arc<dyn Wallet>,
    store: Option<Arc<dyn MediaStore>>,
}

impl Marketplace {
    /// Wire a marketplace from explicit collaborators.
    pub fn new(
        program_id: Pubkey,
        gateway: Arc<dyn LedgerGateway>,
        wallet: Arc<dyn Wallet>,
    ) -> Self {
        Self {
            program_id,
            gateway,
            wallet,
            store: None,
        }
    }

    /// Enable minting through `store`.
    pub fn with_store(mut self, store: Arc<dyn MediaStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Connect to the configured RPC node and pinning service.
    ///
    /// Minting stays unavailable when no pinning credentials are set.
    pub fn connect(config: &MarketConfig, wallet: Arc<dyn Wallet>) -> Result<Self, MarketError> {
        let program_id = config.program_address()?;
        let gateway = RpcGateway::new(config.rpc.clone())
            .map_err(|e| MarketError::Config(e.to_string()))?;
        info!(
            endpoint = %gateway.endpoint(),
            program = %program_id,
            wallet = %wallet.address(),
            "Marketplace connected"
        );

        let mut marketplace = Self::new(program_id, Arc::new(gateway), wallet);
        match PinataStore::new(config.pinata.clone()) {
            Ok(store) => marketplace = marketplace.with_store(Arc::new(store)),
            Err(e) => warn!(error = %e, "Media storage not configured, minting disabled"),
        }
        Ok(marketplace)
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn endpoint(&self) -> &str {
        self.gateway.endpoint()
    }

    pub fn can_mint(&self) -> bool {
        self.store.is_some()
    }

    /// A fresh catalog session for this wallet.
    pub fn catalog_session(&self) -> CatalogSession {
        CatalogSession::new(self.program_id, self.gateway.clone(), self.wallet.clone())
    }

    /// A fresh mint session for this wallet.
    pub fn mint_session(&self) -> Result<MintSession, MarketError> {
        let store = self
            .store
            .clone()
            .ok_or_else(|| MarketError::Config("no media store configured".to_string()))?;
        Ok(MintSession::new(
            self.program_id,
            self.gateway.clone(),
            self.wallet.clone(),
            store,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLedger, MockMediaStore, MockWallet};

    #[test]
    fn test_mint_requires_store() {
        let ledger = Arc::new(MockLedger::default());
        let marketplace = Marketplace::new(ledger.program_id(), ledger, Arc::new(MockWallet::new()));
        assert!(!marketplace.can_mint());
        assert!(matches!(marketplace.mint_session(), Err(MarketError::Config(_))));

        let marketplace = marketplace.with_store(Arc::new(MockMediaStore::new()));
        assert!(marketplace.mint_session().is_ok());
    }

    #[test]
    fn test_connect_without_pinata_credentials() {
        let marketplace =
            Marketplace::connect(&MarketConfig::default(), Arc::new(MockWallet::new())).unwrap();
        assert_eq!(marketplace.endpoint(), "https://api.devnet.solana.com");
        assert!(!marketplace.can_mint());
    }
}
