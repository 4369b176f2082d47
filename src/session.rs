/// Session state
///
/// Accounts, active chain, available chains and wallet capabilities. Accounts
/// and the active chain are cached in memory; everything is persisted so a
/// restarted client resumes where it left off.
///
use log::{debug, info, warn};
use serde_json::Value;

use crate::constants::{
    ACCOUNTS_KEY, ACTIVE_CHAIN_KEY, AVAILABLE_CHAINS_KEY, WALLET_CAPABILITIES_KEY,
};
use crate::error::Result;
use crate::storage::ScopedStorage;
use crate::types::{Chain, ResponseData};

pub struct SessionState {
    storage: ScopedStorage,
    default_chain: Chain,
    accounts: Vec<String>,
    chain: Chain,
}

impl SessionState {
    /// Restores the persisted session, falling back to `default_chain_id`
    /// when no chain has been stored yet.
    pub async fn load(storage: ScopedStorage, default_chain_id: u64) -> Result<Self> {
        let default_chain = Chain::new(default_chain_id);
        let accounts = storage
            .load_object::<Vec<String>>(ACCOUNTS_KEY)
            .await?
            .unwrap_or_default();
        let chain = storage
            .load_object::<Chain>(ACTIVE_CHAIN_KEY)
            .await?
            .unwrap_or_else(|| default_chain.clone());
        debug!(
            "session loaded: {} account(s), chain {}",
            accounts.len(),
            chain.id
        );
        Ok(Self {
            storage,
            default_chain,
            accounts,
            chain,
        })
    }

    pub fn accounts(&self) -> &[String] {
        &self.accounts
    }

    pub fn is_authorized(&self) -> bool {
        !self.accounts.is_empty()
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub async fn set_accounts(&mut self, accounts: Vec<String>) -> Result<()> {
        self.storage.store_object(ACCOUNTS_KEY, &accounts).await?;
        self.accounts = accounts;
        Ok(())
    }

    pub async fn available_chains(&self) -> Result<Option<Vec<Chain>>> {
        self.storage.load_object(AVAILABLE_CHAINS_KEY).await
    }

    pub async fn capabilities(&self) -> Result<Option<Value>> {
        self.storage.load_object(WALLET_CAPABILITIES_KEY).await
    }

    /// Switches to `chain_id` if it is among the available chains, storing
    /// `new_chains` first when given. Returns whether the switch happened.
    pub async fn update_chain(
        &mut self,
        chain_id: u64,
        new_chains: Option<Vec<Chain>>,
    ) -> Result<bool> {
        let chains = match new_chains {
            Some(chains) => {
                self.storage
                    .store_object(AVAILABLE_CHAINS_KEY, &chains)
                    .await?;
                Some(chains)
            }
            None => self.available_chains().await?,
        };

        let Some(chain) = chains
            .unwrap_or_default()
            .into_iter()
            .find(|c| c.id == chain_id)
        else {
            return Ok(false);
        };

        if chain != self.chain {
            self.storage.store_object(ACTIVE_CHAIN_KEY, &chain).await?;
            info!("active chain changed: {} -> {}", self.chain.id, chain.id);
            self.chain = chain;
        }
        Ok(true)
    }

    /// Persists chains and capabilities returned with a wallet response.
    pub async fn apply_response_data(&mut self, data: &ResponseData) -> Result<()> {
        if let Some(chains) = data.available_chains()? {
            let fallback = chains.first().map(|c| c.id);
            if !self.update_chain(self.chain.id, Some(chains)).await? {
                if let Some(first) = fallback {
                    warn!(
                        "chain {} not offered by wallet, falling back to {first}",
                        self.chain.id
                    );
                    self.update_chain(first, None).await?;
                }
            }
        }

        if let Some(capabilities) = &data.capabilities {
            self.storage
                .store_object(WALLET_CAPABILITIES_KEY, capabilities)
                .await?;
        }
        Ok(())
    }

    /// Clears persisted state and returns to defaults.
    pub async fn reset(&mut self) -> Result<()> {
        self.storage.clear().await?;
        self.accounts.clear();
        self.chain = self.default_chain.clone();
        Ok(())
    }
}
