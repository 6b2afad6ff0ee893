//! In-memory account store, used by tests and local tooling

use super::{AccountRecord, AccountStore, StoreError, StoreResult};
use async_trait::async_trait;
use learnmore_core::Role;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory account store
///
/// The check and the decrement in [`AccountStore::decrement_token_if_positive`]
/// happen under one write lock, which serializes concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountStore {
    accounts: Arc<RwLock<HashMap<String, AccountRecord>>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with accounts
    pub fn with_accounts<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = AccountRecord>,
    {
        let accounts = accounts
            .into_iter()
            .map(|account| (account.id.clone(), account))
            .collect();
        Self {
            accounts: Arc::new(RwLock::new(accounts)),
        }
    }

    /// Current balance, bypassing metering (for inspection)
    pub async fn balance_of(&self, user_id: &str) -> Option<i64> {
        let accounts = self.accounts.read().await;
        accounts.get(user_id).map(|a| a.ai_token_balance)
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_account(&self, user_id: &str) -> StoreResult<Option<AccountRecord>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(user_id).cloned())
    }

    async fn decrement_token_if_positive(&self, user_id: &str) -> StoreResult<Option<i64>> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(user_id) {
            Some(account) if account.ai_token_balance > 0 => {
                account.ai_token_balance -= 1;
                Ok(Some(account.ai_token_balance))
            }
            _ => Ok(None),
        }
    }

    async fn create_account(&self, account: &AccountRecord) -> StoreResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(StoreError::AlreadyExists {
                user_id: account.id.clone(),
            });
        }
        accounts.insert(account.id.clone(), account.clone());
        debug!(user_id = %account.id, role = %account.role, "Created account in memory store");
        Ok(())
    }

    async fn set_role(&self, user_id: &str, role: Role) -> StoreResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound {
                user_id: user_id.to_string(),
            })?;
        account.role = role;
        Ok(())
    }

    async fn credit_tokens(&self, user_id: &str, amount: i64) -> StoreResult<i64> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount { amount });
        }
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound {
                user_id: user_id.to_string(),
            })?;
        account.ai_token_balance = account
            .ai_token_balance
            .checked_add(amount)
            .ok_or_else(|| StoreError::BalanceOverflow {
                user_id: user_id.to_string(),
                amount,
            })?;
        Ok(account.ai_token_balance)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
