//! Account storage backends
//!
//! The account store owns each user's role and AI token balance. Metering
//! only needs a point lookup and an atomic decrement-if-positive; the other
//! operations serve account provisioning and plan upgrades.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learnmore_core::{
    not_found_error, validation_error, ErrorContext, LearnMoreError, Role,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryAccountStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAccountStore;

/// Store operation result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by account stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// Account does not exist
    #[error("Account not found: {user_id}")]
    NotFound { user_id: String },

    /// Account id already taken
    #[error("Account already exists: {user_id}")]
    AlreadyExists { user_id: String },

    /// Credits must add at least one token
    #[error("Invalid credit amount: {amount}")]
    InvalidAmount { amount: i64 },

    /// Crediting would push the balance past the largest storable value
    #[error("Crediting {amount} tokens would overflow the balance of {user_id}")]
    BalanceOverflow { user_id: String, amount: i64 },

    /// Stored data could not be interpreted
    #[error("Corrupt account record for {user_id}: {reason}")]
    Corrupt { user_id: String, reason: String },

    /// The backing database failed or is unreachable
    #[error("Database error during {operation}: {message}")]
    Database {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    pub(crate) fn database<E>(operation: &str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Database {
            operation: operation.to_string(),
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// Whether the failure is in infrastructure rather than in the request
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, StoreError::Database { .. } | StoreError::Corrupt { .. })
    }
}

impl From<StoreError> for LearnMoreError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { user_id } => {
                not_found_error!(format!("account {}", user_id), "account_store")
            }
            rejected @ (StoreError::InvalidAmount { .. } | StoreError::BalanceOverflow { .. }) => {
                validation_error!(rejected, "amount", "account_store")
            }
            other => LearnMoreError::Storage {
                message: other.to_string(),
                source: Some(Box::new(other)),
                context: ErrorContext::new("account_store"),
            },
        }
    }
}

/// Minimal projection of a user record used for entitlement and metering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub role: Role,
    /// Remaining AI tokens. Expected to be non-negative but never assumed to be.
    pub ai_token_balance: i64,
    pub created_at: DateTime<Utc>,
}

impl AccountRecord {
    pub fn new(id: impl Into<String>, role: Role, ai_token_balance: i64) -> Self {
        Self {
            id: id.into(),
            role,
            ai_token_balance,
            created_at: Utc::now(),
        }
    }
}

/// Persistence layer for accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Point lookup of an account
    async fn find_account(&self, user_id: &str) -> StoreResult<Option<AccountRecord>>;

    /// Decrement the balance by one if it is positive, as a single atomic step.
    ///
    /// Returns the balance after the decrement, or `None` when no row was
    /// updated (unknown account or balance already at or below zero).
    async fn decrement_token_if_positive(&self, user_id: &str) -> StoreResult<Option<i64>>;

    /// Insert a new account
    async fn create_account(&self, account: &AccountRecord) -> StoreResult<()>;

    /// Assign a role to an existing account
    async fn set_role(&self, user_id: &str, role: Role) -> StoreResult<()>;

    /// Add tokens to an existing account, returning the new balance.
    ///
    /// `amount` must be positive. A credit that would overflow the balance is
    /// rejected with [`StoreError::BalanceOverflow`] and leaves it unchanged.
    async fn credit_tokens(&self, user_id: &str, amount: i64) -> StoreResult<i64>;

    /// Health check for the storage backend
    async fn health_check(&self) -> StoreResult<()>;
}
