//! SQLite-backed account store

use super::{AccountRecord, AccountStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learnmore_core::Role;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// Account store on top of a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    /// Open (creating if missing) the database at `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::database("connect", e))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to connect to account database: {}", e);
                StoreError::database("connect", e)
            })?;

        Self::new(pool).await
    }

    /// Wrap an existing pool and make sure the schema exists
    pub async fn new(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                role TEXT NOT NULL DEFAULT 'STUDENT',
                ai_token_balance INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create accounts table: {}", e);
            StoreError::database("create_tables", e)
        })?;

        info!("Accounts table ready");
        Ok(())
    }

    fn row_to_account(row: &SqliteRow) -> StoreResult<AccountRecord> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::database("decode_account", e))?;

        let role: String = row
            .try_get("role")
            .map_err(|e| StoreError::database("decode_account", e))?;
        let role = role.parse::<Role>().map_err(|reason| StoreError::Corrupt {
            user_id: id.clone(),
            reason,
        })?;

        let ai_token_balance: i64 = row
            .try_get("ai_token_balance")
            .map_err(|e| StoreError::database("decode_account", e))?;

        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::database("decode_account", e))?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt {
                user_id: id.clone(),
                reason: format!("invalid created_at: {}", e),
            })?;

        Ok(AccountRecord {
            id,
            role,
            ai_token_balance,
            created_at,
        })
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn find_account(&self, user_id: &str) -> StoreResult<Option<AccountRecord>> {
        let row = sqlx::query(
            "SELECT id, role, ai_token_balance, created_at FROM accounts WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database("find_account", e))?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    async fn decrement_token_if_positive(&self, user_id: &str) -> StoreResult<Option<i64>> {
        // One conditional statement: the balance check and the write cannot interleave
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET ai_token_balance = ai_token_balance - 1
            WHERE id = ? AND ai_token_balance > 0
            RETURNING ai_token_balance
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database("decrement_token", e))?;

        match row {
            Some(row) => {
                let balance: i64 = row
                    .try_get("ai_token_balance")
                    .map_err(|e| StoreError::database("decrement_token", e))?;
                debug!(user_id = user_id, balance = balance, "Decremented AI token balance");
                Ok(Some(balance))
            }
            None => Ok(None),
        }
    }

    async fn create_account(&self, account: &AccountRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO accounts (id, role, ai_token_balance, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&account.id)
        .bind(account.role.as_str())
        .bind(account.ai_token_balance)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                StoreError::AlreadyExists {
                    user_id: account.id.clone(),
                }
            } else {
                StoreError::database("create_account", e)
            }
        })?;

        debug!(user_id = %account.id, role = %account.role, "Created account");
        Ok(())
    }

    async fn set_role(&self, user_id: &str, role: Role) -> StoreResult<()> {
        let result = sqlx::query("UPDATE accounts SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::database("set_role", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                user_id: user_id.to_string(),
            });
        }

        debug!(user_id = user_id, role = %role, "Updated account role");
        Ok(())
    }

    async fn credit_tokens(&self, user_id: &str, amount: i64) -> StoreResult<i64> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount { amount });
        }

        // SQLite turns an overflowing integer sum into REAL, so the bound is
        // checked in the same statement.
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET ai_token_balance = ai_token_balance + ?
            WHERE id = ? AND ai_token_balance <= 9223372036854775807 - ?
            RETURNING ai_token_balance
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database("credit_tokens", e))?;

        match row {
            Some(row) => row
                .try_get("ai_token_balance")
                .map_err(|e| StoreError::database("credit_tokens", e)),
            None if self.find_account(user_id).await?.is_some() => {
                warn!(user_id = user_id, amount = amount, "Rejected overflowing credit");
                Err(StoreError::BalanceOverflow {
                    user_id: user_id.to_string(),
                    amount,
                })
            }
            None => Err(StoreError::NotFound {
                user_id: user_id.to_string(),
            }),
        }
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::database("health_check", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (SqliteAccountStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("accounts.db").display());
        let store = SqliteAccountStore::connect(&url, 4).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_account_round_trip() {
        let (store, _dir) = open_store().await;
        let account = AccountRecord::new("u1", Role::Teacher, 7);
        store.create_account(&account).await.unwrap();

        let loaded = store.find_account("u1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "u1");
        assert_eq!(loaded.role, Role::Teacher);
        assert_eq!(loaded.ai_token_balance, 7);
        assert_eq!(loaded.created_at.timestamp(), account.created_at.timestamp());

        assert!(store.find_account("missing").await.unwrap().is_none());
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_conditional_decrement() {
        let (store, _dir) = open_store().await;
        store
            .create_account(&AccountRecord::new("u1", Role::Student, 1))
            .await
            .unwrap();

        assert_eq!(store.decrement_token_if_positive("u1").await.unwrap(), Some(0));
        assert_eq!(store.decrement_token_if_positive("u1").await.unwrap(), None);
        assert_eq!(store.decrement_token_if_positive("nobody").await.unwrap(), None);

        let account = store.find_account("u1").await.unwrap().unwrap();
        assert_eq!(account.ai_token_balance, 0);
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_overdraw() {
        let (store, _dir) = open_store().await;
        store
            .create_account(&AccountRecord::new("u1", Role::Student, 3))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.decrement_token_if_positive("u1").await.unwrap()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                granted += 1;
            }
        }

        assert_eq!(granted, 3);
        let account = store.find_account("u1").await.unwrap().unwrap();
        assert_eq!(account.ai_token_balance, 0);
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_accounts() {
        let (store, _dir) = open_store().await;
        let account = AccountRecord::new("u1", Role::Student, 0);
        store.create_account(&account).await.unwrap();

        assert!(matches!(
            store.create_account(&account).await,
            Err(StoreError::AlreadyExists { .. })
        ));
        assert!(matches!(
            store.set_role("ghost", Role::Pro).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.credit_tokens("ghost", 3).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_role_and_credit() {
        let (store, _dir) = open_store().await;
        store
            .create_account(&AccountRecord::new("u1", Role::Student, 0))
            .await
            .unwrap();

        store.set_role("u1", Role::Ultimate).await.unwrap();
        assert_eq!(store.credit_tokens("u1", 5).await.unwrap(), 5);

        let account = store.find_account("u1").await.unwrap().unwrap();
        assert_eq!(account.role, Role::Ultimate);
        assert_eq!(account.ai_token_balance, 5);
    }

    #[tokio::test]
    async fn test_overflowing_credit_leaves_account_readable() {
        let (store, _dir) = open_store().await;
        store
            .create_account(&AccountRecord::new("u1", Role::Student, i64::MAX - 1))
            .await
            .unwrap();

        assert!(matches!(
            store.credit_tokens("u1", 10).await,
            Err(StoreError::BalanceOverflow { amount: 10, .. })
        ));
        assert!(matches!(
            store.credit_tokens("u1", 0).await,
            Err(StoreError::InvalidAmount { amount: 0 })
        ));

        let account = store.find_account("u1").await.unwrap().unwrap();
        assert_eq!(account.ai_token_balance, i64::MAX - 1);

        assert_eq!(store.credit_tokens("u1", 1).await.unwrap(), i64::MAX);
        assert_eq!(
            store.decrement_token_if_positive("u1").await.unwrap(),
            Some(i64::MAX - 1)
        );
    }

    #[tokio::test]
    async fn test_unknown_role_in_database_is_reported() {
        let (store, _dir) = open_store().await;
        sqlx::query(
            "INSERT INTO accounts (id, role, ai_token_balance, created_at) VALUES ('u9', 'PARENT', 0, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(&store.pool)
        .await
        .unwrap();

        let result = store.find_account("u9").await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
        assert!(result.unwrap_err().is_infrastructure());
    }
}
