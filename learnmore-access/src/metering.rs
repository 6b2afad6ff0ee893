//! AI token metering
//!
//! Gates a metered action (an AI tutoring call) on the caller's token
//! balance. Unmetered roles pass without touching the balance; everyone else
//! pays exactly one token per granted call through the store's atomic
//! conditional decrement.
//!
//! Business denials are returned as [`TokenCheckResult::Denied`]. Only store
//! failures are errors, and they are never retried here: once `Granted` has
//! been observed the action is paid for.

use crate::store::{AccountStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tokens left after a granted call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remaining {
    /// The role is not metered; there is no balance to report
    Unlimited,
    Tokens(i64),
}

impl std::fmt::Display for Remaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Remaining::Unlimited => write!(f, "unlimited"),
            Remaining::Tokens(n) => write!(f, "{}", n),
        }
    }
}

/// Why a metered call was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// No identity, or the identity has no account
    Unauthorized,
    /// The account has no tokens left
    InsufficientTokens,
}

impl DenialReason {
    /// User-facing message
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::Unauthorized => "Unauthorized",
            DenialReason::InsufficientTokens => "Insufficient AI tokens",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a metering check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TokenCheckResult {
    Granted { remaining: Remaining },
    Denied { reason: DenialReason },
}

impl TokenCheckResult {
    pub fn is_granted(&self) -> bool {
        matches!(self, TokenCheckResult::Granted { .. })
    }

    pub fn remaining(&self) -> Option<Remaining> {
        match self {
            TokenCheckResult::Granted { remaining } => Some(*remaining),
            TokenCheckResult::Denied { .. } => None,
        }
    }

    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            TokenCheckResult::Granted { .. } => None,
            TokenCheckResult::Denied { reason } => Some(*reason),
        }
    }

    fn denied(reason: DenialReason) -> Self {
        TokenCheckResult::Denied { reason }
    }
}

/// Token metering service
#[derive(Clone)]
pub struct TokenMeter {
    store: Arc<dyn AccountStore>,
}

impl TokenMeter {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Consume one AI token for `user_id`, if allowed.
    ///
    /// `None` means the caller has no authenticated identity. Not idempotent:
    /// every `Granted` for a metered role has used up one token.
    pub async fn consume_token(&self, user_id: Option<&str>) -> StoreResult<TokenCheckResult> {
        let Some(user_id) = user_id else {
            debug!("Metering request without identity");
            return Ok(TokenCheckResult::denied(DenialReason::Unauthorized));
        };

        let Some(account) = self.store.find_account(user_id).await? else {
            warn!(user_id = user_id, "Metering request for unknown account");
            return Ok(TokenCheckResult::denied(DenialReason::Unauthorized));
        };

        if account.role.is_unmetered() {
            debug!(user_id = user_id, role = %account.role, "Unmetered role, skipping balance");
            return Ok(TokenCheckResult::Granted {
                remaining: Remaining::Unlimited,
            });
        }

        if account.ai_token_balance <= 0 {
            info!(
                user_id = user_id,
                balance = account.ai_token_balance,
                "AI token balance exhausted"
            );
            return Ok(TokenCheckResult::denied(DenialReason::InsufficientTokens));
        }

        match self.store.decrement_token_if_positive(user_id).await? {
            Some(balance) => {
                debug!(user_id = user_id, remaining = balance, "Consumed AI token");
                Ok(TokenCheckResult::Granted {
                    remaining: Remaining::Tokens(balance),
                })
            }
            None => {
                // A concurrent call took the last token between the read and the update
                info!(user_id = user_id, "Lost race for last AI token");
                Ok(TokenCheckResult::denied(DenialReason::InsufficientTokens))
            }
        }
    }
}
