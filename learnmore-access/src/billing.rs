//! Plan upgrades from completed checkouts
//!
//! The payment provider reports a completed checkout with the buyer's user id
//! and the purchased plan name in its metadata. Known plans map to a role;
//! unknown plans are acknowledged and ignored.

use crate::store::{AccountStore, StoreError};
use learnmore_core::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Role granted by a purchased plan, if the plan is known
pub fn role_for_plan(plan_name: &str) -> Option<Role> {
    match plan_name.trim().to_lowercase().as_str() {
        "self-learner" => Some(Role::Pro),
        // No dedicated tier yet; scholars get PRO
        "scholar" => Some(Role::Pro),
        "ultimate" => Some(Role::Ultimate),
        _ => None,
    }
}

/// Metadata of a completed checkout session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCompleted {
    pub user_id: Option<String>,
    pub plan_name: Option<String>,
}

/// What applying a checkout did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    Upgraded { user_id: String, role: Role },
    /// The plan name maps to no role; nothing was written
    Ignored { plan_name: String },
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Checkout is missing metadata: {field}")]
    MissingMetadata { field: &'static str },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Apply a completed checkout to the buyer's account
pub async fn apply_checkout(
    store: &dyn AccountStore,
    checkout: &CheckoutCompleted,
) -> Result<PlanOutcome, BillingError> {
    let user_id = checkout
        .user_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(BillingError::MissingMetadata { field: "userId" })?;
    let plan_name = checkout
        .plan_name
        .as_deref()
        .filter(|plan| !plan.is_empty())
        .ok_or(BillingError::MissingMetadata { field: "planName" })?;

    let Some(role) = role_for_plan(plan_name) else {
        warn!(user_id = user_id, plan = plan_name, "Checkout for unknown plan ignored");
        return Ok(PlanOutcome::Ignored {
            plan_name: plan_name.to_string(),
        });
    };

    store.set_role(user_id, role).await?;
    info!(user_id = user_id, plan = plan_name, role = %role, "Applied plan upgrade");

    Ok(PlanOutcome::Upgraded {
        user_id: user_id.to_string(),
        role,
    })
}
