//! LearnMore Access - Entitlements and AI usage metering
//!
//! This crate decides what a user may do and pays for what they use:
//!
//! - **Entitlements** ([`permissions`]): static role → permission table and
//!   feature-tier checks. Pure, never suspends.
//! - **Metering** ([`metering`]): one AI token per metered action, with
//!   unmetered roles bypassing the balance entirely.
//! - **Billing** ([`billing`]): completed checkouts upgrade the buyer's role.
//! - **Tutor** ([`tutor`]): the metered AI explanation of a wrong answer.
//!
//! Persistence and identity are injected through [`store::AccountStore`] and
//! [`identity::IdentityProvider`]; nothing here reaches for global state.

pub mod billing;
pub mod identity;
pub mod metering;
pub mod permissions;
pub mod store;
pub mod tutor;

pub use billing::{apply_checkout, role_for_plan, BillingError, CheckoutCompleted, PlanOutcome};
pub use identity::{IdentityProvider, StaticIdentityProvider};
pub use metering::{DenialReason, Remaining, TokenCheckResult, TokenMeter};
pub use permissions::{
    can_access_feature, has_permission, role_permissions, EntitlementResolver, FeatureLevel,
    Permission, RolePermissionTable,
};
pub use store::{AccountRecord, AccountStore, MemoryAccountStore, StoreError, StoreResult};
#[cfg(feature = "sqlite")]
pub use store::SqliteAccountStore;
pub use tutor::{
    CompletionProvider, GeminiProvider, MemoryQuestionSource, QuestionContext, QuestionSource,
    TutorError, TutorReply, TutorRequest, TutorService,
};

pub use learnmore_core::Role;
