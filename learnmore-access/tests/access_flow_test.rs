//! End-to-end access checks against a SQLite account store
#![cfg(feature = "sqlite")]

use futures::future::join_all;
use learnmore_access::{
    apply_checkout, AccountRecord, AccountStore, CheckoutCompleted, DenialReason,
    EntitlementResolver, FeatureLevel, IdentityProvider, Permission, PlanOutcome, Remaining, Role,
    SqliteAccountStore, StaticIdentityProvider, TokenMeter,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn sqlite_store() -> (Arc<SqliteAccountStore>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("access.db").display());
    let store = SqliteAccountStore::connect(&url, 4).await.unwrap();
    (Arc::new(store), dir)
}

#[tokio::test]
async fn test_session_to_metered_call() {
    let (store, _dir) = sqlite_store().await;
    store
        .create_account(&AccountRecord::new("student-1", Role::Student, 1))
        .await
        .unwrap();

    let identity = StaticIdentityProvider::new();
    let token = identity.issue_session("student-1");
    let meter = TokenMeter::new(store.clone());

    let user_id = identity.resolve_session(&token);
    let first = meter.consume_token(user_id.as_deref()).await.unwrap();
    assert_eq!(first.remaining(), Some(Remaining::Tokens(0)));

    let second = meter.consume_token(user_id.as_deref()).await.unwrap();
    assert_eq!(second.denial(), Some(DenialReason::InsufficientTokens));

    let anonymous = identity.resolve_session("expired-cookie");
    let third = meter.consume_token(anonymous.as_deref()).await.unwrap();
    assert_eq!(third.denial(), Some(DenialReason::Unauthorized));
}

#[tokio::test]
async fn test_concurrent_consumption_against_sqlite() {
    let (store, _dir) = sqlite_store().await;
    store
        .create_account(&AccountRecord::new("student-1", Role::Student, 1))
        .await
        .unwrap();
    let meter = TokenMeter::new(store.clone());

    let results = join_all((0..2).map(|_| meter.consume_token(Some("student-1")))).await;
    let results: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_granted()).count(), 1);
    assert_eq!(results.iter().filter(|r| !r.is_granted()).count(), 1);

    let account = store.find_account("student-1").await.unwrap().unwrap();
    assert_eq!(account.ai_token_balance, 0);
}

#[tokio::test]
async fn test_unknown_identity_leaves_store_untouched() {
    let (store, _dir) = sqlite_store().await;
    let meter = TokenMeter::new(store.clone());

    let result = meter.consume_token(Some("nobody")).await.unwrap();
    assert_eq!(result.denial(), Some(DenialReason::Unauthorized));
    assert!(store.find_account("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upgrade_unlocks_features_and_unmetered_usage() {
    let (store, _dir) = sqlite_store().await;
    store
        .create_account(&AccountRecord::new("buyer", Role::Student, 0))
        .await
        .unwrap();

    let resolver = EntitlementResolver::default();
    let meter = TokenMeter::new(store.clone());

    let before = store.find_account("buyer").await.unwrap().unwrap();
    assert!(!resolver.has_permission(before.role, Permission::KnowledgeGraph));
    assert!(!resolver.can_access_feature(before.role, FeatureLevel::Ultimate));
    assert_eq!(
        meter.consume_token(Some("buyer")).await.unwrap().denial(),
        Some(DenialReason::InsufficientTokens)
    );

    let outcome = apply_checkout(
        store.as_ref(),
        &CheckoutCompleted {
            user_id: Some("buyer".to_string()),
            plan_name: Some("Ultimate".to_string()),
        },
    )
    .await
    .unwrap();
    assert!(matches!(outcome, PlanOutcome::Upgraded { role: Role::Ultimate, .. }));

    let after = store.find_account("buyer").await.unwrap().unwrap();
    assert!(resolver.has_permission(after.role, Permission::KnowledgeGraph));
    assert!(resolver.can_access_feature(after.role, FeatureLevel::Ultimate));

    let result = meter.consume_token(Some("buyer")).await.unwrap();
    assert_eq!(result.remaining(), Some(Remaining::Unlimited));
    let account = store.find_account("buyer").await.unwrap().unwrap();
    assert_eq!(account.ai_token_balance, 0);
}
