//! Entitlement resolution
//!
//! Maps roles to their permission sets and answers the capability queries
//! used to gate features. Everything here is pure and never suspends.

use learnmore_core::{ErrorContext, LearnMoreError, LearnMoreResult, Role};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Fine-grained capability tags checked by feature-gating call sites
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "access:basic_content")]
    BasicContent,
    #[serde(rename = "access:hd_video")]
    HdVideo,
    #[serde(rename = "access:full_question_bank")]
    FullQuestionBank,
    #[serde(rename = "access:knowledge_graph")]
    KnowledgeGraph,
    #[serde(rename = "access:olympiad_questions")]
    OlympiadQuestions,
    #[serde(rename = "access:parent_app")]
    ParentApp,
    #[serde(rename = "limit:ai_chats_5")]
    AiChats5,
    #[serde(rename = "limit:ai_chats_20")]
    AiChats20,
    #[serde(rename = "limit:ai_chats_100")]
    AiChats100,
    #[serde(rename = "limit:ai_chats_unlimited")]
    AiChatsUnlimited,
}

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::BasicContent,
        Permission::HdVideo,
        Permission::FullQuestionBank,
        Permission::KnowledgeGraph,
        Permission::OlympiadQuestions,
        Permission::ParentApp,
        Permission::AiChats5,
        Permission::AiChats20,
        Permission::AiChats100,
        Permission::AiChatsUnlimited,
    ];

    /// The tag string used by clients and stored settings
    pub fn tag(&self) -> &'static str {
        match self {
            Permission::BasicContent => "access:basic_content",
            Permission::HdVideo => "access:hd_video",
            Permission::FullQuestionBank => "access:full_question_bank",
            Permission::KnowledgeGraph => "access:knowledge_graph",
            Permission::OlympiadQuestions => "access:olympiad_questions",
            Permission::ParentApp => "access:parent_app",
            Permission::AiChats5 => "limit:ai_chats_5",
            Permission::AiChats20 => "limit:ai_chats_20",
            Permission::AiChats100 => "limit:ai_chats_100",
            Permission::AiChatsUnlimited => "limit:ai_chats_unlimited",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();
        Permission::ALL
            .into_iter()
            .find(|p| p.tag() == tag)
            .ok_or_else(|| format!("Unknown permission: {}", s))
    }
}

/// Coarse feature tiers used by pricing-gated screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureLevel {
    Free,
    Pro,
    Ultimate,
}

impl std::fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureLevel::Free => write!(f, "free"),
            FeatureLevel::Pro => write!(f, "pro"),
            FeatureLevel::Ultimate => write!(f, "ultimate"),
        }
    }
}

impl std::str::FromStr for FeatureLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(FeatureLevel::Free),
            "pro" => Ok(FeatureLevel::Pro),
            "ultimate" => Ok(FeatureLevel::Ultimate),
            _ => Err(format!("Unknown feature level: {}", s)),
        }
    }
}

/// Standard permission set for a role.
///
/// The exhaustive match keeps the table total: adding a role without an
/// entry fails to compile.
pub fn role_permissions(role: Role) -> &'static [Permission] {
    use Permission::*;

    match role {
        Role::Student => &[BasicContent, AiChats5],
        Role::Pro => &[BasicContent, HdVideo, FullQuestionBank, AiChats20],
        Role::Ultimate => &[
            BasicContent,
            HdVideo,
            FullQuestionBank,
            KnowledgeGraph,
            OlympiadQuestions,
            ParentApp,
            AiChatsUnlimited,
        ],
        Role::Teacher => &[
            BasicContent,
            HdVideo,
            FullQuestionBank,
            KnowledgeGraph,
            OlympiadQuestions,
            AiChatsUnlimited,
        ],
        Role::Admin => &[
            BasicContent,
            HdVideo,
            FullQuestionBank,
            KnowledgeGraph,
            OlympiadQuestions,
            ParentApp,
            AiChatsUnlimited,
        ],
    }
}

/// Check whether `role` holds `permission` in the standard table
pub fn has_permission(role: Role, permission: Permission) -> bool {
    role_permissions(role).contains(&permission)
}

/// Check whether `role` may use features of the given tier
pub fn can_access_feature(role: Role, level: FeatureLevel) -> bool {
    match level {
        FeatureLevel::Free => true,
        FeatureLevel::Pro => matches!(
            role,
            Role::Pro | Role::Ultimate | Role::Teacher | Role::Admin
        ),
        FeatureLevel::Ultimate => matches!(role, Role::Ultimate | Role::Admin),
    }
}

/// Role to permission-set mapping
///
/// Lookups for a role without an entry yield no permissions. Tables built
/// from custom entries should be checked with [`ensure_complete`] at startup.
///
/// [`ensure_complete`]: RolePermissionTable::ensure_complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionTable {
    entries: HashMap<Role, HashSet<Permission>>,
}

impl RolePermissionTable {
    /// The standard table shipped with the product
    pub fn standard() -> Self {
        Self::from_entries(
            Role::ALL
                .into_iter()
                .map(|role| (role, role_permissions(role).to_vec())),
        )
    }

    /// Build a table from explicit entries
    pub fn from_entries<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Role, P)>,
        P: IntoIterator<Item = Permission>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(role, permissions)| (role, permissions.into_iter().collect()))
                .collect(),
        }
    }

    /// Fail if any role lacks an entry
    pub fn ensure_complete(&self) -> LearnMoreResult<()> {
        let missing: Vec<&str> = Role::ALL
            .iter()
            .filter(|role| !self.entries.contains_key(*role))
            .map(|role| role.as_str())
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(LearnMoreError::Config {
            message: format!("Permission table has no entry for: {}", missing.join(", ")),
            source: None,
            context: ErrorContext::new("entitlements")
                .with_operation("ensure_complete")
                .with_suggestion("Add an entry for every role, even if it is empty"),
        })
    }

    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.entries
            .get(&role)
            .map_or(false, |permissions| permissions.contains(&permission))
    }

    /// Permissions held by `role`, sorted for stable display
    pub fn permissions(&self, role: Role) -> Vec<Permission> {
        let mut permissions: Vec<Permission> = self
            .entries
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        permissions.sort();
        permissions
    }
}

impl Default for RolePermissionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Capability lookups against an injected permission table
#[derive(Debug, Clone, Default)]
pub struct EntitlementResolver {
    table: RolePermissionTable,
}

impl EntitlementResolver {
    /// Create a resolver, rejecting incomplete tables
    pub fn new(table: RolePermissionTable) -> LearnMoreResult<Self> {
        table.ensure_complete()?;
        Ok(Self { table })
    }

    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.table.has_permission(role, permission)
    }

    pub fn can_access_feature(&self, role: Role, level: FeatureLevel) -> bool {
        can_access_feature(role, level)
    }

    pub fn permissions_for(&self, role: Role) -> Vec<Permission> {
        self.table.permissions(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_features_open_to_every_role() {
        for role in Role::ALL {
            assert!(can_access_feature(role, FeatureLevel::Free), "{role}");
        }
    }

    #[test]
    fn test_feature_level_policy() {
        assert!(!can_access_feature(Role::Student, FeatureLevel::Pro));
        assert!(can_access_feature(Role::Pro, FeatureLevel::Pro));
        assert!(can_access_feature(Role::Ultimate, FeatureLevel::Pro));
        assert!(can_access_feature(Role::Teacher, FeatureLevel::Pro));
        assert!(can_access_feature(Role::Admin, FeatureLevel::Pro));

        assert!(!can_access_feature(Role::Student, FeatureLevel::Ultimate));
        assert!(!can_access_feature(Role::Pro, FeatureLevel::Ultimate));
        assert!(!can_access_feature(Role::Teacher, FeatureLevel::Ultimate));
        assert!(can_access_feature(Role::Ultimate, FeatureLevel::Ultimate));
        assert!(can_access_feature(Role::Admin, FeatureLevel::Ultimate));
    }

    #[test]
    fn test_knowledge_graph_permission() {
        assert!(!has_permission(Role::Student, Permission::KnowledgeGraph));
        assert!(!has_permission(Role::Pro, Permission::KnowledgeGraph));
        assert!(has_permission(Role::Ultimate, Permission::KnowledgeGraph));
        assert!(has_permission(Role::Teacher, Permission::KnowledgeGraph));
    }

    #[test]
    fn test_parent_app_is_not_granted_to_teachers() {
        assert!(has_permission(Role::Ultimate, Permission::ParentApp));
        assert!(has_permission(Role::Admin, Permission::ParentApp));
        assert!(!has_permission(Role::Teacher, Permission::ParentApp));
    }

    #[test]
    fn test_every_role_has_basic_content() {
        for role in Role::ALL {
            assert!(has_permission(role, Permission::BasicContent));
        }
    }

    #[test]
    fn test_ai_chat_limits_per_role() {
        assert!(has_permission(Role::Student, Permission::AiChats5));
        assert!(has_permission(Role::Pro, Permission::AiChats20));
        assert!(!has_permission(Role::Pro, Permission::AiChatsUnlimited));
        // No role is currently granted the 100-chat tier
        for role in Role::ALL {
            assert!(!has_permission(role, Permission::AiChats100));
        }
    }

    #[test]
    fn test_permission_tags_parse() {
        for permission in Permission::ALL {
            assert_eq!(permission.tag().parse::<Permission>().unwrap(), permission);
        }
        assert!("access:everything".parse::<Permission>().is_err());
        assert_eq!(
            serde_json::to_string(&Permission::HdVideo).unwrap(),
            "\"access:hd_video\""
        );
    }

    #[test]
    fn test_feature_level_rejects_unknown_values() {
        assert_eq!("PRO".parse::<FeatureLevel>().unwrap(), FeatureLevel::Pro);
        assert!("enterprise".parse::<FeatureLevel>().is_err());
    }

    #[test]
    fn test_standard_table_matches_free_functions() {
        let table = RolePermissionTable::standard();
        assert!(table.ensure_complete().is_ok());
        for role in Role::ALL {
            for permission in Permission::ALL {
                assert_eq!(
                    table.has_permission(role, permission),
                    has_permission(role, permission)
                );
            }
        }
    }

    #[test]
    fn test_missing_entry_fails_closed() {
        let table = RolePermissionTable::from_entries([(
            Role::Student,
            vec![Permission::BasicContent],
        )]);

        assert!(!table.has_permission(Role::Admin, Permission::BasicContent));
        assert!(table.permissions(Role::Admin).is_empty());

        let error = table.ensure_complete().unwrap_err();
        let message = error.to_string();
        assert!(message.contains("ADMIN"));
        assert!(!message.contains("STUDENT"));
        assert!(EntitlementResolver::new(table).is_err());
    }

    #[test]
    fn test_resolver_lists_sorted_permissions() {
        let resolver = EntitlementResolver::default();
        assert_eq!(
            resolver.permissions_for(Role::Student),
            vec![Permission::BasicContent, Permission::AiChats5]
        );
        assert!(resolver.has_permission(Role::Admin, Permission::ParentApp));
        assert!(!resolver.can_access_feature(Role::Pro, FeatureLevel::Ultimate));
    }
}
