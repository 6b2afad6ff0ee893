//! Core data type definitions

use serde::{Deserialize, Serialize};

/// Coarse-grained tier assigned to a user account.
///
/// Roles drive both feature gating and AI usage limits. They are assigned
/// outside the access core (sign-up defaults, plan upgrades, operators).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Student,
    Pro,
    Ultimate,
    Teacher,
    Admin,
}

impl Role {
    /// Every role, in declaration order
    pub const ALL: [Role; 5] = [
        Role::Student,
        Role::Pro,
        Role::Ultimate,
        Role::Teacher,
        Role::Admin,
    ];

    /// Canonical upper-case name, as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Pro => "PRO",
            Role::Ultimate => "ULTIMATE",
            Role::Teacher => "TEACHER",
            Role::Admin => "ADMIN",
        }
    }

    /// Roles whose AI usage is not metered at all.
    ///
    /// TEACHER carries the unlimited chat permission tag but is still metered.
    pub fn is_unmetered(&self) -> bool {
        matches!(self, Role::Ultimate | Role::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "PRO" => Ok(Role::Pro),
            "ULTIMATE" => Ok(Role::Ultimate),
            "TEACHER" => Ok(Role::Teacher),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Identifier of a user account, as issued by the identity provider
pub type UserId = String;
