//! Core data type definitions

use serde::{Deserialize, Deserializer, Serialize};

use crate::logging::LoggingConfig;
use std::fmt;
use std::str::FromStr;

/// Marketplace role carried by every authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Project owner
    Builder,
    Contractor,
    Supplier,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Builder, Role::Contractor, Role::Supplier];

    /// Wire representation used by the identity service
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Builder => "BUILDER",
            Role::Contractor => "CONTRACTOR",
            Role::Supplier => "SUPPLIER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUILDER" => Ok(Role::Builder),
            "CONTRACTOR" => Ok(Role::Contractor),
            "SUPPLIER" => Ok(Role::Supplier),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Profile sub-record of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Avatar URL or storage reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Authenticated user as returned by `GET /auth/me/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub last_name: String,
    pub profile: UserProfile,
}

impl UserRecord {
    pub fn role(&self) -> Role {
        self.profile.role
    }

    /// Full name when known, otherwise the username or email
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if !full.is_empty() {
            full.to_string()
        } else if !self.username.is_empty() {
            self.username.clone()
        } else {
            self.email.clone()
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Optional profile fields supplied at sign-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub phone_number: Option<String>,
}

impl SignUpMetadata {
    pub fn with_role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }
}

/// Partial update of the current user's profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.phone_number.is_none()
    }
}

/// Authentication state of the current process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Initial resolution has not completed yet
    #[default]
    Unresolved,
    Anonymous,
    Authenticated(UserRecord),
}

impl SessionState {
    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.user().map(UserRecord::role)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionState::Unresolved)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unresolved => write!(f, "unresolved"),
            SessionState::Anonymous => write!(f, "anonymous"),
            SessionState::Authenticated(user) => {
                write!(f, "authenticated as {} ({})", user.email, user.role())
            }
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContechConfig {
    pub identity: IdentityServiceConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote identity service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityServiceConfig {
    /// Base URL including the API prefix, e.g. `http://localhost:8000/api/v1`
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

/// Durable token storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Name of the durable key holding the token
    pub token_key: String,
}
