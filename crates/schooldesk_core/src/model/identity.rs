//! Identity family: roles, users and teacher profiles.
//!
//! # Invariants
//! - `Role.name` is unique.
//! - `User.username` and `User.email` are unique.
//! - At most one `Teacher` row exists per user.
//! - Passwords are only ever persisted as salted digests.

use super::validation::{
    require_email, require_password, require_text, require_username, ValidationError,
};
use super::{RecordId, Timestamp};
use crate::credential::hash_password;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource-keyed permission document, e.g. `{"homework": ["read"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(pub BTreeMap<String, Vec<String>>);

impl PermissionSet {
    /// Builds a permission set from `(resource, actions)` pairs.
    pub fn from_pairs(pairs: &[(&str, &[&str])]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(resource, actions)| {
                    (
                        (*resource).to_string(),
                        actions.iter().map(|action| (*action).to_string()).collect(),
                    )
                })
                .collect(),
        )
    }

    /// Returns whether `action` is granted on `resource`.
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        self.0
            .get(resource)
            .is_some_and(|actions| actions.iter().any(|granted| granted == action))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RecordId,
    pub name: String,
    pub description: Option<String>,
    pub permissions: PermissionSet,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub permissions: PermissionSet,
}

impl NewRole {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Result<Role, ValidationError> {
        require_text("name", &self.name)?;
        Ok(Role {
            id,
            name: self.name.clone(),
            description: self.description.clone(),
            permissions: self.permissions.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub permissions: Option<PermissionSet>,
}

impl RolePatch {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, role: &mut Role, now: Timestamp) {
        if let Some(name) = &self.name {
            role.name = name.clone();
        }
        if let Some(description) = &self.description {
            role.description = description.clone();
        }
        if let Some(permissions) = &self.permissions {
            role.permissions = permissions.clone();
        }
        role.updated_at = now;
    }
}

/// Persisted account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub username: String,
    /// `sha256$<salt>$<hex digest>`.
    pub password_hash: String,
    pub email: String,
    pub role_id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<String>,
    pub is_active: bool,
    /// Set for bootstrap accounts created without an explicit secret.
    pub must_change_password: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Account creation request; `password` is plain text and hashed on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub role_id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<String>,
}

impl NewUser {
    pub(crate) fn to_row(&self, id: RecordId, now: Timestamp) -> Result<User, ValidationError> {
        require_username(&self.username)?;
        require_email(&self.email)?;
        require_password(&self.password)?;
        require_text("first_name", &self.first_name)?;
        Ok(User {
            id,
            username: self.username.clone(),
            password_hash: hash_password(&self.password),
            email: self.email.clone(),
            role_id: self.role_id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            profile_image: self.profile_image.clone(),
            is_active: true,
            must_change_password: false,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial account update. Setting `password` re-hashes it and clears
/// `must_change_password` unless that flag is set explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<RecordId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub must_change_password: Option<bool>,
}

impl UserPatch {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(email) = &self.email {
            require_email(email)?;
        }
        if let Some(password) = &self.password {
            require_password(password)?;
        }
        if let Some(first_name) = &self.first_name {
            require_text("first_name", first_name)?;
        }
        Ok(())
    }

    /// Resolves the password change into the persisted digest and flag.
    pub(crate) fn credential_change(&self) -> (Option<String>, Option<bool>) {
        let digest = self.password.as_deref().map(hash_password);
        let must_change = match (self.must_change_password, digest.is_some()) {
            (Some(flag), _) => Some(flag),
            (None, true) => Some(false),
            (None, false) => None,
        };
        (digest, must_change)
    }

    pub(crate) fn apply(&self, user: &mut User, now: Timestamp) {
        let (digest, must_change) = self.credential_change();
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(digest) = digest {
            user.password_hash = digest;
        }
        if let Some(role_id) = self.role_id {
            user.role_id = role_id;
        }
        if let Some(first_name) = &self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(profile_image) = &self.profile_image {
            user.profile_image = profile_image.clone();
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(must_change) = must_change {
            user.must_change_password = must_change;
        }
        user.updated_at = now;
    }
}

/// User joined with its role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserWithRole {
    #[serde(flatten)]
    pub user: User,
    pub role_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: RecordId,
    pub user_id: RecordId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Teacher {
    pub(crate) fn new_row(id: RecordId, user_id: RecordId, now: Timestamp) -> Self {
        Self {
            id,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}
