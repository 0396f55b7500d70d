//! Baseline seed: the five fixed roles and one bootstrap admin account.
//!
//! # Responsibility
//! - Insert baseline roles when the role table is empty.
//! - Insert the admin account when the user table is empty and an `Admin`
//!   role exists.
//!
//! # Invariants
//! - Re-running the seed against populated tables writes nothing.
//! - No fixed password is ever shipped: the admin gets either the caller's
//!   secret or a generated one that must be rotated at first login.
//! - Secrets never reach the log.

use crate::credential::generate_secret;
use crate::model::identity::{NewRole, NewUser, PermissionSet, UserPatch};
use crate::repo::{IdentityRepository, RepoResult};
use log::info;
use std::fmt::{Debug, Formatter};
use std::time::Instant;

pub const ADMIN_ROLE: &str = "Admin";
pub const TEACHER_ROLE: &str = "Teacher";
pub const STUDENT_ROLE: &str = "Student";
pub const PARENT_ROLE: &str = "Parent";
pub const CCTV_OPERATOR_ROLE: &str = "CCTV Operator";

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_EMAIL: &str = "admin@school.com";

const CRUD: &[&str] = &["create", "read", "update", "delete"];
const READ: &[&str] = &["read"];
const READ_SEARCH: &[&str] = &["read", "search"];
const CAMERA_OPERATE: &[&str] = &["read", "search", "update"];
const CREATE_READ: &[&str] = &["create", "read"];

/// Seed loader inputs.
#[derive(Clone, Default)]
pub struct SeedOptions {
    /// Bootstrap admin password. When absent a random one is generated.
    pub admin_secret: Option<String>,
}

impl Debug for SeedOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedOptions")
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// What one seed run wrote.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_inserted: usize,
    pub admin_created: bool,
    /// Generated admin password, present only on the run that created it.
    pub generated_admin_secret: Option<String>,
}

impl Debug for SeedReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedReport")
            .field("roles_inserted", &self.roles_inserted)
            .field("admin_created", &self.admin_created)
            .field(
                "generated_admin_secret",
                &self.generated_admin_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Baseline roles with their permission documents.
pub fn baseline_roles() -> Vec<NewRole> {
    vec![
        NewRole {
            name: ADMIN_ROLE.to_string(),
            description: Some("Full administrative access".to_string()),
            permissions: PermissionSet::from_pairs(&[
                ("users", CRUD),
                ("classes", CRUD),
                ("attendance", CRUD),
                ("homework", CRUD),
                ("camera", READ_SEARCH),
            ]),
        },
        NewRole {
            name: TEACHER_ROLE.to_string(),
            description: Some("Manages classes, attendance and homework".to_string()),
            permissions: PermissionSet::from_pairs(&[
                ("users", READ),
                ("classes", READ),
                ("students", CRUD),
                ("attendance", CRUD),
                ("homework", CRUD),
                ("camera", READ),
            ]),
        },
        NewRole {
            name: STUDENT_ROLE.to_string(),
            description: Some("Views own attendance and homework".to_string()),
            permissions: PermissionSet::from_pairs(&[
                ("attendance", READ),
                ("homework", READ),
                ("reports", READ),
            ]),
        },
        NewRole {
            name: PARENT_ROLE.to_string(),
            description: Some("Views linked students' records".to_string()),
            permissions: PermissionSet::from_pairs(&[
                ("attendance", READ),
                ("homework", READ),
                ("reports", READ),
            ]),
        },
        NewRole {
            name: CCTV_OPERATOR_ROLE.to_string(),
            description: Some("Operates cameras and detection search".to_string()),
            permissions: PermissionSet::from_pairs(&[
                ("camera", CAMERA_OPERATE),
                ("reports", CREATE_READ),
            ]),
        },
    ]
}

/// Loads the baseline rows into empty tables.
///
/// # Side effects
/// - Emits a `seed_ensure` event with what was written.
///
/// # Errors
/// - Propagates repository errors; an explicit `admin_secret` shorter than
///   the password minimum fails validation.
pub fn ensure_seed<R>(repo: &R, options: &SeedOptions) -> RepoResult<SeedReport>
where
    R: IdentityRepository + ?Sized,
{
    let started_at = Instant::now();
    let mut report = SeedReport::default();

    if repo.list_roles()?.is_empty() {
        for role in baseline_roles() {
            repo.create_role(&role)?;
            report.roles_inserted += 1;
        }
    }

    if repo.list_users()?.is_empty() {
        if let Some(admin_role) = repo.get_role_by_name(ADMIN_ROLE)? {
            let (password, generated) = match &options.admin_secret {
                Some(secret) => (secret.clone(), false),
                None => (generate_secret(), true),
            };
            let admin_id = repo.create_user(&NewUser {
                username: ADMIN_USERNAME.to_string(),
                password: password.clone(),
                email: ADMIN_EMAIL.to_string(),
                role_id: admin_role.id,
                first_name: "System".to_string(),
                last_name: "Administrator".to_string(),
                profile_image: None,
            })?;
            if generated {
                repo.update_user(
                    admin_id,
                    &UserPatch {
                        must_change_password: Some(true),
                        ..UserPatch::default()
                    },
                )?;
                report.generated_admin_secret = Some(password);
            }
            report.admin_created = true;
        }
    }

    let secret_source = match (report.admin_created, &report.generated_admin_secret) {
        (false, _) => "none",
        (true, Some(_)) => "generated",
        (true, None) => "explicit",
    };
    info!(
        "event=seed_ensure module=db status=ok roles_inserted={} admin_created={} secret_source={secret_source} duration_ms={}",
        report.roles_inserted,
        report.admin_created,
        started_at.elapsed().as_millis()
    );
    Ok(report)
}
