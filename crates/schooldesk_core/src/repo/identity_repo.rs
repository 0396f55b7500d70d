//! Identity repository: roles, users and teacher profiles.
//!
//! # Invariants
//! - Role names, usernames and emails are unique.
//! - One teacher row per user.

use super::sqlite::{delete_by_id, SqliteRepository, UpdateBuilder};
use super::{RepoError, RepoResult};
use crate::model::identity::{
    NewRole, NewUser, PermissionSet, Role, RolePatch, Teacher, User, UserPatch, UserWithRole,
};
use crate::model::{now_ms, RecordId};
use rusqlite::{params, OptionalExtension, Row};

const ROLE_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    permissions,
    created_at,
    updated_at
FROM roles";

const USER_COLUMNS: &str = "u.id AS id,
    u.username AS username,
    u.password_hash AS password_hash,
    u.email AS email,
    u.role_id AS role_id,
    u.first_name AS first_name,
    u.last_name AS last_name,
    u.profile_image AS profile_image,
    u.is_active AS is_active,
    u.must_change_password AS must_change_password,
    u.created_at AS created_at,
    u.updated_at AS updated_at";

const TEACHER_SELECT_SQL: &str = "SELECT id, user_id, created_at, updated_at FROM teachers";

/// Repository interface for roles, users and teachers.
pub trait IdentityRepository {
    fn list_roles(&self) -> RepoResult<Vec<Role>>;
    fn get_role(&self, id: RecordId) -> RepoResult<Option<Role>>;
    fn get_role_by_name(&self, name: &str) -> RepoResult<Option<Role>>;
    fn create_role(&self, role: &NewRole) -> RepoResult<RecordId>;
    fn update_role(&self, id: RecordId, patch: &RolePatch) -> RepoResult<usize>;
    fn delete_role(&self, id: RecordId) -> RepoResult<usize>;

    fn list_users(&self) -> RepoResult<Vec<User>>;
    fn get_user(&self, id: RecordId) -> RepoResult<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Users joined with their role name.
    fn list_users_with_roles(&self) -> RepoResult<Vec<UserWithRole>>;
    fn create_user(&self, user: &NewUser) -> RepoResult<RecordId>;
    fn update_user(&self, id: RecordId, patch: &UserPatch) -> RepoResult<usize>;
    fn delete_user(&self, id: RecordId) -> RepoResult<usize>;

    fn list_teachers(&self) -> RepoResult<Vec<Teacher>>;
    fn get_teacher(&self, id: RecordId) -> RepoResult<Option<Teacher>>;
    fn create_teacher(&self, user_id: RecordId) -> RepoResult<RecordId>;
    fn delete_teacher(&self, id: RecordId) -> RepoResult<usize>;
}

impl IdentityRepository for SqliteRepository<'_> {
    fn list_roles(&self) -> RepoResult<Vec<Role>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ROLE_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut roles = Vec::new();
        while let Some(row) = rows.next()? {
            roles.push(parse_role_row(row)?);
        }
        Ok(roles)
    }

    fn get_role(&self, id: RecordId) -> RepoResult<Option<Role>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ROLE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_role_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ROLE_SELECT_SQL} WHERE name = ?1;"))?;
        let mut rows = stmt.query([name])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_role_row(row)?)),
            None => Ok(None),
        }
    }

    fn create_role(&self, role: &NewRole) -> RepoResult<RecordId> {
        let row = role.to_row(0, now_ms())?;
        self.conn.execute(
            "INSERT INTO roles (name, description, permissions, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                row.name,
                row.description,
                encode_permissions(&row.permissions)?,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_role(&self, id: RecordId, patch: &RolePatch) -> RepoResult<usize> {
        patch.validate()?;
        let mut update = UpdateBuilder::new("roles");
        if let Some(name) = &patch.name {
            update.set("name", name.clone());
        }
        if let Some(description) = &patch.description {
            update.set("description", description.clone());
        }
        if let Some(permissions) = &patch.permissions {
            update.set("permissions", encode_permissions(permissions)?);
        }
        update.execute(self.conn, id)
    }

    fn delete_role(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "roles", id)
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users u ORDER BY u.id ASC;"
        ))?;
        let users = stmt
            .query_map([], parse_user_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn get_user(&self, id: RecordId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1;"),
                [id],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }

    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1;"),
                [username],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }

    fn list_users_with_roles(&self) -> RepoResult<Vec<UserWithRole>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS}, r.name AS role_name
             FROM users u
             JOIN roles r ON r.id = u.role_id
             ORDER BY u.id ASC;"
        ))?;
        let users = stmt
            .query_map([], |row| {
                Ok(UserWithRole {
                    user: parse_user_row(row)?,
                    role_name: row.get("role_name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn create_user(&self, user: &NewUser) -> RepoResult<RecordId> {
        let row = user.to_row(0, now_ms())?;
        insert_user_row(self, &row)
    }

    fn update_user(&self, id: RecordId, patch: &UserPatch) -> RepoResult<usize> {
        patch.validate()?;
        let (digest, must_change) = patch.credential_change();
        let mut update = UpdateBuilder::new("users");
        if let Some(email) = &patch.email {
            update.set("email", email.clone());
        }
        if let Some(digest) = digest {
            update.set("password_hash", digest);
        }
        if let Some(role_id) = patch.role_id {
            update.set("role_id", role_id);
        }
        if let Some(first_name) = &patch.first_name {
            update.set("first_name", first_name.clone());
        }
        if let Some(last_name) = &patch.last_name {
            update.set("last_name", last_name.clone());
        }
        if let Some(profile_image) = &patch.profile_image {
            update.set("profile_image", profile_image.clone());
        }
        if let Some(is_active) = patch.is_active {
            update.set("is_active", is_active);
        }
        if let Some(must_change) = must_change {
            update.set("must_change_password", must_change);
        }
        update.execute(self.conn, id)
    }

    fn delete_user(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "users", id)
    }

    fn list_teachers(&self) -> RepoResult<Vec<Teacher>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEACHER_SELECT_SQL} ORDER BY id ASC;"))?;
        let teachers = stmt
            .query_map([], parse_teacher_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(teachers)
    }

    fn get_teacher(&self, id: RecordId) -> RepoResult<Option<Teacher>> {
        let teacher = self
            .conn
            .query_row(
                &format!("{TEACHER_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_teacher_row,
            )
            .optional()?;
        Ok(teacher)
    }

    fn create_teacher(&self, user_id: RecordId) -> RepoResult<RecordId> {
        let row = Teacher::new_row(0, user_id, now_ms());
        self.conn.execute(
            "INSERT INTO teachers (user_id, created_at, updated_at) VALUES (?1, ?2, ?3);",
            params![row.user_id, row.created_at, row.updated_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn delete_teacher(&self, id: RecordId) -> RepoResult<usize> {
        delete_by_id(self.conn, "teachers", id)
    }
}

pub(super) fn insert_user_row(repo: &SqliteRepository<'_>, row: &User) -> RepoResult<RecordId> {
    repo.conn.execute(
        "INSERT INTO users (
            username,
            password_hash,
            email,
            role_id,
            first_name,
            last_name,
            profile_image,
            is_active,
            must_change_password,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
        params![
            row.username,
            row.password_hash,
            row.email,
            row.role_id,
            row.first_name,
            row.last_name,
            row.profile_image,
            row.is_active,
            row.must_change_password,
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(repo.conn.last_insert_rowid())
}

fn parse_role_row(row: &Row<'_>) -> RepoResult<Role> {
    let permissions_text: String = row.get("permissions")?;
    let permissions = serde_json::from_str::<PermissionSet>(&permissions_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid permissions document in roles: {err}"))
    })?;
    Ok(Role {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        permissions,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(super) fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        email: row.get("email")?,
        role_id: row.get("role_id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        profile_image: row.get("profile_image")?,
        is_active: row.get("is_active")?,
        must_change_password: row.get("must_change_password")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_teacher_row(row: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn encode_permissions(permissions: &PermissionSet) -> RepoResult<String> {
    serde_json::to_string(permissions)
        .map_err(|err| RepoError::InvalidData(format!("unserializable permissions: {err}")))
}
