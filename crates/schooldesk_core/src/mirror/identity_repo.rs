use super::MirrorStore;
use crate::model::identity::{
    NewRole, NewUser, Role, RolePatch, Teacher, User, UserPatch, UserWithRole,
};
use crate::model::{now_ms, RecordId};
use crate::repo::{IdentityRepository, RepoResult};

impl IdentityRepository for MirrorStore {
    fn list_roles(&self) -> RepoResult<Vec<Role>> {
        self.read(|state| Ok(state.roles.values().cloned().collect()))
    }

    fn get_role(&self, id: RecordId) -> RepoResult<Option<Role>> {
        self.read(|state| Ok(state.roles.get(&id).cloned()))
    }

    fn get_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        self.read(|state| Ok(state.roles.values().find(|role| role.name == name).cloned()))
    }

    fn create_role(&self, role: &NewRole) -> RepoResult<RecordId> {
        let row = role.to_row(0, now_ms())?;
        self.write(|tx| tx.insert(row))
    }

    fn update_role(&self, id: RecordId, patch: &RolePatch) -> RepoResult<usize> {
        patch.validate()?;
        let now = now_ms();
        self.write(|tx| tx.update::<Role>(id, |row| patch.apply(row, now)))
    }

    fn delete_role(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<Role>(id))
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        self.read(|state| Ok(state.users.values().cloned().collect()))
    }

    fn get_user(&self, id: RecordId) -> RepoResult<Option<User>> {
        self.read(|state| Ok(state.users.get(&id).cloned()))
    }

    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.read(|state| {
            Ok(state
                .users
                .values()
                .find(|user| user.username == username)
                .cloned())
        })
    }

    fn list_users_with_roles(&self) -> RepoResult<Vec<UserWithRole>> {
        self.read(|state| {
            Ok(state
                .users
                .values()
                .filter_map(|user| {
                    state.roles.get(&user.role_id).map(|role| UserWithRole {
                        user: user.clone(),
                        role_name: role.name.clone(),
                    })
                })
                .collect())
        })
    }

    fn create_user(&self, user: &NewUser) -> RepoResult<RecordId> {
        let row = user.to_row(0, now_ms())?;
        self.write(|tx| tx.insert(row))
    }

    fn update_user(&self, id: RecordId, patch: &UserPatch) -> RepoResult<usize> {
        patch.validate()?;
        let now = now_ms();
        self.write(|tx| tx.update::<User>(id, |row| patch.apply(row, now)))
    }

    fn delete_user(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<User>(id))
    }

    fn list_teachers(&self) -> RepoResult<Vec<Teacher>> {
        self.read(|state| Ok(state.teachers.values().cloned().collect()))
    }

    fn get_teacher(&self, id: RecordId) -> RepoResult<Option<Teacher>> {
        self.read(|state| Ok(state.teachers.get(&id).cloned()))
    }

    fn create_teacher(&self, user_id: RecordId) -> RepoResult<RecordId> {
        let row = Teacher::new_row(0, user_id, now_ms());
        self.write(|tx| tx.insert(row))
    }

    fn delete_teacher(&self, id: RecordId) -> RepoResult<usize> {
        self.write(|tx| tx.remove::<Teacher>(id))
    }
}
