use crate::{
    error::ApiError,
    models::{DEFAULT_ROLE, NewUser, RegisterUserRequest, UpdateUserRequest, User},
    repository::RepositoryState,
};

/// UserService
///
/// The user/role consistency rules: registration with a unique identity and the default
/// role, name/group edits that never touch identity or roles, full-set role replacement
/// restricted to known roles, and hard deletion.
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
}

impl UserService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// register
    ///
    /// Creates a user holding exactly the `student` role. Fails with `Conflict` when the
    /// non-zero GitHub or Telegram id is already registered. Any `roles` in the request are
    /// ignored.
    #[tracing::instrument(skip(self, req), fields(github_id = req.github_id, telegram_id = req.telegram_id))]
    pub async fn register(&self, req: RegisterUserRequest) -> Result<User, ApiError> {
        if !req.roles.is_empty() {
            tracing::debug!(ignored = ?req.roles, "roles in a registration request are ignored");
        }

        match self.repo.create_user(NewUser::from(req), DEFAULT_ROLE).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "user registered");
                Ok(user)
            }
            Err(err) => {
                let err = ApiError::from(err);
                if matches!(err, ApiError::Conflict(_)) {
                    tracing::warn!("registration rejected: identity already registered");
                }
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, id: i64) -> Result<User, ApiError> {
        self.repo.get_user(id).await?.ok_or(ApiError::NotFound)
    }

    /// Role names of the user, in role enumeration order.
    #[tracing::instrument(skip(self))]
    pub async fn get_user_roles(&self, id: i64) -> Result<Vec<String>, ApiError> {
        Ok(self.get_user(id).await?.role_names())
    }

    /// update_info
    ///
    /// Overwrites the full name and group. External ids and roles are left as they are.
    #[tracing::instrument(skip(self, req))]
    pub async fn update_info(&self, id: i64, req: UpdateUserRequest) -> Result<User, ApiError> {
        let user = self
            .repo
            .update_user_info(id, &req.full_name, &req.group_name)
            .await?
            .ok_or(ApiError::NotFound)?;

        tracing::info!(user_id = id, "user info updated");
        Ok(user)
    }

    /// update_roles
    ///
    /// Replaces the user's entire role set with the named roles. Duplicate names collapse to
    /// one membership. The list must be non-empty and every name must be a known role;
    /// otherwise nothing is changed.
    #[tracing::instrument(skip(self))]
    pub async fn update_roles(&self, id: i64, names: Vec<String>) -> Result<User, ApiError> {
        let names = dedup_preserving_order(names);
        if names.is_empty() {
            return Err(ApiError::BadRequest(
                "roles must name at least one role".to_string(),
            ));
        }

        let resolved = self.repo.find_roles(&names).await?;
        let unknown: Vec<&str> = names
            .iter()
            .filter(|name| !resolved.iter().any(|role| &role.name == *name))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "unknown role(s): {}",
                unknown.join(", ")
            )));
        }

        let user = self
            .repo
            .replace_user_roles(id, &resolved)
            .await?
            .ok_or(ApiError::NotFound)?;

        tracing::info!(user_id = id, roles = ?user.role_names(), "user roles replaced");
        Ok(user)
    }

    /// Hard delete. `NotFound` when no such user existed.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        if self.repo.delete_user(id).await? {
            tracing::info!(user_id = id, "user deleted");
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    }
}

fn dedup_preserving_order(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}
