use crate::{
    error::RepositoryError,
    models::{CANONICAL_ROLES, NewUser, Role, User, UserRow},
};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Repository Trait
///
/// The persistence contract behind the user/role service. Every method is a single logical
/// store transaction; uniqueness and atomicity are enforced by the store, not by locks in
/// this process.
///
/// `Ok(None)` / `Ok(false)` mean "no such user".
#[async_trait]
pub trait Repository: Send + Sync {
    /// Checks that neither non-zero external id is taken, attaches `default_role` and inserts
    /// the user, all in one transaction.
    async fn create_user(&self, user: NewUser, default_role: &str) -> Result<User, RepositoryError>;

    /// Fetches a user with its roles populated.
    async fn get_user(&self, id: i64) -> Result<Option<User>, RepositoryError>;

    /// Overwrites `full_name` and `group_name` only.
    async fn update_user_info(
        &self,
        id: i64,
        full_name: &str,
        group_name: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Resolves role names by exact match. Names without a role are simply absent from the result.
    async fn find_roles(&self, names: &[String]) -> Result<Vec<Role>, RepositoryError>;

    /// Replaces the user's whole role set with `roles`.
    async fn replace_user_roles(
        &self,
        id: i64,
        roles: &[Role],
    ) -> Result<Option<User>, RepositoryError>;

    /// Hard-deletes the user; association rows go with it. Returns whether a row existed.
    async fn delete_user(&self, id: i64) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, COALESCE(github_id, 0) AS github_id, \
                            COALESCE(telegram_id, 0) AS telegram_id, full_name, group_name";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn load_roles(conn: &mut PgConnection, user_id: i64) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        r#"
        SELECT r.id, r.name
        FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = $1
        ORDER BY r.id
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// The existence check is advisory; the UNIQUE constraints on `github_id`/`telegram_id`
    /// catch a concurrent registration, which is reported as `Duplicate` too.
    async fn create_user(&self, user: NewUser, default_role: &str) -> Result<User, RepositoryError> {
        let github_id = user.stored_github_id();
        let telegram_id = user.stored_telegram_id();

        let mut tx = self.pool.begin().await?;

        // NULL never compares equal, so unset ids cannot produce a match.
        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE github_id = $1 OR telegram_id = $2",
        )
        .bind(github_id)
        .bind(telegram_id)
        .fetch_one(&mut *tx)
        .await?;
        if existing > 0 {
            return Err(RepositoryError::Duplicate);
        }

        let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE name = $1")
            .bind(default_role)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::MissingRole(default_role.to_string()))?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (github_id, telegram_id, full_name, group_name) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(github_id)
        .bind(telegram_id)
        .bind(&user.full_name)
        .bind(&user.group_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from_write)?;

        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(row.id)
            .bind(role.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(RepositoryError::from_write)?;

        Ok(row.with_roles(vec![role]))
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let roles = load_roles(&mut *conn, row.id).await?;
                Ok(Some(row.with_roles(roles)))
            }
            None => Ok(None),
        }
    }

    async fn update_user_info(
        &self,
        id: i64,
        full_name: &str,
        group_name: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET full_name = $2, group_name = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(full_name)
        .bind(group_name)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let roles = load_roles(&mut *tx, row.id).await?;
        tx.commit().await?;

        Ok(Some(row.with_roles(roles)))
    }

    async fn find_roles(&self, names: &[String]) -> Result<Vec<Role>, RepositoryError> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name FROM roles WHERE name = ANY($1) ORDER BY id",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    /// replace_user_roles
    ///
    /// Explicit two-step replace (delete every association, insert the new set) inside one
    /// transaction that holds a row lock on the user.
    async fn replace_user_roles(
        &self,
        id: i64,
        roles: &[Role],
    ) -> Result<Option<User>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let role_ids: Vec<i64> = roles.iter().map(|role| role.id).collect();
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) \
             SELECT $1, role_id FROM UNNEST($2::BIGINT[]) AS role_id \
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(&role_ids)
        .execute(&mut *tx)
        .await?;

        let roles = load_roles(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(Some(row.with_roles(roles)))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// --- In-Memory Implementation ---

struct Store {
    next_user_id: i64,
    roles: Vec<Role>,
    users: BTreeMap<i64, StoredUser>,
}

struct StoredUser {
    user: NewUser,
    role_ids: Vec<i64>,
}

impl Store {
    fn materialize(&self, id: i64, stored: &StoredUser) -> User {
        let roles = self
            .roles
            .iter()
            .filter(|role| stored.role_ids.contains(&role.id))
            .cloned()
            .collect();

        User {
            id,
            github_id: stored.user.github_id,
            telegram_id: stored.user.telegram_id,
            full_name: stored.user.full_name.clone(),
            group_name: stored.user.group_name.clone(),
            roles,
        }
    }
}

/// InMemoryRepository
///
/// A `Repository` kept in process memory with the same observable rules as the Postgres
/// one: canonical roles seeded, non-zero external ids unique, role sets replaced whole.
/// Used by the test suites and for running the router without a database.
#[derive(Clone)]
pub struct InMemoryRepository {
    store: Arc<Mutex<Store>>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Creates a store seeded with the canonical roles.
    pub fn new() -> Self {
        Self::with_roles(&CANONICAL_ROLES)
    }

    /// Creates a store seeded with exactly `names`, ids assigned in order from 1.
    pub fn with_roles(names: &[&str]) -> Self {
        let roles = names
            .iter()
            .zip(1..)
            .map(|(name, id)| Role {
                id,
                name: name.to_string(),
            })
            .collect();

        Self {
            store: Arc::new(Mutex::new(Store {
                next_user_id: 1,
                roles,
                users: BTreeMap::new(),
            })),
        }
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser, default_role: &str) -> Result<User, RepositoryError> {
        let mut store = self.lock();

        let taken = store.users.values().any(|stored| {
            let existing = &stored.user;
            (user.github_id != 0 && existing.github_id == user.github_id)
                || (user.telegram_id != 0 && existing.telegram_id == user.telegram_id)
        });
        if taken {
            return Err(RepositoryError::Duplicate);
        }

        let role_id = store
            .roles
            .iter()
            .find(|role| role.name == default_role)
            .map(|role| role.id)
            .ok_or_else(|| RepositoryError::MissingRole(default_role.to_string()))?;

        let id = store.next_user_id;
        store.next_user_id += 1;

        let stored = StoredUser {
            user,
            role_ids: vec![role_id],
        };
        let created = store.materialize(id, &stored);
        store.users.insert(id, stored);

        Ok(created)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let store = self.lock();
        Ok(store
            .users
            .get(&id)
            .map(|stored| store.materialize(id, stored)))
    }

    async fn update_user_info(
        &self,
        id: i64,
        full_name: &str,
        group_name: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut store = self.lock();
        let Some(stored) = store.users.get_mut(&id) else {
            return Ok(None);
        };

        stored.user.full_name = full_name.to_string();
        stored.user.group_name = group_name.to_string();

        Ok(store
            .users
            .get(&id)
            .map(|stored| store.materialize(id, stored)))
    }

    async fn find_roles(&self, names: &[String]) -> Result<Vec<Role>, RepositoryError> {
        let store = self.lock();
        Ok(store
            .roles
            .iter()
            .filter(|role| names.contains(&role.name))
            .cloned()
            .collect())
    }

    async fn replace_user_roles(
        &self,
        id: i64,
        roles: &[Role],
    ) -> Result<Option<User>, RepositoryError> {
        let mut store = self.lock();
        let Some(stored) = store.users.get_mut(&id) else {
            return Ok(None);
        };

        stored.role_ids.clear();
        for role in roles {
            if !stored.role_ids.contains(&role.id) {
                stored.role_ids.push(role.id);
            }
        }

        Ok(store
            .users
            .get(&id)
            .map(|stored| store.materialize(id, stored)))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.lock().users.remove(&id).is_some())
    }
}
