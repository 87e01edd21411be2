use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Role Vocabulary ---

/// Role attached to every freshly registered user.
pub const DEFAULT_ROLE: &str = "student";

/// The canonical roles seeded at startup, in enumeration (id) order.
pub const CANONICAL_ROLES: [&str; 3] = ["student", "teacher", "admin"];

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// A row of the `roles` table. Roles are immutable once created; the set of names is
/// fixed at startup by the schema seeder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// User
///
/// A registered user together with its role set. External identifiers use `0` for "unset";
/// the database stores those as NULL so uniqueness only applies to real values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub github_id: i64,
    pub telegram_id: i64,
    pub full_name: String,
    pub group_name: String,
    /// Role memberships, ordered by role id.
    pub roles: Vec<Role>,
}

impl User {
    /// Role names in enumeration order.
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|role| role.name.clone()).collect()
    }
}

/// UserRow
///
/// The scalar columns of `users`, as returned by queries that select
/// `COALESCE(github_id, 0)` / `COALESCE(telegram_id, 0)`. Roles are loaded separately.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub github_id: i64,
    pub telegram_id: i64,
    pub full_name: String,
    pub group_name: String,
}

impl UserRow {
    pub fn with_roles(self, roles: Vec<Role>) -> User {
        User {
            id: self.id,
            github_id: self.github_id,
            telegram_id: self.telegram_id,
            full_name: self.full_name,
            group_name: self.group_name,
            roles,
        }
    }
}

/// NewUser
///
/// The attributes of a user about to be registered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewUser {
    pub github_id: i64,
    pub telegram_id: i64,
    pub full_name: String,
    pub group_name: String,
}

impl NewUser {
    /// GitHub id as stored: `None` when unset.
    pub fn stored_github_id(&self) -> Option<i64> {
        (self.github_id != 0).then_some(self.github_id)
    }

    /// Telegram id as stored: `None` when unset.
    pub fn stored_telegram_id(&self) -> Option<i64> {
        (self.telegram_id != 0).then_some(self.telegram_id)
    }
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for `POST /api/register`. Missing fields default to zero / empty.
/// `roles` is accepted for compatibility but ignored: new users always start as `student`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct RegisterUserRequest {
    #[schema(example = 111)]
    pub github_id: i64,
    #[schema(example = 0)]
    pub telegram_id: i64,
    #[schema(example = "Alice")]
    pub full_name: String,
    #[schema(example = "G1")]
    pub group_name: String,
    pub roles: Vec<String>,
}

impl From<RegisterUserRequest> for NewUser {
    fn from(req: RegisterUserRequest) -> Self {
        NewUser {
            github_id: req.github_id,
            telegram_id: req.telegram_id,
            full_name: req.full_name,
            group_name: req.group_name,
        }
    }
}

/// UpdateUserRequest
///
/// Input payload for `PUT /api/user/{id}`. Only the name and group are owned by this
/// operation; any other field in the body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub full_name: String,
    pub group_name: String,
}

/// RolesPayload
///
/// Body of `PUT /api/user/{id}/roles` and response of `GET /api/user/{id}/roles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RolesPayload {
    #[schema(example = json!(["teacher", "admin"]))]
    pub roles: Vec<String>,
}

/// ErrorBody
///
/// Shape of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}
