use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::test;
use user_registry::{
    AppConfig, AppState, ApiError,
    error::RepositoryError,
    extract::{JsonBody, PathParam},
    handlers,
    models::{NewUser, RegisterUserRequest, Role, RolesPayload, UpdateUserRequest, User},
    repository::Repository,
};

// --- MOCK REPOSITORY IMPLEMENTATION ---

// Canned answers for each repository call, so handler status mapping can be checked
// without a database.
#[derive(Default)]
pub struct MockRepoControl {
    pub create_duplicate: bool,
    pub store_down: bool,
    pub user_to_return: Option<User>,
    pub roles_to_return: Vec<Role>,
}

impl MockRepoControl {
    fn outage(&self) -> Result<(), RepositoryError> {
        if self.store_down {
            Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Repository for MockRepoControl {
    async fn create_user(&self, user: NewUser, default_role: &str) -> Result<User, RepositoryError> {
        self.outage()?;
        if self.create_duplicate {
            return Err(RepositoryError::Duplicate);
        }
        Ok(User {
            id: 1,
            github_id: user.github_id,
            telegram_id: user.telegram_id,
            full_name: user.full_name,
            group_name: user.group_name,
            roles: vec![Role {
                id: 1,
                name: default_role.to_string(),
            }],
        })
    }
    async fn get_user(&self, _id: i64) -> Result<Option<User>, RepositoryError> {
        self.outage()?;
        Ok(self.user_to_return.clone())
    }
    async fn update_user_info(
        &self,
        _id: i64,
        full_name: &str,
        group_name: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.outage()?;
        Ok(self.user_to_return.clone().map(|user| User {
            full_name: full_name.to_string(),
            group_name: group_name.to_string(),
            ..user
        }))
    }
    async fn find_roles(&self, _names: &[String]) -> Result<Vec<Role>, RepositoryError> {
        self.outage()?;
        Ok(self.roles_to_return.clone())
    }
    async fn replace_user_roles(
        &self,
        _id: i64,
        roles: &[Role],
    ) -> Result<Option<User>, RepositoryError> {
        self.outage()?;
        Ok(self.user_to_return.clone().map(|user| User {
            roles: roles.to_vec(),
            ..user
        }))
    }
    async fn delete_user(&self, _id: i64) -> Result<bool, RepositoryError> {
        self.outage()?;
        Ok(self.user_to_return.is_some())
    }
}

// --- TEST UTILITIES ---

const TEST_ID: i64 = 123;

fn create_test_state(repo_control: MockRepoControl) -> AppState {
    AppState::new(Arc::new(repo_control), AppConfig::default())
}

fn alice() -> User {
    User {
        id: TEST_ID,
        github_id: 111,
        telegram_id: 0,
        full_name: "Alice".to_string(),
        group_name: "G1".to_string(),
        roles: vec![Role {
            id: 1,
            name: "student".to_string(),
        }],
    }
}

async fn error_body(err: ApiError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// --- HANDLER TESTS ---

#[test]
async fn test_register_user_created() {
    let state = create_test_state(MockRepoControl::default());

    let request = RegisterUserRequest {
        github_id: 111,
        full_name: "Alice".to_string(),
        ..RegisterUserRequest::default()
    };
    let (status, user) = handlers::register_user(State(state), JsonBody(request))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user.0.role_names(), vec!["student"]);
}

#[test]
async fn test_register_user_conflict() {
    let state = create_test_state(MockRepoControl {
        create_duplicate: true,
        ..MockRepoControl::default()
    });

    let err = handlers::register_user(State(state), JsonBody(RegisterUserRequest::default()))
        .await
        .unwrap_err();

    let (status, body) = error_body(err).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User already exists");
}

#[test]
async fn test_store_failure_is_internal_without_details() {
    let state = create_test_state(MockRepoControl {
        store_down: true,
        ..MockRepoControl::default()
    });

    let err = handlers::register_user(State(state.clone()), JsonBody(RegisterUserRequest::default()))
        .await
        .unwrap_err();
    let (status, body) = error_body(err).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");

    let err = handlers::get_user(State(state), PathParam(TEST_ID))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
async fn test_get_user_found_and_missing() {
    let state = create_test_state(MockRepoControl {
        user_to_return: Some(alice()),
        ..MockRepoControl::default()
    });
    let user = handlers::get_user(State(state), PathParam(TEST_ID))
        .await
        .unwrap();
    assert_eq!(user.0, alice());

    let state = create_test_state(MockRepoControl::default());
    let err = handlers::get_user(State(state), PathParam(TEST_ID))
        .await
        .unwrap_err();
    let (status, body) = error_body(err).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[test]
async fn test_get_user_roles_projects_names() {
    let state = create_test_state(MockRepoControl {
        user_to_return: Some(alice()),
        ..MockRepoControl::default()
    });

    let roles = handlers::get_user_roles(State(state), PathParam(TEST_ID))
        .await
        .unwrap();

    assert_eq!(
        roles.0,
        RolesPayload {
            roles: vec!["student".to_string()]
        }
    );
}

#[test]
async fn test_delete_user_statuses() {
    let state = create_test_state(MockRepoControl {
        user_to_return: Some(alice()),
        ..MockRepoControl::default()
    });
    let status = handlers::delete_user(State(state), PathParam(TEST_ID))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let state = create_test_state(MockRepoControl::default());
    let err = handlers::delete_user(State(state), PathParam(TEST_ID))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NotFound);
}

#[test]
async fn test_update_user_info_returns_updated_user() {
    let state = create_test_state(MockRepoControl {
        user_to_return: Some(alice()),
        ..MockRepoControl::default()
    });

    let user = handlers::update_user_info(
        State(state),
        PathParam(TEST_ID),
        JsonBody(UpdateUserRequest {
            full_name: "Alice Smith".to_string(),
            group_name: "G2".to_string(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(user.0.full_name, "Alice Smith");
    assert_eq!(user.0.group_name, "G2");
    assert_eq!(user.0.github_id, 111);
}

#[test]
async fn test_update_user_roles_replaces_set() {
    let teacher = Role {
        id: 2,
        name: "teacher".to_string(),
    };
    let state = create_test_state(MockRepoControl {
        user_to_return: Some(alice()),
        roles_to_return: vec![teacher.clone()],
        ..MockRepoControl::default()
    });

    let user = handlers::update_user_roles(
        State(state),
        PathParam(TEST_ID),
        JsonBody(RolesPayload {
            roles: vec!["teacher".to_string()],
        }),
    )
    .await
    .unwrap();

    assert_eq!(user.0.roles, vec![teacher]);
}

#[test]
async fn test_update_user_roles_unknown_name_never_reaches_replace() {
    // The mock resolves nothing, so "teacher" counts as unknown.
    let state = create_test_state(MockRepoControl {
        user_to_return: Some(alice()),
        ..MockRepoControl::default()
    });

    let err = handlers::update_user_roles(
        State(state),
        PathParam(TEST_ID),
        JsonBody(RolesPayload {
            roles: vec!["teacher".to_string()],
        }),
    )
    .await
    .unwrap_err();

    let (status, body) = error_body(err).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown role(s): teacher");
}
