use crate::{
    AppState,
    error::ApiError,
    extract::{JsonBody, PathParam},
    models::{ErrorBody, RegisterUserRequest, RolesPayload, UpdateUserRequest, User},
};
use axum::{Json, extract::State, http::StatusCode};

// --- Handlers ---
//
// Every handler here sits behind the API key gate; see `routes::api`.

/// register_user
///
/// Registers a user with the default `student` role.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterUserRequest,
    security(("api_key" = [])),
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 401, description = "Invalid API key", body = ErrorBody),
        (status = 409, description = "GitHub or Telegram id already registered", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.users.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// delete_user
///
/// Hard-deletes a user and its role memberships.
#[utoipa::path(
    delete,
    path = "/api/user/{id}",
    params(("id" = i64, Path, description = "User ID")),
    security(("api_key" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Invalid API key", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode, ApiError> {
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// update_user_info
///
/// Overwrites the user's full name and group. Ids and roles in the body are ignored.
#[utoipa::path(
    put,
    path = "/api/user/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 401, description = "Invalid API key", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_user_info(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state.users.update_info(id, payload).await?;
    Ok(Json(user))
}

/// update_user_roles
///
/// Replaces the user's whole role set with the given role names.
#[utoipa::path(
    put,
    path = "/api/user/{id}/roles",
    params(("id" = i64, Path, description = "User ID")),
    request_body = RolesPayload,
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Roles replaced", body = User),
        (status = 400, description = "Malformed body, empty list or unknown role", body = ErrorBody),
        (status = 401, description = "Invalid API key", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_user_roles(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<RolesPayload>,
) -> Result<Json<User>, ApiError> {
    let user = state.users.update_roles(id, payload.roles).await?;
    Ok(Json(user))
}

/// get_user
///
/// Fetches a user with its roles.
#[utoipa::path(
    get,
    path = "/api/user/{id}",
    params(("id" = i64, Path, description = "User ID")),
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 401, description = "Invalid API key", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<User>, ApiError> {
    let user = state.users.get_user(id).await?;
    Ok(Json(user))
}

/// get_user_roles
///
/// Lists the names of the user's roles.
#[utoipa::path(
    get,
    path = "/api/user/{id}/roles",
    params(("id" = i64, Path, description = "User ID")),
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Role names", body = RolesPayload),
        (status = 401, description = "Invalid API key", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_user_roles(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<RolesPayload>, ApiError> {
    let roles = state.users.get_user_roles(id).await?;
    Ok(Json(RolesPayload { roles }))
}
