use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// API Router Module
///
/// The user/role operations. `create_router` nests this under `/api` and wraps it in the
/// `require_api_key` route layer, so a request without the shared secret is answered with
/// 401 before any body is parsed or any query runs.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // POST /register
        // Creates a user with the default `student` role.
        .route("/register", post(handlers::register_user))
        // GET/PUT/DELETE /user/{id}
        // Fetch with roles, overwrite name/group, hard delete.
        .route(
            "/user/{id}",
            get(handlers::get_user)
                .put(handlers::update_user_info)
                .delete(handlers::delete_user),
        )
        // GET/PUT /user/{id}/roles
        // Role names of a user; full-set replacement of its roles.
        .route(
            "/user/{id}/roles",
            get(handlers::get_user_roles).put(handlers::update_user_roles),
        )
}

