use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod schema;
pub mod service;

// Routing split by access level (public, API-key protected).
pub mod routes;
use routes::{api, public};

// --- Public Re-exports ---

pub use auth::AccessGate;
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use service::UserService;

/// ApiDoc
///
/// OpenAPI document for the `/api` routes, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::delete_user, handlers::update_user_info,
        handlers::update_user_roles, handlers::get_user, handlers::get_user_roles
    ),
    components(
        schemas(
            models::User, models::Role, models::RegisterUserRequest,
            models::UpdateUserRequest, models::RolesPayload, models::ErrorBody,
        )
    ),
    modifiers(&ApiKeyAddon),
    tags(
        (name = "user-registry", description = "User and role registry API")
    )
)]
pub struct ApiDoc;

/// Registers the `X-API-Key` header scheme referenced by every `/api` path.
struct ApiKeyAddon;

impl Modify for ApiKeyAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    auth::API_KEY_HEADER.as_str(),
                ))),
            );
        }
    }
}

/// AppState
///
/// The single shared container handed to every request: the user/role service over the
/// selected repository and the access gate built from the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub gate: AccessGate,
}

impl AppState {
    /// Wires the service and gate from one repository and one configuration.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            users: UserService::new(repo),
            gate: AccessGate::new(&config),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Lets `require_api_key` take `State<AccessGate>` off the shared state.
impl FromRef<AppState> for AccessGate {
    fn from_ref(app_state: &AppState) -> AccessGate {
        app_state.gate.clone()
    }
}

/// create_router
///
/// Assembles public and gated routes, applies the request-id/tracing stack and CORS, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(public::public_routes())
        // Gate is a route layer: unknown paths still 404 instead of 401.
        .nest(
            "/api",
            api::api_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_api_key,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span with method, URI and the `x-request-id` set by the layer above,
/// so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
