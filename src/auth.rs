use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::{config::AppConfig, error::ApiError};

/// Header carrying the shared secret.
pub static API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// AccessGate
///
/// Single shared-secret check in front of every `/api` route. There is no per-user or
/// per-role authorization: a request either presents the configured secret or is refused.
///
/// When no secret is configured the gate refuses everything, so an empty header can never
/// match an empty secret.
#[derive(Clone, Debug)]
pub struct AccessGate {
    secret: Option<Arc<str>>,
}

impl AccessGate {
    pub fn new(config: &AppConfig) -> Self {
        let secret = config.api_key.as_deref().filter(|key| !key.is_empty());
        if secret.is_none() {
            tracing::warn!("API_KEY is not configured; every API request will be rejected");
        }

        Self {
            secret: secret.map(Arc::from),
        }
    }

    /// verify
    ///
    /// Compares the `X-API-Key` header byte for byte with the configured secret.
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let secret = self.secret.as_deref().ok_or(ApiError::Unauthorized)?;
        let provided = headers.get(&API_KEY_HEADER).ok_or(ApiError::Unauthorized)?;

        if provided.as_bytes() == secret.as_bytes() {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// require_api_key
///
/// Route-layer middleware: rejects the request with 401 before any extractor or handler of
/// the protected router runs, so a refused request never touches the store.
pub async fn require_api_key(
    State(gate): State<AccessGate>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(err) = gate.verify(request.headers()) {
        tracing::warn!(
            method = %request.method(),
            uri = %request.uri(),
            "rejected request with a missing or invalid API key"
        );
        return Err(err);
    }

    Ok(next.run(request).await)
}
