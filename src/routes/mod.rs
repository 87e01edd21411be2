/// Router Module Index
///
/// Routes are split by access level so the API key gate is applied once, at the module
/// boundary, instead of per handler.

/// Routes open to any client: liveness and the OpenAPI document.
pub mod public;

/// The user/role API under `/api`, every route behind the API key gate.
pub mod api;
