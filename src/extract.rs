use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body whose rejection (bad syntax, wrong shape, missing content type) is a
/// `400 Bad Request` with the usual `{"error": ...}` body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Path parameters with the same rejection handling as [`JsonBody`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);
