//! Error types shared across the store, auth and HTTP layers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel_async::pooled_connection::PoolError;
use thiserror::Error;

/// A read or write against the document store failed.
///
/// Distinct from "no data": an empty collection is `Ok(vec![])`, a missing
/// document is `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("malformed {collection} document {id}: {reason}")]
    Malformed {
        collection: &'static str,
        id: String,
        reason: String,
    },
}

impl From<bb8::RunError<PoolError>> for StoreError {
    fn from(err: bb8::RunError<PoolError>) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),

    #[error("User not found. Please contact support.")]
    UnknownUser,

    #[error("You do not have admin access to this portal.")]
    NotAdmin,

    #[error("Session missing or expired")]
    Unauthenticated,

    /// The provider refused an account operation requested by a signed-in
    /// staff member.
    #[error("{0}")]
    AccountRejected(String),

    #[error("identity provider unreachable: {0}")]
    Provider(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
            ApiError::Auth(AuthError::Store(StoreError::Malformed { collection, id, reason }))
            | ApiError::Store(StoreError::Malformed { collection, id, reason }) => {
                tracing::error!("Malformed {} document {}: {}", collection, id, reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Stored data is malformed", "state": "malformed" }),
                )
            }
            ApiError::Auth(AuthError::Store(err)) | ApiError::Store(err) => {
                tracing::error!("Store error: {}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    serde_json::json!({ "error": "Data could not be loaded", "state": "unavailable" }),
                )
            }
            ApiError::Auth(AuthError::Provider(err)) => {
                tracing::error!("Identity provider error: {}", err);
                (
                    StatusCode::BAD_GATEWAY,
                    serde_json::json!({ "error": "Network request failed. Please check your internet connection." }),
                )
            }
            ApiError::Auth(AuthError::AccountRejected(msg)) => {
                (StatusCode::CONFLICT, serde_json::json!({ "error": msg }))
            }
            ApiError::Auth(AuthError::NotAdmin) => (
                StatusCode::FORBIDDEN,
                serde_json::json!({ "error": AuthError::NotAdmin.to_string() }),
            ),
            ApiError::Auth(err) => (StatusCode::UNAUTHORIZED, serde_json::json!({ "error": err.to_string() })),
        };

        (status, Json(body)).into_response()
    }
}
