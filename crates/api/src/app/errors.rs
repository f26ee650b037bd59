use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use austin_core::DomainError;
use austin_infra::StoreError;

/// Failure of a REST handler, rendered as `{"error": code, "message": msg}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request rejected before touching the store (`idexists`, `idnull`, ...).
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest { code, message: message.into() }
    }

    pub fn id_exists(entity: &str) -> Self {
        Self::bad_request("idexists", format!("A new {entity} cannot already have an ID"))
    }

    pub fn id_null() -> Self {
        Self::bad_request("idnull", "Invalid id")
    }

    pub fn id_invalid() -> Self {
        Self::bad_request("idinvalid", "Invalid ID")
    }

    pub fn id_not_found() -> Self {
        Self::bad_request("idnotfound", "Entity not found")
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::Validation(msg),
            DomainError::InvalidId(msg) => Self::bad_request("invalid_id", msg),
            DomainError::NotFound => Self::id_not_found(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest { code, message } => json_error(StatusCode::BAD_REQUEST, code, message),
            ApiError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::NotFound(entity) => {
                json_error(StatusCode::NOT_FOUND, "not_found", format!("{entity} not found"))
            }
            ApiError::Store(err) => store_error_to_response(err),
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::Domain(domain) => ApiError::from(domain).into_response(),
        StoreError::InvalidReference(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_reference", msg),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        other => {
            tracing::error!(error = %other, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", other.to_string())
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
