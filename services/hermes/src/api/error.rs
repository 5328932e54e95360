//! API error envelope and constructor catalog.
//!
//! # Purpose
//! Every failure leaves the service as
//! `{"error": {"code", "message", "status"}}` rendered with the same 3-space
//! indentation as success bodies. Handlers build errors exclusively through
//! the constructors here so wording stays consistent across endpoints.
use crate::auth::AuthError;
use crate::broker::BrokerError;
use crate::metrics::MetricsError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug)]
pub struct ApiError {
    pub code: StatusCode,
    pub status: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(code: StatusCode, status: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code.as_u16(),
                message: self.message,
                status: self.status.to_string(),
            },
        };
        super::json_response(self.code, &body)
    }
}

pub fn api_invalid_argument(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", message)
}

pub fn api_unauthorized() -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Unauthorized")
}

pub fn api_forbidden() -> ApiError {
    ApiError::new(
        StatusCode::FORBIDDEN,
        "FORBIDDEN",
        "Access to this resource is forbidden",
    )
}

pub fn api_not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub fn api_already_exists(message: &str) -> ApiError {
    ApiError::new(StatusCode::CONFLICT, "ALREADY_EXISTS", message)
}

pub fn api_conflict(message: &str) -> ApiError {
    ApiError::new(StatusCode::CONFLICT, "CONFLICT", message)
}

pub fn api_timeout(message: &str) -> ApiError {
    ApiError::new(StatusCode::REQUEST_TIMEOUT, "TIMEOUT", message)
}

pub fn api_internal(message: &str) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_SERVER_ERROR",
        message,
    )
}

/// Store failures that were not mapped to a resource-specific error by the
/// handler: log and hide the details.
pub fn api_store_failure(context: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, context, "metadata store error");
    api_internal("Backend error")
}

pub fn api_broker_failure(context: &str, err: &BrokerError) -> ApiError {
    tracing::error!(error = ?err, context, "broker error");
    api_internal("Backend error")
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => api_unauthorized(),
            AuthError::Forbidden => api_forbidden(),
            AuthError::Backend(err) => api_store_failure("authorization", &err),
        }
    }
}

impl From<super::pagination::PageError> for ApiError {
    fn from(err: super::pagination::PageError) -> Self {
        api_invalid_argument(&err.to_string())
    }
}

impl From<MetricsError> for ApiError {
    fn from(err: MetricsError) -> Self {
        match err {
            MetricsError::Store(err) => api_store_failure("metrics", &err),
            MetricsError::Broker(err) => api_broker_failure("metrics", &err),
        }
    }
}
