use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ErrorReport, ServiceError};
use crate::domain::error::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
}

pub mod codes {
    pub const ACCESS_DENIED: &str = "access_denied";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const METHOD_NOT_ALLOWED: &str = "method_not_allowed";
    pub const MALFORMED_FILTER: &str = "malformed_filter";
    pub const UNEXPECTED: &str = "unexpected";
}

/// HTTP shape of a failed service outcome. Classified outcomes carry
/// their own message; everything else serves a generic body while the
/// attached report keeps the detail for the logging middleware.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    source: ServiceError,
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        let (status, code, message) = match &error {
            ServiceError::AccessDenied { .. } => {
                (StatusCode::FORBIDDEN, codes::ACCESS_DENIED, error.to_string())
            }
            ServiceError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, codes::NOT_FOUND, error.to_string())
            }
            ServiceError::InvalidRequest { .. } => (
                StatusCode::BAD_REQUEST,
                codes::INVALID_REQUEST,
                error.to_string(),
            ),
            ServiceError::MethodNotAllowed { .. } => (
                StatusCode::METHOD_NOT_ALLOWED,
                codes::METHOD_NOT_ALLOWED,
                error.to_string(),
            ),
            ServiceError::MalformedFilter(inner) => (
                StatusCode::BAD_REQUEST,
                codes::MALFORMED_FILTER,
                inner.to_string(),
            ),
            ServiceError::Domain(DomainError::Validation { message }) => (
                StatusCode::BAD_REQUEST,
                codes::INVALID_REQUEST,
                message.clone(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::UNEXPECTED,
                "internal error".to_owned(),
            ),
        };
        Self {
            status,
            code,
            message,
            source: error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError {
            status,
            code,
            message,
            source,
        } = self;
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: code.to_string(),
                message,
            },
        };
        let mut response = (status, Json(body)).into_response();
        ErrorReport::from_error("infra::http::api", &source).attach(&mut response);
        response
    }
}
