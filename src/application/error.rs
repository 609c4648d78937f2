use std::error::Error as StdError;

use axum::response::Response;
use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::StoreError;
use crate::domain::error::DomainError;
use crate::domain::filter::FilterParseError;

/// Structured diagnostic attached to failing responses so the shared
/// logging middleware can emit the full source chain without leaking it
/// to clients.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Outcome taxonomy of the service layer. The first five variants are
/// user-visible outcomes that pass through the dispatcher untouched;
/// everything else gets wrapped with request context into `Unexpected`
/// before it surfaces.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("access to `{resource}` denied")]
    AccessDenied { resource: &'static str },
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    #[error("{verb} is not supported on `{object}`")]
    MethodNotAllowed { verb: String, object: String },
    #[error("malformed filter")]
    MalformedFilter(#[from] FilterParseError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("response serialization failed")]
    Serialization(#[from] serde_json::Error),
    #[error("request {request_id} failed after {elapsed_ms}ms")]
    Unexpected {
        request_id: Uuid,
        elapsed_ms: u64,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ServiceError {
    pub fn access_denied(resource: &'static str) -> Self {
        Self::AccessDenied { resource }
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn method_not_allowed(verb: impl Into<String>, object: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            verb: verb.into(),
            object: object.into(),
        }
    }

    /// Whether this outcome is part of the user-visible taxonomy. Domain
    /// validation counts (it surfaces as a bad request); invariant
    /// breaches do not.
    pub fn is_classified(&self) -> bool {
        matches!(
            self,
            ServiceError::AccessDenied { .. }
                | ServiceError::NotFound { .. }
                | ServiceError::InvalidRequest { .. }
                | ServiceError::MethodNotAllowed { .. }
                | ServiceError::MalformedFilter(_)
                | ServiceError::Domain(DomainError::Validation { .. })
        )
    }

    /// Wraps an unclassified failure with elapsed time and request
    /// identity for the operational log. Classified outcomes pass
    /// through unchanged.
    pub fn with_request_context(self, request_id: Uuid, elapsed_ms: u64) -> Self {
        if self.is_classified() {
            return self;
        }
        if let ServiceError::Unexpected { .. } = self {
            return self;
        }
        ServiceError::Unexpected {
            request_id,
            elapsed_ms,
            source: Box::new(self),
        }
    }
}
