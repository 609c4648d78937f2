//! Any-verb entry point translating HTTP requests into service requests.

use std::collections::{HashMap, HashSet};

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::request::{ServiceRequest, Session};
use crate::infra::http::ApiState;
use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::RequestContext;

const BODY_LIMIT: usize = 2 * 1024 * 1024;

pub async fn dispatch(
    State(state): State<ApiState>,
    request: Request<Body>,
) -> Result<Json<JsonValue>, ApiError> {
    let (parts, body) = request.into_parts();

    let mut segments = parts
        .uri
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty());
    let object = segments.next().unwrap_or_default().to_owned();
    let identity = segments.next().map(str::to_owned);

    let query: HashMap<String, String> = match parts.uri.query() {
        Some(raw) => url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect(),
        None => HashMap::new(),
    };

    let session = session_from_headers(&parts.headers);
    let request_id = parts
        .extensions
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id)
        .unwrap_or_else(Uuid::new_v4);

    let bytes = to_bytes(body, BODY_LIMIT).await.map_err(|error| {
        ApiError::from(ServiceError::invalid_request(format!(
            "unreadable request body: {error}"
        )))
    })?;
    let body = if bytes.is_empty() {
        None
    } else {
        let parsed = serde_json::from_slice(&bytes).map_err(|error| {
            ApiError::from(ServiceError::invalid_request(format!(
                "request body is not valid JSON: {error}"
            )))
        })?;
        Some(parsed)
    };

    let service_request = ServiceRequest {
        verb: parts.method,
        object,
        identity,
        query,
        body,
        session,
        request_id,
    };

    let response = state.dispatcher.handle(service_request).await?;
    Ok(Json(response))
}

/// Session identity from the gateway headers. Role names arrive
/// comma-separated in `x-roles`.
fn session_from_headers(headers: &HeaderMap) -> Session {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };
    let roles: HashSet<String> = headers
        .get("x-roles")
        .and_then(|value| value.to_str().ok())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|role| !role.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Session {
        user_id: text("x-user-id"),
        device_id: text("x-device-id"),
        roles,
    }
}
