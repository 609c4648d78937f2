//! Routes a [`ServiceRequest`] to the owning service.

use std::time::Instant;

use axum::http::Method;
use metrics::{counter, histogram};
use serde_json::Value as Json;
use tracing::{debug, info, warn};

use crate::application::contents::ContentService;
use crate::application::definitions::DefinitionService;
use crate::application::error::ServiceError;
use crate::application::profiles::ProfileService;
use crate::application::request::ServiceRequest;
use crate::application::search::SearchService;

const METRIC_DISPATCH_TOTAL: &str = "mediateca_dispatch_total";
const METRIC_DISPATCH_FAILURES: &str = "mediateca_dispatch_failures_total";
const METRIC_DISPATCH_MS: &str = "mediateca_dispatch_duration_ms";

#[derive(Clone)]
pub struct Dispatcher {
    search: SearchService,
    contents: ContentService,
    profiles: ProfileService,
    definitions: DefinitionService,
}

impl Dispatcher {
    pub fn new(
        search: SearchService,
        contents: ContentService,
        profiles: ProfileService,
        definitions: DefinitionService,
    ) -> Self {
        Self {
            search,
            contents,
            profiles,
            definitions,
        }
    }

    /// Runs one request end to end. Unclassified failures leave here
    /// wrapped with the request id and elapsed time so the operational
    /// log can correlate them.
    pub async fn handle(&self, request: ServiceRequest) -> Result<Json, ServiceError> {
        let dispatch_started_at = Instant::now();
        let route = route_label(&request.object);
        debug!(
            request_id = %request.request_id,
            verb = %request.verb,
            object = %request.object,
            identity = request.identity.as_deref().unwrap_or(""),
            "dispatching request"
        );
        counter!(METRIC_DISPATCH_TOTAL, "object" => route).increment(1);

        let outcome = self.route(&request).await;

        let elapsed_ms = dispatch_started_at.elapsed().as_millis() as u64;
        histogram!(METRIC_DISPATCH_MS, "object" => route)
            .record(dispatch_started_at.elapsed().as_secs_f64() * 1000.0);
        match outcome {
            Ok(response) => {
                info!(
                    request_id = %request.request_id,
                    verb = %request.verb,
                    object = %request.object,
                    elapsed_ms,
                    "request handled"
                );
                Ok(response)
            }
            Err(error) => {
                counter!(METRIC_DISPATCH_FAILURES, "object" => route).increment(1);
                let error = error.with_request_context(request.request_id, elapsed_ms);
                warn!(
                    request_id = %request.request_id,
                    verb = %request.verb,
                    object = %request.object,
                    elapsed_ms,
                    error = %error,
                    "request failed"
                );
                Err(error)
            }
        }
    }

    async fn route(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        match request.object.to_ascii_lowercase().as_str() {
            "content" => self.route_content(request).await,
            "profile" => self.route_profile(request).await,
            "definitions" => self.definitions.list(request).await,
            other => Err(ServiceError::invalid_request(format!(
                "unknown object `{other}`"
            ))),
        }
    }

    async fn route_content(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        match request.verb {
            Method::GET => match identity_route(request).as_deref() {
                Some("search") => self.search.list(request).await,
                Some("counters") => self.contents.record_counters(request).await,
                _ => self.contents.get(request).await,
            },
            Method::POST => self.contents.create(request).await,
            Method::PUT => self.contents.update(request).await,
            Method::DELETE => self.contents.delete(request).await,
            _ => Err(not_allowed(request)),
        }
    }

    async fn route_profile(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        match request.verb {
            Method::GET => self.profiles.get(request).await,
            Method::POST => self.profiles.create(request).await,
            Method::PUT => self.profiles.update(request).await,
            _ => Err(not_allowed(request)),
        }
    }
}

fn not_allowed(request: &ServiceRequest) -> ServiceError {
    ServiceError::method_not_allowed(request.verb.as_str(), &request.object)
}

fn identity_route(request: &ServiceRequest) -> Option<String> {
    request.identity.as_deref().map(str::to_ascii_lowercase)
}

/// Metric label for the matched route; unmatched objects collapse into
/// one bucket to keep label cardinality bounded.
fn route_label(object: &str) -> &'static str {
    match object.to_ascii_lowercase().as_str() {
        "content" => "content",
        "profile" => "profile",
        "definitions" => "definitions",
        _ => "unknown",
    }
}
