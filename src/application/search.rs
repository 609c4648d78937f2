//! Listing and free-text search orchestration.
//!
//! One request flows through: authorize, parse the payload, build or
//! adopt the filter tree, resolve time placeholders against a single
//! bucket snapshot, derive the cache key, then either serve the cached
//! assembled response or count/fetch/assemble and write the cache back
//! at half the configured expiration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mediateca_api_types::{ListingEnvelope, SearchPayload};
use serde_json::Value as Json;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::auth::{Authorizer, PrivilegeAction, Resource};
use crate::application::error::ServiceError;
use crate::application::files::{FileGateway, merge_files};
use crate::application::pagination::paginate;
use crate::application::repos::ContentStore;
use crate::application::request::ServiceRequest;
use crate::cache::{ListingCache, ListingKey};
use crate::domain::clock;
use crate::domain::content::{self, ContentItem};
use crate::domain::filter::{
    FilterNode, FilterValue, SortRule, sort_from_json, sort_to_client_json,
};

#[derive(Clone)]
pub struct SearchService {
    contents: Arc<dyn ContentStore>,
    cache: Arc<dyn ListingCache>,
    files: Arc<dyn FileGateway>,
    authorizer: Arc<dyn Authorizer>,
    files_base: String,
    expiration: Duration,
}

impl SearchService {
    pub fn new(
        contents: Arc<dyn ContentStore>,
        cache: Arc<dyn ListingCache>,
        files: Arc<dyn FileGateway>,
        authorizer: Arc<dyn Authorizer>,
        files_base: impl Into<String>,
        expiration: Duration,
    ) -> Self {
        Self {
            contents,
            cache,
            files,
            authorizer,
            files_base: files_base.into(),
            expiration,
        }
    }

    pub async fn list(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        if !self
            .authorizer
            .is_authorized(&request.session, Resource::Content, PrivilegeAction::View)
            .await
        {
            return Err(ServiceError::access_denied("content"));
        }

        let payload = parse_payload(request)?;
        let query = payload
            .query
            .as_deref()
            .filter(|query| !query.trim().is_empty());

        let filter = match payload.filter_by.as_ref() {
            Some(json) => {
                let parsed = FilterNode::from_json(json)?;
                if self
                    .authorizer
                    .is_service_administrator(&request.session)
                    .await
                {
                    parsed
                } else {
                    content::require_published(parsed)
                }
            }
            None => content::live_top_level_filter(),
        };

        // One bucket snapshot per request: every placeholder in this
        // tree resolves to the same value.
        let now = OffsetDateTime::now_utc();
        let bucket = clock::quarter_bucket(now);
        let resolved = filter.resolved(|_| FilterValue::Time(bucket));

        let sort: Vec<SortRule> = match payload.sort_by.as_ref() {
            Some(json) => sort_from_json(json)?,
            None if query.is_none() => content::default_listing_sort(&filter),
            None => Vec::new(),
        };

        let pagination = payload.pagination.unwrap_or_default().sanitized();
        let key = ListingKey::derive(&resolved, &sort, query);

        if let Some(key) = &key {
            let response_key = key.response(pagination.page_number);
            if let Some(cached) = self.cache.get(&response_key).await {
                match serde_json::from_str::<Json>(&cached) {
                    Ok(json) => {
                        debug!(key = %response_key, "listing served from cache");
                        return Ok(json);
                    }
                    Err(error) => {
                        warn!(key = %response_key, %error, "cached listing unreadable, rebuilding");
                    }
                }
            }
        }

        let total = if pagination.total_records > -1 {
            pagination.total_records
        } else if let Some(query) = query {
            self.contents.count_by_query(query, &resolved).await?
        } else {
            let hint = key.as_ref().map(ListingKey::total);
            self.contents.count(&resolved, hint.as_deref()).await?
        };

        let page = paginate(total, pagination.page_size, pagination.page_number);

        let items = if total > 0 {
            match query {
                Some(query) => {
                    self.contents
                        .search(query, &resolved, page.page_size, page.page_number)
                        .await?
                }
                None => {
                    let hint = key.as_ref().map(|key| key.rows(page.page_number));
                    self.contents
                        .find(&resolved, &sort, page.page_size, page.page_number, hint.as_deref())
                        .await?
                }
            }
        } else {
            Vec::new()
        };

        let objects = self.assemble_objects(&items, now).await;

        let envelope = ListingEnvelope {
            filter_by: filter.to_client_json(query),
            sort_by: (!sort.is_empty()).then(|| sort_to_client_json(&sort)),
            pagination: page,
            objects,
        };
        let response = serde_json::to_value(&envelope)?;

        if let Some(key) = &key {
            let response_key = key.response(page.page_number);
            let serialized = serde_json::to_string(&response)?;
            if let Err(error) = self
                .cache
                .set(&response_key, serialized, self.expiration / 2)
                .await
            {
                warn!(key = %response_key, %error, "listing cache write failed");
            }
        }

        Ok(response)
    }

    /// Serializes items and folds in file bundles. A gateway failure
    /// degrades to a listing without attachments rather than failing the
    /// request.
    async fn assemble_objects(&self, items: &[ContentItem], now: OffsetDateTime) -> Vec<Json> {
        let mut objects: Vec<Json> = items
            .iter()
            .map(|item| item.to_client_json(now, &self.files_base))
            .collect();
        if items.is_empty() {
            return objects;
        }

        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let titles: HashMap<Uuid, String> = items
            .iter()
            .map(|item| (item.id, item.title.clone()))
            .collect();
        match self.files.bundles_for(&ids, &titles).await {
            Ok(mut bundles) => {
                for (object, item) in objects.iter_mut().zip(items) {
                    if let Some(bundle) = bundles.remove(&item.id) {
                        merge_files(object, &bundle);
                    }
                }
            }
            Err(error) => {
                warn!(%error, "file lookup failed, serving listing without attachments");
            }
        }
        objects
    }
}

/// The payload rides in the request body, or URL-encoded in the
/// `x-request` parameter for bodyless transports. A missing payload
/// means "default listing".
fn parse_payload(request: &ServiceRequest) -> Result<SearchPayload, ServiceError> {
    if let Some(body) = &request.body {
        return serde_json::from_value(body.clone()).map_err(|error| {
            ServiceError::invalid_request(format!("unreadable search payload: {error}"))
        });
    }
    if let Some(raw) = request.param(&["x-request"]) {
        return serde_json::from_str(raw).map_err(|error| {
            ServiceError::invalid_request(format!("unreadable x-request parameter: {error}"))
        });
    }
    Ok(SearchPayload::default())
}
