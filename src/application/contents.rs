//! Content CRUD, the counters mode, and mutation fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use mediateca_api_types::{ContentBody, DEFAULT_PAGE_SIZE};
use metrics::counter;
use serde_json::{Value as Json, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;
use uuid::Uuid;

use crate::application::auth::{Authorizer, PrivilegeAction, Resource};
use crate::application::error::ServiceError;
use crate::application::files::{FileGateway, merge_files};
use crate::application::messaging::{UpdateBus, UpdateMessage, publish_detached};
use crate::application::repos::ContentStore;
use crate::application::request::ServiceRequest;
use crate::domain::clock;
use crate::domain::content::{self, ContentItem};
use crate::domain::counters;
use crate::domain::error::DomainError;
use crate::domain::filter::FilterValue;
use crate::domain::types::ApprovalStatus;

/// Query parameter aliases carrying an object id, in lookup order.
const ID_PARAMS: &[&str] = &["x-object-id", "object-id", "content-id", "id"];

pub const METRIC_COUNTER_UPDATES: &str = "mediateca_counter_updates_total";

#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn ContentStore>,
    files: Arc<dyn FileGateway>,
    authorizer: Arc<dyn Authorizer>,
    bus: Arc<dyn UpdateBus>,
    files_base: String,
}

impl ContentService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        files: Arc<dyn FileGateway>,
        authorizer: Arc<dyn Authorizer>,
        bus: Arc<dyn UpdateBus>,
        files_base: impl Into<String>,
    ) -> Self {
        Self {
            store,
            files,
            authorizer,
            bus,
            files_base: files_base.into(),
        }
    }

    /// Plain read by id. No permission gate; visibility enforcement
    /// belongs to the listing path.
    pub async fn get(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        let Some(id) = object_id(request) else {
            return Err(ServiceError::not_found("content"));
        };
        let Some(item) = self.store.get(id).await? else {
            return Err(ServiceError::not_found("content"));
        };
        Ok(self.merged_client_json(&item, OffsetDateTime::now_utc()).await)
    }

    /// The counters mode: applies one action to the referenced item and
    /// persists only when a counter actually moved.
    pub async fn record_counters(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        let Some(id) = object_id(request) else {
            return Err(ServiceError::not_found("content"));
        };
        let action = request.param(&["x-action", "action"]).unwrap_or(counters::VIEW);
        let Some(mut item) = self.store.get(id).await? else {
            return Err(ServiceError::not_found("content"));
        };

        // Counter movement is not an editorial change; the item-level
        // LastUpdated stays put.
        let now = OffsetDateTime::now_utc();
        if counters::record_action(&mut item.counters, action, now) {
            self.store.update(&item).await?;
            counter!(METRIC_COUNTER_UPDATES, "action" => action_label(action)).increment(1);
            publish_detached(
                self.bus.clone(),
                UpdateMessage::content_counters(
                    counters_envelope(&item),
                    request.session.device_id.clone(),
                ),
            );
        }
        Ok(counters_envelope(&item))
    }

    pub async fn create(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        if !self
            .authorizer
            .is_authorized(&request.session, Resource::Content, PrivilegeAction::Update)
            .await
        {
            return Err(ServiceError::access_denied("content"));
        }
        let body = content_body(request)?;
        let now = OffsetDateTime::now_utc();
        let user = request.session.user_id.clone().unwrap_or_default();

        let mut item = ContentItem {
            id: Uuid::new_v4(),
            title: String::new(),
            summary: String::new(),
            speakers: String::new(),
            media_uri: String::new(),
            categories: String::new(),
            tags: String::new(),
            starting_time: now,
            ending_time: None,
            status: ApprovalStatus::Draft,
            details: None,
            parent_id: None,
            order_index: None,
            last_updated: now,
            counters: counters::seed_counters(now),
            created: now,
            created_id: user.clone(),
            last_modified: now,
            last_modified_id: user,
        };
        apply_body(&mut item, &body, &self.files_base)?;
        if item.title.is_empty() {
            return Err(DomainError::validation("Title is required").into());
        }

        self.store.create(&item).await?;
        self.announce_if_published(&item, now, request.session.device_id.clone());
        Ok(self.merged_client_json(&item, now).await)
    }

    pub async fn update(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        if !self
            .authorizer
            .is_authorized(&request.session, Resource::Content, PrivilegeAction::Update)
            .await
        {
            return Err(ServiceError::access_denied("content"));
        }
        let Some(id) = object_id(request) else {
            return Err(ServiceError::not_found("content"));
        };
        let Some(mut item) = self.store.get(id).await? else {
            return Err(ServiceError::not_found("content"));
        };
        let body = content_body(request)?;

        let now = OffsetDateTime::now_utc();
        apply_body(&mut item, &body, &self.files_base)?;
        item.last_updated = now;
        item.last_modified = now;
        item.last_modified_id = request.session.user_id.clone().unwrap_or_default();

        self.store.update(&item).await?;
        self.announce_if_published(&item, now, request.session.device_id.clone());
        Ok(self.merged_client_json(&item, now).await)
    }

    pub async fn delete(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        if !self
            .authorizer
            .is_authorized(&request.session, Resource::Content, PrivilegeAction::Delete)
            .await
        {
            return Err(ServiceError::access_denied("content"));
        }
        let Some(id) = object_id(request) else {
            return Err(ServiceError::not_found("content"));
        };
        let Some(item) = self.store.get(id).await? else {
            return Err(ServiceError::not_found("content"));
        };

        self.store.delete(id).await?;
        publish_detached(
            self.bus.clone(),
            UpdateMessage::content_delete(json!({
                "ID": item.id,
                "Categories": item.categories,
            })),
        );
        Ok(json!({}))
    }

    /// Inbound peer path: a sibling service reported a file download.
    pub async fn record_download(&self, id: Uuid) -> Result<(), ServiceError> {
        let Some(mut item) = self.store.get(id).await? else {
            return Err(ServiceError::not_found("content"));
        };
        let now = OffsetDateTime::now_utc();
        if counters::record_action(&mut item.counters, counters::DOWNLOAD, now) {
            self.store.update(&item).await?;
            counter!(METRIC_COUNTER_UPDATES, "action" => "download").increment(1);
            publish_detached(
                self.bus.clone(),
                UpdateMessage::content_counters(counters_envelope(&item), None),
            );
        }
        Ok(())
    }

    /// Re-primes connected clients after a restart: the first default
    /// listing page goes out as one update message per item. Failures are
    /// logged and swallowed.
    pub async fn latest_broadcast(&self) {
        let filter = content::live_top_level_filter();
        let sort = content::default_listing_sort(&filter);
        let now = OffsetDateTime::now_utc();
        let bucket = clock::quarter_bucket(now);
        let resolved = filter.resolved(|_| FilterValue::Time(bucket));

        match self
            .store
            .find(&resolved, &sort, DEFAULT_PAGE_SIZE, 1, None)
            .await
        {
            Ok(items) => {
                for item in items {
                    publish_detached(
                        self.bus.clone(),
                        UpdateMessage::content_update(
                            item.to_client_json(now, &self.files_base),
                            None,
                        ),
                    );
                }
            }
            Err(error) => warn!(%error, "startup broadcast listing failed"),
        }
    }

    fn announce_if_published(
        &self,
        item: &ContentItem,
        now: OffsetDateTime,
        excluded_device_id: Option<String>,
    ) {
        if item.status != ApprovalStatus::Published {
            return;
        }
        publish_detached(
            self.bus.clone(),
            UpdateMessage::content_update(
                item.to_client_json(now, &self.files_base),
                excluded_device_id,
            ),
        );
    }

    async fn merged_client_json(&self, item: &ContentItem, now: OffsetDateTime) -> Json {
        let mut object = item.to_client_json(now, &self.files_base);
        let titles = HashMap::from([(item.id, item.title.clone())]);
        match self.files.bundles_for(&[item.id], &titles).await {
            Ok(mut bundles) => {
                if let Some(bundle) = bundles.remove(&item.id) {
                    merge_files(&mut object, &bundle);
                }
            }
            Err(error) => {
                warn!(%error, "file lookup failed, serving object without attachments");
            }
        }
        object
    }
}

fn counters_envelope(item: &ContentItem) -> Json {
    json!({
        "ID": item.id,
        "Counters": counters::counters_to_json(&item.counters),
    })
}

/// Metric label of a counter action that moved; bounded to the seeded
/// counter kinds.
fn action_label(action: &str) -> &'static str {
    if action.eq_ignore_ascii_case(counters::DOWNLOAD) {
        "download"
    } else {
        "view"
    }
}

fn object_id(request: &ServiceRequest) -> Option<Uuid> {
    request.identity_as_id().or_else(|| {
        request
            .param(ID_PARAMS)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    })
}

fn content_body(request: &ServiceRequest) -> Result<ContentBody, ServiceError> {
    let Some(body) = &request.body else {
        return Err(ServiceError::invalid_request("a JSON body is required"));
    };
    serde_json::from_value(body.clone())
        .map_err(|error| ServiceError::invalid_request(format!("unreadable content body: {error}")))
}

/// Applies the writable fields. Absent fields keep their current value;
/// a blank parent id clears the parent and the order index together.
fn apply_body(
    item: &mut ContentItem,
    body: &ContentBody,
    files_base: &str,
) -> Result<(), ServiceError> {
    if let Some(title) = &body.title {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Title is required").into());
        }
        item.title = trimmed.to_owned();
    }
    if let Some(summary) = &body.summary {
        item.summary = summary.clone();
    }
    if let Some(speakers) = &body.speakers {
        item.speakers = speakers.clone();
    }
    if let Some(uri) = &body.media_uri {
        item.media_uri = content::internalize_media_uri(uri, files_base);
    }
    if let Some(categories) = &body.categories {
        item.categories = categories.clone();
    }
    if let Some(tags) = &body.tags {
        item.tags = tags.clone();
    }
    if let Some(starting_time) = body.starting_time {
        item.starting_time = starting_time;
    }
    if let Some(raw) = &body.ending_time {
        item.ending_time = parse_ending_time(raw);
    }
    if let Some(raw) = body.status.as_deref() {
        item.status = ApprovalStatus::try_from(raw)
            .map_err(|_| DomainError::validation(format!("unknown status `{raw}`")))?;
    }
    if let Some(details) = &body.details {
        item.details = (!details.is_empty()).then(|| details.clone());
    }
    match body.parent_id.as_deref() {
        None => {}
        Some("") => {
            item.parent_id = None;
            item.order_index = None;
        }
        Some(raw) => {
            let parent = Uuid::parse_str(raw)
                .map_err(|_| DomainError::validation("ParentID must be a UUID"))?;
            item.parent_id = Some(parent);
        }
    }
    if item.parent_id.is_some() {
        if let Some(index) = &body.order_index {
            item.order_index = (!index.is_empty()).then(|| index.clone());
        }
    }
    Ok(())
}

/// `"-"` and blank both mean "no defined ending"; anything unparseable
/// degrades to the same.
fn parse_ending_time(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return None;
    }
    OffsetDateTime::parse(trimmed, &Rfc3339).ok()
}
