//! Store traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::content::ContentItem;
use crate::domain::filter::{FilterNode, SortRule};
use crate::domain::profile::Profile;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate `{entity}` record")]
    Duplicate { entity: &'static str },
    #[error("record not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl StoreError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Persistence surface for content items. Listing calls take the filter
/// tree with every placeholder already resolved; `cache_hint`, when
/// present, is the deterministic key prefix the adapter may use to keep
/// row pages and totals warm between assembled-response rebuilds.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find(
        &self,
        filter: &FilterNode,
        sort: &[SortRule],
        page_size: u32,
        page_number: u32,
        cache_hint: Option<&str>,
    ) -> Result<Vec<ContentItem>, StoreError>;

    async fn count(
        &self,
        filter: &FilterNode,
        cache_hint: Option<&str>,
    ) -> Result<i64, StoreError>;

    /// Free-text search scoped by `filter`. Results are relevance-bound
    /// and never cached, so no hint is taken.
    async fn search(
        &self,
        query: &str,
        filter: &FilterNode,
        page_size: u32,
        page_number: u32,
    ) -> Result<Vec<ContentItem>, StoreError>;

    async fn count_by_query(&self, query: &str, filter: &FilterNode) -> Result<i64, StoreError>;

    async fn create(&self, item: &ContentItem) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError>;

    async fn update(&self, item: &ContentItem) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError>;

    async fn create(&self, profile: &Profile) -> Result<(), StoreError>;

    async fn update(&self, profile: &Profile) -> Result<(), StoreError>;
}
