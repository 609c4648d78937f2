//! In-memory store adapters backing the content and profile contracts.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{ContentStore, ProfileStore, StoreError};
use crate::cache::ListingCache;
use crate::domain::content::{ContentItem, FieldValue};
use crate::domain::filter::{CompareOp, FilterNode, FilterValue, GroupOp, SortDirection, SortRule};
use crate::domain::profile::Profile;

/// Content store over a concurrent map. Row pages and totals are kept
/// warm in the injected listing cache under the caller's hint keys at
/// the full listing TTL; row pages are stored as id lists and re-read
/// through the map so cached pages never serve stale field values.
pub struct MemoryContentStore {
    items: DashMap<Uuid, ContentItem>,
    hints: Option<HintCache>,
}

struct HintCache {
    cache: Arc<dyn ListingCache>,
    ttl: Duration,
}

impl MemoryContentStore {
    pub fn new(hint_cache: Option<Arc<dyn ListingCache>>, hint_ttl: Duration) -> Self {
        Self {
            items: DashMap::new(),
            hints: hint_cache.map(|cache| HintCache {
                cache,
                ttl: hint_ttl,
            }),
        }
    }

    fn matching(&self, filter: &FilterNode) -> Vec<ContentItem> {
        self.items
            .iter()
            .filter(|entry| matches(filter, entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Cached row page, re-read through the map. A missing id means the
    /// page went stale mid-TTL; the caller recomputes.
    async fn cached_rows(&self, key: &str) -> Option<Vec<ContentItem>> {
        let hints = self.hints.as_ref()?;
        let payload = hints.cache.get(key).await?;
        let ids: Vec<Uuid> = serde_json::from_str(&payload).ok()?;
        ids.iter()
            .map(|id| self.items.get(id).map(|entry| entry.value().clone()))
            .collect()
    }

    async fn store_rows(&self, key: &str, rows: &[ContentItem]) {
        let Some(hints) = self.hints.as_ref() else {
            return;
        };
        let ids: Vec<Uuid> = rows.iter().map(|item| item.id).collect();
        let Ok(payload) = serde_json::to_string(&ids) else {
            return;
        };
        if let Err(error) = hints.cache.set(key, payload, hints.ttl).await {
            warn!(%error, key, "row hint store failed");
        }
    }

    async fn cached_total(&self, key: &str) -> Option<i64> {
        let hints = self.hints.as_ref()?;
        hints.cache.get(key).await?.parse().ok()
    }

    async fn store_total(&self, key: &str, total: i64) {
        let Some(hints) = self.hints.as_ref() else {
            return;
        };
        if let Err(error) = hints.cache.set(key, total.to_string(), hints.ttl).await {
            warn!(%error, key, "total hint store failed");
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn find(
        &self,
        filter: &FilterNode,
        sort: &[SortRule],
        page_size: u32,
        page_number: u32,
        cache_hint: Option<&str>,
    ) -> Result<Vec<ContentItem>, StoreError> {
        if let Some(key) = cache_hint {
            if let Some(rows) = self.cached_rows(key).await {
                return Ok(rows);
            }
        }

        let mut rows = self.matching(filter);
        sort_rows(&mut rows, sort);
        let page = page_slice(rows, page_size, page_number);
        if let Some(key) = cache_hint {
            self.store_rows(key, &page).await;
        }
        Ok(page)
    }

    async fn count(
        &self,
        filter: &FilterNode,
        cache_hint: Option<&str>,
    ) -> Result<i64, StoreError> {
        if let Some(key) = cache_hint {
            if let Some(total) = self.cached_total(key).await {
                return Ok(total);
            }
        }

        let total = self
            .items
            .iter()
            .filter(|entry| matches(filter, entry.value()))
            .count() as i64;
        if let Some(key) = cache_hint {
            self.store_total(key, total).await;
        }
        Ok(total)
    }

    async fn search(
        &self,
        query: &str,
        filter: &FilterNode,
        page_size: u32,
        page_number: u32,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let terms = search_terms(query);
        let mut rows: Vec<ContentItem> = self
            .items
            .iter()
            .filter(|entry| matches(filter, entry.value()) && matches_terms(entry.value(), &terms))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(page_slice(rows, page_size, page_number))
    }

    async fn count_by_query(&self, query: &str, filter: &FilterNode) -> Result<i64, StoreError> {
        let terms = search_terms(query);
        Ok(self
            .items
            .iter()
            .filter(|entry| matches(filter, entry.value()) && matches_terms(entry.value(), &terms))
            .count() as i64)
    }

    async fn create(&self, item: &ContentItem) -> Result<(), StoreError> {
        match self.items.entry(item.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate { entity: "content" }),
            Entry::Vacant(slot) => {
                slot.insert(item.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.items.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, item: &ContentItem) -> Result<(), StoreError> {
        match self.items.get_mut(&item.id) {
            Some(mut slot) => {
                *slot = item.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.items
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

/// Tree evaluation against one item. Placeholders never reach here; the
/// service resolves them before calling the store, so an unresolved one
/// simply fails to match.
fn matches(node: &FilterNode, item: &ContentItem) -> bool {
    match node {
        FilterNode::Group { operator, children } => match operator {
            GroupOp::And => children.iter().all(|child| matches(child, item)),
            GroupOp::Or => children.iter().any(|child| matches(child, item)),
        },
        FilterNode::Leaf {
            attribute,
            operator,
            value,
        } => leaf_matches(item.attribute(attribute), *operator, value.as_ref()),
    }
}

fn leaf_matches(projected: Option<FieldValue>, operator: CompareOp, expected: Option<&FilterValue>) -> bool {
    match operator {
        CompareOp::IsNull => projected.is_none(),
        CompareOp::IsNotNull => projected.is_some(),
        CompareOp::IsEmpty => projected_is_empty(&projected),
        CompareOp::IsNotEmpty => !projected_is_empty(&projected),
        _ => {
            let (Some(projected), Some(expected)) = (projected, expected) else {
                return false;
            };
            compare(&projected, operator, expected)
        }
    }
}

fn projected_is_empty(projected: &Option<FieldValue>) -> bool {
    match projected {
        None => true,
        Some(FieldValue::Text(text)) => text.is_empty(),
        Some(FieldValue::Time(_)) => false,
    }
}

/// Typed comparison. Text compares case-sensitively and orders
/// lexicographically; time orders chronologically; a type mismatch
/// never matches.
fn compare(projected: &FieldValue, operator: CompareOp, expected: &FilterValue) -> bool {
    match (projected, expected) {
        (FieldValue::Text(have), FilterValue::Text(want)) => match operator {
            CompareOp::Equals => have == want,
            CompareOp::NotEquals => have != want,
            CompareOp::LessThan => have < want,
            CompareOp::LessOrEqual => have <= want,
            CompareOp::Greater => have > want,
            CompareOp::GreaterOrEqual => have >= want,
            CompareOp::Contains => have.contains(want.as_str()),
            CompareOp::StartsWith => have.starts_with(want.as_str()),
            CompareOp::EndsWith => have.ends_with(want.as_str()),
            _ => false,
        },
        (FieldValue::Time(have), FilterValue::Time(want)) => match operator {
            CompareOp::Equals => have == want,
            CompareOp::NotEquals => have != want,
            CompareOp::LessThan => have < want,
            CompareOp::LessOrEqual => have <= want,
            CompareOp::Greater => have > want,
            CompareOp::GreaterOrEqual => have >= want,
            _ => false,
        },
        _ => false,
    }
}

fn sort_rows(rows: &mut [ContentItem], sort: &[SortRule]) {
    rows.sort_by(|a, b| {
        for rule in sort {
            let ordering = compare_projected(
                a.attribute(&rule.attribute),
                b.attribute(&rule.attribute),
            );
            let ordering = match rule.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Null projections order before values; mixed projection types keep a
/// fixed text-before-time order so the sort stays total.
fn compare_projected(a: Option<FieldValue>, b: Option<FieldValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(FieldValue::Text(a)), Some(FieldValue::Text(b))) => a.cmp(&b),
        (Some(FieldValue::Time(a)), Some(FieldValue::Time(b))) => a.cmp(&b),
        (Some(FieldValue::Text(_)), Some(FieldValue::Time(_))) => Ordering::Less,
        (Some(FieldValue::Time(_)), Some(FieldValue::Text(_))) => Ordering::Greater,
    }
}

fn page_slice(rows: Vec<ContentItem>, page_size: u32, page_number: u32) -> Vec<ContentItem> {
    let size = page_size.max(1) as usize;
    let page = page_number.max(1) as usize;
    rows.into_iter().skip((page - 1) * size).take(size).collect()
}

fn search_terms(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Every term must appear somewhere in the item's searchable text.
fn matches_terms(item: &ContentItem, terms: &[String]) -> bool {
    let haystack = item.searchable_text().to_lowercase();
    terms.iter().all(|term| haystack.contains(term.as_str()))
}

/// Profile store over a concurrent map keyed by the profile id.
pub struct MemoryProfileStore {
    profiles: DashMap<String, Profile>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.get(id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, profile: &Profile) -> Result<(), StoreError> {
        match self.profiles.entry(profile.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate { entity: "profile" }),
            Entry::Vacant(slot) => {
                slot.insert(profile.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, profile: &Profile) -> Result<(), StoreError> {
        match self.profiles.get_mut(&profile.id) {
            Some(mut slot) => {
                *slot = profile.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::cache::MemoryListingCache;
    use crate::domain::content::sample_item;

    fn store() -> MemoryContentStore {
        MemoryContentStore::new(None, Duration::from_secs(300))
    }

    fn published_filter() -> FilterNode {
        FilterNode::equals("Status", FilterValue::text("Published"))
    }

    #[tokio::test]
    async fn filter_matches_typed_attributes() {
        let store = store();
        let mut live = sample_item(Uuid::new_v4(), "Morning brief");
        live.starting_time = datetime!(2026-08-25 10:00:00 UTC);
        let mut early = sample_item(Uuid::new_v4(), "Old brief");
        early.starting_time = datetime!(2026-08-25 08:00:00 UTC);
        store.create(&live).await.unwrap();
        store.create(&early).await.unwrap();

        let filter = FilterNode::and(vec![
            published_filter(),
            FilterNode::leaf(
                "StartingTime",
                CompareOp::GreaterOrEqual,
                Some(FilterValue::Time(datetime!(2026-08-25 09:00:00 UTC))),
            ),
        ]);

        let rows = store.find(&filter, &[], 20, 1, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Morning brief");
        assert_eq!(store.count(&filter, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn absent_ending_time_matches_the_sentinel_leg() {
        let store = store();
        let open_ended = sample_item(Uuid::new_v4(), "Open ended");
        let mut closed = sample_item(Uuid::new_v4(), "Closed");
        closed.ending_time = Some(datetime!(2026-08-30 09:00:00 UTC));
        store.create(&open_ended).await.unwrap();
        store.create(&closed).await.unwrap();

        let sentinel_leg = FilterNode::equals("EndingTime", FilterValue::text("-"));
        let rows = store.find(&sentinel_leg, &[], 20, 1, None).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Open ended");
    }

    #[tokio::test]
    async fn multi_key_sort_breaks_ties_in_order() {
        let store = store();
        let mut first = sample_item(Uuid::new_v4(), "Alpha");
        first.categories = "briefings".to_owned();
        first.starting_time = datetime!(2026-08-25 09:00:00 UTC);
        let mut second = sample_item(Uuid::new_v4(), "Beta");
        second.categories = "briefings".to_owned();
        second.starting_time = datetime!(2026-08-25 11:00:00 UTC);
        let mut other = sample_item(Uuid::new_v4(), "Gamma");
        other.categories = "archive".to_owned();
        other.starting_time = datetime!(2026-08-25 10:00:00 UTC);
        for item in [&first, &second, &other] {
            store.create(item).await.unwrap();
        }

        let sort = vec![
            SortRule::ascending("Categories"),
            SortRule::descending("StartingTime"),
        ];
        let rows = store
            .find(&published_filter(), &sort, 20, 1, None)
            .await
            .unwrap();

        let titles: Vec<&str> = rows.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(titles, ["Gamma", "Beta", "Alpha"]);
    }

    #[tokio::test]
    async fn total_hint_is_served_without_recounting() {
        let cache = Arc::new(MemoryListingCache::new(16));
        let store = MemoryContentStore::new(Some(cache), Duration::from_secs(300));
        store
            .create(&sample_item(Uuid::new_v4(), "Morning brief"))
            .await
            .unwrap();

        let filter = published_filter();
        assert_eq!(store.count(&filter, Some("k:total")).await.unwrap(), 1);

        store
            .create(&sample_item(Uuid::new_v4(), "Evening brief"))
            .await
            .unwrap();

        // Stale within the TTL by design.
        assert_eq!(store.count(&filter, Some("k:total")).await.unwrap(), 1);
        assert_eq!(store.count(&filter, None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn row_hint_with_a_deleted_id_recomputes() {
        let cache = Arc::new(MemoryListingCache::new(16));
        let store = MemoryContentStore::new(Some(cache), Duration::from_secs(300));
        let kept = sample_item(Uuid::new_v4(), "Kept");
        let dropped = sample_item(Uuid::new_v4(), "Dropped");
        store.create(&kept).await.unwrap();
        store.create(&dropped).await.unwrap();

        let filter = published_filter();
        let sort = vec![SortRule::ascending("Title")];
        let warm = store
            .find(&filter, &sort, 20, 1, Some("k:1"))
            .await
            .unwrap();
        assert_eq!(warm.len(), 2);

        store.delete(dropped.id).await.unwrap();

        let refreshed = store
            .find(&filter, &sort, 20, 1, Some("k:1"))
            .await
            .unwrap();
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].title, "Kept");
    }

    #[tokio::test]
    async fn search_requires_every_term() {
        let store = store();
        let mut market = sample_item(Uuid::new_v4(), "Morning market wrap");
        market.summary = "equities and bonds".to_owned();
        let briefing = sample_item(Uuid::new_v4(), "Morning briefing");
        store.create(&market).await.unwrap();
        store.create(&briefing).await.unwrap();

        let rows = store
            .search("morning EQUITIES", &published_filter(), 20, 1)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Morning market wrap");
        assert_eq!(
            store
                .count_by_query("morning", &published_filter())
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn writes_enforce_presence() {
        let store = store();
        let item = sample_item(Uuid::new_v4(), "Morning brief");
        store.create(&item).await.unwrap();

        assert!(matches!(
            store.create(&item).await,
            Err(StoreError::Duplicate { entity: "content" })
        ));

        let ghost = sample_item(Uuid::new_v4(), "Ghost");
        assert!(matches!(
            store.update(&ghost).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete(ghost.id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn profile_store_round_trips() {
        let store = MemoryProfileStore::new();
        let mut profile = Profile::empty("user-7".to_owned(), datetime!(2026-08-25 09:00:00 UTC));
        store.create(&profile).await.unwrap();

        assert!(matches!(
            store.create(&profile).await,
            Err(StoreError::Duplicate { entity: "profile" })
        ));

        profile.favorites.push("item-1".to_owned());
        store.update(&profile).await.unwrap();
        let read = store.get("user-7").await.unwrap().unwrap();
        assert_eq!(read.favorites, vec!["item-1".to_owned()]);
    }
}
