//! Content items: the catalogue entity, its query-engine projection,
//! listing defaults, and client JSON assembly.

use serde_json::{Value as Json, json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::clock;
use crate::domain::counters::{self, CounterInfo};
use crate::domain::filter::{CompareOp, FilterNode, FilterValue, SortRule};
use crate::domain::types::{ApprovalStatus, MediaKind};

/// Stored prefix standing for the public files base URI. Rewritten on the
/// way out, never persisted in rewritten form.
pub const MEDIA_URI_SENTINEL: &str = "~~";

#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub speakers: String,
    pub media_uri: String,
    pub categories: String,
    pub tags: String,
    pub starting_time: OffsetDateTime,
    pub ending_time: Option<OffsetDateTime>,
    pub status: ApprovalStatus,
    pub details: Option<String>,
    pub parent_id: Option<Uuid>,
    /// Short ordinal string ("0010"-style) ordering siblings under one
    /// parent; sorted lexicographically.
    pub order_index: Option<String>,
    pub last_updated: OffsetDateTime,
    pub counters: Vec<CounterInfo>,
    pub created: OffsetDateTime,
    pub created_id: String,
    pub last_modified: OffsetDateTime,
    pub last_modified_id: String,
}

/// A projected attribute value as the query engine compares it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Time(OffsetDateTime),
}

impl ContentItem {
    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_uri(&self.media_uri)
    }

    /// Attribute projection for the query engine. Names match without
    /// case; unknown attributes project as null. `EndingTime` projects the
    /// `"-"` sentinel when absent so both legs of the liveness check
    /// (`EndingTime = "-"` and the timestamp comparison) can match.
    pub fn attribute(&self, name: &str) -> Option<FieldValue> {
        match name.to_ascii_lowercase().as_str() {
            "id" => Some(FieldValue::Text(self.id.to_string())),
            "title" => Some(FieldValue::Text(self.title.clone())),
            "summary" => Some(FieldValue::Text(self.summary.clone())),
            "speakers" => Some(FieldValue::Text(self.speakers.clone())),
            "mediauri" => Some(FieldValue::Text(self.media_uri.clone())),
            "categories" => Some(FieldValue::Text(self.categories.clone())),
            "tags" => Some(FieldValue::Text(self.tags.clone())),
            "startingtime" => Some(FieldValue::Time(self.starting_time)),
            "endingtime" => Some(match self.ending_time {
                None => FieldValue::Text("-".to_owned()),
                Some(timestamp) => FieldValue::Time(timestamp),
            }),
            "status" => Some(FieldValue::Text(self.status.as_str().to_owned())),
            "details" => self.details.clone().map(FieldValue::Text),
            "parentid" => self.parent_id.map(|id| FieldValue::Text(id.to_string())),
            "orderindex" => self.order_index.clone().map(FieldValue::Text),
            "lastupdated" => Some(FieldValue::Time(self.last_updated)),
            "created" => Some(FieldValue::Time(self.created)),
            "createdid" => Some(FieldValue::Text(self.created_id.clone())),
            "lastmodified" => Some(FieldValue::Time(self.last_modified)),
            "lastmodifiedid" => Some(FieldValue::Text(self.last_modified_id.clone())),
            _ => None,
        }
    }

    /// Concatenated text the free-text matcher scans.
    pub fn searchable_text(&self) -> String {
        [
            self.title.as_str(),
            self.summary.as_str(),
            self.speakers.as_str(),
            self.categories.as_str(),
        ]
        .join(" ")
    }

    /// Client JSON with presentation normalization applied: the media URI
    /// sentinel resolved against `files_base`, `EndingTime` null when
    /// absent, the derived media kind included, and stale download
    /// windows zeroed per [`counters::presentation_counters`].
    pub fn to_client_json(&self, now: OffsetDateTime, files_base: &str) -> Json {
        json!({
            "ID": self.id,
            "Title": self.title,
            "Summary": self.summary,
            "Speakers": self.speakers,
            "MediaURI": public_media_uri(&self.media_uri, files_base),
            "MediaType": self.media_kind().as_str(),
            "Categories": self.categories,
            "Tags": self.tags,
            "StartingTime": clock::rfc3339(self.starting_time),
            "EndingTime": self.ending_time.map(clock::rfc3339),
            "Status": self.status.as_str(),
            "Details": self.details,
            "ParentID": self.parent_id,
            "OrderIndex": self.order_index,
            "LastUpdated": clock::rfc3339(self.last_updated),
            "Counters": counters::counters_to_json(
                &counters::presentation_counters(&self.counters, now)
            ),
            "Images": [],
            "Created": clock::rfc3339(self.created),
            "CreatedID": self.created_id,
            "LastModified": clock::rfc3339(self.last_modified),
            "LastModifiedID": self.last_modified_id,
        })
    }
}

/// Rewrites the stored sentinel prefix to the public files base.
pub fn public_media_uri(uri: &str, files_base: &str) -> String {
    uri.replace(MEDIA_URI_SENTINEL, files_base)
}

/// Internalizes an inbound URI: the public files base collapses to the
/// sentinel so the stored form survives a base-URI change.
pub fn internalize_media_uri(uri: &str, files_base: &str) -> String {
    uri.replace(files_base, MEDIA_URI_SENTINEL)
}

/// Filter applied when a client supplies none: published, top-level
/// content that is live relative to the current time bucket. The
/// comparison directions are carried exactly as the wire protocol has
/// always used them.
pub fn live_top_level_filter() -> FilterNode {
    FilterNode::and(vec![
        FilterNode::equals("Status", FilterValue::text(ApprovalStatus::Published.as_str())),
        FilterNode::leaf(
            "StartingTime",
            CompareOp::GreaterOrEqual,
            Some(FilterValue::bucket()),
        ),
        FilterNode::or(vec![
            FilterNode::equals("EndingTime", FilterValue::text("-")),
            FilterNode::leaf("EndingTime", CompareOp::LessThan, Some(FilterValue::bucket())),
        ]),
        FilterNode::is_null("ParentID"),
    ])
}

/// Appends a forced `Status = Published` predicate so the executed filter
/// can never surface unpublished items. An `And` root takes it as an extra
/// child; any other root is wrapped.
pub fn require_published(filter: FilterNode) -> FilterNode {
    let forced = FilterNode::equals("Status", FilterValue::text(ApprovalStatus::Published.as_str()));
    match filter {
        FilterNode::Group {
            operator: crate::domain::filter::GroupOp::And,
            mut children,
        } => {
            children.push(forced);
            FilterNode::and(children)
        }
        other => FilterNode::and(vec![other, forced]),
    }
}

/// Sort applied when the client names none and no free-text query is
/// active: sibling order under an explicit parent, otherwise newest
/// first.
pub fn default_listing_sort(filter: &FilterNode) -> Vec<SortRule> {
    let parent_pinned = matches!(
        filter.direct_leaf("ParentID"),
        Some(FilterNode::Leaf {
            value: Some(FilterValue::Text(text)),
            ..
        }) if Uuid::parse_str(text).is_ok()
    );
    if parent_pinned {
        vec![SortRule::descending("OrderIndex")]
    } else {
        vec![
            SortRule::descending("StartingTime"),
            SortRule::descending("LastUpdated"),
        ]
    }
}

/// Fully populated published item shared by tests across the crate.
#[cfg(test)]
pub(crate) fn sample_item(id: Uuid, title: &str) -> ContentItem {
    let stamp = time::macros::datetime!(2026-08-25 09:00:00 UTC);
    ContentItem {
        id,
        title: title.to_owned(),
        summary: String::new(),
        speakers: String::new(),
        media_uri: String::new(),
        categories: "briefings".to_owned(),
        tags: String::new(),
        starting_time: stamp,
        ending_time: None,
        status: ApprovalStatus::Published,
        details: None,
        parent_id: None,
        order_index: None,
        last_updated: stamp,
        counters: counters::seed_counters(stamp),
        created: stamp,
        created_id: "editor-1".to_owned(),
        last_modified: stamp,
        last_modified_id: "editor-1".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::GroupOp;
    use time::macros::datetime;

    #[test]
    fn projection_covers_sentinels_and_nulls() {
        let mut item = sample_item(Uuid::new_v4(), "Morning brief");
        assert_eq!(
            item.attribute("ENDINGTIME"),
            Some(FieldValue::Text("-".to_owned()))
        );
        item.ending_time = Some(datetime!(2026-08-26 09:00:00 UTC));
        assert_eq!(
            item.attribute("EndingTime"),
            Some(FieldValue::Time(datetime!(2026-08-26 09:00:00 UTC)))
        );
        assert_eq!(
            item.attribute("status"),
            Some(FieldValue::Text("Published".to_owned()))
        );
        assert_eq!(item.attribute("ParentID"), None);
        assert_eq!(item.attribute("Readers"), None);
    }

    #[test]
    fn media_uri_sentinel_round_trips() {
        let base = "https://files.mediateca.example";
        let inbound = "https://files.mediateca.example/media/brief.mp3";
        let stored = internalize_media_uri(inbound, base);
        assert_eq!(stored, "~~/media/brief.mp3");
        assert_eq!(public_media_uri(&stored, base), inbound);
    }

    #[test]
    fn client_json_resolves_uri_and_normalizes() {
        let now = datetime!(2026-08-25 10:00:00 UTC);
        let mut item = sample_item(Uuid::new_v4(), "Morning brief");
        item.media_uri = "~~/media/brief.mp3".to_owned();
        item.counters = vec![CounterInfo {
            kind: counters::DOWNLOAD.to_owned(),
            total: 4,
            last_updated: datetime!(2026-07-01 10:00:00 UTC),
            month: 4,
            week: 4,
        }];

        let json = item.to_client_json(now, "https://files.mediateca.example");
        assert_eq!(
            json["MediaURI"],
            "https://files.mediateca.example/media/brief.mp3"
        );
        assert_eq!(json["MediaType"], "Audio");
        assert_eq!(json["EndingTime"], Json::Null);
        assert_eq!(json["Counters"][0]["Month"], 0);
        assert_eq!(json["Counters"][0]["Week"], 0);
        // Presentation only; the item keeps its stored figures.
        assert_eq!(item.counters[0].month, 4);
    }

    #[test]
    fn require_published_extends_an_and_root() {
        let filter = FilterNode::and(vec![FilterNode::equals(
            "Status",
            FilterValue::text("Draft"),
        )]);
        let FilterNode::Group { operator, children } = require_published(filter) else {
            panic!("expected a group root");
        };
        assert_eq!(operator, GroupOp::And);
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[1],
            FilterNode::equals("Status", FilterValue::text("Published"))
        );
    }

    #[test]
    fn require_published_wraps_other_roots() {
        let filter = FilterNode::or(vec![
            FilterNode::equals("Status", FilterValue::text("Draft")),
            FilterNode::equals("Status", FilterValue::text("Archived")),
        ]);
        let FilterNode::Group { operator, children } = require_published(filter) else {
            panic!("expected a group root");
        };
        assert_eq!(operator, GroupOp::And);
        assert_eq!(children.len(), 2);
        assert!(matches!(
            children[0],
            FilterNode::Group {
                operator: GroupOp::Or,
                ..
            }
        ));
    }

    #[test]
    fn default_sort_pins_sibling_order_under_a_parent() {
        let parent = Uuid::new_v4();
        let filter = FilterNode::and(vec![FilterNode::equals(
            "ParentID",
            FilterValue::text(parent.to_string()),
        )]);
        assert_eq!(
            default_listing_sort(&filter),
            vec![SortRule::descending("OrderIndex")]
        );
    }

    #[test]
    fn default_sort_falls_back_to_newest_first() {
        assert_eq!(
            default_listing_sort(&live_top_level_filter()),
            vec![
                SortRule::descending("StartingTime"),
                SortRule::descending("LastUpdated"),
            ]
        );
        let named_parent = FilterNode::and(vec![FilterNode::equals(
            "ParentID",
            FilterValue::text("not-an-identifier"),
        )]);
        assert_eq!(default_listing_sort(&named_parent).len(), 2);
    }
}
