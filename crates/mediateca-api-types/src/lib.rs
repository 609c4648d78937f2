//! Shared wire types for the Mediateca content catalogue API.
//!
//! Field names follow the PascalCase convention of the wire protocol the
//! service speaks, with `ID` spelled out in full. Everything here is plain
//! serde data; behavior lives in the service crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Page size applied when a request does not name one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

fn default_total_records() -> i64 {
    -1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_page_number() -> u32 {
    1
}

/// The pagination tuple carried on both requests and responses.
///
/// On a request, `total_records` of `-1` means "unknown, count for me";
/// any non-negative value is trusted and skips the recount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(rename = "TotalRecords", default = "default_total_records")]
    pub total_records: i64,
    #[serde(rename = "TotalPages", default)]
    pub total_pages: u32,
    #[serde(rename = "PageSize", default = "default_page_size")]
    pub page_size: u32,
    #[serde(rename = "PageNumber", default = "default_page_number")]
    pub page_number: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            total_records: -1,
            total_pages: 0,
            page_size: DEFAULT_PAGE_SIZE,
            page_number: 1,
        }
    }
}

impl Pagination {
    /// Applies the floors the service assumes: a page size and page number
    /// of at least 1.
    pub fn sanitized(mut self) -> Self {
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.page_number == 0 {
            self.page_number = 1;
        }
        self
    }
}

/// Listing request payload: sent as the JSON body of `GET content/search`
/// or URL-encoded in the `x-request` query parameter.
///
/// `filter_by` and `sort_by` stay structurally untyped here; the service
/// validates them and reports malformed trees precisely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPayload {
    #[serde(rename = "FilterBy")]
    pub filter_by: Option<Value>,
    #[serde(rename = "SortBy")]
    pub sort_by: Option<Value>,
    #[serde(rename = "Pagination")]
    pub pagination: Option<Pagination>,
    #[serde(rename = "Query")]
    pub query: Option<String>,
}

/// Writable fields of a content item. Identifier, audit stamps, counters,
/// and attachment data are server-assigned and have no inbound form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentBody {
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Summary")]
    pub summary: Option<String>,
    #[serde(rename = "Speakers")]
    pub speakers: Option<String>,
    #[serde(rename = "MediaURI")]
    pub media_uri: Option<String>,
    #[serde(rename = "Categories")]
    pub categories: Option<String>,
    #[serde(rename = "Tags")]
    pub tags: Option<String>,
    #[serde(rename = "StartingTime", with = "time::serde::rfc3339::option")]
    pub starting_time: Option<OffsetDateTime>,
    /// Either an RFC 3339 timestamp or the literal `"-"` for "no ending".
    #[serde(rename = "EndingTime")]
    pub ending_time: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "Details")]
    pub details: Option<String>,
    /// An empty string clears the parent and the order index together.
    #[serde(rename = "ParentID")]
    pub parent_id: Option<String>,
    #[serde(rename = "OrderIndex")]
    pub order_index: Option<String>,
}

/// Writable fields of a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileBody {
    #[serde(rename = "Favorites")]
    pub favorites: Option<Vec<String>>,
}

/// One rolling usage counter as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterPayload {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Total")]
    pub total: i64,
    #[serde(rename = "LastUpdated", with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(rename = "Month")]
    pub month: i64,
    #[serde(rename = "Week")]
    pub week: i64,
}

/// Response envelope of a listing request. `filter_by` echoes the client's
/// filter in symbolic form (placeholders unresolved), with the free-text
/// query folded in when one was given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingEnvelope {
    #[serde(rename = "FilterBy")]
    pub filter_by: Value,
    #[serde(rename = "SortBy")]
    pub sort_by: Option<Value>,
    #[serde(rename = "Pagination")]
    pub pagination: Pagination,
    #[serde(rename = "Objects")]
    pub objects: Vec<Value>,
}

/// Response of the counters mode and of counter change notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountersEnvelope {
    #[serde(rename = "ID")]
    pub id: Uuid,
    #[serde(rename = "Counters")]
    pub counters: Vec<CounterPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_mark_total_unknown() {
        let pagination: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(pagination.total_records, -1);
        assert_eq!(pagination.total_pages, 0);
        assert_eq!(pagination.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(pagination.page_number, 1);
    }

    #[test]
    fn pagination_sanitizes_zero_floors() {
        let pagination = Pagination {
            total_records: 10,
            total_pages: 1,
            page_size: 0,
            page_number: 0,
        }
        .sanitized();
        assert_eq!(pagination.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(pagination.page_number, 1);
    }

    #[test]
    fn search_payload_accepts_partial_bodies() {
        let payload: SearchPayload =
            serde_json::from_str(r#"{"Query":"turbine maintenance"}"#).unwrap();
        assert_eq!(payload.query.as_deref(), Some("turbine maintenance"));
        assert!(payload.filter_by.is_none());
        assert!(payload.pagination.is_none());
    }

    #[test]
    fn content_body_keeps_ending_time_raw() {
        let body: ContentBody =
            serde_json::from_str(r#"{"Title":"Morning brief","EndingTime":"-"}"#).unwrap();
        assert_eq!(body.ending_time.as_deref(), Some("-"));
        assert!(body.starting_time.is_none());
    }

    #[test]
    fn counter_payload_round_trips_wire_names() {
        let json = r#"{"Type":"View","Total":7,"LastUpdated":"2026-03-02T09:30:00Z","Month":3,"Week":2}"#;
        let counter: CounterPayload = serde_json::from_str(json).unwrap();
        assert_eq!(counter.kind, "View");
        assert_eq!(counter.total, 7);
        let back = serde_json::to_value(&counter).unwrap();
        assert_eq!(back["Type"], "View");
        assert_eq!(back["Week"], 2);
    }
}
