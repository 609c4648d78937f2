//! Rolling usage counters: running totals plus ISO-week and
//! calendar-month sub-totals that reset when the window rolls over.

use serde_json::{Value as Json, json};
use time::OffsetDateTime;

use crate::domain::clock;

pub const VIEW: &str = "View";
pub const DOWNLOAD: &str = "Download";

/// One usage counter on a content item. At most one per `kind` per item;
/// the wire name of `kind` is `Type`.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterInfo {
    pub kind: String,
    pub total: i64,
    pub last_updated: OffsetDateTime,
    pub month: i64,
    pub week: i64,
}

impl CounterInfo {
    pub fn new(kind: impl Into<String>, now: OffsetDateTime) -> Self {
        CounterInfo {
            kind: kind.into(),
            total: 0,
            last_updated: now,
            month: 0,
            week: 0,
        }
    }
}

/// The counter set every new content item starts with.
pub fn seed_counters(now: OffsetDateTime) -> Vec<CounterInfo> {
    vec![CounterInfo::new(VIEW, now), CounterInfo::new(DOWNLOAD, now)]
}

/// Records one action against the counter of matching kind (compared
/// without case). Returns false, leaving the set untouched, when no
/// counter of that kind exists.
///
/// The matched counter gets `total + 1`; its week/month figures increment
/// inside the current window and re-seed to 1 across a rollover. For any
/// action other than a download, a stale download counter on the same item
/// has its week/month figures zeroed without touching its `last_updated`,
/// so readers never see windowed figures older than the current window.
pub fn record_action(counters: &mut [CounterInfo], action: &str, now: OffsetDateTime) -> bool {
    let Some(index) = counters
        .iter()
        .position(|counter| counter.kind.eq_ignore_ascii_case(action))
    else {
        return false;
    };

    let counter = &mut counters[index];
    counter.total += 1;
    counter.week = if clock::same_iso_week(counter.last_updated, now) {
        counter.week + 1
    } else {
        1
    };
    counter.month = if clock::same_calendar_month(counter.last_updated, now) {
        counter.month + 1
    } else {
        1
    };
    counter.last_updated = now;

    if !action.eq_ignore_ascii_case(DOWNLOAD) {
        if let Some(download) = counters
            .iter_mut()
            .find(|counter| counter.kind.eq_ignore_ascii_case(DOWNLOAD))
        {
            if !clock::same_iso_week(download.last_updated, now) {
                download.week = 0;
            }
            if !clock::same_calendar_month(download.last_updated, now) {
                download.month = 0;
            }
        }
    }

    true
}

/// Wire rendering of a counter set; the single serialization path for
/// counters, matching the `CounterPayload` shape clients parse.
pub fn counters_to_json(counters: &[CounterInfo]) -> Json {
    Json::Array(
        counters
            .iter()
            .map(|counter| {
                json!({
                    "Type": counter.kind,
                    "Total": counter.total,
                    "LastUpdated": clock::rfc3339(counter.last_updated),
                    "Month": counter.month,
                    "Week": counter.week,
                })
            })
            .collect(),
    )
}

/// Presentation copy of a counter set. A download counter whose stale
/// week/month figure still equals the running total (every recorded
/// download happened inside the stale window) shows 0 for that figure.
/// Persisted state is never modified here.
pub fn presentation_counters(counters: &[CounterInfo], now: OffsetDateTime) -> Vec<CounterInfo> {
    counters
        .iter()
        .cloned()
        .map(|mut counter| {
            if counter.kind.eq_ignore_ascii_case(DOWNLOAD) {
                if !clock::same_calendar_month(counter.last_updated, now)
                    && counter.total == counter.month
                {
                    counter.month = 0;
                }
                if !clock::same_iso_week(counter.last_updated, now) && counter.total == counter.week
                {
                    counter.week = 0;
                }
            }
            counter
        })
        .collect()
}
