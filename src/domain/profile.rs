//! Viewer profiles: the per-account favorites list.

use serde_json::{Value as Json, json};
use time::OffsetDateTime;

use crate::domain::clock;

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Account identifier as issued by the identity provider; opaque here.
    pub id: String,
    /// Item identifiers the account has marked as favorites.
    pub favorites: Vec<String>,
    pub created: OffsetDateTime,
    pub last_modified: OffsetDateTime,
}

impl Profile {
    /// A blank profile, as auto-created on first read of one's own
    /// account.
    pub fn empty(id: impl Into<String>, now: OffsetDateTime) -> Self {
        Profile {
            id: id.into(),
            favorites: Vec::new(),
            created: now,
            last_modified: now,
        }
    }

    pub fn to_client_json(&self) -> Json {
        json!({
            "ID": self.id,
            "Favorites": self.favorites,
            "Created": clock::rfc3339(self.created),
            "LastModified": clock::rfc3339(self.last_modified),
        })
    }
}
