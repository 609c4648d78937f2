//! Normalized request envelope handed to the dispatcher.

use std::collections::{HashMap, HashSet};

use axum::http::Method;
use serde_json::Value as Json;
use uuid::Uuid;

/// Caller identity as conveyed by the hosting transport. Anonymous
/// callers carry no user id and an empty role set.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user_id: Option<String>,
    pub device_id: Option<String>,
    pub roles: HashSet<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// One service call, independent of transport. `object` selects the
/// handler, `identity` is the optional path remainder (an object id,
/// a definition name, or a mode marker such as `counters`).
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub verb: Method,
    pub object: String,
    pub identity: Option<String>,
    pub query: HashMap<String, String>,
    pub body: Option<Json>,
    pub session: Session,
    pub request_id: Uuid,
}

impl ServiceRequest {
    /// Case-insensitive lookup trying each name in order. Callers list
    /// header-style aliases first (`x-object-id`) and fall back to the
    /// plain form.
    pub fn param(&self, names: &[&str]) -> Option<&str> {
        for name in names {
            if let Some((_, value)) = self
                .query
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
            {
                if !value.is_empty() {
                    return Some(value.as_str());
                }
            }
        }
        None
    }

    /// The identity segment when it parses as an object id.
    pub fn identity_as_id(&self) -> Option<Uuid> {
        self.identity
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}
