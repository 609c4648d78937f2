//! Named definition sets (categories, groups, lists) served verbatim
//! from the backing source.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::application::error::ServiceError;
use crate::application::repos::StoreError;
use crate::application::request::ServiceRequest;

/// The definition sets a client may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Categories,
    Groups,
    Lists,
}

impl DefinitionKind {
    pub fn file_stem(self) -> &'static str {
        match self {
            DefinitionKind::Categories => "categories",
            DefinitionKind::Groups => "groups",
            DefinitionKind::Lists => "lists",
        }
    }
}

impl TryFrom<&str> for DefinitionKind {
    type Error = ServiceError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        match raw.to_ascii_lowercase().as_str() {
            "categories" => Ok(DefinitionKind::Categories),
            "groups" => Ok(DefinitionKind::Groups),
            "lists" => Ok(DefinitionKind::Lists),
            _ => Err(ServiceError::invalid_request(format!(
                "unknown definition set `{raw}`"
            ))),
        }
    }
}

/// Raw access to a definition set. Absent sets surface as
/// [`StoreError::NotFound`].
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn read(&self, kind: DefinitionKind) -> Result<String, StoreError>;
}

#[derive(Clone)]
pub struct DefinitionService {
    source: Arc<dyn DefinitionSource>,
}

impl DefinitionService {
    pub fn new(source: Arc<dyn DefinitionSource>) -> Self {
        Self { source }
    }

    /// Any verb is accepted; the sets are read-only reference data.
    pub async fn list(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        let Some(identity) = request.identity.as_deref() else {
            return Err(ServiceError::invalid_request(
                "a definition set name is required",
            ));
        };
        let kind = DefinitionKind::try_from(identity)?;

        let raw = self.source.read(kind).await.map_err(|error| match error {
            StoreError::NotFound => ServiceError::not_found("definition set"),
            other => ServiceError::from(other),
        })?;

        // Hand-maintained files tend to carry stray carriage returns and
        // tabs; strip them before parsing.
        let cleaned: String = raw
            .chars()
            .filter(|character| *character != '\r' && *character != '\t')
            .collect();
        let entries: Vec<Json> = serde_json::from_str(&cleaned)?;
        Ok(Json::Array(entries))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use axum::http::Method;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::application::request::Session;

    struct FixedSource {
        content: Result<String, StoreError>,
    }

    #[async_trait]
    impl DefinitionSource for FixedSource {
        async fn read(&self, _kind: DefinitionKind) -> Result<String, StoreError> {
            self.content
                .as_ref()
                .map(Clone::clone)
                .map_err(|error| match error {
                    StoreError::NotFound => StoreError::NotFound,
                    other => StoreError::Persistence(other.to_string()),
                })
        }
    }

    fn request(identity: Option<&str>) -> ServiceRequest {
        ServiceRequest {
            verb: Method::GET,
            object: "definitions".to_owned(),
            identity: identity.map(str::to_owned),
            query: HashMap::new(),
            body: None,
            session: Session {
                user_id: None,
                device_id: None,
                roles: HashSet::new(),
            },
            request_id: Uuid::new_v4(),
        }
    }

    fn service(content: Result<String, StoreError>) -> DefinitionService {
        DefinitionService::new(Arc::new(FixedSource { content }))
    }

    #[tokio::test]
    async fn set_names_are_case_insensitive() {
        let service = service(Ok("[]".to_owned()));
        assert_eq!(
            service.list(&request(Some("CATEGORIES"))).await.unwrap(),
            json!([])
        );

        let unknown = service.list(&request(Some("colours"))).await.unwrap_err();
        assert!(matches!(unknown, ServiceError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn stray_control_characters_are_stripped() {
        let service = service(Ok(
            "[\r\n\t{\"Name\": \"News\"},\r\n\t{\"Name\": \"Sport\"}\r\n]".to_owned()
        ));

        let entries = service.list(&request(Some("groups"))).await.unwrap();

        assert_eq!(entries, json!([{"Name": "News"}, {"Name": "Sport"}]));
    }

    #[tokio::test]
    async fn absent_sets_are_not_found() {
        let service = service(Err(StoreError::NotFound));

        let error = service.list(&request(Some("lists"))).await.unwrap_err();

        assert!(matches!(error, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn non_array_content_is_a_server_fault() {
        let service = service(Ok("{\"Name\": \"News\"}".to_owned()));

        let error = service
            .list(&request(Some("categories")))
            .await
            .unwrap_err();

        assert!(!error.is_classified());
    }
}
