//! Profile reads and writes.

use std::sync::Arc;

use mediateca_api_types::ProfileBody;
use serde_json::Value as Json;
use time::OffsetDateTime;

use crate::application::auth::{Authorizer, PrivilegeAction, Resource};
use crate::application::error::ServiceError;
use crate::application::repos::ProfileStore;
use crate::application::request::{ServiceRequest, Session};
use crate::domain::profile::Profile;

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    authorizer: Arc<dyn Authorizer>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { store, authorizer }
    }

    /// Owners may create their own profile; anyone else needs system
    /// administration.
    pub async fn create(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        let Some(id) = target_id(request) else {
            return Err(ServiceError::invalid_request("a profile id is required"));
        };
        if !is_owner(&request.session, &id)
            && !self.authorizer.is_system_administrator(&request.session).await
        {
            return Err(ServiceError::access_denied("profile"));
        }
        if self.store.get(&id).await?.is_some() {
            return Err(ServiceError::invalid_request(format!(
                "profile `{id}` already exists"
            )));
        }

        let mut profile = Profile::empty(id, OffsetDateTime::now_utc());
        if let Some(favorites) = profile_body(request)?.favorites {
            profile.favorites = favorites;
        }
        self.store.create(&profile).await?;
        Ok(profile.to_client_json())
    }

    /// A missing own profile is created empty on first read; a missing
    /// foreign profile stays NotFound.
    pub async fn get(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        let Some(id) = target_id(request) else {
            return Err(ServiceError::not_found("profile"));
        };
        let owner = is_owner(&request.session, &id);
        if !owner
            && !self
                .authorizer
                .is_service_administrator(&request.session)
                .await
        {
            return Err(ServiceError::access_denied("profile"));
        }

        match self.store.get(&id).await? {
            Some(profile) => Ok(profile.to_client_json()),
            None if owner => {
                let profile = Profile::empty(id, OffsetDateTime::now_utc());
                self.store.create(&profile).await?;
                Ok(profile.to_client_json())
            }
            None => Err(ServiceError::not_found("profile")),
        }
    }

    /// Only `favorites` is writable; everything else on the profile is
    /// server-maintained.
    pub async fn update(&self, request: &ServiceRequest) -> Result<Json, ServiceError> {
        let Some(id) = target_id(request) else {
            return Err(ServiceError::not_found("profile"));
        };
        let allowed = is_owner(&request.session, &id)
            || self.authorizer.is_system_administrator(&request.session).await
            || self
                .authorizer
                .is_authorized(&request.session, Resource::Profile, PrivilegeAction::Update)
                .await;
        if !allowed {
            return Err(ServiceError::access_denied("profile"));
        }
        let Some(mut profile) = self.store.get(&id).await? else {
            return Err(ServiceError::not_found("profile"));
        };

        if let Some(favorites) = profile_body(request)?.favorites {
            profile.favorites = favorites;
        }
        profile.last_modified = OffsetDateTime::now_utc();
        self.store.update(&profile).await?;
        Ok(profile.to_client_json())
    }
}

/// The addressed profile: the identity segment when given, else the
/// session user.
fn target_id(request: &ServiceRequest) -> Option<String> {
    request
        .identity
        .clone()
        .filter(|identity| !identity.is_empty())
        .or_else(|| request.session.user_id.clone())
        .filter(|id| !id.is_empty())
}

fn is_owner(session: &Session, id: &str) -> bool {
    session.user_id.as_deref() == Some(id)
}

fn profile_body(request: &ServiceRequest) -> Result<ProfileBody, ServiceError> {
    match &request.body {
        None => Ok(ProfileBody::default()),
        Some(body) => serde_json::from_value(body.clone()).map_err(|error| {
            ServiceError::invalid_request(format!("unreadable profile body: {error}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::http::Method;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::application::repos::StoreError;

    #[derive(Default)]
    struct StubProfiles {
        profiles: Mutex<HashMap<String, Profile>>,
    }

    #[async_trait]
    impl ProfileStore for StubProfiles {
        async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError> {
            Ok(self.profiles.lock().unwrap().get(id).cloned())
        }

        async fn create(&self, profile: &Profile) -> Result<(), StoreError> {
            self.profiles
                .lock()
                .unwrap()
                .insert(profile.id.clone(), profile.clone());
            Ok(())
        }

        async fn update(&self, profile: &Profile) -> Result<(), StoreError> {
            self.profiles
                .lock()
                .unwrap()
                .insert(profile.id.clone(), profile.clone());
            Ok(())
        }
    }

    struct StubAuthorizer {
        service_admin: bool,
        system_admin: bool,
    }

    #[async_trait]
    impl Authorizer for StubAuthorizer {
        async fn is_authorized(
            &self,
            _session: &Session,
            _resource: Resource,
            _action: PrivilegeAction,
        ) -> bool {
            false
        }

        async fn is_service_administrator(&self, _session: &Session) -> bool {
            self.service_admin
        }

        async fn is_system_administrator(&self, _session: &Session) -> bool {
            self.system_admin
        }
    }

    fn service(store: Arc<StubProfiles>, service_admin: bool, system_admin: bool) -> ProfileService {
        ProfileService::new(
            store,
            Arc::new(StubAuthorizer {
                service_admin,
                system_admin,
            }),
        )
    }

    fn request(
        verb: Method,
        identity: Option<&str>,
        body: Option<Json>,
        user: Option<&str>,
    ) -> ServiceRequest {
        ServiceRequest {
            verb,
            object: "profile".to_owned(),
            identity: identity.map(str::to_owned),
            query: HashMap::new(),
            body,
            session: Session {
                user_id: user.map(str::to_owned),
                device_id: None,
                roles: HashSet::new(),
            },
            request_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn missing_own_profile_is_created_on_read() {
        let store = Arc::new(StubProfiles::default());
        let service = service(store.clone(), false, false);

        let profile = service
            .get(&request(Method::GET, None, None, Some("user-7")))
            .await
            .unwrap();

        assert_eq!(profile["ID"], "user-7");
        assert_eq!(profile["Favorites"], json!([]));
        assert!(store.profiles.lock().unwrap().contains_key("user-7"));
    }

    #[tokio::test]
    async fn foreign_profiles_need_service_administration() {
        let store = Arc::new(StubProfiles::default());
        let plain = service(store.clone(), false, false);
        let admin = service(store, true, false);
        let foreign = request(Method::GET, Some("user-9"), None, Some("user-7"));

        let denied = plain.get(&foreign).await.unwrap_err();
        assert!(matches!(denied, ServiceError::AccessDenied { .. }));

        let absent = admin.get(&foreign).await.unwrap_err();
        assert!(matches!(absent, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_touches_only_favorites() {
        let store = Arc::new(StubProfiles::default());
        let service = service(store.clone(), false, false);
        service
            .get(&request(Method::GET, None, None, Some("user-7")))
            .await
            .unwrap();

        let updated = service
            .update(&request(
                Method::PUT,
                None,
                Some(json!({"Favorites": ["a", "b"], "ID": "someone-else"})),
                Some("user-7"),
            ))
            .await
            .unwrap();

        assert_eq!(updated["ID"], "user-7");
        assert_eq!(updated["Favorites"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn duplicate_create_is_an_invalid_request() {
        let store = Arc::new(StubProfiles::default());
        let service = service(store, false, false);
        let create = request(Method::POST, None, None, Some("user-7"));

        service.create(&create).await.unwrap();
        let error = service.create(&create).await.unwrap_err();

        assert!(matches!(error, ServiceError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn creating_for_someone_else_needs_system_administration() {
        let store = Arc::new(StubProfiles::default());
        let plain = service(store.clone(), true, false);
        let system = service(store, false, true);
        let foreign = request(Method::POST, Some("user-9"), None, Some("user-7"));

        let denied = plain.create(&foreign).await.unwrap_err();
        assert!(matches!(denied, ServiceError::AccessDenied { .. }));

        let created = system.create(&foreign).await.unwrap();
        assert_eq!(created["ID"], "user-9");
    }
}
