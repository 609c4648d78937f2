//! Authorization seam between the service layer and the role model.

use async_trait::async_trait;

use crate::application::request::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Content,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeAction {
    View,
    Create,
    Update,
    Delete,
}

/// Answers privilege questions for a session. Service administrators
/// hold every privilege on this service; system administrators hold
/// every privilege everywhere.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_authorized(
        &self,
        session: &Session,
        resource: Resource,
        action: PrivilegeAction,
    ) -> bool;

    async fn is_service_administrator(&self, session: &Session) -> bool;

    async fn is_system_administrator(&self, session: &Session) -> bool;
}
