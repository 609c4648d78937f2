//! Role-set authorization adapter.

use async_trait::async_trait;

use crate::application::auth::{Authorizer, PrivilegeAction, Resource};
use crate::application::request::Session;

pub const ROLE_SYSTEM_ADMINISTRATOR: &str = "system-administrator";
pub const ROLE_SERVICE_ADMINISTRATOR: &str = "service-administrator";
pub const ROLE_EDITOR: &str = "editor";

/// Grants from the session role set: administrators get everything,
/// editors get content and profile writes, plain reads are open.
pub struct RoleBasedAuthorizer;

#[async_trait]
impl Authorizer for RoleBasedAuthorizer {
    async fn is_authorized(
        &self,
        session: &Session,
        _resource: Resource,
        action: PrivilegeAction,
    ) -> bool {
        match action {
            PrivilegeAction::View => true,
            PrivilegeAction::Create | PrivilegeAction::Update | PrivilegeAction::Delete => {
                session.has_role(ROLE_SYSTEM_ADMINISTRATOR)
                    || session.has_role(ROLE_SERVICE_ADMINISTRATOR)
                    || session.has_role(ROLE_EDITOR)
            }
        }
    }

    async fn is_service_administrator(&self, session: &Session) -> bool {
        session.has_role(ROLE_SERVICE_ADMINISTRATOR) || session.has_role(ROLE_SYSTEM_ADMINISTRATOR)
    }

    async fn is_system_administrator(&self, session: &Session) -> bool {
        session.has_role(ROLE_SYSTEM_ADMINISTRATOR)
    }
}
