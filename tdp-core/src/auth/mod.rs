use std::collections::BTreeSet;

use crate::errors::CoreError;

/// Roles admitted to export and restore. `manager` is the site's managers group.
pub const BACKUP_OPERATOR_ROLES: [&str; 3] = ["admin", "staff", "manager"];

pub const ACTION_EXPORT: &str = "backup.export";
pub const ACTION_RESTORE: &str = "backup.restore";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Actor {
    pub user_id: Option<i32>,
    roles: BTreeSet<String>,
    is_system: bool,
}

impl Actor {
    pub fn user(user_id: i32) -> Self {
        Self {
            user_id: Some(user_id),
            roles: BTreeSet::new(),
            is_system: false,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            roles: BTreeSet::new(),
            is_system: false,
        }
    }

    pub fn system() -> Self {
        Self {
            user_id: None,
            roles: BTreeSet::new(),
            is_system: true,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into().trim().to_ascii_lowercase());
        self
    }

    /// Parse a comma separated role list such as `"staff, manager"`.
    pub fn with_roles(self, roles: &str) -> Self {
        roles
            .split(',')
            .filter(|role| !role.trim().is_empty())
            .fold(self, |actor, role| actor.with_role(role))
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// System actors see every task; users only their own.
    pub fn can_view_owned_by(&self, owner: Option<i32>) -> bool {
        self.is_system || (self.user_id.is_some() && self.user_id == owner)
    }
}

pub struct SystemActor;

impl SystemActor {
    pub fn internal() -> Actor {
        Actor::system()
    }
}

pub trait Authorizer: Send + Sync {
    fn authorize(&self, actor: &Actor, action: &str) -> Result<(), CoreError>;
}

/// Admits system actors and authenticated users holding an operator role.
pub struct BackupOperatorAuthorizer;

impl Authorizer for BackupOperatorAuthorizer {
    fn authorize(&self, actor: &Actor, action: &str) -> Result<(), CoreError> {
        if actor.is_system() {
            return Ok(());
        }
        if actor.user_id.is_none() {
            return Err(CoreError::unauthorized(format!(
                "Authentication required for {}",
                action
            )));
        }
        if BACKUP_OPERATOR_ROLES
            .iter()
            .any(|role| actor.has_role(role))
        {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "User is not allowed to perform {}",
                action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreErrorKind;

    #[test]
    fn test_operator_roles_admitted() {
        let authorizer = BackupOperatorAuthorizer;
        for role in BACKUP_OPERATOR_ROLES {
            let actor = Actor::user(1).with_role(role);
            assert!(authorizer.authorize(&actor, ACTION_RESTORE).is_ok());
        }
        assert!(authorizer
            .authorize(&SystemActor::internal(), ACTION_EXPORT)
            .is_ok());
    }

    #[test]
    fn test_plain_user_forbidden() {
        let err = BackupOperatorAuthorizer
            .authorize(&Actor::user(2).with_role("editor"), ACTION_EXPORT)
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Forbidden);
    }

    #[test]
    fn test_anonymous_unauthorized() {
        let err = BackupOperatorAuthorizer
            .authorize(&Actor::anonymous().with_role("admin"), ACTION_EXPORT)
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Unauthorized);
    }

    #[test]
    fn test_role_list_parsing() {
        let actor = Actor::user(3).with_roles("Staff, ,manager");
        assert!(actor.has_role("staff"));
        assert!(actor.has_role("manager"));
        assert!(!actor.has_role(""));
    }

    #[test]
    fn test_ownership() {
        let actor = Actor::user(5);
        assert!(actor.can_view_owned_by(Some(5)));
        assert!(!actor.can_view_owned_by(Some(6)));
        assert!(!Actor::anonymous().can_view_owned_by(None));
        assert!(Actor::system().can_view_owned_by(Some(6)));
    }
}
