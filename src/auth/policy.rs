//! Role policy
//!
//! Pure decision table mapping (actor role, action, target role) to allow/deny.
//! Every identity mutation and every write to the supermarket record asks here
//! first.

use crate::auth::Role;
use crate::error::AppError;
use crate::users::User;

/// Something an authenticated user wants to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create an identity with the requested role (`None` means default)
    CreateIdentity { requested: Option<Role> },
    /// Edit an identity's fields, optionally changing its role
    ModifyIdentity { role_change: Option<Role> },
    DisableIdentity,
    DeleteIdentity,
    ListIdentities,
    CreateManagedEntity,
    EditManagedEntity,
    ReadManagedEntity,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::CreateIdentity { requested: Some(role) } => write!(f, "create {} users", role),
            Action::CreateIdentity { requested: None } => write!(f, "create users"),
            Action::ModifyIdentity { role_change: Some(role) } => {
                write!(f, "change user roles to {}", role)
            }
            Action::ModifyIdentity { role_change: None } => write!(f, "modify users"),
            Action::DisableIdentity => write!(f, "disable users"),
            Action::DeleteIdentity => write!(f, "delete users"),
            Action::ListIdentities => write!(f, "list users"),
            Action::CreateManagedEntity => write!(f, "create the supermarket"),
            Action::EditManagedEntity => write!(f, "edit the supermarket"),
            Action::ReadManagedEntity => write!(f, "view the supermarket"),
        }
    }
}

/// Whether `actor` may perform `action` on an identity whose current role is
/// `target`. Identity actions other than create and list need a target.
pub fn can_perform(actor: Role, action: Action, target: Option<Role>) -> bool {
    use Action::*;

    match (actor, action) {
        (_, ReadManagedEntity) => true,
        (Role::Owner, CreateManagedEntity | EditManagedEntity) => true,
        (Role::Manager | Role::Staff, CreateManagedEntity | EditManagedEntity) => false,

        // Staff never administer identities.
        (Role::Staff, _) => false,

        (Role::Owner | Role::Manager, ListIdentities) => true,

        (Role::Owner, CreateIdentity { requested }) => {
            matches!(requested, None | Some(Role::Manager) | Some(Role::Staff))
        }
        (Role::Manager, CreateIdentity { requested }) => {
            matches!(requested, None | Some(Role::Staff))
        }

        // Managers act only on identities below them, and never change roles.
        (Role::Manager, ModifyIdentity { role_change }) => {
            role_change.is_none() && target.is_some_and(|t| actor.outranks(t))
        }
        (Role::Manager, DisableIdentity | DeleteIdentity) => {
            target.is_some_and(|t| actor.outranks(t))
        }

        (Role::Owner, ModifyIdentity { role_change }) => match (target, role_change) {
            (None, _) => false,
            (Some(_), None) => true,
            // An owner's role is fixed, and nobody is promoted to owner.
            (Some(Role::Owner), Some(_)) => false,
            (Some(_), Some(new_role)) => new_role != Role::Owner,
        },
        // Owner-role identities can never be disabled or deleted.
        (Role::Owner, DisableIdentity | DeleteIdentity) => {
            matches!(target, Some(Role::Manager) | Some(Role::Staff))
        }
    }
}

/// `can_perform` for a concrete actor, failing with `Forbidden`
pub fn authorize(actor: &User, action: Action, target: Option<Role>) -> Result<(), AppError> {
    if can_perform(actor.role, action, target) {
        return Ok(());
    }

    let message = match target {
        Some(target) if actor.role != Role::Staff => format!(
            "Role '{}' may not {} on a '{}' account",
            actor.role, action, target
        ),
        _ => format!("Role '{}' may not {}", actor.role, action),
    };
    Err(AppError::Forbidden(message))
}

/// Role a new identity receives, after checking the actor may grant it
pub fn resolve_created_role(actor: &User, requested: Option<Role>) -> Result<Role, AppError> {
    authorize(actor, Action::CreateIdentity { requested }, None)?;
    Ok(requested.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::tests::sample_user;

    fn targeted_actions() -> Vec<Action> {
        let mut actions = vec![Action::DisableIdentity, Action::DeleteIdentity];
        actions.push(Action::ModifyIdentity { role_change: None });
        for role in Role::ALL {
            actions.push(Action::ModifyIdentity { role_change: Some(role) });
        }
        actions
    }

    #[test]
    fn test_staff_can_create_nothing() {
        for requested in [None, Some(Role::Staff), Some(Role::Manager), Some(Role::Owner)] {
            assert!(!can_perform(Role::Staff, Action::CreateIdentity { requested }, None));
        }
    }

    #[test]
    fn test_staff_cannot_touch_any_identity() {
        for action in targeted_actions() {
            for target in Role::ALL {
                assert!(!can_perform(Role::Staff, action, Some(target)));
            }
        }
        assert!(!can_perform(Role::Staff, Action::ListIdentities, None));
    }

    #[test]
    fn test_manager_creates_only_staff() {
        assert!(can_perform(Role::Manager, Action::CreateIdentity { requested: None }, None));
        assert!(can_perform(
            Role::Manager,
            Action::CreateIdentity { requested: Some(Role::Staff) },
            None
        ));
        assert!(!can_perform(
            Role::Manager,
            Action::CreateIdentity { requested: Some(Role::Manager) },
            None
        ));
        assert!(!can_perform(
            Role::Manager,
            Action::CreateIdentity { requested: Some(Role::Owner) },
            None
        ));
    }

    #[test]
    fn test_owner_creates_managers_and_staff_but_not_owners() {
        for requested in [None, Some(Role::Manager), Some(Role::Staff)] {
            assert!(can_perform(Role::Owner, Action::CreateIdentity { requested }, None));
        }
        assert!(!can_perform(
            Role::Owner,
            Action::CreateIdentity { requested: Some(Role::Owner) },
            None
        ));
    }

    #[test]
    fn test_manager_targets_only_staff_and_keeps_roles() {
        for action in [Action::DisableIdentity, Action::DeleteIdentity, Action::ModifyIdentity { role_change: None }] {
            assert!(can_perform(Role::Manager, action, Some(Role::Staff)));
            assert!(!can_perform(Role::Manager, action, Some(Role::Manager)));
            assert!(!can_perform(Role::Manager, action, Some(Role::Owner)));
            assert!(!can_perform(Role::Manager, action, None));
        }
        for role in Role::ALL {
            assert!(!can_perform(
                Role::Manager,
                Action::ModifyIdentity { role_change: Some(role) },
                Some(Role::Staff)
            ));
        }
    }

    #[test]
    fn test_owner_identities_are_never_deleted_or_disabled() {
        for actor in Role::ALL {
            assert!(!can_perform(actor, Action::DeleteIdentity, Some(Role::Owner)));
            assert!(!can_perform(actor, Action::DisableIdentity, Some(Role::Owner)));
        }
    }

    #[test]
    fn test_owner_administers_managers_and_staff() {
        for target in [Role::Manager, Role::Staff] {
            assert!(can_perform(Role::Owner, Action::DeleteIdentity, Some(target)));
            assert!(can_perform(Role::Owner, Action::DisableIdentity, Some(target)));
            assert!(can_perform(
                Role::Owner,
                Action::ModifyIdentity { role_change: Some(Role::Manager) },
                Some(target)
            ));
            assert!(!can_perform(
                Role::Owner,
                Action::ModifyIdentity { role_change: Some(Role::Owner) },
                Some(target)
            ));
        }
        assert!(can_perform(
            Role::Owner,
            Action::ModifyIdentity { role_change: None },
            Some(Role::Owner)
        ));
        assert!(!can_perform(
            Role::Owner,
            Action::ModifyIdentity { role_change: Some(Role::Staff) },
            Some(Role::Owner)
        ));
    }

    #[test]
    fn test_managed_entity_writes_are_owner_only() {
        for action in [Action::CreateManagedEntity, Action::EditManagedEntity] {
            assert!(can_perform(Role::Owner, action, None));
            assert!(!can_perform(Role::Manager, action, None));
            assert!(!can_perform(Role::Staff, action, None));
        }
        for actor in Role::ALL {
            assert!(can_perform(actor, Action::ReadManagedEntity, None));
        }
    }

    #[test]
    fn test_authorize_reports_forbidden() {
        let m1 = sample_user("m1", Role::Manager, "h");

        let result = authorize(&m1, Action::CreateIdentity { requested: Some(Role::Manager) }, None);
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(authorize(&m1, Action::CreateIdentity { requested: Some(Role::Staff) }, None).is_ok());
    }

    #[test]
    fn test_resolve_created_role_defaults_to_staff() {
        let owner = sample_user("olga", Role::Owner, "h");
        let manager = sample_user("m1", Role::Manager, "h");
        let staff = sample_user("sam", Role::Staff, "h");

        assert_eq!(resolve_created_role(&owner, None).unwrap(), Role::Staff);
        assert_eq!(resolve_created_role(&owner, Some(Role::Manager)).unwrap(), Role::Manager);
        assert_eq!(resolve_created_role(&manager, None).unwrap(), Role::Staff);
        assert!(resolve_created_role(&manager, Some(Role::Manager)).is_err());
        assert!(resolve_created_role(&staff, None).is_err());
    }
}
