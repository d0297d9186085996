//! crates/biblio_core/src/access.rs
//!
//! The access-control model: a total mapping from role to capability set.
//! Pure lookups, no I/O; callers reject unauthorized operations with
//! `CoreError::Authorization`.

use uuid::Uuid;

use crate::domain::Role;
use crate::ports::{CoreError, CoreResult};

/// A named permission checked before an operation proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Create,
    Update,
    Delete,
    ManageUsers,
    DeleteUsers,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::View,
        Capability::Create,
        Capability::Update,
        Capability::Delete,
        Capability::ManageUsers,
        Capability::DeleteUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::View => "view",
            Capability::Create => "create",
            Capability::Update => "update",
            Capability::Delete => "delete",
            Capability::ManageUsers => "manage_users",
            Capability::DeleteUsers => "delete_users",
        }
    }
}

/// The fixed capability set for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub can_view: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub can_manage_users: bool,
    pub can_delete_users: bool,
}

impl Role {
    /// The permission table. Total over the role enum; no role falls through.
    pub fn permissions(self) -> Permissions {
        match self {
            Role::Standard => Permissions {
                can_view: true,
                can_create: false,
                can_update: false,
                can_delete: false,
                can_manage_users: false,
                can_delete_users: false,
            },
            Role::Admin => Permissions {
                can_view: true,
                can_create: true,
                can_update: true,
                can_delete: true,
                can_manage_users: false,
                can_delete_users: false,
            },
            Role::SuperAdmin => Permissions {
                can_view: true,
                can_create: true,
                can_update: true,
                can_delete: true,
                can_manage_users: true,
                can_delete_users: true,
            },
        }
    }

    /// Answers whether this role holds the given capability.
    pub fn authorize(self, capability: Capability) -> bool {
        let permissions = self.permissions();
        match capability {
            Capability::View => permissions.can_view,
            Capability::Create => permissions.can_create,
            Capability::Update => permissions.can_update,
            Capability::Delete => permissions.can_delete,
            Capability::ManageUsers => permissions.can_manage_users,
            Capability::DeleteUsers => permissions.can_delete_users,
        }
    }
}

/// Guard used by handlers before any protected operation.
pub fn require(role: Role, capability: Capability) -> CoreResult<()> {
    if role.authorize(capability) {
        Ok(())
    } else {
        Err(CoreError::Authorization(format!(
            "role '{}' lacks the '{}' capability",
            role.as_str(),
            capability.as_str()
        )))
    }
}

/// A principal may never delete or deactivate its own account, regardless
/// of its role's other permissions.
pub fn ensure_not_self(actor: Uuid, target: Uuid) -> CoreResult<()> {
    if actor == target {
        return Err(CoreError::Authorization(
            "an account cannot perform this action on itself".to_string(),
        ));
    }
    Ok(())
}

/// Role changes sit above the manage-users capability: only a super admin
/// may change any account's role.
pub fn ensure_role_change_allowed(actor: Role) -> CoreResult<()> {
    if actor != Role::SuperAdmin {
        return Err(CoreError::Authorization(
            "only a super admin may change roles".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_table_is_exact() {
        // Every (role, capability) pair, spelled out.
        let expected: [(Role, [bool; 6]); 3] = [
            (Role::Standard, [true, false, false, false, false, false]),
            (Role::Admin, [true, true, true, true, false, false]),
            (Role::SuperAdmin, [true, true, true, true, true, true]),
        ];
        for (role, grants) in expected {
            for (capability, expected_grant) in Capability::ALL.into_iter().zip(grants) {
                assert_eq!(
                    role.authorize(capability),
                    expected_grant,
                    "{:?} / {:?}",
                    role,
                    capability
                );
            }
        }
    }

    #[test]
    fn require_rejects_with_authorization_error() {
        assert!(require(Role::Admin, Capability::Delete).is_ok());
        let err = require(Role::Standard, Capability::Create).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
        let err = require(Role::Admin, Capability::ManageUsers).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
    }

    #[test]
    fn self_deactivation_is_always_rejected() {
        // The ban is identity-based, so no role is exempt; even a super
        // admin holding the delete-users capability cannot target itself.
        let actor = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(Role::SuperAdmin.authorize(Capability::DeleteUsers));
        assert!(matches!(
            ensure_not_self(actor, actor),
            Err(CoreError::Authorization(_))
        ));
        assert!(ensure_not_self(actor, other).is_ok());
    }

    #[test]
    fn role_changes_require_super_admin() {
        assert!(matches!(
            ensure_role_change_allowed(Role::Standard),
            Err(CoreError::Authorization(_))
        ));
        assert!(matches!(
            ensure_role_change_allowed(Role::Admin),
            Err(CoreError::Authorization(_))
        ));
        assert!(ensure_role_change_allowed(Role::SuperAdmin).is_ok());
    }
}
