use serde::{Deserialize, Serialize};

use crate::database::models::{TableAccess, User};

/// Independently grantable permission on a dynamic table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    View,
    Edit,
    Export,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::View => "view",
            Capability::Edit => "edit",
            Capability::Export => "export",
        }
    }
}

/// The single allow/deny decision for table capabilities.
///
/// Admins always pass. Everyone else needs a grant with the capability set.
/// Table existence is not checked here.
pub struct AccessGate;

impl AccessGate {
    pub fn authorize(user: &User, grant: Option<&TableAccess>, capability: Capability) -> bool {
        if user.is_admin() {
            return true;
        }
        match grant {
            Some(grant) => match capability {
                Capability::View => grant.can_view,
                Capability::Edit => grant.can_edit,
                Capability::Export => grant.can_export,
            },
            None => false,
        }
    }

    /// Admin-only surfaces
    pub fn is_admin(user: &User) -> bool {
        user.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: &str) -> User {
        User {
            id: 2,
            username: "u".to_string(),
            password_hash: String::new(),
            email: None,
            role: role.to_string(),
            status: "offline".to_string(),
            session_nonce: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn grant(view: bool, edit: bool, export: bool) -> TableAccess {
        TableAccess {
            id: 1,
            user_id: 2,
            table_name: "orders".to_string(),
            can_view: view,
            can_edit: edit,
            can_export: export,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn admin_bypasses_grants() {
        let admin = user("admin");
        for cap in [Capability::View, Capability::Edit, Capability::Export] {
            assert!(AccessGate::authorize(&admin, None, cap));
        }
    }

    #[test]
    fn capabilities_are_independent() {
        let member = user("user");
        let view_only = grant(true, false, false);
        assert!(AccessGate::authorize(&member, Some(&view_only), Capability::View));
        assert!(!AccessGate::authorize(&member, Some(&view_only), Capability::Edit));
        assert!(!AccessGate::authorize(&member, Some(&view_only), Capability::Export));

        let export_only = grant(false, false, true);
        assert!(AccessGate::authorize(&member, Some(&export_only), Capability::Export));
        assert!(!AccessGate::authorize(&member, Some(&export_only), Capability::View));
    }

    #[test]
    fn no_grant_denies() {
        assert!(!AccessGate::authorize(&user("user"), None, Capability::View));
    }
}
