//! Role-based visibility of dashboard tabs and actions.

use serde::{Deserialize, Serialize};

use crate::models::Role;

/// Dashboard sections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Clients,
    Analysis,
    Consent,
    Team,
    Billing,
    Settings,
    Portal,
}

impl Tab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Clients => "clients",
            Tab::Analysis => "analysis",
            Tab::Consent => "consent",
            Tab::Team => "team",
            Tab::Billing => "billing",
            Tab::Settings => "settings",
            Tab::Portal => "portal",
        }
    }
}

/// Actions gated by role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewClients,
    EditClients,
    DeleteClients,
    ImportClients,
    RunAnalysis,
    ManageConsentForms,
    SendConsentForms,
    ManageTeam,
    ViewBilling,
    EditSettings,
    ViewOwnPortal,
}

impl Permission {
    pub fn parse(s: &str) -> Option<Self> {
        use Permission::*;

        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "view_clients" => Some(ViewClients),
            "edit_clients" => Some(EditClients),
            "delete_clients" => Some(DeleteClients),
            "import_clients" => Some(ImportClients),
            "run_analysis" => Some(RunAnalysis),
            "manage_consent_forms" => Some(ManageConsentForms),
            "send_consent_forms" => Some(SendConsentForms),
            "manage_team" => Some(ManageTeam),
            "view_billing" => Some(ViewBilling),
            "edit_settings" => Some(EditSettings),
            "view_own_portal" => Some(ViewOwnPortal),
            _ => None,
        }
    }
}

/// Tabs shown to a role, in display order.
pub fn visible_tabs(role: Role) -> &'static [Tab] {
    match role {
        Role::Owner | Role::Admin => &[
            Tab::Clients,
            Tab::Analysis,
            Tab::Consent,
            Tab::Team,
            Tab::Billing,
            Tab::Settings,
        ],
        Role::Artist | Role::Instructor => {
            &[Tab::Clients, Tab::Analysis, Tab::Consent, Tab::Settings]
        }
        Role::FrontDesk => &[Tab::Clients, Tab::Consent, Tab::Settings],
        Role::Client => &[Tab::Portal],
    }
}

pub fn can_see(role: Role, tab: Tab) -> bool {
    visible_tabs(role).contains(&tab)
}

/// Whether a role may perform an action.
pub fn can(role: Role, permission: Permission) -> bool {
    use Permission::*;

    match role {
        Role::Owner => permission != ViewOwnPortal,
        // Client deletion is owner-only
        Role::Admin => !matches!(permission, ViewOwnPortal | DeleteClients),
        Role::Artist | Role::Instructor => matches!(
            permission,
            ViewClients | EditClients | RunAnalysis | SendConsentForms | EditSettings
        ),
        Role::FrontDesk => matches!(
            permission,
            ViewClients | EditClients | ImportClients | SendConsentForms | EditSettings
        ),
        Role::Client => permission == ViewOwnPortal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_desk_hides_team_and_billing() {
        assert!(!can_see(Role::FrontDesk, Tab::Team));
        assert!(!can_see(Role::FrontDesk, Tab::Billing));
        assert!(can_see(Role::FrontDesk, Tab::Clients));
    }

    #[test]
    fn test_client_only_sees_portal() {
        assert_eq!(visible_tabs(Role::Client), &[Tab::Portal]);
        assert!(can(Role::Client, Permission::ViewOwnPortal));
        assert!(!can(Role::Client, Permission::ViewClients));
    }

    #[test]
    fn test_staff_never_see_portal_tab() {
        for role in [
            Role::Owner,
            Role::Admin,
            Role::Artist,
            Role::Instructor,
            Role::FrontDesk,
        ] {
            assert!(!can_see(role, Tab::Portal), "{:?}", role);
            assert!(can_see(role, Tab::Clients), "{:?}", role);
        }
    }

    #[test]
    fn test_only_owner_deletes_clients() {
        assert!(can(Role::Owner, Permission::DeleteClients));
        assert!(!can(Role::Admin, Permission::DeleteClients));
        assert!(!can(Role::Artist, Permission::DeleteClients));
        assert!(!can(Role::FrontDesk, Permission::DeleteClients));
    }

    #[test]
    fn test_team_management() {
        assert!(can(Role::Admin, Permission::ManageTeam));
        assert!(!can(Role::Instructor, Permission::ManageTeam));
        assert!(can(Role::Artist, Permission::RunAnalysis));
        assert!(!can(Role::FrontDesk, Permission::RunAnalysis));
    }

    #[test]
    fn test_permission_parse() {
        assert_eq!(Permission::parse("Manage Team"), Some(Permission::ManageTeam));
        assert_eq!(Permission::parse("view-own-portal"), Some(Permission::ViewOwnPortal));
        assert_eq!(Permission::parse("fly"), None);
    }

    #[test]
    fn test_tabs_and_permissions_agree() {
        for role in [Role::Artist, Role::FrontDesk, Role::Client] {
            assert_eq!(
                can_see(role, Tab::Team),
                can(role, Permission::ManageTeam),
                "{:?}",
                role
            );
            assert_eq!(
                can_see(role, Tab::Billing),
                can(role, Permission::ViewBilling),
                "{:?}",
                role
            );
        }
    }
}
