//! Studio team models.

use serde::{Deserialize, Serialize};

/// Role of a studio user. Clients log in to the portal with the `Client` role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Artist,
    Instructor,
    FrontDesk,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Artist => "artist",
            Role::Instructor => "instructor",
            Role::FrontDesk => "front_desk",
            Role::Client => "client",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "artist" => Some(Role::Artist),
            "instructor" => Some(Role::Instructor),
            "front_desk" | "receptionist" => Some(Role::FrontDesk),
            "client" => Some(Role::Client),
            _ => None,
        }
    }

    /// Roles that may be held by team members (not portal users).
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Client)
    }
}

/// A member of a studio's team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMember {
    pub member_id: String,
    /// Remote collection ID - null until first push
    pub server_id: Option<String>,
    pub studio_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    /// SHA-256 of the payload last pushed to the remote collection
    pub synced_hash: Option<String>,
    pub created_at: String,
}

impl TeamMember {
    pub fn new(studio_id: String, name: String, email: String, role: Role) -> Self {
        Self {
            member_id: uuid::Uuid::new_v4().to_string(),
            server_id: None,
            studio_id,
            name,
            email,
            role,
            active: true,
            synced_hash: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_instructor(&self) -> bool {
        self.role == Role::Instructor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("Front Desk"), Some(Role::FrontDesk));
        assert_eq!(Role::parse("front-desk"), Some(Role::FrontDesk));
        assert_eq!(Role::parse("OWNER"), Some(Role::Owner));
        assert_eq!(Role::parse("janitor"), None);
    }

    #[test]
    fn test_new_member_active() {
        let member = TeamMember::new(
            "studio-1".into(),
            "Bea".into(),
            "bea@example.com".into(),
            Role::Instructor,
        );
        assert!(member.active);
        assert!(member.is_instructor());
        assert!(member.role.is_staff());
    }
}
