//! Team member database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Role, TeamMember};

impl Database {
    /// Insert a team member. Emails are unique within a studio.
    pub fn insert_team_member(&self, member: &TeamMember) -> DbResult<()> {
        let result = self.conn.execute(
            r#"
            INSERT INTO team_members (
                member_id, server_id, studio_id, name, email, role, active,
                synced_hash, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                member.member_id,
                member.server_id,
                member.studio_id,
                member.name,
                member.email,
                member.role.as_str(),
                member.active,
                member.synced_hash,
                member.created_at,
            ],
        );
        email_conflict(result, &member.email)?;
        Ok(())
    }

    /// Update a member's editable fields.
    pub fn update_team_member(&self, member: &TeamMember) -> DbResult<bool> {
        let result = self.conn.execute(
            r#"
            UPDATE team_members SET
                name = ?2,
                email = ?3,
                role = ?4,
                active = ?5
            WHERE member_id = ?1
            "#,
            params![
                member.member_id,
                member.name,
                member.email,
                member.role.as_str(),
                member.active,
            ],
        );
        Ok(email_conflict(result, &member.email)? > 0)
    }

    pub fn get_team_member(&self, member_id: &str) -> DbResult<Option<TeamMember>> {
        self.conn
            .query_row(
                r#"
                SELECT member_id, server_id, studio_id, name, email, role, active, synced_hash, created_at
                FROM team_members
                WHERE member_id = ?
                "#,
                [member_id],
                read_member_row,
            )
            .optional()?
            .map(TeamMember::try_from)
            .transpose()
    }

    pub fn get_team_member_by_server_id(&self, server_id: &str) -> DbResult<Option<TeamMember>> {
        self.conn
            .query_row(
                r#"
                SELECT member_id, server_id, studio_id, name, email, role, active, synced_hash, created_at
                FROM team_members
                WHERE server_id = ?
                "#,
                [server_id],
                read_member_row,
            )
            .optional()?
            .map(TeamMember::try_from)
            .transpose()
    }

    /// List a studio's team, optionally including deactivated members.
    pub fn list_team_members(&self, studio_id: &str, include_inactive: bool) -> DbResult<Vec<TeamMember>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT member_id, server_id, studio_id, name, email, role, active, synced_hash, created_at
            FROM team_members
            WHERE studio_id = ?1 AND (?2 OR active = 1)
            ORDER BY name COLLATE NOCASE
            "#,
        )?;
        let rows = stmt.query_map(params![studio_id, include_inactive], read_member_row)?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?.try_into()?);
        }
        Ok(members)
    }

    /// Record a successful push: link the remote ID and remember the payload hash.
    pub fn mark_team_member_synced(&self, member_id: &str, server_id: &str, synced_hash: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE team_members SET server_id = ?2, synced_hash = ?3 WHERE member_id = ?1",
            params![member_id, server_id, synced_hash],
        )?;
        Ok(rows_affected > 0)
    }

    /// Remove a member outright (used when the remote collection dropped them).
    pub fn delete_team_member(&self, member_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM team_members WHERE member_id = ?", [member_id])?;
        Ok(rows_affected > 0)
    }

    /// Soft-delete: deactivated members keep their history.
    pub fn deactivate_team_member(&self, member_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE team_members SET active = 0 WHERE member_id = ?",
            [member_id],
        )?;
        Ok(rows_affected > 0)
    }
}

struct MemberRow {
    member_id: String,
    server_id: Option<String>,
    studio_id: String,
    name: String,
    email: String,
    role: String,
    active: bool,
    synced_hash: Option<String>,
    created_at: String,
}

fn read_member_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        member_id: row.get(0)?,
        server_id: row.get(1)?,
        studio_id: row.get(2)?,
        name: row.get(3)?,
        email: row.get(4)?,
        role: row.get(5)?,
        active: row.get(6)?,
        synced_hash: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl TryFrom<MemberRow> for TeamMember {
    type Error = DbError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| DbError::Constraint(format!("Unknown role: {}", row.role)))?;
        Ok(TeamMember {
            member_id: row.member_id,
            server_id: row.server_id,
            studio_id: row.studio_id,
            name: row.name,
            email: row.email,
            role,
            active: row.active,
            synced_hash: row.synced_hash,
            created_at: row.created_at,
        })
    }
}

/// Emails compare case-insensitively, so "BEA@" collides with "bea@".
fn email_conflict(result: rusqlite::Result<usize>, email: &str) -> DbResult<usize> {
    match result {
        Ok(rows) => Ok(rows),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(DbError::Constraint(format!(
                "A team member with email {} already exists",
                email
            )))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, email: &str, role: Role) -> TeamMember {
        TeamMember::new("studio-1".into(), name.into(), email.into(), role)
    }

    #[test]
    fn test_insert_and_list() {
        let db = Database::open_in_memory().unwrap();

        db.insert_team_member(&member("Carla", "carla@example.com", Role::Artist))
            .unwrap();
        db.insert_team_member(&member("bea", "bea@example.com", Role::Instructor))
            .unwrap();

        let team = db.list_team_members("studio-1", false).unwrap();
        assert_eq!(team.len(), 2);
        assert_eq!(team[0].name, "bea");
        assert_eq!(team[0].role, Role::Instructor);
    }

    #[test]
    fn test_duplicate_email_is_constraint_error() {
        let db = Database::open_in_memory().unwrap();

        db.insert_team_member(&member("Carla", "carla@example.com", Role::Artist))
            .unwrap();
        let result = db.insert_team_member(&member("Carla B", "carla@example.com", Role::Admin));
        assert!(matches!(result, Err(DbError::Constraint(_))));

        let result = db.insert_team_member(&member("Carla C", "CARLA@Example.com", Role::Admin));
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_update_to_taken_email_is_constraint_error() {
        let db = Database::open_in_memory().unwrap();

        db.insert_team_member(&member("Carla", "carla@example.com", Role::Artist))
            .unwrap();
        let mut bea = member("Bea", "bea@example.com", Role::Instructor);
        db.insert_team_member(&bea).unwrap();

        bea.email = "Carla@example.com".into();
        let result = db.update_team_member(&bea);
        assert!(matches!(result, Err(DbError::Constraint(_))));

        let stored = db.get_team_member(&bea.member_id).unwrap().unwrap();
        assert_eq!(stored.email, "bea@example.com");
    }

    #[test]
    fn test_deactivate_hides_from_default_list() {
        let db = Database::open_in_memory().unwrap();

        let carla = member("Carla", "carla@example.com", Role::Artist);
        db.insert_team_member(&carla).unwrap();
        assert!(db.deactivate_team_member(&carla.member_id).unwrap());

        assert!(db.list_team_members("studio-1", false).unwrap().is_empty());
        let all = db.list_team_members("studio-1", true).unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].active);
    }

    #[test]
    fn test_update_member() {
        let db = Database::open_in_memory().unwrap();

        let mut carla = member("Carla", "carla@example.com", Role::Artist);
        db.insert_team_member(&carla).unwrap();

        carla.role = Role::Admin;
        assert!(db.update_team_member(&carla).unwrap());

        let stored = db.get_team_member(&carla.member_id).unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);
    }

    #[test]
    fn test_mark_synced_and_lookup() {
        let db = Database::open_in_memory().unwrap();

        let carla = member("Carla", "carla@example.com", Role::Artist);
        db.insert_team_member(&carla).unwrap();
        db.mark_team_member_synced(&carla.member_id, "tm-1", "hash")
            .unwrap();

        let stored = db.get_team_member_by_server_id("tm-1").unwrap().unwrap();
        assert_eq!(stored.member_id, carla.member_id);
        assert_eq!(stored.synced_hash, Some("hash".into()));

        assert!(db.delete_team_member(&carla.member_id).unwrap());
        assert!(db.get_team_member(&carla.member_id).unwrap().is_none());
    }
}
