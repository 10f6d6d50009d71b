//! Client database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{json_list, Database, DbError, DbResult};
use crate::models::Client;

const CLIENT_COLUMNS: &str = "local_id, server_id, studio_id, first_name, last_name, email, phone, \
     date_of_birth, allergies, medications, skin_conditions, notes, reward_points, \
     synced_hash, created_at, updated_at";

impl Database {
    /// Insert a new client.
    pub fn insert_client(&self, client: &Client) -> DbResult<()> {
        let allergies_json = serde_json::to_string(&client.allergies)?;
        let medications_json = serde_json::to_string(&client.medications)?;
        let conditions_json = serde_json::to_string(&client.skin_conditions)?;

        self.conn.execute(
            r#"
            INSERT INTO clients (
                local_id, server_id, studio_id, first_name, last_name, email, phone,
                date_of_birth, allergies, medications, skin_conditions, notes,
                reward_points, synced_hash, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                client.local_id,
                client.server_id,
                client.studio_id,
                client.first_name,
                client.last_name,
                client.email,
                client.phone,
                client.date_of_birth,
                allergies_json,
                medications_json,
                conditions_json,
                client.notes,
                client.reward_points,
                client.synced_hash,
                client.created_at,
                client.updated_at,
            ],
        )?;
        tracing::debug!(client_id = %client.local_id, "client inserted");
        Ok(())
    }

    /// Update an existing client's editable fields.
    ///
    /// Sync bookkeeping (`server_id`, `synced_hash`) is left alone; use
    /// [`Database::mark_client_synced`] for that.
    pub fn update_client(&self, client: &Client) -> DbResult<bool> {
        let allergies_json = serde_json::to_string(&client.allergies)?;
        let medications_json = serde_json::to_string(&client.medications)?;
        let conditions_json = serde_json::to_string(&client.skin_conditions)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE clients SET
                first_name = ?2,
                last_name = ?3,
                email = ?4,
                phone = ?5,
                date_of_birth = ?6,
                allergies = ?7,
                medications = ?8,
                skin_conditions = ?9,
                notes = ?10,
                reward_points = ?11,
                updated_at = ?12
            WHERE local_id = ?1
            "#,
            params![
                client.local_id,
                client.first_name,
                client.last_name,
                client.email,
                client.phone,
                client.date_of_birth,
                allergies_json,
                medications_json,
                conditions_json,
                client.notes,
                client.reward_points,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a client by local ID.
    pub fn get_client(&self, local_id: &str) -> DbResult<Option<Client>> {
        let sql = format!("SELECT {} FROM clients WHERE local_id = ?", CLIENT_COLUMNS);
        self.conn
            .query_row(&sql, [local_id], read_client_row)
            .optional()?
            .map(Client::try_from)
            .transpose()
    }

    /// Get a client by remote collection ID.
    pub fn get_client_by_server_id(&self, server_id: &str) -> DbResult<Option<Client>> {
        let sql = format!("SELECT {} FROM clients WHERE server_id = ?", CLIENT_COLUMNS);
        self.conn
            .query_row(&sql, [server_id], read_client_row)
            .optional()?
            .map(Client::try_from)
            .transpose()
    }

    /// Find a client in a studio by email (case-insensitive).
    pub fn find_client_by_email(&self, studio_id: &str, email: &str) -> DbResult<Option<Client>> {
        let sql = format!(
            "SELECT {} FROM clients WHERE studio_id = ? AND lower(email) = lower(?) LIMIT 1",
            CLIENT_COLUMNS
        );
        self.conn
            .query_row(&sql, params![studio_id, email.trim()], read_client_row)
            .optional()?
            .map(Client::try_from)
            .transpose()
    }

    /// List all clients of a studio, ordered by last then first name.
    pub fn list_clients(&self, studio_id: &str) -> DbResult<Vec<Client>> {
        let sql = format!(
            "SELECT {} FROM clients WHERE studio_id = ? ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE",
            CLIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([studio_id], read_client_row)?;

        let mut clients = Vec::new();
        for row in rows {
            clients.push(row?.try_into()?);
        }
        Ok(clients)
    }

    /// Search a studio's clients by first name, last name or email (prefix match).
    pub fn search_clients(&self, studio_id: &str, query: &str, limit: usize) -> DbResult<Vec<Client>> {
        let pattern = format!("{}%", escape_like(query.trim()));
        let sql = format!(
            r#"
            SELECT {} FROM clients
            WHERE studio_id = ?1
              AND (first_name LIKE ?2 ESCAPE '\'
                   OR last_name LIKE ?2 ESCAPE '\'
                   OR email LIKE ?2 ESCAPE '\'
                   OR (first_name || ' ' || last_name) LIKE ?2 ESCAPE '\')
            ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE
            LIMIT ?3
            "#,
            CLIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![studio_id, pattern, limit as i64], read_client_row)?;

        let mut clients = Vec::new();
        for row in rows {
            clients.push(row?.try_into()?);
        }
        Ok(clients)
    }

    /// Delete a client and, by cascade, its sub-records.
    pub fn delete_client(&self, local_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM clients WHERE local_id = ?", [local_id])?;
        Ok(rows_affected > 0)
    }

    /// Record a successful push: link the remote ID and remember the payload hash.
    pub fn mark_client_synced(&self, local_id: &str, server_id: &str, synced_hash: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE clients SET server_id = ?2, synced_hash = ?3 WHERE local_id = ?1",
            params![local_id, server_id, synced_hash],
        )?;
        Ok(rows_affected > 0)
    }

    /// Add reward points and return the new balance.
    pub fn add_reward_points(&self, local_id: &str, points: u32) -> DbResult<u32> {
        let rows_affected = self.conn.execute(
            "UPDATE clients SET reward_points = reward_points + ?2, updated_at = ?3 WHERE local_id = ?1",
            params![local_id, points, chrono::Utc::now().to_rfc3339()],
        )?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("client {}", local_id)));
        }

        self.conn
            .query_row(
                "SELECT reward_points FROM clients WHERE local_id = ?",
                [local_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}

/// Intermediate row struct for database mapping.
struct ClientRow {
    local_id: String,
    server_id: Option<String>,
    studio_id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    date_of_birth: Option<String>,
    allergies: String,
    medications: String,
    skin_conditions: String,
    notes: Option<String>,
    reward_points: u32,
    synced_hash: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_client_row(row: &Row<'_>) -> rusqlite::Result<ClientRow> {
    Ok(ClientRow {
        local_id: row.get(0)?,
        server_id: row.get(1)?,
        studio_id: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        date_of_birth: row.get(7)?,
        allergies: row.get(8)?,
        medications: row.get(9)?,
        skin_conditions: row.get(10)?,
        notes: row.get(11)?,
        reward_points: row.get(12)?,
        synced_hash: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

impl TryFrom<ClientRow> for Client {
    type Error = DbError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        Ok(Client {
            local_id: row.local_id,
            server_id: row.server_id,
            studio_id: row.studio_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            date_of_birth: row.date_of_birth,
            allergies: json_list(&row.allergies)?,
            medications: json_list(&row.medications)?,
            skin_conditions: json_list(&row.skin_conditions)?,
            notes: row.notes,
            reward_points: row.reward_points,
            synced_hash: row.synced_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn client(first: &str, last: &str) -> Client {
        Client::new("studio-1".into(), first.into(), last.into())
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut ana = client("Ana", "Lima");
        ana.email = Some("ana@example.com".into());
        ana.allergies = vec!["nickel".into()];
        ana.medications = vec!["aspirin".into()];
        db.insert_client(&ana).unwrap();

        let retrieved = db.get_client(&ana.local_id).unwrap().unwrap();
        assert_eq!(retrieved.first_name, "Ana");
        assert_eq!(retrieved.email, Some("ana@example.com".into()));
        assert_eq!(retrieved.allergies, vec!["nickel".to_string()]);
        assert_eq!(retrieved.medications, vec!["aspirin".to_string()]);
        assert!(retrieved.skin_conditions.is_empty());
    }

    #[test]
    fn test_update_client() {
        let db = setup_db();

        let mut ana = client("Ana", "Lima");
        db.insert_client(&ana).unwrap();

        ana.phone = Some("+351 900 000 000".into());
        ana.skin_conditions = vec!["rosacea".into()];
        assert!(db.update_client(&ana).unwrap());

        let retrieved = db.get_client(&ana.local_id).unwrap().unwrap();
        assert_eq!(retrieved.phone, Some("+351 900 000 000".into()));
        assert_eq!(retrieved.skin_conditions, vec!["rosacea".to_string()]);

        let ghost = client("No", "Body");
        assert!(!db.update_client(&ghost).unwrap());
    }

    #[test]
    fn test_list_is_scoped_and_ordered() {
        let db = setup_db();

        db.insert_client(&client("Zoe", "Alves")).unwrap();
        db.insert_client(&client("Ana", "Lima")).unwrap();
        db.insert_client(&client("Bia", "alves")).unwrap();
        db.insert_client(&Client::new("studio-2".into(), "Eve".into(), "Other".into()))
            .unwrap();

        let names: Vec<String> = db
            .list_clients("studio-1")
            .unwrap()
            .iter()
            .map(|c| c.full_name())
            .collect();
        assert_eq!(names, vec!["Bia alves", "Zoe Alves", "Ana Lima"]);
    }

    #[test]
    fn test_search_clients() {
        let db = setup_db();

        let mut ana = client("Ana", "Lima");
        ana.email = Some("ana@example.com".into());
        db.insert_client(&ana).unwrap();
        db.insert_client(&client("Anabela", "Costa")).unwrap();
        db.insert_client(&client("Rita", "Anes")).unwrap();
        db.insert_client(&client("Luis", "Pinto")).unwrap();

        let results = db.search_clients("studio-1", "Ana", 10).unwrap();
        assert_eq!(results.len(), 2);

        let results = db.search_clients("studio-1", "an", 10).unwrap();
        assert_eq!(results.len(), 3); // Ana, Anabela, Anes

        let results = db.search_clients("studio-1", "ana lima", 10).unwrap();
        assert_eq!(results.len(), 1);

        // Wildcards in user input are literal
        let results = db.search_clients("studio-1", "%", 10).unwrap();
        assert!(results.is_empty());

        let results = db.search_clients("studio-2", "Ana", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_find_by_email_case_insensitive() {
        let db = setup_db();

        let mut ana = client("Ana", "Lima");
        ana.email = Some("Ana@Example.com".into());
        db.insert_client(&ana).unwrap();

        let found = db
            .find_client_by_email("studio-1", " ana@example.COM ")
            .unwrap()
            .unwrap();
        assert_eq!(found.local_id, ana.local_id);
        assert!(db
            .find_client_by_email("studio-2", "ana@example.com")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_mark_synced() {
        let db = setup_db();

        let ana = client("Ana", "Lima");
        db.insert_client(&ana).unwrap();
        assert!(!ana.is_synced());

        db.mark_client_synced(&ana.local_id, "srv-9", "abc").unwrap();

        let retrieved = db.get_client(&ana.local_id).unwrap().unwrap();
        assert_eq!(retrieved.server_id, Some("srv-9".into()));
        assert_eq!(retrieved.synced_hash, Some("abc".into()));

        let by_server = db.get_client_by_server_id("srv-9").unwrap().unwrap();
        assert_eq!(by_server.local_id, ana.local_id);
    }

    #[test]
    fn test_reward_points() {
        let db = setup_db();

        let ana = client("Ana", "Lima");
        db.insert_client(&ana).unwrap();

        assert_eq!(db.add_reward_points(&ana.local_id, 50).unwrap(), 50);
        assert_eq!(db.add_reward_points(&ana.local_id, 150).unwrap(), 200);
        assert!(matches!(
            db.add_reward_points("missing", 10),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_client() {
        let db = setup_db();

        let ana = client("Ana", "Lima");
        db.insert_client(&ana).unwrap();

        assert!(db.delete_client(&ana.local_id).unwrap());
        assert!(db.get_client(&ana.local_id).unwrap().is_none());
        assert!(!db.delete_client(&ana.local_id).unwrap());
    }
}
