//! Consent form and request database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{ConsentForm, ConsentRequest, ConsentStatus, Procedure};

impl Database {
    // =========================================================================
    // Forms
    // =========================================================================

    pub fn insert_consent_form(&self, form: &ConsentForm) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO consent_forms (
                form_id, server_id, studio_id, title, body, version, procedure,
                synced_hash, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                form.form_id,
                form.server_id,
                form.studio_id,
                form.title,
                form.body,
                form.version,
                form.procedure.map(|p| p.as_str()),
                form.synced_hash,
                form.created_at,
            ],
        )?;
        Ok(())
    }

    /// Update a form. The version is bumped when the body text changes.
    pub fn update_consent_form(&self, form: &ConsentForm) -> DbResult<Option<ConsentForm>> {
        let Some(current) = self.get_consent_form(&form.form_id)? else {
            return Ok(None);
        };

        let mut updated = form.clone();
        updated.server_id = current.server_id;
        updated.synced_hash = current.synced_hash;
        updated.version = if current.body != form.body {
            current.version + 1
        } else {
            current.version
        };

        self.overwrite_consent_form(&updated)?;
        Ok(Some(updated))
    }

    /// Write every editable column as given, version included.
    ///
    /// Used when the remote collection is authoritative for the form.
    pub fn overwrite_consent_form(&self, form: &ConsentForm) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE consent_forms SET
                title = ?2,
                body = ?3,
                version = ?4,
                procedure = ?5
            WHERE form_id = ?1
            "#,
            params![
                form.form_id,
                form.title,
                form.body,
                form.version,
                form.procedure.map(|p| p.as_str()),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Record a successful push.
    pub fn mark_consent_form_synced(&self, form_id: &str, server_id: &str, synced_hash: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE consent_forms SET server_id = ?2, synced_hash = ?3 WHERE form_id = ?1",
            params![form_id, server_id, synced_hash],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn delete_consent_form(&self, form_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM consent_forms WHERE form_id = ?", [form_id])?;
        Ok(rows_affected > 0)
    }

    pub fn get_consent_form_by_server_id(&self, server_id: &str) -> DbResult<Option<ConsentForm>> {
        self.conn
            .query_row(
                r#"
                SELECT form_id, server_id, studio_id, title, body, version, procedure, synced_hash, created_at
                FROM consent_forms
                WHERE server_id = ?
                "#,
                [server_id],
                read_form_row,
            )
            .optional()?
            .map(ConsentForm::try_from)
            .transpose()
    }

    pub fn get_consent_form(&self, form_id: &str) -> DbResult<Option<ConsentForm>> {
        self.conn
            .query_row(
                r#"
                SELECT form_id, server_id, studio_id, title, body, version, procedure, synced_hash, created_at
                FROM consent_forms
                WHERE form_id = ?
                "#,
                [form_id],
                read_form_row,
            )
            .optional()?
            .map(ConsentForm::try_from)
            .transpose()
    }

    pub fn list_consent_forms(&self, studio_id: &str) -> DbResult<Vec<ConsentForm>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT form_id, server_id, studio_id, title, body, version, procedure, synced_hash, created_at
            FROM consent_forms
            WHERE studio_id = ?
            ORDER BY title COLLATE NOCASE
            "#,
        )?;
        let rows = stmt.query_map([studio_id], read_form_row)?;

        let mut forms = Vec::new();
        for row in rows {
            forms.push(row?.try_into()?);
        }
        Ok(forms)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    pub fn insert_consent_request(&self, request: &ConsentRequest) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO consent_requests (
                request_id, form_id, form_version, client_id, status,
                sent_at, signed_at, signature_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                request.request_id,
                request.form_id,
                request.form_version,
                request.client_id,
                request.status.as_str(),
                request.sent_at,
                request.signed_at,
                request.signature_name,
            ],
        )?;
        Ok(())
    }

    pub fn get_consent_request(&self, request_id: &str) -> DbResult<Option<ConsentRequest>> {
        self.conn
            .query_row(
                r#"
                SELECT request_id, form_id, form_version, client_id, status,
                       sent_at, signed_at, signature_name
                FROM consent_requests
                WHERE request_id = ?
                "#,
                [request_id],
                read_request_row,
            )
            .optional()?
            .map(ConsentRequest::try_from)
            .transpose()
    }

    /// Whether a client already has a pending request for a form.
    pub fn has_pending_consent(&self, form_id: &str, client_id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM consent_requests WHERE form_id = ? AND client_id = ? AND status = 'pending'",
            [form_id, client_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List a client's requests, optionally only pending ones; newest first.
    pub fn list_consent_requests(&self, client_id: &str, pending_only: bool) -> DbResult<Vec<ConsentRequest>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT request_id, form_id, form_version, client_id, status,
                   sent_at, signed_at, signature_name
            FROM consent_requests
            WHERE client_id = ?1 AND (NOT ?2 OR status = 'pending')
            ORDER BY sent_at DESC, rowid DESC
            "#,
        )?;
        let rows = stmt.query_map(params![client_id, pending_only], read_request_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?.try_into()?);
        }
        Ok(requests)
    }

    /// Move a pending request to a final status.
    pub fn set_consent_status(
        &self,
        request_id: &str,
        status: ConsentStatus,
        signature_name: Option<&str>,
    ) -> DbResult<bool> {
        let signed_at = (status == ConsentStatus::Signed).then(|| chrono::Utc::now().to_rfc3339());
        let rows_affected = self.conn.execute(
            r#"
            UPDATE consent_requests SET
                status = ?2,
                signed_at = ?3,
                signature_name = ?4
            WHERE request_id = ?1 AND status = 'pending'
            "#,
            params![request_id, status.as_str(), signed_at, signature_name],
        )?;
        Ok(rows_affected > 0)
    }
}

struct FormRow {
    form_id: String,
    server_id: Option<String>,
    studio_id: String,
    title: String,
    body: String,
    version: u32,
    procedure: Option<String>,
    synced_hash: Option<String>,
    created_at: String,
}

fn read_form_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FormRow> {
    Ok(FormRow {
        form_id: row.get(0)?,
        server_id: row.get(1)?,
        studio_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        version: row.get(5)?,
        procedure: row.get(6)?,
        synced_hash: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl TryFrom<FormRow> for ConsentForm {
    type Error = DbError;

    fn try_from(row: FormRow) -> Result<Self, Self::Error> {
        let procedure = row
            .procedure
            .map(|p| {
                Procedure::parse(&p)
                    .ok_or_else(|| DbError::Constraint(format!("Unknown procedure: {}", p)))
            })
            .transpose()?;
        Ok(ConsentForm {
            form_id: row.form_id,
            server_id: row.server_id,
            studio_id: row.studio_id,
            title: row.title,
            body: row.body,
            version: row.version,
            procedure,
            synced_hash: row.synced_hash,
            created_at: row.created_at,
        })
    }
}

struct RequestRow {
    request_id: String,
    form_id: String,
    form_version: u32,
    client_id: String,
    status: String,
    sent_at: String,
    signed_at: Option<String>,
    signature_name: Option<String>,
}

fn read_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        request_id: row.get(0)?,
        form_id: row.get(1)?,
        form_version: row.get(2)?,
        client_id: row.get(3)?,
        status: row.get(4)?,
        sent_at: row.get(5)?,
        signed_at: row.get(6)?,
        signature_name: row.get(7)?,
    })
}

impl TryFrom<RequestRow> for ConsentRequest {
    type Error = DbError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status = ConsentStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown consent status: {}", row.status)))?;
        Ok(ConsentRequest {
            request_id: row.request_id,
            form_id: row.form_id,
            form_version: row.form_version,
            client_id: row.client_id,
            status,
            sent_at: row.sent_at,
            signed_at: row.signed_at,
            signature_name: row.signature_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Client;

    fn setup() -> (Database, Client, ConsentForm) {
        let db = Database::open_in_memory().unwrap();
        let client = Client::new("studio-1".into(), "Ana".into(), "Lima".into());
        db.insert_client(&client).unwrap();
        let mut form = ConsentForm::new(
            "studio-1".into(),
            "Lip blush consent".into(),
            "I understand healing takes 4-6 weeks.".into(),
        );
        form.procedure = Some(Procedure::Lips);
        db.insert_consent_form(&form).unwrap();
        (db, client, form)
    }

    #[test]
    fn test_form_round_trip() {
        let (db, _, form) = setup();
        let stored = db.get_consent_form(&form.form_id).unwrap().unwrap();
        assert_eq!(stored, form);
        assert_eq!(db.list_consent_forms("studio-1").unwrap().len(), 1);
        assert!(db.list_consent_forms("studio-2").unwrap().is_empty());
    }

    #[test]
    fn test_body_change_bumps_version() {
        let (db, _, mut form) = setup();

        form.title = "Lip blush consent (2026)".into();
        let updated = db.update_consent_form(&form).unwrap().unwrap();
        assert_eq!(updated.version, 1);

        form.body = "I understand healing takes 6-8 weeks.".into();
        let updated = db.update_consent_form(&form).unwrap().unwrap();
        assert_eq!(updated.version, 2);

        let missing = ConsentForm::new("studio-1".into(), "x".into(), "y".into());
        assert!(db.update_consent_form(&missing).unwrap().is_none());
    }

    #[test]
    fn test_update_keeps_sync_linkage() {
        let (db, _, mut form) = setup();
        db.mark_consent_form_synced(&form.form_id, "cf-9", "h1").unwrap();

        form.title = "Renamed".into();
        let updated = db.update_consent_form(&form).unwrap().unwrap();
        assert_eq!(updated.server_id, Some("cf-9".into()));
        assert_eq!(updated.synced_hash, Some("h1".into()));

        let by_server = db.get_consent_form_by_server_id("cf-9").unwrap().unwrap();
        assert_eq!(by_server.title, "Renamed");
    }

    #[test]
    fn test_overwrite_sets_version() {
        let (db, _, mut form) = setup();
        form.version = 7;
        form.body = "Remote text".into();
        assert!(db.overwrite_consent_form(&form).unwrap());

        let stored = db.get_consent_form(&form.form_id).unwrap().unwrap();
        assert_eq!(stored.version, 7);
        assert_eq!(stored.body, "Remote text");
    }

    #[test]
    fn test_request_lifecycle() {
        let (db, client, form) = setup();

        let request = ConsentRequest::new(&form, client.local_id.clone());
        db.insert_consent_request(&request).unwrap();
        assert!(db.has_pending_consent(&form.form_id, &client.local_id).unwrap());
        assert_eq!(db.list_consent_requests(&client.local_id, true).unwrap().len(), 1);

        assert!(db
            .set_consent_status(&request.request_id, ConsentStatus::Signed, Some("Ana Lima"))
            .unwrap());

        let signed = db.get_consent_request(&request.request_id).unwrap().unwrap();
        assert_eq!(signed.status, ConsentStatus::Signed);
        assert!(signed.signed_at.is_some());
        assert_eq!(signed.signature_name, Some("Ana Lima".into()));

        // Final states do not change again
        assert!(!db
            .set_consent_status(&request.request_id, ConsentStatus::Revoked, None)
            .unwrap());

        assert!(!db.has_pending_consent(&form.form_id, &client.local_id).unwrap());
        assert!(db.list_consent_requests(&client.local_id, true).unwrap().is_empty());
        assert_eq!(db.list_consent_requests(&client.local_id, false).unwrap().len(), 1);
    }
}
