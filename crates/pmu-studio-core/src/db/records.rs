//! Client sub-record operations: analysis history, documents and insurance.

use rusqlite::{params, OptionalExtension};

use super::{json_list, Database, DbError, DbResult};
use crate::models::{
    AnalysisRecord, AnalysisSource, DocumentKind, DocumentRef, FitzpatrickType, InsuranceRecord,
    Procedure, Undertone,
};

impl Database {
    // =========================================================================
    // Analysis history
    // =========================================================================

    /// Append an analysis result to a client's history.
    pub fn insert_analysis(&self, record: &AnalysisRecord) -> DbResult<()> {
        let pigments_json = serde_json::to_string(&record.recommended_pigments)?;
        let flags_json = serde_json::to_string(&record.contraindications)?;

        self.conn.execute(
            r#"
            INSERT INTO analyses (
                analysis_id, client_id, fitzpatrick, undertone, procedure,
                recommended_pigments, contraindications, source, notes, analyzed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.analysis_id,
                record.client_id,
                record.fitzpatrick.number(),
                record.undertone.as_str(),
                record.procedure.as_str(),
                pigments_json,
                flags_json,
                record.source.as_str(),
                record.notes,
                record.analyzed_at,
            ],
        )?;
        Ok(())
    }

    /// List a client's analysis history, newest first.
    pub fn list_analyses(&self, client_id: &str) -> DbResult<Vec<AnalysisRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT analysis_id, client_id, fitzpatrick, undertone, procedure,
                   recommended_pigments, contraindications, source, notes, analyzed_at
            FROM analyses
            WHERE client_id = ?
            ORDER BY analyzed_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([client_id], |row| {
            Ok(AnalysisRow {
                analysis_id: row.get(0)?,
                client_id: row.get(1)?,
                fitzpatrick: row.get(2)?,
                undertone: row.get(3)?,
                procedure: row.get(4)?,
                recommended_pigments: row.get(5)?,
                contraindications: row.get(6)?,
                source: row.get(7)?,
                notes: row.get(8)?,
                analyzed_at: row.get(9)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Most recent analysis of a client, if any.
    pub fn latest_analysis(&self, client_id: &str) -> DbResult<Option<AnalysisRecord>> {
        Ok(self.list_analyses(client_id)?.into_iter().next())
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Attach a document. Returns the stored reference, which is the existing
    /// one when the same content was already attached to this client.
    pub fn insert_document(&self, document: &DocumentRef) -> DbResult<DocumentRef> {
        if let Some(existing) = self.find_document_by_digest(&document.client_id, &document.sha256)? {
            tracing::debug!(
                client_id = %document.client_id,
                document_id = %existing.document_id,
                "document already attached"
            );
            return Ok(existing);
        }

        self.conn.execute(
            r#"
            INSERT INTO documents (document_id, client_id, kind, file_name, url, sha256, added_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                document.document_id,
                document.client_id,
                document.kind.as_str(),
                document.file_name,
                document.url,
                document.sha256,
                document.added_at,
            ],
        )?;
        Ok(document.clone())
    }

    fn find_document_by_digest(&self, client_id: &str, sha256: &str) -> DbResult<Option<DocumentRef>> {
        self.conn
            .query_row(
                r#"
                SELECT document_id, client_id, kind, file_name, url, sha256, added_at
                FROM documents
                WHERE client_id = ? AND sha256 = ?
                "#,
                [client_id, sha256],
                read_document_row,
            )
            .optional()?
            .map(DocumentRef::try_from)
            .transpose()
    }

    pub fn get_document(&self, document_id: &str) -> DbResult<Option<DocumentRef>> {
        self.conn
            .query_row(
                r#"
                SELECT document_id, client_id, kind, file_name, url, sha256, added_at
                FROM documents
                WHERE document_id = ?
                "#,
                [document_id],
                read_document_row,
            )
            .optional()?
            .map(DocumentRef::try_from)
            .transpose()
    }

    /// List a client's documents, oldest first.
    pub fn list_documents(&self, client_id: &str) -> DbResult<Vec<DocumentRef>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT document_id, client_id, kind, file_name, url, sha256, added_at
            FROM documents
            WHERE client_id = ?
            ORDER BY added_at, rowid
            "#,
        )?;
        let rows = stmt.query_map([client_id], read_document_row)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?.try_into()?);
        }
        Ok(documents)
    }

    /// Remove a document reference.
    pub fn delete_document(&self, document_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM documents WHERE document_id = ?", [document_id])?;
        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Insurance
    // =========================================================================

    pub fn insert_insurance(&self, record: &InsuranceRecord) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO insurance_records (
                insurance_id, client_id, provider, policy_number, coverage_notes, valid_until
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.insurance_id,
                record.client_id,
                record.provider,
                record.policy_number,
                record.coverage_notes,
                record.valid_until,
            ],
        )?;
        Ok(())
    }

    pub fn get_insurance(&self, insurance_id: &str) -> DbResult<Option<InsuranceRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT insurance_id, client_id, provider, policy_number, coverage_notes, valid_until
                FROM insurance_records
                WHERE insurance_id = ?
                "#,
                [insurance_id],
                read_insurance_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn update_insurance(&self, record: &InsuranceRecord) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE insurance_records SET
                provider = ?2,
                policy_number = ?3,
                coverage_notes = ?4,
                valid_until = ?5
            WHERE insurance_id = ?1
            "#,
            params![
                record.insurance_id,
                record.provider,
                record.policy_number,
                record.coverage_notes,
                record.valid_until,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    pub fn list_insurance(&self, client_id: &str) -> DbResult<Vec<InsuranceRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT insurance_id, client_id, provider, policy_number, coverage_notes, valid_until
            FROM insurance_records
            WHERE client_id = ?
            ORDER BY provider
            "#,
        )?;
        let rows = stmt.query_map([client_id], read_insurance_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_insurance(&self, insurance_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM insurance_records WHERE insurance_id = ?",
            [insurance_id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn read_insurance_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InsuranceRecord> {
    Ok(InsuranceRecord {
        insurance_id: row.get(0)?,
        client_id: row.get(1)?,
        provider: row.get(2)?,
        policy_number: row.get(3)?,
        coverage_notes: row.get(4)?,
        valid_until: row.get(5)?,
    })
}

/// Intermediate row struct for database mapping.
struct AnalysisRow {
    analysis_id: String,
    client_id: String,
    fitzpatrick: u8,
    undertone: String,
    procedure: String,
    recommended_pigments: String,
    contraindications: String,
    source: String,
    notes: Option<String>,
    analyzed_at: String,
}

impl TryFrom<AnalysisRow> for AnalysisRecord {
    type Error = DbError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let fitzpatrick = FitzpatrickType::from_number(row.fitzpatrick).ok_or_else(|| {
            DbError::Constraint(format!("Unknown Fitzpatrick type: {}", row.fitzpatrick))
        })?;
        let undertone = Undertone::parse(&row.undertone)
            .ok_or_else(|| DbError::Constraint(format!("Unknown undertone: {}", row.undertone)))?;
        let procedure = Procedure::parse(&row.procedure)
            .ok_or_else(|| DbError::Constraint(format!("Unknown procedure: {}", row.procedure)))?;
        let source = AnalysisSource::parse(&row.source)
            .ok_or_else(|| DbError::Constraint(format!("Unknown analysis source: {}", row.source)))?;

        Ok(AnalysisRecord {
            analysis_id: row.analysis_id,
            client_id: row.client_id,
            fitzpatrick,
            undertone,
            procedure,
            recommended_pigments: json_list(&row.recommended_pigments)?,
            contraindications: json_list(&row.contraindications)?,
            source,
            notes: row.notes,
            analyzed_at: row.analyzed_at,
        })
    }
}

struct DocumentRow {
    document_id: String,
    client_id: String,
    kind: String,
    file_name: String,
    url: String,
    sha256: String,
    added_at: String,
}

fn read_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        document_id: row.get(0)?,
        client_id: row.get(1)?,
        kind: row.get(2)?,
        file_name: row.get(3)?,
        url: row.get(4)?,
        sha256: row.get(5)?,
        added_at: row.get(6)?,
    })
}

impl TryFrom<DocumentRow> for DocumentRef {
    type Error = DbError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let kind = DocumentKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown document kind: {}", row.kind)))?;
        Ok(DocumentRef {
            document_id: row.document_id,
            client_id: row.client_id,
            kind,
            file_name: row.file_name,
            url: row.url,
            sha256: row.sha256,
            added_at: row.added_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Client, Contraindication, PigmentRecommendation, Severity};

    fn setup() -> (Database, Client) {
        let db = Database::open_in_memory().unwrap();
        let client = Client::new("studio-1".into(), "Ana".into(), "Lima".into());
        db.insert_client(&client).unwrap();
        (db, client)
    }

    #[test]
    fn test_analysis_history_newest_first() {
        let (db, client) = setup();

        let mut first = AnalysisRecord::new(
            client.local_id.clone(),
            FitzpatrickType::II,
            Undertone::Cool,
            Procedure::Brows,
            AnalysisSource::Questionnaire,
        );
        first.analyzed_at = "2026-01-01T10:00:00+00:00".into();
        first.recommended_pigments.push(PigmentRecommendation {
            family: "ash brown".into(),
            modifier: Some("warm orange".into()),
            rationale: "cool undertone".into(),
        });

        let mut second = AnalysisRecord::new(
            client.local_id.clone(),
            FitzpatrickType::III,
            Undertone::Neutral,
            Procedure::Brows,
            AnalysisSource::Ai,
        );
        second.analyzed_at = "2026-02-01T10:00:00+00:00".into();
        second.contraindications.push(Contraindication {
            trigger: "aspirin".into(),
            severity: Severity::Caution,
            note: "bleeding".into(),
        });

        db.insert_analysis(&first).unwrap();
        db.insert_analysis(&second).unwrap();

        let history = db.list_analyses(&client.local_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], second);
        assert_eq!(history[1], first);

        let latest = db.latest_analysis(&client.local_id).unwrap().unwrap();
        assert_eq!(latest.fitzpatrick, FitzpatrickType::III);
    }

    #[test]
    fn test_analysis_requires_existing_client() {
        let (db, _) = setup();
        let orphan = AnalysisRecord::new(
            "missing".into(),
            FitzpatrickType::I,
            Undertone::Warm,
            Procedure::Lips,
            AnalysisSource::Manual,
        );
        assert!(db.insert_analysis(&orphan).is_err());
    }

    #[test]
    fn test_document_dedup_by_digest() {
        let (db, client) = setup();

        let doc = DocumentRef::new(
            client.local_id.clone(),
            DocumentKind::Consent,
            "consent.pdf".into(),
            "https://files/consent.pdf".into(),
            b"%PDF-1.7 consent",
        );
        let stored = db.insert_document(&doc).unwrap();
        assert_eq!(stored.document_id, doc.document_id);

        let again = DocumentRef::new(
            client.local_id.clone(),
            DocumentKind::Consent,
            "consent-copy.pdf".into(),
            "https://files/consent-copy.pdf".into(),
            b"%PDF-1.7 consent",
        );
        let stored_again = db.insert_document(&again).unwrap();
        assert_eq!(stored_again.document_id, doc.document_id);

        assert_eq!(db.list_documents(&client.local_id).unwrap().len(), 1);
        let fetched = db.get_document(&doc.document_id).unwrap().unwrap();
        assert_eq!(fetched.client_id, client.local_id);

        assert!(db.delete_document(&doc.document_id).unwrap());
        assert!(db.get_document(&doc.document_id).unwrap().is_none());
        assert!(db.list_documents(&client.local_id).unwrap().is_empty());
    }

    #[test]
    fn test_insurance_crud() {
        let (db, client) = setup();

        let mut record = InsuranceRecord::new(
            client.local_id.clone(),
            "Medis".into(),
            "POL-42".into(),
        );
        db.insert_insurance(&record).unwrap();

        record.valid_until = Some("2027-06-30".into());
        record.coverage_notes = Some("corrective areola only".into());
        assert!(db.update_insurance(&record).unwrap());

        let listed = db.list_insurance(&client.local_id).unwrap();
        assert_eq!(listed, vec![record.clone()]);
        assert_eq!(db.get_insurance(&record.insurance_id).unwrap(), Some(record.clone()));

        assert!(db.delete_insurance(&record.insurance_id).unwrap());
        assert!(db.list_insurance(&client.local_id).unwrap().is_empty());
    }
}
