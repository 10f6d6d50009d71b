//! Skin analysis intake.
//!
//! Pipeline: Questionnaire or model assessment → Fitzpatrick type → Pigment
//! lookup + Contraindication screening → Analysis history

mod fitzpatrick;
mod pigments;
mod screening;

pub use fitzpatrick::*;
pub use pigments::*;
pub use screening::*;

use thiserror::Error;

use crate::db::Database;
use crate::models::{AnalysisRecord, AnalysisSource, FitzpatrickType, Procedure, Undertone};

/// Analysis errors.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("Invalid questionnaire: {0}")]
    InvalidQuestionnaire(String),

    #[error("Questionnaire score {0} is outside 0-40")]
    ScoreOutOfRange(u32),

    #[error("Client not found: {0}")]
    ClientNotFound(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Coordinates classification, lookup and storage of analyses.
pub struct Analyzer<'a> {
    db: &'a Database,
}

impl<'a> Analyzer<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Build and store an analysis for a client from a known phototype.
    pub fn analyze(
        &self,
        client_id: &str,
        fitzpatrick: FitzpatrickType,
        undertone: Undertone,
        procedure: Procedure,
        source: AnalysisSource,
        notes: Option<String>,
    ) -> AnalysisResult<AnalysisRecord> {
        let client = self
            .db
            .get_client(client_id)?
            .ok_or_else(|| AnalysisError::ClientNotFound(client_id.to_string()))?;

        let mut record = AnalysisRecord::new(
            client.local_id.clone(),
            fitzpatrick,
            undertone,
            procedure,
            source,
        );
        record.recommended_pigments = recommend(fitzpatrick, undertone, procedure);
        record.contraindications = screen(&client.intake());
        record.notes = notes;

        self.db.insert_analysis(&record)?;

        tracing::info!(
            client_id,
            fitzpatrick = fitzpatrick.number(),
            undertone = undertone.as_str(),
            procedure = procedure.as_str(),
            flags = record.contraindications.len(),
            "analysis recorded"
        );
        Ok(record)
    }

    /// Classify a questionnaire and store the resulting analysis.
    pub fn analyze_questionnaire(
        &self,
        client_id: &str,
        answers: &[u8],
        undertone: Undertone,
        procedure: Procedure,
    ) -> AnalysisResult<AnalysisRecord> {
        let fitzpatrick = classify(answers)?;
        self.analyze(
            client_id,
            fitzpatrick,
            undertone,
            procedure,
            AnalysisSource::Questionnaire,
            None,
        )
    }

    /// Analysis history of a client, newest first.
    pub fn history(&self, client_id: &str) -> AnalysisResult<Vec<AnalysisRecord>> {
        Ok(self.db.list_analyses(client_id)?)
    }
}
