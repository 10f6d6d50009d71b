//! Client list export (JSON and CSV).

use serde::{Deserialize, Serialize};

use crate::db::{Database, DbResult};
use crate::models::{Client, RewardTier};

/// One exported client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientExportRow {
    pub local_id: String,
    pub server_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub skin_conditions: Vec<String>,
    /// Phototype of the most recent analysis, as a roman numeral
    pub fitzpatrick: Option<String>,
    pub reward_points: u32,
    pub reward_tier: RewardTier,
    pub created_at: String,
}

impl ClientExportRow {
    fn new(client: Client, fitzpatrick: Option<String>) -> Self {
        Self {
            reward_tier: RewardTier::for_points(client.reward_points),
            local_id: client.local_id,
            server_id: client.server_id,
            first_name: client.first_name,
            last_name: client.last_name,
            email: client.email,
            phone: client.phone,
            date_of_birth: client.date_of_birth,
            allergies: client.allergies,
            medications: client.medications,
            skin_conditions: client.skin_conditions,
            fitzpatrick,
            reward_points: client.reward_points,
            created_at: client.created_at,
        }
    }
}

/// Export of a studio's clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientExport {
    pub studio_id: String,
    pub exported_at: String,
    pub clients: Vec<ClientExportRow>,
}

const CSV_HEADER: &str = "local_id,server_id,first_name,last_name,email,phone,date_of_birth,\
allergies,medications,skin_conditions,fitzpatrick,reward_points,reward_tier,created_at\n";

impl ClientExport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// CSV with one line per client; list fields are joined with "; ".
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);

        for row in &self.clients {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
                escape_csv(&row.local_id),
                escape_csv(row.server_id.as_deref().unwrap_or("")),
                escape_csv(&row.first_name),
                escape_csv(&row.last_name),
                escape_csv(row.email.as_deref().unwrap_or("")),
                escape_csv(row.phone.as_deref().unwrap_or("")),
                escape_csv(row.date_of_birth.as_deref().unwrap_or("")),
                escape_csv(&row.allergies.join("; ")),
                escape_csv(&row.medications.join("; ")),
                escape_csv(&row.skin_conditions.join("; ")),
                row.fitzpatrick.as_deref().unwrap_or(""),
                row.reward_points,
                row.reward_tier.as_str(),
                escape_csv(&row.created_at),
            ));
        }

        csv
    }
}

pub struct ClientExporter<'a> {
    db: &'a Database,
}

impl<'a> ClientExporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Export every client of a studio, ordered like the client list.
    pub fn export_studio(&self, studio_id: &str) -> DbResult<ClientExport> {
        let mut clients = Vec::new();
        for client in self.db.list_clients(studio_id)? {
            let fitzpatrick = self
                .db
                .latest_analysis(&client.local_id)?
                .map(|a| a.fitzpatrick.as_str().to_string());
            clients.push(ClientExportRow::new(client, fitzpatrick));
        }

        tracing::debug!(studio_id, count = clients.len(), "clients exported");
        Ok(ClientExport {
            studio_id: studio_id.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            clients,
        })
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisRecord, AnalysisSource, FitzpatrickType, Procedure, Undertone};

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();

        let mut ana = Client::new("studio-1".into(), "Ana".into(), "Lima".into());
        ana.allergies = vec!["latex".into(), "nickel".into()];
        ana.notes = Some("private".into());
        ana.reward_points = 250;
        db.insert_client(&ana).unwrap();

        let mut older = AnalysisRecord::new(
            ana.local_id.clone(),
            FitzpatrickType::II,
            Undertone::Cool,
            Procedure::Brows,
            AnalysisSource::Questionnaire,
        );
        older.analyzed_at = "2026-01-01T00:00:00Z".into();
        db.insert_analysis(&older).unwrap();

        let mut newer = older.clone();
        newer.analysis_id = "a-2".into();
        newer.fitzpatrick = FitzpatrickType::III;
        newer.analyzed_at = "2026-02-01T00:00:00Z".into();
        db.insert_analysis(&newer).unwrap();

        let bea = Client::new("studio-1".into(), "Bea".into(), "Costa, Jr".into());
        db.insert_client(&bea).unwrap();

        let other = Client::new("studio-2".into(), "Zoe".into(), "Other".into());
        db.insert_client(&other).unwrap();
        db
    }

    #[test]
    fn test_export_uses_latest_analysis() {
        let db = setup();
        let export = ClientExporter::new(&db).export_studio("studio-1").unwrap();

        assert_eq!(export.clients.len(), 2);
        let ana = export.clients.iter().find(|c| c.first_name == "Ana").unwrap();
        assert_eq!(ana.fitzpatrick.as_deref(), Some("III"));
        assert_eq!(ana.reward_tier, RewardTier::Silver);

        let bea = export.clients.iter().find(|c| c.first_name == "Bea").unwrap();
        assert_eq!(bea.fitzpatrick, None);
    }

    #[test]
    fn test_export_json_omits_notes() {
        let db = setup();
        let json = ClientExporter::new(&db)
            .export_studio("studio-1")
            .unwrap()
            .to_json()
            .unwrap();
        assert!(json.contains("\"latex\""));
        assert!(!json.contains("private"));
        assert!(!json.contains("Zoe"));
    }

    #[test]
    fn test_export_csv() {
        let db = setup();
        let csv = ClientExporter::new(&db)
            .export_studio("studio-1")
            .unwrap()
            .to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3); // Header + 2 clients
        assert!(lines[0].starts_with("local_id,"));
        assert!(csv.contains("\"Costa, Jr\""));
        assert!(csv.contains("latex; nickel"));
        assert!(csv.contains(",III,250,silver,"));
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }
}
