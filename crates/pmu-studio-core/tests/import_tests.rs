//! Bulk client import from spreadsheet-shaped rows.

use std::collections::BTreeMap;

use pmu_studio_core::db::Database;
use pmu_studio_core::import::{ClientImporter, ImportError, RowStatus};

const STUDIO: &str = "studio-1";

fn row(cells: &[(&str, &str)]) -> BTreeMap<String, String> {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_salon_export_with_messy_headers() {
    let db = Database::open_in_memory().unwrap();
    let rows = vec![
        row(&[
            ("Client Name", "Lima, Ana"),
            ("E-mail Address", "ana@example.com"),
            ("D.O.B.", "1990-04-02"),
            ("Known Allergies", "latex; lidocaine"),
            ("Loyalty Tier", "gold"),
        ]),
        row(&[
            ("Client Name", "Bea Costa Reis"),
            ("E-mail Address", "bea@example.com"),
            ("D.O.B.", ""),
            ("Known Allergies", ""),
            ("Loyalty Tier", ""),
        ]),
        row(&[
            ("Client Name", "Caio Souza"),
            ("E-mail Address", "not-an-email"),
            ("D.O.B.", ""),
            ("Known Allergies", ""),
            ("Loyalty Tier", ""),
        ]),
    ];

    let report = ClientImporter::new(&db, STUDIO).import(&rows).unwrap();
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.unmapped_headers, vec!["Loyalty Tier".to_string()]);
    assert!(matches!(report.rows[2].status, RowStatus::Failed { .. }));
    assert_eq!(report.rows[2].row_number, 3);

    let ana = db.find_client_by_email(STUDIO, "ana@example.com").unwrap().unwrap();
    assert_eq!(ana.first_name, "Ana");
    assert_eq!(ana.last_name, "Lima");
    assert_eq!(ana.date_of_birth.as_deref(), Some("1990-04-02"));
    assert_eq!(ana.allergies, vec!["latex".to_string(), "lidocaine".to_string()]);

    let bea = db.find_client_by_email(STUDIO, "bea@example.com").unwrap().unwrap();
    assert_eq!(bea.first_name, "Bea");
    assert_eq!(bea.last_name, "Costa Reis");
}

#[test]
fn test_id_and_visit_columns_do_not_shadow_the_name() {
    let db = Database::open_in_memory().unwrap();
    let rows = vec![row(&[
        ("Client ID", "1001"),
        ("First Visit", "2024-03-01"),
        ("Name", "Ana Lima"),
    ])];

    let report = ClientImporter::new(&db, STUDIO).import(&rows).unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(
        report.unmapped_headers,
        vec!["Client ID".to_string(), "First Visit".to_string()]
    );

    let clients = db.list_clients(STUDIO).unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].first_name, "Ana");
    assert_eq!(clients[0].last_name, "Lima");
}

#[test]
fn test_reimport_reports_duplicates() {
    let db = Database::open_in_memory().unwrap();
    let rows = vec![row(&[
        ("First Name", "Ana"),
        ("Last Name", "Lima"),
        ("Email", "ana@example.com"),
    ])];

    let importer = ClientImporter::new(&db, STUDIO);
    assert_eq!(importer.import(&rows).unwrap().created, 1);

    let again = importer.import(&rows).unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.duplicates, 1);
    assert_eq!(db.list_clients(STUDIO).unwrap().len(), 1);
}

#[test]
fn test_sheet_without_name_column_is_rejected() {
    let db = Database::open_in_memory().unwrap();
    let rows = vec![row(&[("Email", "ana@example.com"), ("Phone", "555")])];

    let err = ClientImporter::new(&db, STUDIO).import(&rows).unwrap_err();
    assert!(matches!(err, ImportError::NoNameColumn(_)));
    assert!(db.list_clients(STUDIO).unwrap().is_empty());
}

#[test]
fn test_empty_sheet() {
    let db = Database::open_in_memory().unwrap();
    let report = ClientImporter::new(&db, STUDIO).import(&[]).unwrap();
    assert_eq!(report.total_rows, 0);
    assert!(report.rows.is_empty());
}
