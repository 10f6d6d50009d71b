//! SQLite schema definition.

/// Complete database schema for the studio store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Clients
-- ============================================================================

CREATE TABLE IF NOT EXISTS clients (
    local_id TEXT PRIMARY KEY,
    server_id TEXT,                              -- NULL until first push
    studio_id TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    date_of_birth TEXT,
    allergies TEXT NOT NULL DEFAULT '[]',        -- JSON array of strings
    medications TEXT NOT NULL DEFAULT '[]',      -- JSON array of strings
    skin_conditions TEXT NOT NULL DEFAULT '[]',  -- JSON array of strings
    notes TEXT,
    reward_points INTEGER NOT NULL DEFAULT 0 CHECK (reward_points >= 0),
    synced_hash TEXT,                            -- SHA-256 of last pushed payload
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_clients_studio ON clients(studio_id);
CREATE INDEX IF NOT EXISTS idx_clients_server_id ON clients(server_id);
CREATE INDEX IF NOT EXISTS idx_clients_name ON clients(studio_id, last_name, first_name);
CREATE INDEX IF NOT EXISTS idx_clients_email ON clients(studio_id, email);

-- ============================================================================
-- Client sub-records
-- ============================================================================

CREATE TABLE IF NOT EXISTS analyses (
    analysis_id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL REFERENCES clients(local_id) ON DELETE CASCADE,
    fitzpatrick INTEGER NOT NULL CHECK (fitzpatrick BETWEEN 1 AND 6),
    undertone TEXT NOT NULL,
    procedure TEXT NOT NULL,
    recommended_pigments TEXT NOT NULL DEFAULT '[]',  -- JSON array of PigmentRecommendation
    contraindications TEXT NOT NULL DEFAULT '[]',     -- JSON array of Contraindication
    source TEXT NOT NULL,
    notes TEXT,
    analyzed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_analyses_client ON analyses(client_id, analyzed_at);

CREATE TABLE IF NOT EXISTS documents (
    document_id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL REFERENCES clients(local_id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    file_name TEXT NOT NULL,
    url TEXT NOT NULL,
    sha256 TEXT NOT NULL,
    added_at TEXT NOT NULL,
    UNIQUE (client_id, sha256)
);

CREATE TABLE IF NOT EXISTS insurance_records (
    insurance_id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL REFERENCES clients(local_id) ON DELETE CASCADE,
    provider TEXT NOT NULL,
    policy_number TEXT NOT NULL,
    coverage_notes TEXT,
    valid_until TEXT
);

CREATE INDEX IF NOT EXISTS idx_insurance_client ON insurance_records(client_id);

-- ============================================================================
-- Team
-- ============================================================================

CREATE TABLE IF NOT EXISTS team_members (
    member_id TEXT PRIMARY KEY,
    server_id TEXT,
    studio_id TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL COLLATE NOCASE,
    role TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    synced_hash TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (studio_id, email)
);

CREATE INDEX IF NOT EXISTS idx_team_members_server_id ON team_members(server_id);

-- ============================================================================
-- Consent
-- ============================================================================

CREATE TABLE IF NOT EXISTS consent_forms (
    form_id TEXT PRIMARY KEY,
    server_id TEXT,
    studio_id TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    procedure TEXT,
    synced_hash TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_consent_forms_server_id ON consent_forms(server_id);

CREATE TABLE IF NOT EXISTS consent_requests (
    request_id TEXT PRIMARY KEY,
    form_id TEXT NOT NULL REFERENCES consent_forms(form_id) ON DELETE CASCADE,
    form_version INTEGER NOT NULL,
    client_id TEXT NOT NULL REFERENCES clients(local_id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'signed', 'revoked')),
    sent_at TEXT NOT NULL,
    signed_at TEXT,
    signature_name TEXT
);

CREATE INDEX IF NOT EXISTS idx_consent_requests_client ON consent_requests(client_id, status);

-- ============================================================================
-- Local cache (browser storage analog: one JSON snapshot per key)
-- ============================================================================

CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Sync State
-- ============================================================================

CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

INSERT OR IGNORE INTO sync_state (key, value) VALUES ('clients_last_pull', '');
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_fitzpatrick_range_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO clients (local_id, studio_id, first_name, last_name) VALUES ('c1', 's1', 'Ana', 'Lima')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO analyses (analysis_id, client_id, fitzpatrick, undertone, procedure, source, analyzed_at)
             VALUES ('a1', 'c1', 7, 'warm', 'brows', 'manual', '2026-01-01')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO analyses (analysis_id, client_id, fitzpatrick, undertone, procedure, source, analyzed_at)
             VALUES ('a1', 'c1', 6, 'warm', 'brows', 'manual', '2026-01-01')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_sub_records_cascade() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO clients (local_id, studio_id, first_name, last_name) VALUES ('c1', 's1', 'Ana', 'Lima')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO insurance_records (insurance_id, client_id, provider, policy_number) VALUES ('i1', 'c1', 'Acme', 'P1')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM clients WHERE local_id = 'c1'", [])
            .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM insurance_records", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_team_email_unique_per_studio() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let insert = "INSERT INTO team_members (member_id, studio_id, name, email, role, created_at)
                      VALUES (?, ?, 'Bea', 'bea@example.com', 'artist', '2026-01-01')";
        conn.execute(insert, ["m1", "s1"]).unwrap();
        assert!(conn.execute(insert, ["m2", "s1"]).is_err());
        assert!(conn.execute(insert, ["m3", "s2"]).is_ok());

        let shouted = "INSERT INTO team_members (member_id, studio_id, name, email, role, created_at)
                       VALUES ('m4', 's1', 'Bea', 'BEA@Example.com', 'artist', '2026-01-01')";
        assert!(conn.execute(shouted, []).is_err());
    }
}
