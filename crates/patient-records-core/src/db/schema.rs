//! SQLite schema definition.

/// Complete database schema for patient records.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_type TEXT NOT NULL,
    document_number TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    birth_date TEXT NOT NULL,                    -- YYYY-MM-DD
    phone_number TEXT,
    email TEXT,
    created_at TEXT NOT NULL                     -- RFC 3339 UTC, microsecond precision
);

-- Authoritative guard for document identity under concurrent writers
CREATE UNIQUE INDEX IF NOT EXISTS idx_patients_document
    ON patients(document_type, document_number);

CREATE INDEX IF NOT EXISTS idx_patients_created_at ON patients(created_at);
CREATE INDEX IF NOT EXISTS idx_patients_document_number ON patients(document_number);
"#;
