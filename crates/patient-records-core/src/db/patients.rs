//! Patient database operations.

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{classify_write_error, Database, DbError, DbResult};
use crate::models::{format_date, NewPatient, Patient, PatientFilter};
use crate::store::PatientStore;

const PATIENT_COLUMNS: &str = "id, document_type, document_number, first_name, last_name, \
                               birth_date, phone_number, email, created_at";

const FILTER_CLAUSE: &str = r#"
    WHERE (?1 IS NULL OR (first_name || ' ' || last_name) LIKE '%' || ?1 || '%' ESCAPE '\')
      AND (?2 IS NULL OR document_number = ?2)
"#;

impl PatientStore for Database {
    fn insert(&self, fields: &NewPatient) -> DbResult<Patient> {
        // Stored at microsecond precision; truncate so the returned record matches a re-read.
        let created_at = Utc::now().trunc_subsecs(6);

        self.conn
            .execute(
                r#"
                INSERT INTO patients (
                    document_type, document_number, first_name, last_name,
                    birth_date, phone_number, email, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    fields.document_type,
                    fields.document_number,
                    fields.first_name,
                    fields.last_name,
                    format_date(fields.birth_date),
                    fields.phone_number,
                    fields.email,
                    format_timestamp(created_at),
                ],
            )
            .map_err(|e| {
                classify_write_error(e, || {
                    format!("{}/{}", fields.document_type, fields.document_number)
                })
            })?;

        let id = self.conn.last_insert_rowid();
        debug!(id, "inserted patient row");

        Ok(Patient {
            id,
            document_type: fields.document_type.clone(),
            document_number: fields.document_number.clone(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            birth_date: fields.birth_date,
            phone_number: fields.phone_number.clone(),
            email: fields.email.clone(),
            created_at,
        })
    }

    fn find_by_id(&self, id: i64) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS),
                [id],
                PatientRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn find_by_document(
        &self,
        document_type: &str,
        document_number: &str,
        exclude_id: Option<i64>,
    ) -> DbResult<bool> {
        let exists: bool = self.conn.query_row(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM patients
                WHERE document_type = ?1
                  AND document_number = ?2
                  AND (?3 IS NULL OR id <> ?3)
            )
            "#,
            params![document_type, document_number, exclude_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list(
        &self,
        filter: &PatientFilter,
        page: i64,
        page_size: i64,
    ) -> DbResult<(Vec<Patient>, i64)> {
        let name_pattern = filter.name.as_deref().map(escape_like);
        let document_number = filter.document_number.as_deref();

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM patients {}", FILTER_CLAUSE),
            params![name_pattern, document_number],
            |row| row.get(0),
        )?;

        if page_size < 1 {
            debug!(total, page_size, "non-positive page size, returning empty slice");
            return Ok((Vec::new(), total));
        }

        let offset = (page.max(1) - 1).saturating_mul(page_size);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients {} ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4",
            PATIENT_COLUMNS, FILTER_CLAUSE
        ))?;

        let rows = stmt.query_map(
            params![name_pattern, document_number, page_size, offset],
            PatientRow::from_row,
        )?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }

        debug!(total, returned = patients.len(), "listed patients");
        Ok((patients, total))
    }

    fn list_created_after(&self, after: DateTime<Utc>) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients WHERE created_at > ?1 ORDER BY created_at DESC, id DESC",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([format_timestamp(after)], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    fn update(&self, patient: &Patient) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE patients SET
                    document_type = ?2,
                    document_number = ?3,
                    first_name = ?4,
                    last_name = ?5,
                    birth_date = ?6,
                    phone_number = ?7,
                    email = ?8
                WHERE id = ?1
                "#,
                params![
                    patient.id,
                    patient.document_type,
                    patient.document_number,
                    patient.first_name,
                    patient.last_name,
                    format_date(patient.birth_date),
                    patient.phone_number,
                    patient.email,
                ],
            )
            .map_err(|e| {
                classify_write_error(e, || {
                    format!("{}/{}", patient.document_type, patient.document_number)
                })
            })?;
        Ok(rows_affected > 0)
    }

    fn delete(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: i64,
    document_type: String,
    document_number: String,
    first_name: String,
    last_name: String,
    birth_date: String,
    phone_number: Option<String>,
    email: Option<String>,
    created_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            document_type: row.get(1)?,
            document_number: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            birth_date: row.get(5)?,
            phone_number: row.get(6)?,
            email: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let birth_date = NaiveDate::parse_from_str(&row.birth_date, "%Y-%m-%d").map_err(|_| {
            DbError::InvalidRow(format!(
                "patient {}: bad birth_date {}",
                row.id, row.birth_date
            ))
        })?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|_| {
                DbError::InvalidRow(format!(
                    "patient {}: bad created_at {}",
                    row.id, row.created_at
                ))
            })?
            .with_timezone(&Utc);

        Ok(Patient {
            id: row.id,
            document_type: row.document_type,
            document_number: row.document_number,
            first_name: row.first_name,
            last_name: row.last_name,
            birth_date,
            phone_number: row.phone_number,
            email: row.email,
            created_at,
        })
    }
}

/// Fixed-width so that text ordering matches time ordering.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Make `value` match literally inside a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn fields(doc_type: &str, doc_number: &str, first: &str, last: &str) -> NewPatient {
        NewPatient {
            document_type: doc_type.into(),
            document_number: doc_number.into(),
            first_name: first.into(),
            last_name: last.into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            phone_number: None,
            email: None,
        }
    }

    /// Pin created_at so ordering tests do not depend on clock resolution.
    fn set_created_at(db: &Database, id: i64, at: &str) {
        db.conn()
            .execute(
                "UPDATE patients SET created_at = ?2 WHERE id = ?1",
                params![id, at],
            )
            .unwrap();
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut new_patient = fields("CC", "123", "Ana", "Gomez");
        new_patient.phone_number = Some("555".into());
        new_patient.email = Some("ana@example.com".into());

        let inserted = db.insert(&new_patient).unwrap();
        assert!(inserted.id > 0);

        let retrieved = db.find_by_id(inserted.id).unwrap().unwrap();
        assert_eq!(retrieved, inserted);
        assert_eq!(retrieved.phone_number, Some("555".into()));
        assert_eq!(retrieved.email, Some("ana@example.com".into()));
    }

    #[test]
    fn test_get_missing() {
        let db = setup_db();
        assert!(db.find_by_id(42).unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_document_is_unique_violation() {
        let db = setup_db();
        db.insert(&fields("CC", "123", "Ana", "Gomez")).unwrap();

        let err = db.insert(&fields("CC", "123", "Luis", "Perez")).unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation(ref pair) if pair == "CC/123"));

        let (_, total) = db.list(&PatientFilter::default(), 1, 10).unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_update_into_taken_document_is_unique_violation() {
        let db = setup_db();
        db.insert(&fields("CC", "123", "Ana", "Gomez")).unwrap();
        let mut other = db.insert(&fields("CC", "456", "Luis", "Perez")).unwrap();

        other.document_number = "123".into();
        let err = db.update(&other).unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation(_)));
    }

    #[test]
    fn test_find_by_document_with_exclusion() {
        let db = setup_db();
        let patient = db.insert(&fields("CC", "123", "Ana", "Gomez")).unwrap();

        assert!(db.find_by_document("CC", "123", None).unwrap());
        assert!(!db.find_by_document("CC", "123", Some(patient.id)).unwrap());
        assert!(db.find_by_document("CC", "123", Some(patient.id + 1)).unwrap());
        assert!(!db.find_by_document("TI", "123", None).unwrap());
    }

    #[test]
    fn test_update_patient() {
        let db = setup_db();
        let mut patient = db.insert(&fields("CC", "123", "Ana", "Gomez")).unwrap();

        patient.first_name = "Ana Maria".into();
        patient.email = Some("ana@example.com".into());
        assert!(db.update(&patient).unwrap());

        let retrieved = db.find_by_id(patient.id).unwrap().unwrap();
        assert_eq!(retrieved.first_name, "Ana Maria");
        assert_eq!(retrieved.created_at, patient.created_at);
    }

    #[test]
    fn test_update_missing_returns_false() {
        let db = setup_db();
        let mut patient = db.insert(&fields("CC", "123", "Ana", "Gomez")).unwrap();
        db.delete(patient.id).unwrap();

        patient.first_name = "Ghost".into();
        assert!(!db.update(&patient).unwrap());
    }

    #[test]
    fn test_delete() {
        let db = setup_db();
        let patient = db.insert(&fields("CC", "123", "Ana", "Gomez")).unwrap();

        assert!(db.delete(patient.id).unwrap());
        assert!(!db.delete(patient.id).unwrap());
        assert!(db.find_by_id(patient.id).unwrap().is_none());
    }

    #[test]
    fn test_list_orders_newest_first_and_paginates() {
        let db = setup_db();
        let mut ids = Vec::new();
        for i in 0..5 {
            let p = db
                .insert(&fields("CC", &i.to_string(), "Name", &i.to_string()))
                .unwrap();
            set_created_at(&db, p.id, &format!("2024-01-0{}T00:00:00.000000Z", i + 1));
            ids.push(p.id);
        }

        let (items, total) = db.list(&PatientFilter::default(), 2, 2).unwrap();
        assert_eq!(total, 5);
        let got: Vec<i64> = items.iter().map(|p| p.id).collect();
        // Newest is ids[4]; ranks 3 and 4 are ids[2] and ids[1]
        assert_eq!(got, vec![ids[2], ids[1]]);

        let (items, _) = db.list(&PatientFilter::default(), 3, 2).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, ids[0]);

        let (items, total) = db.list(&PatientFilter::default(), 4, 2).unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 5);
    }

    #[test]
    fn test_list_ties_broken_by_id() {
        let db = setup_db();
        let a = db.insert(&fields("CC", "1", "A", "A")).unwrap();
        let b = db.insert(&fields("CC", "2", "B", "B")).unwrap();
        set_created_at(&db, a.id, "2024-01-01T00:00:00.000000Z");
        set_created_at(&db, b.id, "2024-01-01T00:00:00.000000Z");

        let (items, _) = db.list(&PatientFilter::default(), 1, 10).unwrap();
        assert_eq!(items[0].id, b.id);
        assert_eq!(items[1].id, a.id);
    }

    #[test]
    fn test_list_tolerates_non_positive_paging() {
        let db = setup_db();
        db.insert(&fields("CC", "1", "Ana", "Gomez")).unwrap();
        db.insert(&fields("CC", "2", "Luis", "Perez")).unwrap();

        let (items, total) = db.list(&PatientFilter::default(), 0, 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(total, 2);

        let (items, total) = db.list(&PatientFilter::default(), -3, 1).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(total, 2);

        let (items, total) = db.list(&PatientFilter::default(), 1, 0).unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 2);

        let (items, _) = db.list(&PatientFilter::default(), 1, -5).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_list_name_filter_spans_first_and_last() {
        let db = setup_db();
        db.insert(&fields("CC", "1", "Ana", "Gomez")).unwrap();
        db.insert(&fields("CC", "2", "Ana Maria", "Lopez")).unwrap();
        db.insert(&fields("CC", "3", "Luis", "Perez")).unwrap();

        let filter = PatientFilter::new(Some("Ana"), None);
        let (items, total) = db.list(&filter, 1, 10).unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);

        let filter = PatientFilter::new(Some("a Gom"), None);
        let (items, _) = db.list(&filter, 1, 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].last_name, "Gomez");
    }

    #[test]
    fn test_list_name_filter_is_literal() {
        let db = setup_db();
        db.insert(&fields("CC", "1", "Ana", "Gomez")).unwrap();
        db.insert(&fields("CC", "2", "100%", "Real")).unwrap();

        let (items, _) = db.list(&PatientFilter::new(Some("%"), None), 1, 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].first_name, "100%");

        let (items, _) = db.list(&PatientFilter::new(Some("_"), None), 1, 10).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_list_document_number_exact_and_combined() {
        let db = setup_db();
        db.insert(&fields("CC", "123", "Ana", "Gomez")).unwrap();
        db.insert(&fields("TI", "123", "Luis", "Perez")).unwrap();
        db.insert(&fields("CC", "1234", "Ana", "Lopez")).unwrap();

        let (items, total) = db.list(&PatientFilter::new(None, Some("123")), 1, 10).unwrap();
        assert_eq!(total, 2);
        assert!(items.iter().all(|p| p.document_number == "123"));

        let (items, total) = db
            .list(&PatientFilter::new(Some("Ana"), Some("123")), 1, 10)
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].document_type, "CC");
    }

    #[test]
    fn test_list_created_after() {
        let db = setup_db();
        let old = db.insert(&fields("CC", "1", "Old", "One")).unwrap();
        let new = db.insert(&fields("CC", "2", "New", "One")).unwrap();
        set_created_at(&db, old.id, "2024-01-01T00:00:00.000000Z");
        set_created_at(&db, new.id, "2025-06-01T12:00:00.000000Z");

        let cutoff = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let items = db.list_created_after(cutoff).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, new.id);

        let everything = db
            .list_created_after(cutoff - Duration::days(3650))
            .unwrap();
        assert_eq!(everything.len(), 2);
        assert_eq!(everything[0].id, new.id);
    }

    #[test]
    fn test_corrupt_row_reported() {
        let db = setup_db();
        let patient = db.insert(&fields("CC", "1", "Ana", "Gomez")).unwrap();
        db.conn()
            .execute(
                "UPDATE patients SET birth_date = 'yesterday' WHERE id = ?",
                [patient.id],
            )
            .unwrap();

        let err = db.find_by_id(patient.id).unwrap_err();
        assert!(matches!(err, DbError::InvalidRow(_)));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }
}
