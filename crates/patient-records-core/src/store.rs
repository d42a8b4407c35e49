//! Persistence contract for patient records.

use chrono::{DateTime, Utc};

use crate::db::DbResult;
use crate::models::{NewPatient, Patient, PatientFilter};

/// Storage operations the resource manager relies on.
///
/// Implementations must enforce uniqueness of (document_type, document_number)
/// themselves and report a violation as [`crate::db::DbError::UniqueViolation`];
/// the manager's existence check is not atomic with the following write.
pub trait PatientStore {
    /// Persist a new record, assigning its id and creation timestamp.
    fn insert(&self, fields: &NewPatient) -> DbResult<Patient>;

    fn find_by_id(&self, id: i64) -> DbResult<Option<Patient>>;

    /// Whether another record holds this document pair, optionally ignoring `exclude_id`.
    fn find_by_document(
        &self,
        document_type: &str,
        document_number: &str,
        exclude_id: Option<i64>,
    ) -> DbResult<bool>;

    /// One page of matching records, newest first, plus the total match count.
    ///
    /// `page` is 1-indexed. Non-positive values must not error.
    fn list(
        &self,
        filter: &PatientFilter,
        page: i64,
        page_size: i64,
    ) -> DbResult<(Vec<Patient>, i64)>;

    /// Records created strictly after `after`, newest first.
    fn list_created_after(&self, after: DateTime<Utc>) -> DbResult<Vec<Patient>>;

    /// Overwrite all mutable fields of the record with `patient.id`.
    ///
    /// Returns false when no such record exists.
    fn update(&self, patient: &Patient) -> DbResult<bool>;

    /// Returns true if a record existed and was removed.
    fn delete(&self, id: i64) -> DbResult<bool>;
}
