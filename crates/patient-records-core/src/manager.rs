//! Patient resource manager.
//!
//! Enforces field constraints and document-identity uniqueness before
//! delegating to a [`PatientStore`]. The existence check is a fast path for a
//! friendly conflict; the store's unique index stays authoritative, and its
//! violations are reported as the same [`PatientError::DuplicateDocument`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use tracing::{error, info, warn};

use crate::config::CoreConfig;
use crate::db::DbError;
use crate::error::{PatientError, PatientResult};
use crate::models::{
    ListQuery, NewPatient, Patient, PatientFilter, PatientInput, PatientPage, DEFAULT_PAGE,
    DEFAULT_PAGE_SIZE,
};
use crate::patch::{merge_patch, PatientPatch};
use crate::store::PatientStore;
use crate::validation::{validate_input, ValidationErrors};

/// Create/read/update/delete over a borrowed store.
pub struct PatientManager<'a, S: PatientStore + ?Sized> {
    store: &'a S,
    default_page_size: i64,
}

impl<'a, S: PatientStore + ?Sized> PatientManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Use listing defaults from `config`.
    pub fn with_config(store: &'a S, config: &CoreConfig) -> Self {
        Self {
            store,
            default_page_size: config.default_page_size(),
        }
    }

    /// Validate and insert a new patient.
    pub fn create(&self, input: &PatientInput) -> PatientResult<Patient> {
        let fields = validate_input(input).map_err(|e| rejected("create", e))?;
        self.ensure_document_free(&fields, None)?;

        let patient = self
            .store
            .insert(&fields)
            .map_err(|e| store_error(e, Some(fields.document_identity())))?;

        info!(id = patient.id, "created patient");
        Ok(patient)
    }

    pub fn get(&self, id: i64) -> PatientResult<Patient> {
        self.fetch(id)
    }

    /// One page of patients, newest first.
    pub fn list(&self, query: &ListQuery) -> PatientResult<PatientPage> {
        let page = query.page.unwrap_or(DEFAULT_PAGE);
        let page_size = query.page_size.unwrap_or(self.default_page_size);
        let filter = PatientFilter::new(query.name.as_deref(), query.document_number.as_deref());

        let (items, total) = self
            .store
            .list(&filter, page, page_size)
            .map_err(|e| store_error(e, None))?;

        Ok(PatientPage {
            total,
            page,
            page_size,
            items,
        })
    }

    /// Patients created strictly after `after` (`YYYY-MM-DD` or RFC 3339).
    pub fn list_created_after(&self, after: &str) -> PatientResult<Vec<Patient>> {
        let instant = parse_instant(after).ok_or_else(|| {
            rejected(
                "list_created_after",
                ValidationErrors::single(
                    "after",
                    "must be a date (YYYY-MM-DD) or an RFC 3339 timestamp",
                ),
            )
        })?;

        self.store
            .list_created_after(instant)
            .map_err(|e| store_error(e, None))
    }

    /// Overwrite every mutable field of patient `id`.
    pub fn replace(&self, id: i64, input: &PatientInput) -> PatientResult<Patient> {
        let existing = self.fetch(id)?;
        let fields = validate_input(input).map_err(|e| rejected("replace", e))?;

        if fields.document_identity() != existing.document_identity() {
            self.ensure_document_free(&fields, Some(id))?;
        }

        let mut updated = existing;
        updated.apply(fields);
        self.persist(&updated)?;

        info!(id, "replaced patient");
        Ok(updated)
    }

    /// Merge a sparse patch into patient `id`.
    pub fn patch(&self, id: i64, patch: &PatientPatch) -> PatientResult<Patient> {
        let existing = self.fetch(id)?;
        let merged = merge_patch(&existing, patch).map_err(|e| rejected("patch", e))?;

        // Compared after merge: a field re-sent with its current value counts as unchanged.
        if merged.document_identity() != existing.document_identity() {
            let (document_type, document_number) = merged.document_identity();
            self.ensure_pair_free(document_type, document_number, Some(id))?;
        }

        self.persist(&merged)?;

        info!(id, "patched patient");
        Ok(merged)
    }

    /// Parse a JSON PATCH body, then [`Self::patch`].
    pub fn patch_json(&self, id: i64, body: &str) -> PatientResult<Patient> {
        let patch = PatientPatch::from_json(body).map_err(|e| {
            warn!(id, error = %e, "rejected malformed patch");
            PatientError::from(e)
        })?;
        self.patch(id, &patch)
    }

    pub fn delete(&self, id: i64) -> PatientResult<()> {
        let removed = self.store.delete(id).map_err(|e| store_error(e, None))?;
        if !removed {
            warn!(id, "delete of missing patient");
            return Err(PatientError::NotFound(id));
        }

        info!(id, "deleted patient");
        Ok(())
    }

    fn fetch(&self, id: i64) -> PatientResult<Patient> {
        self.store
            .find_by_id(id)
            .map_err(|e| store_error(e, None))?
            .ok_or_else(|| {
                warn!(id, "patient not found");
                PatientError::NotFound(id)
            })
    }

    fn persist(&self, patient: &Patient) -> PatientResult<()> {
        let updated = self
            .store
            .update(patient)
            .map_err(|e| store_error(e, Some(patient.document_identity())))?;
        if !updated {
            // Removed between fetch and write.
            warn!(id = patient.id, "patient vanished before update");
            return Err(PatientError::NotFound(patient.id));
        }
        Ok(())
    }

    fn ensure_document_free(&self, fields: &NewPatient, exclude_id: Option<i64>) -> PatientResult<()> {
        let (document_type, document_number) = fields.document_identity();
        self.ensure_pair_free(document_type, document_number, exclude_id)
    }

    fn ensure_pair_free(
        &self,
        document_type: &str,
        document_number: &str,
        exclude_id: Option<i64>,
    ) -> PatientResult<()> {
        let taken = self
            .store
            .find_by_document(document_type, document_number, exclude_id)
            .map_err(|e| store_error(e, None))?;
        if taken {
            warn!(document_type, document_number, "duplicate document");
            return Err(duplicate(document_type, document_number));
        }
        Ok(())
    }
}

fn duplicate(document_type: &str, document_number: &str) -> PatientError {
    PatientError::DuplicateDocument {
        document_type: document_type.to_string(),
        document_number: document_number.to_string(),
    }
}

fn rejected(operation: &str, errors: ValidationErrors) -> PatientError {
    warn!(operation, fields = ?errors.fields(), "validation failed");
    PatientError::Validation(errors)
}

/// Reclassify a store failure. A unique-index violation on a write that
/// carried `document` becomes a duplicate; anything else is opaque.
fn store_error(err: DbError, document: Option<(&str, &str)>) -> PatientError {
    match (err, document) {
        (DbError::UniqueViolation(detail), Some((document_type, document_number))) => {
            warn!(%detail, "unique index rejected write after pre-check");
            duplicate(document_type, document_number)
        }
        (err, _) => {
            error!(error = %err, "patient store failure");
            PatientError::Storage(err)
        }
    }
}

/// `YYYY-MM-DD` (midnight UTC), naive ISO datetime (UTC), or RFC 3339.
///
/// The UTC year must be within `0..=9999`; stored timestamps compare as text.
fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let instant = if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        date.and_hms_opt(0, 0, 0)?.and_utc()
    } else if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        datetime.and_utc()
    } else {
        DateTime::parse_from_rfc3339(value).ok()?.with_timezone(&Utc)
    };
    (0..=9999).contains(&instant.year()).then_some(instant)
}
