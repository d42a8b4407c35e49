//! Listing query and page types.

use serde::{Deserialize, Serialize};

use super::Patient;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Client-supplied listing parameters; absent values fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// Substring matched against "first_name last_name"
    pub name: Option<String>,
    /// Exact match on document number
    pub document_number: Option<String>,
}

/// Store-level filter. Blank filters are dropped before reaching the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientFilter {
    pub name: Option<String>,
    pub document_number: Option<String>,
}

impl PatientFilter {
    pub fn new(name: Option<&str>, document_number: Option<&str>) -> Self {
        fn non_blank(value: Option<&str>) -> Option<String> {
            value
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        }

        Self {
            name: non_blank(name),
            document_number: non_blank(document_number),
        }
    }
}

/// One page of a filtered listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatientPage {
    /// Matching records before pagination
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<Patient>,
}
