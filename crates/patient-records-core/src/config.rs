//! Core runtime configuration.
//!
//! Resolved once at process startup and passed into the core, so request
//! handling never reads process-wide environment variables.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::DEFAULT_PAGE_SIZE;

pub const DB_PATH_ENV: &str = "PATIENT_RECORDS_DB_PATH";
pub const DEFAULT_PAGE_SIZE_ENV: &str = "PATIENT_RECORDS_DEFAULT_PAGE_SIZE";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("default page size must be positive, got {0}")]
    InvalidPageSize(i64),
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    /// `None` keeps the database in memory
    database_path: Option<PathBuf>,
    default_page_size: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CoreConfig {
    pub fn new(database_path: Option<PathBuf>, default_page_size: i64) -> Result<Self, ConfigError> {
        if default_page_size < 1 {
            return Err(ConfigError::InvalidPageSize(default_page_size));
        }

        Ok(Self {
            database_path,
            default_page_size,
        })
    }

    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup(DB_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let default_page_size = match lookup(DEFAULT_PAGE_SIZE_ENV) {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                name: DEFAULT_PAGE_SIZE_ENV,
                value: raw.clone(),
            })?,
        };

        Self::new(database_path, default_page_size)
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }

    pub fn default_page_size(&self) -> i64 {
        self.default_page_size
    }
}
