//! Error taxonomy of the ledger.
//!
//! Failures map 1:1 onto what an API layer reports: [`NotFound`] → 404,
//! [`Conflict`] → 409. Store errors propagate unmodified except for
//! unique-constraint violations, which become [`Conflict`].
//!
//! [`NotFound`]: LedgerError::NotFound
//! [`Conflict`]: LedgerError::Conflict

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The referenced entity does not exist for the requesting owner.
    #[error("{0} not found")]
    NotFound(String),
    /// A business rule was violated (self-parenting category, transfer to the
    /// same account, disallowed mutation on a transfer group, ...).
    #[error("conflict: {0}")]
    Conflict(String),
    /// A monetary amount or schedule parameter is out of range.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl LedgerError {
    /// Translates a store error raised by an insert/update.
    ///
    /// Unique-constraint violations become [`LedgerError::Conflict`]; every
    /// other database error is passed through untouched.
    pub(crate) fn on_write(err: DbErr, resource: &str) -> LedgerError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => LedgerError::Conflict(format!(
                "{resource} already exists with the provided unique fields"
            )),
            _ => LedgerError::Database(err),
        }
    }
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
