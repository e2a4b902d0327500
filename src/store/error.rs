//! Row-level write errors.

use thiserror::Error;

use super::identity::IdentityError;

/// Why a single row could not be written.
///
/// These errors are recovered by the batch reconciler and reported per row;
/// they never abort a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A row with the same natural key already exists.
    #[error("Duplicate key: {key}")]
    DuplicateKey {
        /// The natural key.
        key: String,
    },

    /// No row with the natural key exists.
    #[error("Record not found: {key}")]
    NotFound {
        /// The natural key.
        key: String,
    },

    /// The row references an employee the store does not know.
    #[error("Unknown employee: {reference}")]
    UnknownEmployee {
        /// The unresolved reference.
        reference: String,
    },

    /// The row is structurally invalid.
    #[error("Invalid record: {message}")]
    Invalid {
        /// What is wrong with the row.
        message: String,
    },

    /// The row would bind an identifier held by another employee.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}
