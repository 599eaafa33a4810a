//! Flat Store Error Types
//!
//! Errors a flat store adapter reports when it refuses an operation. The tree
//! layer wraps every one of them as `TreeError::FlatStoreRejected`.

use thiserror::Error;

/// Refusals reported by a flat store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Store does not accept writes
    #[error("Store is read-only")]
    ReadOnly,

    /// Row position outside the table
    #[error("Row {row} out of range (table has {len} rows)")]
    RowOutOfRange { row: usize, len: usize },

    /// Column position outside the table
    #[error("Column {column} out of range (table has {len} columns)")]
    ColumnOutOfRange { column: usize, len: usize },

    /// Commit would break a key constraint
    #[error("Constraint violation: {context}")]
    ConstraintViolation { context: String },

    /// Store-specific refusal
    #[error("Store rejected operation: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Create a row out of range error
    pub fn row_out_of_range(row: usize, len: usize) -> Self {
        Self::RowOutOfRange { row, len }
    }

    /// Create a column out of range error
    pub fn column_out_of_range(column: usize, len: usize) -> Self {
        Self::ColumnOutOfRange { column, len }
    }

    /// Create a constraint violation error
    pub fn constraint_violation(context: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            context: context.into(),
        }
    }

    /// Create a generic rejection
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
