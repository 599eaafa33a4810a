//! Flat Store Adapter
//!
//! The tree layer never owns records. It reads and writes them through this
//! trait, addressed by (row, column), and learns about changes made to the
//! store from the queued [`StoreChange`] notifications.
//!
//! Relation-aware stores (columns whose displayed value is a lookup of a key
//! in another table) additionally expose [`RelationLookup`]; plain stores
//! return `None` from [`FlatStore::relations`].

use crate::db::error::StoreError;
use crate::db::events::StoreChange;
use serde_json::Value;

/// Field content as seen through the store
pub type FieldValue = Value;

/// Tabular collaborator holding the adjacency-list encoded hierarchy
pub trait FlatStore {
    fn row_count(&self) -> usize;

    fn column_count(&self) -> usize;

    /// Human-readable column name, if the store has one
    fn column_name(&self, column: usize) -> Option<String>;

    /// Read a field (display value for relation columns)
    fn field(&self, row: usize, column: usize) -> Result<FieldValue, StoreError>;

    /// Write a field (key value for relation columns)
    fn set_field(&mut self, row: usize, column: usize, value: FieldValue)
        -> Result<(), StoreError>;

    /// Insert `count` empty rows before `row` (`row == row_count()` appends)
    fn insert_rows(&mut self, row: usize, count: usize) -> Result<(), StoreError>;

    fn remove_rows(&mut self, row: usize, count: usize) -> Result<(), StoreError>;

    fn insert_columns(&mut self, column: usize, count: usize) -> Result<(), StoreError>;

    fn remove_columns(&mut self, column: usize, count: usize) -> Result<(), StoreError>;

    /// Commit a single row; the store may finalize generated keys and reorder rows
    fn submit(&mut self, row: usize) -> Result<(), StoreError>;

    /// Commit every pending change
    fn submit_all(&mut self) -> Result<(), StoreError>;

    /// Every row whose stored `column` value equals `value`, order unspecified
    fn match_exact(&self, column: usize, value: &FieldValue) -> Vec<usize>;

    /// Row removed from view but not yet durably deleted
    fn is_pending_delete(&self, _row: usize) -> bool {
        false
    }

    /// Relation capability, present only on relation-aware stores
    fn relations(&self) -> Option<&dyn RelationLookup> {
        None
    }

    /// Drain queued change notifications in emission order
    fn take_changes(&mut self) -> Vec<StoreChange>;
}

/// Foreign-key display resolution
pub trait RelationLookup {
    /// Whether `column` shows display values of a foreign key
    fn is_relation_column(&self, column: usize) -> bool;

    /// Every key whose display value in `column` equals `display`
    fn resolve_key(&self, column: usize, display: &FieldValue) -> Vec<FieldValue>;
}
