//! In-Memory Flat Store
//!
//! `MemoryTable` is a reference [`FlatStore`]: named columns, rows of JSON
//! values, and the store behaviours the tree layer has to cope with.
//!
//! - **Edit strategies**: `OnFieldChange` removes rows immediately;
//!   `OnManualSubmit` only marks committed rows as pending-delete until
//!   [`FlatStore::submit_all`].
//! - **Generated keys**: with a key column configured, committing a row whose
//!   key is null assigns `max + 1`, duplicate keys are refused, and rows are
//!   re-ordered by key after each commit (as a re-selecting SQL table would).
//! - **Relations**: a column can be bound to a lookup list of `(key, display)`
//!   pairs; reads return the display value, writes store the key.
//! - **Read-only mode**: every write is refused.
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use treeproxy_core::db::{FlatStore, MemoryTable};
//!
//! let table = MemoryTable::new("Table1", ["ID", "Parent", "Content"])
//!     .with_rows(vec![
//!         vec![json!(1), json!(0), json!("first item")],
//!         vec![json!(2), json!(1), json!("second item")],
//!     ]);
//! assert_eq!(table.row_count(), 2);
//! assert_eq!(table.match_exact(1, &json!(1)), vec![1]);
//! ```

use crate::db::error::StoreError;
use crate::db::events::StoreChange;
use crate::db::flat_store::{FieldValue, FlatStore, RelationLookup};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// When removals become durable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStrategy {
    #[default]
    OnFieldChange,
    OnManualSubmit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowState {
    Committed,
    Inserted,
    Removed,
}

#[derive(Debug, Clone)]
struct TableRow {
    values: Vec<Value>,
    state: RowState,
}

/// Lookup list backing a relation column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// `(key, display)` pairs
    entries: Vec<(Value, Value)>,
}

impl Relation {
    pub fn new(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    fn display_for(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, display)| display)
    }

    fn keys_for(&self, display: &Value) -> Vec<Value> {
        self.entries
            .iter()
            .filter(|(_, d)| d == display)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// In-memory table implementing [`FlatStore`]
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<TableRow>,
    strategy: EditStrategy,
    read_only: bool,
    key_column: Option<usize>,
    relations: BTreeMap<usize, Relation>,
    changes: Vec<StoreChange>,
}

impl MemoryTable {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            strategy: EditStrategy::default(),
            read_only: false,
            key_column: None,
            relations: BTreeMap::new(),
            changes: Vec::new(),
        }
    }

    /// Seed committed rows (padded or truncated to the column count, no notifications)
    pub fn with_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        let width = self.columns.len();
        self.rows.extend(rows.into_iter().map(|mut values| {
            values.resize(width, Value::Null);
            TableRow {
                values,
                state: RowState::Committed,
            }
        }));
        self
    }

    pub fn with_edit_strategy(mut self, strategy: EditStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Column whose null values are generated on commit and must stay unique
    pub fn with_key_column(mut self, column: usize) -> Self {
        self.key_column = Some(column);
        self
    }

    pub fn with_relation(mut self, column: usize, relation: Relation) -> Self {
        self.relations.insert(column, relation);
        self
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Stored values of a row (keys, not display values)
    pub fn raw_row(&self, row: usize) -> Option<&[Value]> {
        self.rows.get(row).map(|r| r.values.as_slice())
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn check_cell(&self, row: usize, column: usize) -> Result<(), StoreError> {
        if row >= self.rows.len() {
            return Err(StoreError::row_out_of_range(row, self.rows.len()));
        }
        if column >= self.columns.len() {
            return Err(StoreError::column_out_of_range(column, self.columns.len()));
        }
        Ok(())
    }

    fn remove_row_now(&mut self, row: usize) {
        self.changes.push(StoreChange::RowsAboutToBeRemoved {
            first: row,
            last: row,
        });
        self.rows.remove(row);
        self.changes.push(StoreChange::RowsRemoved {
            first: row,
            last: row,
        });
    }

    /// Assign a generated key if needed and enforce key uniqueness
    fn finalize_key(&mut self, row: usize) -> Result<(), StoreError> {
        let Some(key_column) = self.key_column else {
            return Ok(());
        };

        if self.rows[row].values[key_column].is_null() {
            let next = self
                .rows
                .iter()
                .filter_map(|r| r.values[key_column].as_i64())
                .max()
                .unwrap_or(0)
                + 1;
            self.rows[row].values[key_column] = Value::from(next);
            self.changes.push(StoreChange::FieldsChanged {
                top_row: row,
                bottom_row: row,
                first_column: key_column,
                last_column: key_column,
            });
        }

        let key = &self.rows[row].values[key_column];
        let duplicate = self
            .rows
            .iter()
            .enumerate()
            .any(|(i, r)| i != row && r.state != RowState::Removed && &r.values[key_column] == key);
        if duplicate {
            return Err(StoreError::constraint_violation(format!(
                "duplicate key {} in column {}",
                key, key_column
            )));
        }
        Ok(())
    }

    /// Re-order rows by key the way a re-select would
    fn reorder_by_key(&mut self) {
        let Some(key_column) = self.key_column else {
            return;
        };

        let compare = |a: &TableRow, b: &TableRow| match (
            a.values[key_column].as_i64(),
            b.values[key_column].as_i64(),
        ) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        let sorted = self.rows.windows(2).all(|w| compare(&w[0], &w[1]) != Ordering::Greater);
        if sorted {
            return;
        }

        self.changes.push(StoreChange::LayoutAboutToBeChanged);
        self.rows.sort_by(compare);
        self.changes.push(StoreChange::LayoutChanged);
    }
}

impl FlatStore for MemoryTable {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, column: usize) -> Option<String> {
        self.columns.get(column).cloned()
    }

    fn field(&self, row: usize, column: usize) -> Result<FieldValue, StoreError> {
        self.check_cell(row, column)?;
        let raw = &self.rows[row].values[column];
        let display = self
            .relations
            .get(&column)
            .and_then(|relation| relation.display_for(raw));
        Ok(display.unwrap_or(raw).clone())
    }

    fn set_field(
        &mut self,
        row: usize,
        column: usize,
        value: FieldValue,
    ) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.check_cell(row, column)?;
        if self.rows[row].state == RowState::Removed {
            return Err(StoreError::rejected(format!(
                "row {} is pending deletion",
                row
            )));
        }

        self.rows[row].values[column] = value;
        self.changes.push(StoreChange::FieldsChanged {
            top_row: row,
            bottom_row: row,
            first_column: column,
            last_column: column,
        });
        Ok(())
    }

    fn insert_rows(&mut self, row: usize, count: usize) -> Result<(), StoreError> {
        self.ensure_writable()?;
        if row > self.rows.len() {
            return Err(StoreError::row_out_of_range(row, self.rows.len()));
        }
        if count == 0 {
            return Ok(());
        }

        let last = row + count - 1;
        self.changes
            .push(StoreChange::RowsAboutToBeInserted { first: row, last });
        let width = self.columns.len();
        let fresh = (0..count).map(|_| TableRow {
            values: vec![Value::Null; width],
            state: RowState::Inserted,
        });
        self.rows.splice(row..row, fresh);
        self.changes.push(StoreChange::RowsInserted { first: row, last });
        Ok(())
    }

    fn remove_rows(&mut self, row: usize, count: usize) -> Result<(), StoreError> {
        self.ensure_writable()?;
        if count == 0 {
            return Ok(());
        }
        if row + count > self.rows.len() {
            return Err(StoreError::row_out_of_range(
                row + count - 1,
                self.rows.len(),
            ));
        }

        match self.strategy {
            EditStrategy::OnFieldChange => {
                let last = row + count - 1;
                self.changes
                    .push(StoreChange::RowsAboutToBeRemoved { first: row, last });
                self.rows.drain(row..row + count);
                self.changes.push(StoreChange::RowsRemoved { first: row, last });
            }
            EditStrategy::OnManualSubmit => {
                let mut marked = false;
                for r in (row..row + count).rev() {
                    match self.rows[r].state {
                        RowState::Inserted => self.remove_row_now(r),
                        RowState::Committed => {
                            self.rows[r].state = RowState::Removed;
                            marked = true;
                        }
                        RowState::Removed => {}
                    }
                }
                if marked {
                    self.changes.push(StoreChange::LayoutAboutToBeChanged);
                    self.changes.push(StoreChange::LayoutChanged);
                }
            }
        }
        Ok(())
    }

    fn insert_columns(&mut self, column: usize, count: usize) -> Result<(), StoreError> {
        self.ensure_writable()?;
        if column > self.columns.len() {
            return Err(StoreError::column_out_of_range(column, self.columns.len()));
        }
        if count == 0 {
            return Ok(());
        }

        let last = column + count - 1;
        self.changes.push(StoreChange::ColumnsAboutToBeInserted {
            first: column,
            last,
        });
        self.columns
            .splice(column..column, (0..count).map(|_| String::new()));
        for row in &mut self.rows {
            row.values
                .splice(column..column, (0..count).map(|_| Value::Null));
        }
        if let Some(key) = self.key_column.as_mut() {
            if *key >= column {
                *key += count;
            }
        }
        self.relations = std::mem::take(&mut self.relations)
            .into_iter()
            .map(|(col, rel)| if col >= column { (col + count, rel) } else { (col, rel) })
            .collect();
        self.changes.push(StoreChange::ColumnsInserted {
            first: column,
            last,
        });
        Ok(())
    }

    fn remove_columns(&mut self, column: usize, count: usize) -> Result<(), StoreError> {
        self.ensure_writable()?;
        if count == 0 {
            return Ok(());
        }
        if column + count > self.columns.len() {
            return Err(StoreError::column_out_of_range(
                column + count - 1,
                self.columns.len(),
            ));
        }

        let last = column + count - 1;
        self.changes.push(StoreChange::ColumnsAboutToBeRemoved {
            first: column,
            last,
        });
        self.columns.drain(column..=last);
        for row in &mut self.rows {
            row.values.drain(column..=last);
        }
        self.key_column = match self.key_column {
            Some(key) if key > last => Some(key - count),
            Some(key) if key >= column => None,
            other => other,
        };
        self.relations = std::mem::take(&mut self.relations)
            .into_iter()
            .filter(|(col, _)| *col < column || *col > last)
            .map(|(col, rel)| if col > last { (col - count, rel) } else { (col, rel) })
            .collect();
        self.changes.push(StoreChange::ColumnsRemoved {
            first: column,
            last,
        });
        Ok(())
    }

    fn submit(&mut self, row: usize) -> Result<(), StoreError> {
        self.ensure_writable()?;
        if row >= self.rows.len() {
            return Err(StoreError::row_out_of_range(row, self.rows.len()));
        }

        match self.rows[row].state {
            RowState::Committed => return Ok(()),
            RowState::Removed => {
                self.remove_row_now(row);
                return Ok(());
            }
            RowState::Inserted => {}
        }

        self.finalize_key(row)?;
        self.rows[row].state = RowState::Committed;
        self.reorder_by_key();
        Ok(())
    }

    fn submit_all(&mut self) -> Result<(), StoreError> {
        self.ensure_writable()?;

        for row in (0..self.rows.len()).rev() {
            if self.rows[row].state == RowState::Removed {
                self.remove_row_now(row);
            }
        }
        for row in 0..self.rows.len() {
            if self.rows[row].state == RowState::Inserted {
                self.finalize_key(row)?;
                self.rows[row].state = RowState::Committed;
            }
        }
        self.reorder_by_key();
        Ok(())
    }

    fn match_exact(&self, column: usize, value: &FieldValue) -> Vec<usize> {
        if column >= self.columns.len() {
            return Vec::new();
        }
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| &r.values[column] == value)
            .map(|(i, _)| i)
            .collect()
    }

    fn is_pending_delete(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_some_and(|r| r.state == RowState::Removed)
    }

    fn relations(&self) -> Option<&dyn RelationLookup> {
        if self.relations.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    fn take_changes(&mut self) -> Vec<StoreChange> {
        std::mem::take(&mut self.changes)
    }
}

impl RelationLookup for MemoryTable {
    fn is_relation_column(&self, column: usize) -> bool {
        self.relations.contains_key(&column)
    }

    fn resolve_key(&self, column: usize, display: &FieldValue) -> Vec<FieldValue> {
        self.relations
            .get(&column)
            .map(|relation| relation.keys_for(display))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> MemoryTable {
        MemoryTable::new("Table1", ["ID", "Parent", "Content"]).with_rows(vec![
            vec![json!(1), json!(0), json!("first item")],
            vec![json!(2), json!(1), json!("second item")],
            vec![json!(3), json!(1), json!("third item")],
        ])
    }

    #[test]
    fn test_insert_rows_notifies_and_pads() {
        let mut table = sample();
        table.insert_rows(3, 2).unwrap();

        assert_eq!(table.row_count(), 5);
        assert_eq!(table.raw_row(4).unwrap(), &[Value::Null, Value::Null, Value::Null]);
        assert_eq!(
            table.take_changes(),
            vec![
                StoreChange::RowsAboutToBeInserted { first: 3, last: 4 },
                StoreChange::RowsInserted { first: 3, last: 4 },
            ]
        );
        assert!(table.take_changes().is_empty());
    }

    #[test]
    fn test_read_only_refuses_writes() {
        let mut table = sample();
        table.set_read_only(true);

        assert_eq!(table.set_field(0, 2, json!("x")), Err(StoreError::ReadOnly));
        assert_eq!(table.insert_rows(0, 1), Err(StoreError::ReadOnly));
        assert_eq!(table.remove_rows(0, 1), Err(StoreError::ReadOnly));
        assert_eq!(table.field(0, 2).unwrap(), json!("first item"));
    }

    #[test]
    fn test_manual_submit_marks_pending_delete() {
        let mut table = sample().with_edit_strategy(EditStrategy::OnManualSubmit);
        table.remove_rows(1, 1).unwrap();

        assert_eq!(table.row_count(), 3);
        assert!(table.is_pending_delete(1));
        assert!(table.set_field(1, 2, json!("x")).is_err());

        table.submit_all().unwrap();
        assert_eq!(table.row_count(), 2);
        assert!(!table.is_pending_delete(1));
        assert_eq!(table.raw_row(1).unwrap()[0], json!(3));
    }

    #[test]
    fn test_submit_generates_key_and_reorders() {
        let mut table = sample().with_key_column(0);
        table.insert_rows(0, 1).unwrap();
        table.set_field(0, 1, json!(-1)).unwrap();
        table.take_changes();

        table.submit(0).unwrap();

        // Generated key 4 sorts after the existing rows
        assert_eq!(table.raw_row(3).unwrap()[0], json!(4));
        assert_eq!(table.match_exact(1, &json!(-1)), vec![3]);
        let changes = table.take_changes();
        assert!(changes.contains(&StoreChange::LayoutChanged));
    }

    #[test]
    fn test_submit_refuses_duplicate_key() {
        let mut table = sample().with_key_column(0);
        table.insert_rows(3, 1).unwrap();
        table.set_field(3, 0, json!(2)).unwrap();

        assert!(matches!(
            table.submit(3),
            Err(StoreError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_relation_display_and_resolution() {
        let table = MemoryTable::new("Tasks", ["ID", "Parent", "Owner"])
            .with_rows(vec![vec![json!(1), json!(0), json!(10)]])
            .with_relation(2, Relation::new([(json!(10), json!("alice")), (json!(11), json!("bob"))]));

        assert_eq!(table.field(0, 2).unwrap(), json!("alice"));
        assert_eq!(table.raw_row(0).unwrap()[2], json!(10));

        let relations = table.relations().unwrap();
        assert!(relations.is_relation_column(2));
        assert!(!relations.is_relation_column(1));
        assert_eq!(relations.resolve_key(2, &json!("bob")), vec![json!(11)]);
        assert!(relations.resolve_key(2, &json!("carol")).is_empty());
    }

    #[test]
    fn test_plain_table_has_no_relations() {
        assert!(sample().relations().is_none());
    }

    #[test]
    fn test_column_insert_and_remove_shift_relations() {
        let mut table = MemoryTable::new("T", ["ID", "Parent", "Owner"])
            .with_relation(2, Relation::new([(json!(1), json!("a"))]))
            .with_key_column(0);

        table.insert_columns(1, 1).unwrap();
        assert_eq!(table.column_count(), 4);
        assert!(table.is_relation_column(3));

        table.remove_columns(3, 1).unwrap();
        assert_eq!(table.column_count(), 3);
        assert!(table.relations().is_none());
        assert_eq!(
            table.take_changes().last(),
            Some(&StoreChange::ColumnsRemoved { first: 3, last: 3 })
        );
    }
}
