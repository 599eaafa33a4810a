//! Tracked Column Layout
//!
//! Positions of the id field and the parent field inside the flat store's
//! column set. The two positions never coincide; every mutator refuses a
//! value that would make them equal and leaves the layout untouched.

use crate::services::error::{Result, TreeError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    id_column: usize,
    parent_column: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            id_column: 0,
            parent_column: 1,
        }
    }
}

impl ColumnLayout {
    pub fn new(id_column: usize, parent_column: usize) -> Result<Self> {
        if id_column == parent_column {
            return Err(TreeError::structural_violation(format!(
                "id and parent fields cannot share column {}",
                id_column
            )));
        }
        Ok(Self {
            id_column,
            parent_column,
        })
    }

    pub fn id_column(&self) -> usize {
        self.id_column
    }

    pub fn parent_column(&self) -> usize {
        self.parent_column
    }

    /// The larger of the two tracked positions
    pub fn last_tracked(&self) -> usize {
        self.id_column.max(self.parent_column)
    }

    pub fn is_tracked(&self, column: usize) -> bool {
        column == self.id_column || column == self.parent_column
    }

    /// True when `first..=last` contains the id or the parent column
    pub fn covers_tracked(&self, first: usize, last: usize) -> bool {
        (first..=last).contains(&self.id_column) || (first..=last).contains(&self.parent_column)
    }

    pub fn set_id_column(&mut self, column: usize) -> Result<()> {
        if column == self.parent_column {
            return Err(TreeError::structural_violation(format!(
                "column {} already holds the parent field",
                column
            )));
        }
        self.id_column = column;
        Ok(())
    }

    pub fn set_parent_column(&mut self, column: usize) -> Result<()> {
        if column == self.id_column {
            return Err(TreeError::structural_violation(format!(
                "column {} already holds the id field",
                column
            )));
        }
        self.parent_column = column;
        Ok(())
    }

    /// Re-derive tracked positions after `count` columns were inserted at `first`
    ///
    /// The larger index moves first so the two never coincide mid-update.
    pub fn shift_for_insert(&mut self, first: usize, count: usize) -> Result<()> {
        let shifted = |col: usize| if col >= first { col + count } else { col };
        let (new_id, new_parent) = (shifted(self.id_column), shifted(self.parent_column));
        if self.id_column > self.parent_column {
            self.set_id_column(new_id)?;
            self.set_parent_column(new_parent)
        } else {
            self.set_parent_column(new_parent)?;
            self.set_id_column(new_id)
        }
    }

    /// Re-derive tracked positions after `count` columns were removed at `first`
    ///
    /// Fails if the removed range contained a tracked column. The smaller index
    /// moves first so the two never coincide mid-update.
    pub fn shift_for_remove(&mut self, first: usize, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if self.covers_tracked(first, first + count - 1) {
            return Err(TreeError::structural_violation(format!(
                "columns {}..{} contain a tracked field",
                first,
                first + count
            )));
        }
        let shifted = |col: usize| if col > first { col - count } else { col };
        let (new_id, new_parent) = (shifted(self.id_column), shifted(self.parent_column));
        if self.id_column < self.parent_column {
            self.set_id_column(new_id)?;
            self.set_parent_column(new_parent)
        } else {
            self.set_parent_column(new_parent)?;
            self.set_id_column(new_id)
        }
    }
}
