//! Change Translator
//!
//! Maps flat store notifications onto tree events. The rule of thumb: only a
//! plain content edit of non-key columns can be expressed in node terms. Any
//! row-level or layout change, and any edit touching the id or parent column,
//! can re-shape arbitrary ancestry, so it becomes a full reset bracket.
//!
//! Column structure changes are forwarded after the tracked column positions
//! have been re-derived.

use crate::db::{FlatStore, StoreChange, TreeEvent};
use crate::models::ColumnLayout;
use crate::services::error::{Result, TreeError};
use crate::services::tree_projector::TreeProjector;

/// Whether a reset bracket is currently open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslatorState {
    #[default]
    Idle,
    RebuildPending,
}

#[derive(Debug, Default)]
pub struct ChangeTranslator {
    state: TranslatorState,
    /// Open before-notifications not yet matched by their after-notification
    depth: usize,
}

impl ChangeTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TranslatorState {
        self.state
    }

    /// Translate one store notification
    ///
    /// `layout` is updated in place when columns move. An error means the
    /// store violated a tracked-column precondition; the layout is left as it
    /// was.
    pub fn translate<S: FlatStore + ?Sized>(
        &mut self,
        change: &StoreChange,
        store: &S,
        layout: &mut ColumnLayout,
        sentinel: i64,
    ) -> Result<Vec<TreeEvent>> {
        match *change {
            StoreChange::FieldsChanged {
                top_row,
                bottom_row,
                first_column,
                last_column,
            } => {
                if layout.covers_tracked(first_column, last_column) {
                    return Ok(self.full_reset());
                }
                if self.state == TranslatorState::RebuildPending {
                    // The pending reset already covers it
                    return Ok(Vec::new());
                }
                Ok(self.content_changed(
                    store,
                    *layout,
                    sentinel,
                    top_row..=bottom_row,
                    first_column,
                    last_column,
                ))
            }

            StoreChange::RowsAboutToBeInserted { .. }
            | StoreChange::RowsAboutToBeRemoved { .. }
            | StoreChange::LayoutAboutToBeChanged
            | StoreChange::AboutToBeReset => Ok(self.begin_reset()),

            StoreChange::RowsInserted { .. }
            | StoreChange::RowsRemoved { .. }
            | StoreChange::LayoutChanged
            | StoreChange::Reset => Ok(self.end_reset()),

            StoreChange::ColumnsAboutToBeInserted { first, .. } => {
                if first <= layout.last_tracked() {
                    return Err(TreeError::structural_violation(format!(
                        "column insert at {} would pre-empt tracked column {}",
                        first,
                        layout.last_tracked()
                    )));
                }
                Ok(Vec::new())
            }

            StoreChange::ColumnsInserted { first, last } => {
                layout.shift_for_insert(first, column_span(first, last)?)?;
                Ok(vec![TreeEvent::ColumnsInserted { first, last }])
            }

            StoreChange::ColumnsAboutToBeRemoved { first, last } => {
                if layout.covers_tracked(first, last) {
                    return Err(TreeError::structural_violation(format!(
                        "columns {}..={} contain a tracked column",
                        first, last
                    )));
                }
                Ok(Vec::new())
            }

            StoreChange::ColumnsRemoved { first, last } => {
                layout.shift_for_remove(first, column_span(first, last)?)?;
                Ok(vec![TreeEvent::ColumnsRemoved { first, last }])
            }
        }
    }

    /// Reset bracket emitted in one go (`Idle → RebuildPending → Idle`)
    pub fn full_reset(&mut self) -> Vec<TreeEvent> {
        let mut events = self.begin_reset();
        events.extend(self.end_reset());
        events
    }

    fn begin_reset(&mut self) -> Vec<TreeEvent> {
        self.depth += 1;
        match self.state {
            TranslatorState::Idle => {
                self.state = TranslatorState::RebuildPending;
                vec![TreeEvent::ResetBegin]
            }
            TranslatorState::RebuildPending => Vec::new(),
        }
    }

    fn end_reset(&mut self) -> Vec<TreeEvent> {
        match self.state {
            TranslatorState::Idle => {
                // After-notification without its before-notification
                vec![TreeEvent::ResetBegin, TreeEvent::ResetEnd]
            }
            TranslatorState::RebuildPending => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth > 0 {
                    return Vec::new();
                }
                self.state = TranslatorState::Idle;
                vec![TreeEvent::ResetEnd]
            }
        }
    }

    fn content_changed<S: FlatStore + ?Sized>(
        &self,
        store: &S,
        layout: ColumnLayout,
        sentinel: i64,
        rows: std::ops::RangeInclusive<usize>,
        first_column: usize,
        last_column: usize,
    ) -> Vec<TreeEvent> {
        let tree = TreeProjector::new(store, layout, sentinel);
        let mut events = Vec::new();

        for row in rows {
            match tree.from_flat_row(row) {
                Ok(Some(node)) => events.push(TreeEvent::ContentChanged {
                    node,
                    first_column,
                    last_column,
                }),
                // Under construction: no node to report yet
                Ok(None) => {}
                Err(e) => tracing::warn!("Field change at row {} has no node mapping: {}", row, e),
            }
        }
        events
    }
}

/// Number of columns in `first..=last`
fn column_span(first: usize, last: usize) -> Result<usize> {
    last.checked_sub(first).map(|span| span + 1).ok_or_else(|| {
        TreeError::structural_violation(format!(
            "column range {}..={} is reversed",
            first, last
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryTable;
    use crate::models::NodeHandle;
    use serde_json::json;

    fn sample() -> MemoryTable {
        MemoryTable::new("Table1", ["ID", "Parent", "Content", "Details"]).with_rows(vec![
            vec![json!(1), json!(0), json!("first item")],
            vec![json!(2), json!(1), json!("second item")],
        ])
    }

    fn translate(
        translator: &mut ChangeTranslator,
        table: &MemoryTable,
        layout: &mut ColumnLayout,
        change: StoreChange,
    ) -> Result<Vec<TreeEvent>> {
        translator.translate(&change, table, layout, -1)
    }

    #[test]
    fn test_content_change_maps_to_node() {
        let table = sample();
        let mut layout = ColumnLayout::default();
        let mut translator = ChangeTranslator::new();

        let events = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::FieldsChanged {
                top_row: 0,
                bottom_row: 1,
                first_column: 2,
                last_column: 3,
            },
        )
        .unwrap();

        assert_eq!(
            events,
            vec![
                TreeEvent::ContentChanged {
                    node: NodeHandle::Record(1),
                    first_column: 2,
                    last_column: 3
                },
                TreeEvent::ContentChanged {
                    node: NodeHandle::Record(2),
                    first_column: 2,
                    last_column: 3
                },
            ]
        );
    }

    #[test]
    fn test_tracked_field_change_resets() {
        let table = sample();
        let mut layout = ColumnLayout::default();
        let mut translator = ChangeTranslator::new();

        let events = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::FieldsChanged {
                top_row: 1,
                bottom_row: 1,
                first_column: 1,
                last_column: 1,
            },
        )
        .unwrap();

        assert_eq!(events, vec![TreeEvent::ResetBegin, TreeEvent::ResetEnd]);
        assert_eq!(translator.state(), TranslatorState::Idle);
    }

    #[test]
    fn test_row_changes_bracket_a_reset() {
        let table = sample();
        let mut layout = ColumnLayout::default();
        let mut translator = ChangeTranslator::new();

        let begin = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::RowsAboutToBeRemoved { first: 1, last: 1 },
        )
        .unwrap();
        assert_eq!(begin, vec![TreeEvent::ResetBegin]);
        assert_eq!(translator.state(), TranslatorState::RebuildPending);

        // Nested bracket and content edits are folded into the open reset
        let nested = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::LayoutAboutToBeChanged,
        )
        .unwrap();
        assert!(nested.is_empty());
        let content = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::FieldsChanged {
                top_row: 0,
                bottom_row: 0,
                first_column: 2,
                last_column: 2,
            },
        )
        .unwrap();
        assert!(content.is_empty());

        assert!(translate(&mut translator, &table, &mut layout, StoreChange::LayoutChanged)
            .unwrap()
            .is_empty());
        let end = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::RowsRemoved { first: 1, last: 1 },
        )
        .unwrap();
        assert_eq!(end, vec![TreeEvent::ResetEnd]);
        assert_eq!(translator.state(), TranslatorState::Idle);
    }

    #[test]
    fn test_unmatched_after_notification() {
        let table = sample();
        let mut layout = ColumnLayout::default();
        let mut translator = ChangeTranslator::new();

        let events = translate(&mut translator, &table, &mut layout, StoreChange::Reset).unwrap();
        assert_eq!(events, vec![TreeEvent::ResetBegin, TreeEvent::ResetEnd]);
    }

    #[test]
    fn test_column_insert_before_tracked_rejected() {
        let table = sample();
        let mut layout = ColumnLayout::new(1, 2).unwrap();
        let mut translator = ChangeTranslator::new();

        let result = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::ColumnsAboutToBeInserted { first: 2, last: 2 },
        );
        assert!(matches!(result, Err(TreeError::StructuralViolation { .. })));
        assert_eq!(layout, ColumnLayout::new(1, 2).unwrap());
    }

    #[test]
    fn test_column_insert_after_tracked_forwarded() {
        let table = sample();
        let mut layout = ColumnLayout::default();
        let mut translator = ChangeTranslator::new();

        assert!(translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::ColumnsAboutToBeInserted { first: 2, last: 3 },
        )
        .unwrap()
        .is_empty());
        let events = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::ColumnsInserted { first: 2, last: 3 },
        )
        .unwrap();

        assert_eq!(events, vec![TreeEvent::ColumnsInserted { first: 2, last: 3 }]);
        assert_eq!(layout, ColumnLayout::default());
    }

    #[test]
    fn test_column_removal_shifts_tracked_columns() {
        let table = sample();
        let mut layout = ColumnLayout::new(2, 3).unwrap();
        let mut translator = ChangeTranslator::new();

        translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::ColumnsAboutToBeRemoved { first: 0, last: 1 },
        )
        .unwrap();
        let events = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::ColumnsRemoved { first: 0, last: 1 },
        )
        .unwrap();

        assert_eq!(events, vec![TreeEvent::ColumnsRemoved { first: 0, last: 1 }]);
        assert_eq!(layout.id_column(), 0);
        assert_eq!(layout.parent_column(), 1);
    }

    #[test]
    fn test_column_removal_of_tracked_rejected() {
        let table = sample();
        let mut layout = ColumnLayout::default();
        let mut translator = ChangeTranslator::new();

        let result = translate(
            &mut translator,
            &table,
            &mut layout,
            StoreChange::ColumnsAboutToBeRemoved { first: 1, last: 2 },
        );
        assert!(matches!(result, Err(TreeError::StructuralViolation { .. })));
    }

    #[test]
    fn test_reversed_column_range_rejected() {
        let table = sample();
        let mut layout = ColumnLayout::default();
        let mut translator = ChangeTranslator::new();

        for change in [
            StoreChange::ColumnsInserted { first: 4, last: 3 },
            StoreChange::ColumnsRemoved { first: 3, last: 2 },
        ] {
            let result = translate(&mut translator, &table, &mut layout, change);
            assert!(matches!(result, Err(TreeError::StructuralViolation { .. })));
        }
        assert_eq!(layout, ColumnLayout::default());
    }
}
