//! Change Notifications
//!
//! Two event vocabularies meet here:
//!
//! - [`StoreChange`] is what a flat store reports about itself, in flat
//!   row/column coordinates (before/after pairs for structural changes).
//! - [`TreeEvent`] is what the tree layer tells the view, in node coordinates.
//!
//! The change translator turns the first into the second.
//!
//! # Event Flow
//!
//! 1. A flat store performs a write and queues a `StoreChange`
//! 2. `TreeModel::process_store_changes` drains the queue through the translator
//! 3. The resulting `TreeEvent`s are broadcast to every subscriber

use crate::models::NodeHandle;
use serde::{Deserialize, Serialize};

/// Notification emitted by a flat store (ranges are inclusive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    FieldsChanged {
        top_row: usize,
        bottom_row: usize,
        first_column: usize,
        last_column: usize,
    },
    RowsAboutToBeInserted { first: usize, last: usize },
    RowsInserted { first: usize, last: usize },
    RowsAboutToBeRemoved { first: usize, last: usize },
    RowsRemoved { first: usize, last: usize },
    ColumnsAboutToBeInserted { first: usize, last: usize },
    ColumnsInserted { first: usize, last: usize },
    ColumnsAboutToBeRemoved { first: usize, last: usize },
    ColumnsRemoved { first: usize, last: usize },
    LayoutAboutToBeChanged,
    LayoutChanged,
    AboutToBeReset,
    Reset,
}

/// Structural or content event delivered to the view layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TreeEvent {
    /// Everything derived from the store is about to be invalidated
    ResetBegin,

    /// Projection may be re-read from scratch
    ResetEnd,

    #[serde(rename_all = "camelCase")]
    ColumnsInserted { first: usize, last: usize },

    #[serde(rename_all = "camelCase")]
    ColumnsRemoved { first: usize, last: usize },

    /// Non-key fields of one node changed
    #[serde(rename_all = "camelCase")]
    ContentChanged {
        node: NodeHandle,
        first_column: usize,
        last_column: usize,
    },
}

impl TreeEvent {
    /// Short name for logging
    pub fn event_type(&self) -> &str {
        match self {
            TreeEvent::ResetBegin => "tree:reset-begin",
            TreeEvent::ResetEnd => "tree:reset-end",
            TreeEvent::ColumnsInserted { .. } => "tree:columns-inserted",
            TreeEvent::ColumnsRemoved { .. } => "tree:columns-removed",
            TreeEvent::ContentChanged { .. } => "tree:content-changed",
        }
    }
}
