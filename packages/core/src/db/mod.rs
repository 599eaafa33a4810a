//! Flat Store Layer
//!
//! The seam between the tree and the tabular store that actually holds the
//! records:
//!
//! - [`FlatStore`] - field access, row/column edits, exact-match lookup and
//!   queued change notifications
//! - [`RelationLookup`] - optional display-to-key resolution for foreign keys
//! - [`MemoryTable`] - in-memory reference store
//!
//! Change notifications ([`StoreChange`]) and the view-facing [`TreeEvent`]s
//! they are translated into live in [`events`].

mod error;
pub mod events;
mod flat_store;
mod memory_table;

pub use error::StoreError;
pub use events::{StoreChange, TreeEvent};
pub use flat_store::{FieldValue, FlatStore, RelationLookup};
pub use memory_table::{EditStrategy, MemoryTable, Relation};
