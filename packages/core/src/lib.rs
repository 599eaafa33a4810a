//! TreeProxy Core
//!
//! Presents a flat, tabular store whose records encode a hierarchy as an
//! adjacency list (every record carries its own id and its parent's id) as a
//! navigable, editable tree.
//!
//! # Architecture
//!
//! - **Store is the authority**: nothing is cached, every navigation call
//!   re-derives parent/child relationships from the store
//! - **Virtual root**: parent id `0` denotes the root, which is never stored
//! - **Scan order**: a child's position among its siblings is its position in
//!   the store's row order
//!
//! # Modules
//!
//! - [`models`] - Node handles, record ids, tracked column layout
//! - [`db`] - Flat store trait, change notifications, in-memory table
//! - [`services`] - Projector, id allocator, mutation engine, change translator, tree model
//! - [`operations`] - Drag/drop codec
//! - [`config`] - Tree configuration

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::TreeConfig;
pub use db::{EditStrategy, FlatStore, MemoryTable, Relation, StoreChange, StoreError, TreeEvent};
pub use models::*;
pub use operations::DropAction;
pub use services::{Result, TreeError, TreeModel};
