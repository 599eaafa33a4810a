//! Tree Services
//!
//! - `TreeProjector` - parent/child/ordinal derivation from the flat store
//! - `IdAllocator` - monotonic record id issuance
//! - `MutationEngine` - insert, cascading remove, move and copy
//! - `ChangeTranslator` - store notifications to tree events
//! - `TreeModel` - facade owning all of the above plus the event channel

pub mod change_translator;
pub mod error;
pub mod id_allocator;
pub mod mutation_engine;
pub mod tree_model;
pub mod tree_projector;

pub use change_translator::{ChangeTranslator, TranslatorState};
pub use error::{Result, TreeError};
pub use id_allocator::IdAllocator;
pub use mutation_engine::{cycle_check, MutationEngine};
pub use tree_model::TreeModel;
pub use tree_projector::TreeProjector;
