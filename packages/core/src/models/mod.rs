//! Data Models
//!
//! Node handles and the tracked column layout. Records themselves are owned by
//! the flat store; nothing here holds field data.

pub mod column_layout;
pub mod node;

pub use column_layout::ColumnLayout;
pub use node::{KeyField, NodeHandle, RecordId, VIRTUAL_ROOT_ID};
