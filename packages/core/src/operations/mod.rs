//! Tree Operations
//!
//! Operations that sit on top of the mutation engine. Currently the
//! drag/drop codec: selections are encoded as a tagged id list and applied as
//! a batch of moves or copies.

pub mod drag_drop;

pub use drag_drop::{decode, encode, DragPayload, DropAction, NODE_ID_LIST_FORMAT};
