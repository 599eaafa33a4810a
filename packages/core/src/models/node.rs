//! Tree Node Handles
//!
//! A tree node has no storage of its own: its identity is the value of a
//! record's id field. Everything else (parent, ordinal position, columns) is
//! derived from the flat store on demand by the projector.
//!
//! # Examples
//!
//! ```rust
//! use treeproxy_core::models::{NodeHandle, VIRTUAL_ROOT_ID};
//!
//! let root = NodeHandle::from_id(VIRTUAL_ROOT_ID);
//! assert!(root.is_root());
//!
//! let node = NodeHandle::from_id(42);
//! assert_eq!(node.id(), 42);
//! assert_eq!(node.record_id(), Some(42));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Value of a record's id field (and of parent fields that reference it)
pub type RecordId = i64;

/// Parent value that denotes the virtual root
pub const VIRTUAL_ROOT_ID: RecordId = 0;

/// Addressable position in the projected tree
///
/// `Root` is the conceptual parent of all top-level records and is never
/// stored. `Record` carries the id of the record backing the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum NodeHandle {
    Root,
    Record(RecordId),
}

impl NodeHandle {
    /// Map a parent-field value to a handle (`0` is the virtual root)
    pub fn from_id(id: RecordId) -> Self {
        if id == VIRTUAL_ROOT_ID {
            NodeHandle::Root
        } else {
            NodeHandle::Record(id)
        }
    }

    /// Id as written into a child's parent field
    pub fn id(&self) -> RecordId {
        match self {
            NodeHandle::Root => VIRTUAL_ROOT_ID,
            NodeHandle::Record(id) => *id,
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            NodeHandle::Root => None,
            NodeHandle::Record(id) => Some(*id),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, NodeHandle::Root)
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeHandle::Root => write!(f, "<root>"),
            NodeHandle::Record(id) => write!(f, "#{}", id),
        }
    }
}

/// Content of an id or parent field after interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    /// Field not populated yet (null or empty text)
    Unset,
    /// Integer content
    Id(RecordId),
    /// Anything that is not an integer
    Invalid,
}

impl KeyField {
    /// Interpret a raw field value as a key
    ///
    /// Only integer numbers are keys, since lookups match the stored JSON
    /// value exactly. Null and empty text are the transient "under
    /// construction" states; any other text is invalid.
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Null => KeyField::Unset,
            Value::Number(n) => n.as_i64().map(KeyField::Id).unwrap_or(KeyField::Invalid),
            Value::String(s) if s.trim().is_empty() => KeyField::Unset,
            _ => KeyField::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_mapping() {
        assert_eq!(NodeHandle::from_id(0), NodeHandle::Root);
        assert_eq!(NodeHandle::Root.id(), VIRTUAL_ROOT_ID);
        assert_eq!(NodeHandle::Root.record_id(), None);
        assert_eq!(NodeHandle::from_id(7), NodeHandle::Record(7));
    }

    #[test]
    fn test_key_field_parse() {
        assert_eq!(KeyField::parse(&json!(3)), KeyField::Id(3));
        assert_eq!(KeyField::parse(&json!("12")), KeyField::Invalid);
        assert_eq!(KeyField::parse(&Value::Null), KeyField::Unset);
        assert_eq!(KeyField::parse(&json!("  ")), KeyField::Unset);
        assert_eq!(KeyField::parse(&json!(1.5)), KeyField::Invalid);
        assert_eq!(KeyField::parse(&json!("abc")), KeyField::Invalid);
        assert_eq!(KeyField::parse(&json!([1])), KeyField::Invalid);
    }

    #[test]
    fn test_handle_serialization() {
        let json = serde_json::to_value(NodeHandle::Record(5)).unwrap();
        assert_eq!(json, json!({"kind": "record", "id": 5}));
        let json = serde_json::to_value(NodeHandle::Root).unwrap();
        assert_eq!(json, json!({"kind": "root"}));
    }
}
