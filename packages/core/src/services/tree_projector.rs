//! Tree Projector
//!
//! Derives parent/child/ordinal relationships from the flat store on every
//! call. Nothing is cached: the store is the single authority, and a child's
//! ordinal is simply its position in the store's scan order among the rows
//! whose parent field holds the parent's id.
//!
//! Rows under construction (id not populated yet, or parent field still
//! carrying the insert sentinel) have no node mapping, and rows pending
//! deletion are left out of child enumeration.

use crate::db::{FieldValue, FlatStore};
use crate::models::{ColumnLayout, KeyField, NodeHandle, RecordId, VIRTUAL_ROOT_ID};
use crate::services::error::{Result, TreeError};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

/// Read-only tree view over a flat store
pub struct TreeProjector<'a, S: FlatStore + ?Sized> {
    store: &'a S,
    layout: ColumnLayout,
    sentinel: i64,
}

impl<'a, S: FlatStore + ?Sized> TreeProjector<'a, S> {
    pub fn new(store: &'a S, layout: ColumnLayout, sentinel: i64) -> Self {
        Self {
            store,
            layout,
            sentinel,
        }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn layout(&self) -> ColumnLayout {
        self.layout
    }

    pub fn column_count(&self) -> usize {
        self.store.column_count()
    }

    /// Id stored at `row`; `None` while the field is not populated
    pub fn id_at(&self, row: usize) -> Result<Option<RecordId>> {
        let value = self.store.field(row, self.layout.id_column())?;
        match KeyField::parse(&value) {
            KeyField::Unset => Ok(None),
            KeyField::Id(VIRTUAL_ROOT_ID) => Err(TreeError::structural_violation(format!(
                "row {} has id 0, which is reserved for the virtual root",
                row
            ))),
            KeyField::Id(id) => Ok(Some(id)),
            KeyField::Invalid => Err(TreeError::structural_violation(format!(
                "row {} has non-integer id {}",
                row, value
            ))),
        }
    }

    /// Parent id stored at `row`; `None` while unset or tagged with the sentinel
    pub fn parent_field_at(&self, row: usize) -> Result<Option<RecordId>> {
        let value = self.store.field(row, self.layout.parent_column())?;
        match KeyField::parse(&value) {
            KeyField::Unset => Ok(None),
            KeyField::Id(id) if id == self.sentinel => Ok(None),
            KeyField::Id(id) if id >= 0 => Ok(Some(id)),
            _ => Err(TreeError::structural_violation(format!(
                "row {} has invalid parent value {}",
                row, value
            ))),
        }
    }

    /// Every row whose id field holds `id`, in scan order
    pub fn rows_with_id(&self, id: RecordId) -> Vec<usize> {
        let mut rows = self
            .store
            .match_exact(self.layout.id_column(), &Value::from(id));
        rows.sort_unstable();
        rows
    }

    pub fn contains(&self, id: RecordId) -> bool {
        !self.rows_with_id(id).is_empty()
    }

    /// The single row owning `id`
    pub fn row_of(&self, id: RecordId) -> Result<usize> {
        match self.rows_with_id(id).as_slice() {
            [] => Err(TreeError::not_found(format!("record {}", id))),
            [row] => Ok(*row),
            rows => Err(TreeError::structural_violation(format!(
                "id {} is held by {} records",
                id,
                rows.len()
            ))),
        }
    }

    pub fn is_pending_delete(&self, id: RecordId) -> Result<bool> {
        Ok(self.store.is_pending_delete(self.row_of(id)?))
    }

    /// Ids of `parent`'s children in scan order
    pub fn children(&self, parent: NodeHandle) -> Result<Vec<RecordId>> {
        let mut rows = self
            .store
            .match_exact(self.layout.parent_column(), &Value::from(parent.id()));
        rows.sort_unstable();

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            if self.store.is_pending_delete(row) {
                continue;
            }
            if let Some(id) = self.id_at(row)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    pub fn child_at(&self, parent: NodeHandle, index: usize) -> Result<NodeHandle> {
        self.children(parent)?
            .get(index)
            .map(|id| NodeHandle::Record(*id))
            .ok_or_else(|| TreeError::not_found(format!("child {} of {}", index, parent)))
    }

    pub fn child_count(&self, parent: NodeHandle) -> Result<usize> {
        Ok(self.children(parent)?.len())
    }

    pub fn has_children(&self, parent: NodeHandle) -> Result<bool> {
        Ok(self.child_count(parent)? > 0)
    }

    /// Raw parent field of record `id`
    pub fn parent_id_of(&self, id: RecordId) -> Result<RecordId> {
        let row = self.row_of(id)?;
        self.parent_field_at(row)?.ok_or_else(|| {
            TreeError::structural_violation(format!("record {} is still under construction", id))
        })
    }

    /// Parent node; the parent field must resolve to exactly one record
    pub fn parent_of(&self, node: NodeHandle) -> Result<NodeHandle> {
        let NodeHandle::Record(id) = node else {
            return Err(TreeError::not_found("parent of the virtual root"));
        };

        let parent_id = self.parent_id_of(id)?;
        if parent_id == VIRTUAL_ROOT_ID {
            return Ok(NodeHandle::Root);
        }

        match self.rows_with_id(parent_id).len() {
            1 => Ok(NodeHandle::Record(parent_id)),
            n => Err(TreeError::structural_violation(format!(
                "parent {} of record {} resolves to {} records",
                parent_id, id, n
            ))),
        }
    }

    /// Position of `node` among its siblings
    pub fn ordinal_of(&self, node: NodeHandle) -> Result<usize> {
        let NodeHandle::Record(id) = node else {
            return Ok(0);
        };
        let parent = self.parent_of(node)?;
        self.children(parent)?
            .iter()
            .position(|child| *child == id)
            .ok_or_else(|| TreeError::not_found(format!("{} among children of {}", node, parent)))
    }

    pub fn to_flat_row(&self, node: NodeHandle) -> Result<usize> {
        match node {
            NodeHandle::Root => Err(TreeError::not_found("flat row of the virtual root")),
            NodeHandle::Record(id) => self.row_of(id),
        }
    }

    /// Node backed by `row`, or `None` while the row is under construction
    pub fn from_flat_row(&self, row: usize) -> Result<Option<NodeHandle>> {
        if row >= self.store.row_count() {
            return Err(TreeError::not_found(format!("flat row {}", row)));
        }
        let Some(id) = self.id_at(row)? else {
            return Ok(None);
        };
        if self.parent_field_at(row)?.is_none() {
            return Ok(None);
        }
        Ok(Some(NodeHandle::Record(id)))
    }

    pub fn data(&self, node: NodeHandle, column: usize) -> Result<FieldValue> {
        let row = self.to_flat_row(node)?;
        Ok(self.store.field(row, column)?)
    }

    /// Every transitive descendant of `node`, breadth first
    pub fn descendants(&self, node: NodeHandle) -> Result<Vec<RecordId>> {
        let limit = self.store.row_count();
        let mut found = Vec::new();
        let mut queue = VecDeque::from([node]);

        while let Some(current) = queue.pop_front() {
            for child in self.children(current)? {
                if found.len() >= limit {
                    return Err(TreeError::structural_violation(format!(
                        "descendants of {} exceed the record count; the hierarchy has a cycle",
                        node
                    )));
                }
                found.push(child);
                queue.push_back(NodeHandle::Record(child));
            }
        }
        Ok(found)
    }

    /// Verify the hierarchy invariants over the whole store
    ///
    /// Ids are non-zero and unique, every parent field is 0 or an existing id,
    /// and every record is reachable from the virtual root exactly once.
    pub fn check_integrity(&self) -> Result<()> {
        let mut ids = HashSet::new();
        let mut children: HashMap<RecordId, Vec<RecordId>> = HashMap::new();

        for row in 0..self.store.row_count() {
            if self.store.is_pending_delete(row) {
                continue;
            }
            let id = self.id_at(row)?.ok_or_else(|| {
                TreeError::structural_violation(format!("row {} has no id", row))
            })?;
            let parent = self.parent_field_at(row)?.ok_or_else(|| {
                TreeError::structural_violation(format!("record {} has no parent", id))
            })?;
            if !ids.insert(id) {
                return Err(TreeError::structural_violation(format!(
                    "id {} is held by more than one record",
                    id
                )));
            }
            children.entry(parent).or_default().push(id);
        }

        for parent in children.keys() {
            if *parent != VIRTUAL_ROOT_ID && !ids.contains(parent) {
                return Err(TreeError::structural_violation(format!(
                    "parent {} does not exist",
                    parent
                )));
            }
        }

        let mut reached = 0usize;
        let mut queue = VecDeque::from([VIRTUAL_ROOT_ID]);
        while let Some(current) = queue.pop_front() {
            if let Some(kids) = children.get(&current) {
                reached += kids.len();
                queue.extend(kids.iter().copied());
            }
        }

        if reached != ids.len() {
            return Err(TreeError::structural_violation(format!(
                "{} of {} records are not reachable from the root",
                ids.len() - reached,
                ids.len()
            )));
        }
        Ok(())
    }
}
