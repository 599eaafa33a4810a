//! Mutation Engine
//!
//! Structural edits on the projected tree, expressed as sequences of flat
//! store writes:
//!
//! - **insert**: new row → id → sentinel parent → commit → relocate by
//!   sentinel → real parent
//! - **remove**: delete a run of siblings and, iteratively, every descendant
//! - **move**: rewrite one parent field after a cycle check
//! - **copy**: clone a record under a fresh id, then its subtree
//!
//! Cycle and structural checks run before the first write. A store refusal
//! in the middle of a sequence is returned as is; writes already applied stay
//! applied. Callers needing atomicity wrap calls in the store's own
//! transaction facility.

use crate::config::TreeConfig;
use crate::db::{FieldValue, FlatStore};
use crate::models::{ColumnLayout, KeyField, NodeHandle, RecordId, VIRTUAL_ROOT_ID};
use crate::services::error::{Result, TreeError};
use crate::services::id_allocator::IdAllocator;
use crate::services::tree_projector::TreeProjector;
use serde_json::Value;
use std::collections::HashSet;

/// Fail if `moving_id` is `candidate_parent` or one of its ancestors
///
/// Walks the ancestor chain of `candidate_parent` up to the virtual root. A
/// chain longer than the record count means the store already holds a cycle.
pub fn cycle_check<S: FlatStore + ?Sized>(
    tree: &TreeProjector<'_, S>,
    candidate_parent: RecordId,
    moving_id: RecordId,
) -> Result<()> {
    if candidate_parent == moving_id {
        return Err(TreeError::cycle_violation(moving_id, candidate_parent));
    }

    let limit = tree.store().row_count();
    let mut current = NodeHandle::from_id(candidate_parent);
    let mut steps = 0usize;

    while let NodeHandle::Record(_) = current {
        current = tree.parent_of(current)?;
        if current.id() == moving_id {
            return Err(TreeError::cycle_violation(moving_id, candidate_parent));
        }
        steps += 1;
        if steps > limit {
            return Err(TreeError::structural_violation(format!(
                "ancestor chain of {} does not reach the root",
                candidate_parent
            )));
        }
    }
    Ok(())
}

/// Structural edits over a flat store
pub struct MutationEngine<'a, S: FlatStore + ?Sized> {
    store: &'a mut S,
    layout: ColumnLayout,
    allocator: &'a mut IdAllocator,
    config: &'a TreeConfig,
}

impl<'a, S: FlatStore + ?Sized> MutationEngine<'a, S> {
    pub fn new(
        store: &'a mut S,
        layout: ColumnLayout,
        allocator: &'a mut IdAllocator,
        config: &'a TreeConfig,
    ) -> Self {
        Self {
            store,
            layout,
            allocator,
            config,
        }
    }

    /// Raw store access for edits that bypass the tree rules
    pub fn store_mut(&mut self) -> &mut S {
        &mut *self.store
    }

    pub fn projector(&self) -> TreeProjector<'_, S> {
        TreeProjector::new(&*self.store, self.layout, self.config.insert_sentinel)
    }

    pub fn cycle_check(&self, candidate_parent: RecordId, moving_id: RecordId) -> Result<()> {
        cycle_check(&self.projector(), candidate_parent, moving_id)
    }

    /// True when `id` is the virtual root or an existing record
    pub fn is_known(&self, id: RecordId) -> bool {
        id == VIRTUAL_ROOT_ID || self.projector().contains(id)
    }

    /// Append `count` records under `parent`, returning their committed ids
    pub fn insert(&mut self, parent: NodeHandle, count: usize) -> Result<Vec<RecordId>> {
        self.ensure_live_parent(parent)?;
        self.ensure_default_id_free(count)?;

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id_value = match &self.config.default_id {
                Some(default_id) => default_id.clone(),
                None => Value::from(self.allocate()?),
            };
            ids.push(self.insert_record(parent.id(), id_value)?);
        }
        Ok(ids)
    }

    /// Remove `count` consecutive siblings starting at `node`, with their subtrees
    ///
    /// Returns every removed id in removal order.
    pub fn remove(&mut self, node: NodeHandle, count: usize) -> Result<Vec<RecordId>> {
        let NodeHandle::Record(first) = node else {
            return Err(TreeError::structural_violation(
                "the virtual root cannot be removed",
            ));
        };
        if count == 0 {
            return Ok(Vec::new());
        }

        let targets = {
            let tree = self.projector();
            let parent = tree.parent_of(node)?;
            let siblings = tree.children(parent)?;
            let start = siblings
                .iter()
                .position(|id| *id == first)
                .ok_or_else(|| TreeError::not_found(format!("{} among its siblings", node)))?;
            if start + count > siblings.len() {
                return Err(TreeError::not_found(format!(
                    "{} siblings starting at {} (only {} remain)",
                    count,
                    node,
                    siblings.len() - start
                )));
            }
            siblings[start..start + count].to_vec()
        };

        let mut removed = HashSet::new();
        let mut order = Vec::new();
        for id in targets {
            self.remove_subtree(id, &mut removed, &mut order)?;
        }
        tracing::debug!("Removed {} record(s) starting at {}", order.len(), node);
        Ok(order)
    }

    /// Reparent `node_id` under `new_parent_id`; its children follow by reference
    pub fn move_node(&mut self, node_id: RecordId, new_parent_id: RecordId) -> Result<()> {
        let row = self.projector().row_of(node_id)?;
        self.cycle_check(new_parent_id, node_id)?;
        self.ensure_live_parent(NodeHandle::from_id(new_parent_id))?;

        self.store
            .set_field(row, self.layout.parent_column(), Value::from(new_parent_id))?;
        tracing::debug!("Moved record {} under {}", node_id, new_parent_id);
        Ok(())
    }

    /// Clone `node_id` and its subtree under `new_parent_id`
    ///
    /// Returns the clone's id, or `None` when the source is pending deletion.
    pub fn copy_node(
        &mut self,
        node_id: RecordId,
        new_parent_id: RecordId,
    ) -> Result<Option<RecordId>> {
        self.cycle_check(new_parent_id, node_id)?;
        self.ensure_live_parent(NodeHandle::from_id(new_parent_id))?;

        let limit = self.store.row_count();
        let mut root_clone = None;
        let mut copied = 0usize;
        let mut stack = vec![(node_id, new_parent_id)];

        while let Some((source, target_parent)) = stack.pop() {
            let Some(clone_id) = self.copy_record(source, target_parent)? else {
                continue;
            };
            if root_clone.is_none() {
                root_clone = Some(clone_id);
            }

            copied += 1;
            if copied > limit {
                return Err(TreeError::structural_violation(format!(
                    "subtree of {} exceeds the record count; the hierarchy has a cycle",
                    node_id
                )));
            }

            let children = self.projector().children(NodeHandle::Record(source))?;
            let mut seen = HashSet::new();
            let mut branches = Vec::with_capacity(children.len());
            for child in children {
                if seen.insert(child) {
                    branches.push((child, clone_id));
                } else {
                    tracing::warn!(
                        "Duplicate child id {} under record {}; skipping that branch of the copy",
                        child,
                        source
                    );
                }
            }
            // Reversed so the first child is copied first and keeps its place
            stack.extend(branches.into_iter().rev());
        }

        if let Some(clone_id) = root_clone {
            tracing::debug!(
                "Copied record {} as {} under {} ({} record(s))",
                node_id,
                clone_id,
                new_parent_id,
                copied
            );
        }
        Ok(root_clone)
    }

    /// Write one field, routing key columns through their invariants
    ///
    /// Parent writes become a `move_node`; id writes must keep ids non-zero and
    /// unique and are refused for records that have children.
    pub fn set_data(&mut self, node: NodeHandle, column: usize, value: FieldValue) -> Result<()> {
        let NodeHandle::Record(id) = node else {
            return Err(TreeError::structural_violation(
                "the virtual root has no fields",
            ));
        };

        if column == self.layout.parent_column() {
            return match KeyField::parse(&value) {
                KeyField::Id(parent_id) if parent_id >= 0 => self.move_node(id, parent_id),
                _ => Err(TreeError::structural_violation(format!(
                    "{} is not a valid parent id",
                    value
                ))),
            };
        }

        let row = {
            let tree = self.projector();
            if column == self.layout.id_column() {
                match KeyField::parse(&value) {
                    KeyField::Id(new_id) if new_id == id => return Ok(()),
                    KeyField::Id(new_id) if new_id > 0 => {
                        if tree.contains(new_id) {
                            return Err(TreeError::structural_violation(format!(
                                "id {} is already in use",
                                new_id
                            )));
                        }
                        if tree.has_children(node)? {
                            return Err(TreeError::structural_violation(format!(
                                "record {} has children referencing its id",
                                id
                            )));
                        }
                    }
                    _ => {
                        return Err(TreeError::structural_violation(format!(
                            "{} is not a valid record id",
                            value
                        )))
                    }
                }
            }
            tree.row_of(id)?
        };

        self.store.set_field(row, column, value)?;
        Ok(())
    }

    fn allocate(&mut self) -> Result<RecordId> {
        let tree = TreeProjector::new(&*self.store, self.layout, self.config.insert_sentinel);
        self.allocator.allocate(|candidate| Ok(tree.contains(candidate)))
    }

    /// Parent must be the root or an existing record not pending deletion
    fn ensure_live_parent(&self, parent: NodeHandle) -> Result<()> {
        if let NodeHandle::Record(id) = parent {
            if self.projector().is_pending_delete(id)? {
                return Err(TreeError::structural_violation(format!(
                    "record {} is pending deletion",
                    id
                )));
            }
        }
        Ok(())
    }

    /// A fixed default id can be issued once, and only while unused
    fn ensure_default_id_free(&self, count: usize) -> Result<()> {
        let Some(default_id) = &self.config.default_id else {
            return Ok(());
        };
        if let KeyField::Id(id) = KeyField::parse(default_id) {
            if count > 1 {
                return Err(TreeError::structural_violation(format!(
                    "default id {} cannot be given to {} new records",
                    id, count
                )));
            }
            if self.projector().contains(id) {
                return Err(TreeError::structural_violation(format!(
                    "default id {} is already in use",
                    id
                )));
            }
        }
        Ok(())
    }

    /// The multi-step insert sequence for one record
    fn insert_record(&mut self, parent_id: RecordId, id_value: FieldValue) -> Result<RecordId> {
        let id_column = self.layout.id_column();
        let parent_column = self.layout.parent_column();
        let sentinel = Value::from(self.config.insert_sentinel);

        if !self.store.match_exact(parent_column, &sentinel).is_empty() {
            return Err(TreeError::structural_violation(format!(
                "a record already carries the insert sentinel {}",
                sentinel
            )));
        }

        let row = self.store.row_count();
        self.store.insert_rows(row, 1)?;
        self.store.set_field(row, id_column, id_value)?;
        self.store.set_field(row, parent_column, sentinel.clone())?;
        self.store.submit(row)?;

        // The commit may have finalized the id and moved the row
        let row = match self.store.match_exact(parent_column, &sentinel).as_slice() {
            [row] => *row,
            rows => {
                return Err(TreeError::structural_violation(format!(
                    "relocating the inserted record found {} rows tagged {}",
                    rows.len(),
                    sentinel
                )))
            }
        };

        let id = {
            let tree = self.projector();
            let id = tree.id_at(row)?.ok_or_else(|| {
                TreeError::structural_violation("store did not assign an id to the inserted record")
            })?;
            if tree.rows_with_id(id).len() > 1 {
                return Err(TreeError::structural_violation(format!(
                    "inserted record duplicates id {}",
                    id
                )));
            }
            id
        };

        self.store
            .set_field(row, parent_column, Value::from(parent_id))?;
        tracing::debug!("Inserted record {} under {}", id, parent_id);
        Ok(id)
    }

    fn remove_subtree(
        &mut self,
        root: RecordId,
        removed: &mut HashSet<RecordId>,
        order: &mut Vec<RecordId>,
    ) -> Result<()> {
        let limit = self.store.row_count();
        let mut pending = vec![root];

        while let Some(id) = pending.pop() {
            if !removed.insert(id) {
                continue;
            }
            if removed.len() > limit {
                return Err(TreeError::structural_violation(format!(
                    "descendants of {} exceed the record count; the hierarchy has a cycle",
                    root
                )));
            }

            let row = self.projector().row_of(id)?;
            if !self.store.is_pending_delete(row) {
                self.store.remove_rows(row, 1)?;
                order.push(id);
            }

            // Children still reference `id` after its row is gone. Pending
            // rows are included so their live descendants are reached too.
            let mut child_rows = self
                .store
                .match_exact(self.layout.parent_column(), &Value::from(id));
            child_rows.sort_unstable();
            let tree = self.projector();
            for row in child_rows {
                if let Some(child) = tree.id_at(row)? {
                    if !removed.contains(&child) {
                        pending.push(child);
                    }
                }
            }
        }
        Ok(())
    }

    /// Clone a single record; `None` if the source is pending deletion
    fn copy_record(
        &mut self,
        source_id: RecordId,
        target_parent: RecordId,
    ) -> Result<Option<RecordId>> {
        let source_row = self.first_row_of(source_id)?;
        if self.store.is_pending_delete(source_row) {
            tracing::debug!("Record {} is pending deletion; not copied", source_id);
            return Ok(None);
        }

        let fresh_id = self.allocate()?;
        let clone_id = self.insert_record(target_parent, Value::from(fresh_id))?;

        // Rows may have been re-ordered by the commit
        let source_row = self.first_row_of(source_id)?;
        let values = self.copyable_fields(source_row)?;
        let target_row = self.projector().row_of(clone_id)?;
        for (column, value) in values {
            self.store.set_field(target_row, column, value)?;
        }
        Ok(Some(clone_id))
    }

    /// First row holding `id`; duplicates are tolerated while copying
    fn first_row_of(&self, id: RecordId) -> Result<usize> {
        self.projector()
            .rows_with_id(id)
            .first()
            .copied()
            .ok_or_else(|| TreeError::not_found(format!("record {}", id)))
    }

    /// Non-key fields of `row`, with relation display values mapped back to keys
    fn copyable_fields(&self, row: usize) -> Result<Vec<(usize, FieldValue)>> {
        let relations = self.store.relations();
        let mut values = Vec::new();

        for column in 0..self.store.column_count() {
            if self.layout.is_tracked(column) {
                continue;
            }
            let value = self.store.field(row, column)?;
            let value = match relations {
                Some(lookup) if lookup.is_relation_column(column) => {
                    let mut keys = lookup.resolve_key(column, &value);
                    if keys.len() == 1 {
                        keys.remove(0)
                    } else {
                        tracing::warn!(
                            "Display value {} in column {} resolves to {} keys; copied unresolved",
                            value,
                            column,
                            keys.len()
                        );
                        value
                    }
                }
                _ => value,
            };
            values.push((column, value));
        }
        Ok(values)
    }
}
