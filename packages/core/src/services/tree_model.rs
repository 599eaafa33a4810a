//! Tree Model
//!
//! Facade handed to the view layer. It owns the flat store together with the
//! tracked column layout, the id allocator and the change translator, and
//! exposes navigation, structural edits, drag/drop and tree events.
//!
//! Every edit drains the store's queued notifications through the change
//! translator before returning, whether or not the edit succeeded, so writes
//! applied before a mid-sequence failure are still reported to subscribers.

use crate::config::TreeConfig;
use crate::db::{FieldValue, FlatStore, TreeEvent};
use crate::models::{ColumnLayout, NodeHandle, RecordId};
use crate::operations::drag_drop::{self, DropAction, NODE_ID_LIST_FORMAT};
use crate::services::change_translator::ChangeTranslator;
use crate::services::error::{Result, TreeError};
use crate::services::id_allocator::IdAllocator;
use crate::services::mutation_engine::MutationEngine;
use crate::services::tree_projector::TreeProjector;
use tokio::sync::broadcast;

/// Tree view over an adjacency-list flat store
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use treeproxy_core::{MemoryTable, NodeHandle, TreeConfig, TreeModel};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let table = MemoryTable::new("Table1", ["ID", "Parent", "Content"]).with_rows(vec![
///     vec![json!(1), json!(0), json!("first item")],
///     vec![json!(2), json!(1), json!("second item")],
/// ]);
/// let mut model = TreeModel::new(table, TreeConfig::default())?;
/// let mut rx = model.subscribe();
///
/// let ids = model.insert(NodeHandle::Record(1), 1)?;
/// assert_eq!(model.child_count(NodeHandle::Record(1))?, 2);
/// assert_eq!(ids, vec![3]);
/// assert!(rx.try_recv().is_ok());
/// # Ok(())
/// # }
/// ```
pub struct TreeModel<S: FlatStore> {
    store: S,
    config: TreeConfig,
    layout: ColumnLayout,
    allocator: IdAllocator,
    translator: ChangeTranslator,

    /// Broadcast channel for tree events
    event_tx: broadcast::Sender<TreeEvent>,
}

impl<S: FlatStore> TreeModel<S> {
    /// Wrap `store`, tracking the columns named by `config`
    ///
    /// Notifications the store queued before this call are discarded.
    pub fn new(mut store: S, config: TreeConfig) -> Result<Self> {
        config.validate().map_err(TreeError::invalid_config)?;
        let layout = config.layout().map_err(TreeError::invalid_config)?;

        if layout.last_tracked() >= store.column_count() {
            return Err(TreeError::invalid_config(format!(
                "tracked column {} is outside the store's {} columns",
                layout.last_tracked(),
                store.column_count()
            )));
        }

        let stale = store.take_changes();
        if !stale.is_empty() {
            tracing::debug!("Discarding {} store notification(s) queued before attach", stale.len());
        }

        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);

        Ok(Self {
            store,
            config,
            layout,
            allocator: IdAllocator::new(),
            translator: ChangeTranslator::new(),
            event_tx,
        })
    }

    /// Subscribe to tree events
    ///
    /// Events are sent as edits complete; a receiver that falls more than the
    /// configured channel capacity behind starts lagging.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors: having no subscribers is fine
    fn emit_event(&self, event: TreeEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Drain queued store notifications, broadcast and return the tree events
    ///
    /// Call this after changing the store directly through [`Self::store_mut`].
    pub fn process_store_changes(&mut self) -> Vec<TreeEvent> {
        let changes = self.store.take_changes();
        let mut events = Vec::new();

        for change in &changes {
            match self.translator.translate(
                change,
                &self.store,
                &mut self.layout,
                self.config.insert_sentinel,
            ) {
                Ok(translated) => events.extend(translated),
                Err(e) => tracing::error!("Store notification {:?} violates the layout: {}", change, e),
            }
        }

        for event in &events {
            self.emit_event(event.clone());
        }
        events
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn layout(&self) -> ColumnLayout {
        self.layout
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access; follow up with [`Self::process_store_changes`]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn projector(&self) -> TreeProjector<'_, S> {
        TreeProjector::new(&self.store, self.layout, self.config.insert_sentinel)
    }

    // Navigation

    pub fn child_at(&self, parent: NodeHandle, index: usize) -> Result<NodeHandle> {
        self.projector().child_at(parent, index)
    }

    pub fn child_count(&self, parent: NodeHandle) -> Result<usize> {
        self.projector().child_count(parent)
    }

    pub fn children(&self, parent: NodeHandle) -> Result<Vec<RecordId>> {
        self.projector().children(parent)
    }

    pub fn has_children(&self, parent: NodeHandle) -> Result<bool> {
        self.projector().has_children(parent)
    }

    pub fn parent_of(&self, node: NodeHandle) -> Result<NodeHandle> {
        self.projector().parent_of(node)
    }

    pub fn ordinal_of(&self, node: NodeHandle) -> Result<usize> {
        self.projector().ordinal_of(node)
    }

    pub fn to_flat_row(&self, node: NodeHandle) -> Result<usize> {
        self.projector().to_flat_row(node)
    }

    pub fn from_flat_row(&self, row: usize) -> Result<Option<NodeHandle>> {
        self.projector().from_flat_row(row)
    }

    pub fn column_count(&self) -> usize {
        self.store.column_count()
    }

    /// Store column name
    pub fn header(&self, column: usize) -> Option<String> {
        self.store.column_name(column)
    }

    pub fn data(&self, node: NodeHandle, column: usize) -> Result<FieldValue> {
        self.projector().data(node, column)
    }

    /// Verify the hierarchy invariants over the whole store
    pub fn check_integrity(&self) -> Result<()> {
        if self.layout.last_tracked() >= self.store.column_count() {
            return Err(TreeError::structural_violation(format!(
                "tracked column {} is outside the store's {} columns",
                self.layout.last_tracked(),
                self.store.column_count()
            )));
        }
        self.projector().check_integrity()
    }

    // Structural edits

    /// Run `op` on a mutation engine, then report whatever the store queued
    fn edit<T>(&mut self, op: impl FnOnce(&mut MutationEngine<'_, S>) -> Result<T>) -> Result<T> {
        let result = {
            let mut engine = MutationEngine::new(
                &mut self.store,
                self.layout,
                &mut self.allocator,
                &self.config,
            );
            op(&mut engine)
        };
        self.process_store_changes();
        result
    }

    pub fn insert(&mut self, parent: NodeHandle, count: usize) -> Result<Vec<RecordId>> {
        self.edit(|engine| engine.insert(parent, count))
    }

    pub fn remove(&mut self, node: NodeHandle, count: usize) -> Result<Vec<RecordId>> {
        self.edit(|engine| engine.remove(node, count))
    }

    pub fn move_node(&mut self, node_id: RecordId, new_parent_id: RecordId) -> Result<()> {
        self.edit(|engine| engine.move_node(node_id, new_parent_id))
    }

    pub fn copy_node(
        &mut self,
        node_id: RecordId,
        new_parent_id: RecordId,
    ) -> Result<Option<RecordId>> {
        self.edit(|engine| engine.copy_node(node_id, new_parent_id))
    }

    pub fn set_data(&mut self, node: NodeHandle, column: usize, value: FieldValue) -> Result<()> {
        self.edit(|engine| engine.set_data(node, column, value))
    }

    /// Insert columns; only allowed after both tracked columns
    pub fn insert_columns(&mut self, column: usize, count: usize) -> Result<()> {
        if column <= self.layout.last_tracked() {
            return Err(TreeError::structural_violation(format!(
                "column insert at {} would pre-empt tracked column {}",
                column,
                self.layout.last_tracked()
            )));
        }
        self.edit(|engine| Ok(engine.store_mut().insert_columns(column, count)?))
    }

    /// Remove columns; a range containing a tracked column is refused
    pub fn remove_columns(&mut self, column: usize, count: usize) -> Result<()> {
        if count > 0 && self.layout.covers_tracked(column, column + count - 1) {
            return Err(TreeError::structural_violation(format!(
                "columns {}..{} contain a tracked column",
                column,
                column + count
            )));
        }
        self.edit(|engine| Ok(engine.store_mut().remove_columns(column, count)?))
    }

    /// Commit every pending store change
    pub fn submit_all(&mut self) -> Result<()> {
        self.edit(|engine| Ok(engine.store_mut().submit_all()?))
    }

    /// Track the id field in another column
    pub fn set_id_column(&mut self, column: usize) -> Result<()> {
        self.retarget(column, |layout| layout.set_id_column(column))?;
        self.config.id_column = column;
        Ok(())
    }

    /// Track the parent field in another column
    pub fn set_parent_column(&mut self, column: usize) -> Result<()> {
        self.retarget(column, |layout| layout.set_parent_column(column))?;
        self.config.parent_column = column;
        Ok(())
    }

    fn retarget(
        &mut self,
        column: usize,
        update: impl FnOnce(&mut ColumnLayout) -> Result<()>,
    ) -> Result<()> {
        if column >= self.store.column_count() {
            return Err(TreeError::not_found(format!("column {}", column)));
        }
        update(&mut self.layout)?;
        tracing::debug!(
            "Tracking id column {} and parent column {}",
            self.layout.id_column(),
            self.layout.parent_column()
        );
        for event in self.translator.full_reset() {
            self.emit_event(event);
        }
        Ok(())
    }

    // Drag and drop

    /// Payload formats produced by [`Self::mime_data`]
    pub fn mime_types(&self) -> Vec<&'static str> {
        vec![NODE_ID_LIST_FORMAT]
    }

    pub fn mime_data(&self, selection: &[NodeHandle]) -> Result<Vec<u8>> {
        drag_drop::encode(&self.projector(), selection)
    }

    /// Decode `data` and move or copy its records under `parent`
    pub fn drop_mime_data(
        &mut self,
        data: &[u8],
        parent: NodeHandle,
        action: DropAction,
    ) -> Result<Vec<Option<RecordId>>> {
        let ids = drag_drop::decode(data)?;
        self.edit(|engine| drag_drop::apply(engine, &ids, parent, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryTable;
    use serde_json::json;

    fn sample() -> MemoryTable {
        MemoryTable::new("Table1", ["ID", "Parent", "Content", "Details"]).with_rows(vec![
            vec![json!(1), json!(0), json!("first item"), json!("Details for first item")],
            vec![json!(2), json!(1), json!("second item"), json!("Details for second item")],
            vec![json!(3), json!(1), json!("third item"), json!("Details for third item")],
            vec![json!(4), json!(0), json!("fourth item"), json!("Details for fourth item")],
        ])
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = TreeConfig {
            parent_column: 0,
            ..Default::default()
        };
        assert!(matches!(
            TreeModel::new(sample(), config),
            Err(TreeError::InvalidConfig(_))
        ));

        let config = TreeConfig {
            parent_column: 9,
            ..Default::default()
        };
        assert!(matches!(
            TreeModel::new(sample(), config),
            Err(TreeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_headers_and_data() {
        let model = TreeModel::new(sample(), TreeConfig::default()).unwrap();
        assert_eq!(model.column_count(), 4);
        assert_eq!(model.header(3).as_deref(), Some("Details"));
        assert_eq!(model.header(4), None);
        assert_eq!(
            model.data(NodeHandle::Record(3), 2).unwrap(),
            json!("third item")
        );
        assert_eq!(model.ordinal_of(NodeHandle::Record(3)).unwrap(), 1);
        assert!(model.check_integrity().is_ok());
    }

    #[test]
    fn test_failed_move_emits_nothing() {
        let mut model = TreeModel::new(sample(), TreeConfig::default()).unwrap();
        let mut rx = model.subscribe();

        assert!(model.move_node(1, 3).is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_content_edit_emits_content_changed() {
        let mut model = TreeModel::new(sample(), TreeConfig::default()).unwrap();
        let mut rx = model.subscribe();

        model
            .set_data(NodeHandle::Record(4), 3, json!("new details"))
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            TreeEvent::ContentChanged {
                node: NodeHandle::Record(4),
                first_column: 3,
                last_column: 3
            }
        );
    }

    #[test]
    fn test_column_edits_guard_tracked_columns() {
        let mut model = TreeModel::new(sample(), TreeConfig::default()).unwrap();

        assert!(model.insert_columns(1, 1).is_err());
        assert!(model.remove_columns(0, 2).is_err());
        assert_eq!(model.column_count(), 4);

        model.insert_columns(2, 1).unwrap();
        assert_eq!(model.column_count(), 5);
        model.remove_columns(2, 2).unwrap();
        assert_eq!(model.column_count(), 3);
        assert_eq!(model.layout(), ColumnLayout::default());
    }

    #[test]
    fn test_retarget_tracked_columns() {
        let table = MemoryTable::new("T", ["Parent", "ID", "Content"]).with_rows(vec![
            vec![json!(0), json!(1), json!("a")],
            vec![json!(1), json!(2), json!("b")],
        ]);
        let mut model = TreeModel::new(table, TreeConfig::default()).unwrap();
        let mut rx = model.subscribe();

        // Collides with the current id column
        assert!(model.set_parent_column(0).is_err());

        model.set_id_column(2).unwrap();
        model.set_parent_column(0).unwrap();
        model.set_id_column(1).unwrap();
        assert_eq!(rx.try_recv().unwrap(), TreeEvent::ResetBegin);
        assert_eq!(rx.try_recv().unwrap(), TreeEvent::ResetEnd);

        assert_eq!(model.children(NodeHandle::Record(1)).unwrap(), vec![2]);
        assert_eq!(model.config().id_column, 1);
        assert_eq!(model.config().parent_column, 0);
    }

    #[test]
    fn test_drop_round_trip_through_model() {
        let mut model = TreeModel::new(sample(), TreeConfig::default()).unwrap();
        assert_eq!(model.mime_types(), vec![NODE_ID_LIST_FORMAT]);

        let data = model
            .mime_data(&[NodeHandle::Record(2), NodeHandle::Record(3)])
            .unwrap();
        let results = model
            .drop_mime_data(&data, NodeHandle::Record(4), DropAction::Move)
            .unwrap();

        assert_eq!(results, vec![Some(2), Some(3)]);
        assert_eq!(model.children(NodeHandle::Record(4)).unwrap(), vec![2, 3]);
        assert!(!model.has_children(NodeHandle::Record(1)).unwrap());
    }
}
