//! Drag/Drop Tests
//!
//! Encoding selections, decoding payloads and applying drops as batches of
//! moves or copies.

#[cfg(test)]
mod drag_drop_tests {
    use anyhow::Result;
    use serde_json::json;
    use treeproxy_core::db::{EditStrategy, MemoryTable};
    use treeproxy_core::operations::{decode, DragPayload, NODE_ID_LIST_FORMAT};
    use treeproxy_core::{DropAction, NodeHandle, TreeConfig, TreeError, TreeModel};

    /// Helper to create a table with two levels under node 1 and a sibling 4
    fn sample_table() -> MemoryTable {
        MemoryTable::new("Table1", ["ID", "Parent", "Content"]).with_rows(vec![
            vec![json!(1), json!(0), json!("first item")],
            vec![json!(2), json!(1), json!("second item")],
            vec![json!(3), json!(1), json!("third item")],
            vec![json!(4), json!(0), json!("fourth item")],
            vec![json!(5), json!(1), json!("fifth item")],
            vec![json!(6), json!(2), json!("sixth item")],
        ])
    }

    fn sample_model() -> Result<TreeModel<MemoryTable>> {
        Ok(TreeModel::new(sample_table(), TreeConfig::default())?)
    }

    #[test]
    fn test_decode_of_encode_keeps_first_parent_group() -> Result<()> {
        let model = sample_model()?;

        let selection = [
            NodeHandle::Record(5),
            NodeHandle::Record(6),
            NodeHandle::Record(2),
            NodeHandle::Record(4),
            NodeHandle::Record(5),
        ];
        let data = model.mime_data(&selection)?;

        assert_eq!(decode(&data)?, vec![2, 5]);
        Ok(())
    }

    #[test]
    fn test_payload_is_tagged_json() -> Result<()> {
        let model = sample_model()?;
        let data = model.mime_data(&[NodeHandle::Record(4), NodeHandle::Record(1)])?;

        let payload: DragPayload = serde_json::from_slice(&data)?;
        assert_eq!(payload.format, NODE_ID_LIST_FORMAT);
        assert_eq!(payload.ids, vec![1, 4]);
        assert_eq!(model.mime_types(), vec![NODE_ID_LIST_FORMAT]);

        Ok(())
    }

    #[test]
    fn test_drop_rejects_foreign_payload() -> Result<()> {
        let mut model = sample_model()?;
        let data = serde_json::to_vec(&json!({"format": "text/uri-list", "ids": [2]}))?;

        assert!(matches!(
            model.drop_mime_data(&data, NodeHandle::Record(4), DropAction::Move),
            Err(TreeError::InvalidPayload { .. })
        ));
        assert_eq!(model.children(NodeHandle::Record(4))?, Vec::<i64>::new());

        Ok(())
    }

    #[test]
    fn test_drop_move_batch() -> Result<()> {
        let mut model = sample_model()?;
        let data = model.mime_data(&[NodeHandle::Record(3), NodeHandle::Record(2)])?;

        let results = model.drop_mime_data(&data, NodeHandle::Record(4), DropAction::Move)?;
        assert_eq!(results, vec![Some(2), Some(3)]);
        assert_eq!(model.children(NodeHandle::Record(4))?, vec![2, 3]);
        assert_eq!(model.children(NodeHandle::Record(1))?, vec![5]);
        // 6 travels with its parent
        assert_eq!(model.parent_of(NodeHandle::Record(6))?, NodeHandle::Record(2));

        Ok(())
    }

    #[test]
    fn test_drop_copy_batch() -> Result<()> {
        let mut model = sample_model()?;
        let data = model.mime_data(&[NodeHandle::Record(2), NodeHandle::Record(5)])?;

        let results = model.drop_mime_data(&data, NodeHandle::Root, DropAction::Copy)?;
        let clones: Vec<i64> = results.into_iter().flatten().collect();
        assert_eq!(clones.len(), 2);

        let root_children = model.children(NodeHandle::Root)?;
        assert!(clones.iter().all(|id| root_children.contains(id)));
        // Copy of 2 brings a copy of 6 along
        assert_eq!(model.child_count(NodeHandle::Record(clones[0]))?, 1);
        model.check_integrity()?;

        Ok(())
    }

    #[test]
    fn test_drop_with_cycle_applies_nothing() -> Result<()> {
        let mut model = sample_model()?;
        let data = model.mime_data(&[NodeHandle::Record(1), NodeHandle::Record(4)])?;

        // 4 alone could move under 2, but 1 cannot
        assert!(matches!(
            model.drop_mime_data(&data, NodeHandle::Record(2), DropAction::Move),
            Err(TreeError::CycleViolation { .. })
        ));
        assert_eq!(model.children(NodeHandle::Root)?, vec![1, 4]);
        assert_eq!(model.children(NodeHandle::Record(2))?, vec![6]);

        Ok(())
    }

    #[test]
    fn test_drop_skips_pending_delete_records() -> Result<()> {
        let table = sample_table().with_edit_strategy(EditStrategy::OnManualSubmit);
        let mut model = TreeModel::new(table, TreeConfig::default())?;
        let data = model.mime_data(&[NodeHandle::Record(3), NodeHandle::Record(5)])?;

        model.remove(NodeHandle::Record(3), 1)?;
        let results = model.drop_mime_data(&data, NodeHandle::Record(4), DropAction::Move)?;

        assert_eq!(results, vec![None, Some(5)]);
        assert_eq!(model.children(NodeHandle::Record(4))?, vec![5]);

        Ok(())
    }

    #[test]
    fn test_drop_onto_pending_delete_target_rejected() -> Result<()> {
        let table = sample_table().with_edit_strategy(EditStrategy::OnManualSubmit);
        let mut model = TreeModel::new(table, TreeConfig::default())?;
        let data = model.mime_data(&[NodeHandle::Record(3)])?;

        model.remove(NodeHandle::Record(4), 1)?;
        assert!(matches!(
            model.drop_mime_data(&data, NodeHandle::Record(4), DropAction::Move),
            Err(TreeError::StructuralViolation { .. })
        ));
        assert_eq!(model.parent_of(NodeHandle::Record(3))?, NodeHandle::Record(1));

        Ok(())
    }
}
