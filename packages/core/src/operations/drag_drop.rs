//! Drag/Drop Codec
//!
//! Selections travel as a JSON document tagged with a private format marker:
//!
//! ```json
//! { "format": "application/x-treeproxy-id-list", "ids": [2, 3] }
//! ```
//!
//! Only one level of the tree can be dragged at a time. `encode` keeps the
//! nodes that share the first node's parent and silently drops the rest.

use crate::db::FlatStore;
use crate::models::{NodeHandle, RecordId};
use crate::services::error::{Result, TreeError};
use crate::services::mutation_engine::MutationEngine;
use crate::services::tree_projector::TreeProjector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Format tag carried by every payload
pub const NODE_ID_LIST_FORMAT: &str = "application/x-treeproxy-id-list";

/// Serialized drag selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragPayload {
    pub format: String,
    pub ids: Vec<RecordId>,
}

/// What a drop does with the dragged records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropAction {
    Move,
    Copy,
}

/// Serialize the single-parent part of `selection`
pub fn encode<S: FlatStore + ?Sized>(
    tree: &TreeProjector<'_, S>,
    selection: &[NodeHandle],
) -> Result<Vec<u8>> {
    let mut ids = BTreeSet::new();

    if let Some(first) = selection.first() {
        let reference = tree.parent_of(*first)?;
        for node in selection {
            let NodeHandle::Record(id) = *node else {
                continue;
            };
            match tree.parent_of(*node) {
                Ok(parent) if parent == reference => {
                    ids.insert(id);
                }
                Ok(_) => tracing::debug!("Dropping {} from drag: different parent", node),
                Err(e) => tracing::debug!("Dropping {} from drag: {}", node, e),
            }
        }
    }

    let payload = DragPayload {
        format: NODE_ID_LIST_FORMAT.to_string(),
        ids: ids.into_iter().collect(),
    };
    serde_json::to_vec(&payload)
        .map_err(|e| TreeError::invalid_payload(format!("serialization failed: {}", e)))
}

/// Parse a payload into ascending, de-duplicated ids
pub fn decode(data: &[u8]) -> Result<Vec<RecordId>> {
    let payload: DragPayload = serde_json::from_slice(data)
        .map_err(|e| TreeError::invalid_payload(format!("malformed payload: {}", e)))?;

    if payload.format != NODE_ID_LIST_FORMAT {
        return Err(TreeError::invalid_payload(format!(
            "unexpected format tag {:?}",
            payload.format
        )));
    }

    let ids: BTreeSet<RecordId> = payload.ids.into_iter().collect();
    Ok(ids.into_iter().collect())
}

/// Move or copy `ids` under `target_parent`
///
/// Every cycle check runs before the first write, so a single bad id leaves
/// the store untouched. Ids whose records are pending deletion yield `None`;
/// moved ids yield themselves and copied ids yield their clone.
pub fn apply<S: FlatStore + ?Sized>(
    engine: &mut MutationEngine<'_, S>,
    ids: &[RecordId],
    target_parent: NodeHandle,
    action: DropAction,
) -> Result<Vec<Option<RecordId>>> {
    let target = target_parent.id();

    let live = {
        let tree = engine.projector();
        if let NodeHandle::Record(id) = target_parent {
            if tree.is_pending_delete(id)? {
                return Err(TreeError::structural_violation(format!(
                    "drop target {} is pending deletion",
                    target_parent
                )));
            }
        }

        let mut sorted: Vec<RecordId> = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut live = Vec::with_capacity(sorted.len());
        for id in sorted {
            let pending = tree.is_pending_delete(id)?;
            if !pending {
                engine.cycle_check(target, id)?;
            }
            live.push((id, !pending));
        }
        live
    };

    let mut results = Vec::with_capacity(live.len());
    for (id, is_live) in live {
        if !is_live {
            results.push(None);
            continue;
        }
        let result = match action {
            DropAction::Move => {
                engine.move_node(id, target)?;
                Some(id)
            }
            DropAction::Copy => engine.copy_node(id, target)?,
        };
        results.push(result);
    }

    tracing::debug!(
        "Dropped {} record(s) onto {} ({:?})",
        results.len(),
        target_parent,
        action
    );
    Ok(results)
}
