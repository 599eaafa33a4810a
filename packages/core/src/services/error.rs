//! Tree Layer Error Types
//!
//! Every failure the projector, mutation engine, change translator or
//! drag/drop codec can report. Structural and cycle violations are detected
//! before any write where feasible; store refusals surface from the point
//! where they were detected, without rollback of earlier writes.

use crate::db::StoreError;
use crate::models::RecordId;
use thiserror::Error;

/// Errors produced by tree projection and tree mutation
#[derive(Error, Debug)]
pub enum TreeError {
    /// Hierarchy invariant broken: zero or duplicate id, non-integer key
    /// content, parent referencing a missing record, duplicate sibling ids
    #[error("Structural violation: {reason}")]
    StructuralViolation { reason: String },

    /// Move/copy target is the node itself or one of its descendants
    #[error("Cycle violation: node {node_id} cannot be placed under {target_parent_id}")]
    CycleViolation {
        node_id: RecordId,
        target_parent_id: RecordId,
    },

    /// The flat store refused a write, insert, removal or commit
    #[error("Flat store rejected operation: {0}")]
    FlatStoreRejected(#[from] StoreError),

    /// A lookup expected to return exactly one record returned none
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Drag/drop payload is not in the node id list format
    #[error("Invalid drag payload: {reason}")]
    InvalidPayload { reason: String },

    /// No positive id left to hand out
    #[error("Record id space exhausted")]
    IdSpaceExhausted,

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TreeError {
    /// Create a structural violation error
    pub fn structural_violation(reason: impl Into<String>) -> Self {
        Self::StructuralViolation {
            reason: reason.into(),
        }
    }

    /// Create a cycle violation error
    pub fn cycle_violation(node_id: RecordId, target_parent_id: RecordId) -> Self {
        Self::CycleViolation {
            node_id,
            target_parent_id,
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create an invalid payload error
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TreeError>;
