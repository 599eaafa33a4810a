//! Record Id Allocation
//!
//! Issues ids for inserted and copied records. Candidates are searched
//! upward from the last issued value, so ids are monotonic within a session
//! and never handed out twice, even if the record holding one is deleted.

use crate::models::RecordId;
use crate::services::error::{Result, TreeError};

#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    last_issued: RecordId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume after a previously issued id
    pub fn starting_after(last_issued: RecordId) -> Self {
        Self {
            last_issued: last_issued.max(0),
        }
    }

    pub fn last_issued(&self) -> RecordId {
        self.last_issued
    }

    /// Smallest positive id above the last issued one that `in_use` rejects
    pub fn allocate<F>(&mut self, mut in_use: F) -> Result<RecordId>
    where
        F: FnMut(RecordId) -> Result<bool>,
    {
        let mut candidate = self
            .last_issued
            .checked_add(1)
            .ok_or(TreeError::IdSpaceExhausted)?;

        while in_use(candidate)? {
            candidate = candidate
                .checked_add(1)
                .ok_or(TreeError::IdSpaceExhausted)?;
        }

        self.last_issued = candidate;
        tracing::debug!("Allocated record id {}", candidate);
        Ok(candidate)
    }
}
