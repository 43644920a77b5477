// ============================================================================
// Transaction State Management
// ============================================================================
//
// Each optimistic transaction moves through:
//
//   Pending ──confirm──> Confirmed   (folded into authoritative state)
//     │
//     └──revert──> Reverted          (layer discarded)
//
// ============================================================================

use super::{Patch, Sequence};
use crate::core::{Result, SyncError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one optimistic transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generate a fresh random transaction id
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TransactionId {
    fn from(id: Uuid) -> Self {
        TransactionId(id)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(TransactionId)
            .map_err(|err| SyncError::InvalidInput(format!("invalid transaction id '{}': {}", s, err)))
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    /// Applied optimistically, still revertible
    Pending,

    /// Made permanent; waiting for earlier layers before it is folded
    Confirmed,

    /// Discarded
    Reverted,
}

impl TransactionState {
    pub fn is_pending(&self) -> bool {
        matches!(self, TransactionState::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Confirmed | TransactionState::Reverted)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Pending => write!(f, "PENDING"),
            TransactionState::Confirmed => write!(f, "CONFIRMED"),
            TransactionState::Reverted => write!(f, "REVERTED"),
        }
    }
}

/// One optimistic layer: the patch a transaction applied and where it stands
#[derive(Debug, Clone)]
pub struct OptimisticTransaction {
    id: TransactionId,
    state: TransactionState,
    patch: Patch,
    /// Clock tick the layer was applied at
    sequence: Sequence,
    /// Start time for diagnostics
    start_time: std::time::Instant,
}

impl OptimisticTransaction {
    pub fn new(id: TransactionId, sequence: Sequence, patch: Patch) -> Self {
        Self {
            id,
            state: TransactionState::Pending,
            patch,
            sequence,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn into_patch(self) -> Patch {
        self.patch
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// # Errors
    /// Returns error if the transaction is no longer pending
    pub fn confirm(&mut self) -> Result<()> {
        if !self.state.is_pending() {
            return Err(SyncError::InvalidInput(format!(
                "Cannot confirm: transaction {} is already {}",
                self.id, self.state
            )));
        }
        self.state = TransactionState::Confirmed;
        Ok(())
    }

    /// # Errors
    /// Returns error if the transaction is no longer pending
    pub fn revert(&mut self) -> Result<()> {
        if !self.state.is_pending() {
            return Err(SyncError::InvalidInput(format!(
                "Cannot revert: transaction {} is already {}",
                self.id, self.state
            )));
        }
        self.state = TransactionState::Reverted;
        Ok(())
    }
}
