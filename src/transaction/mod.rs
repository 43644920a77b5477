// ============================================================================
// Optimistic Transaction Module
// ============================================================================
//
// Speculative mutations are recorded as value patches (Command Pattern) and
// kept as revertible layers until the real on-chain transaction is confirmed
// or abandoned.
//
// ============================================================================

pub mod change;
pub mod clock;
pub mod draft;
pub mod manager;
pub mod state;

pub use change::{ModelDelta, Patch};
pub use clock::{FieldClock, Sequence};
pub use draft::Draft;
pub use manager::{OptimisticLayers, Resolution, SequencedDelta};
pub use state::{OptimisticTransaction, TransactionId, TransactionState};
