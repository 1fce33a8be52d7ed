//! Step chain engine for the Device Trail Service.
//!
//! Every device has one [`Trail`]: an append-only, revision-numbered log of
//! configuration state. Each revision is a [`Step`]; rev 0 is the factory
//! baseline created together with the trail, and every later revision
//! requires its predecessor to exist. The chain never has gaps by
//! construction, not by repair.
//!
//! # Invariants
//!
//! - Rev 0 always exists for a live trail and is immediately `Done`.
//! - A step at rev N > 0 is only created if the non-garbage step at
//!   rev N−1 exists for the same trail.
//! - Steps are immutable once created, except for: the progress sub-object
//!   (by the device), state/meta while still `New` (by the owner), and the
//!   cached public-visibility flag.
//! - All cross-request coordination is delegated to the storage backend's
//!   atomic insert-unique and filtered conditional updates.

pub mod chain;
pub mod error;
pub mod memory;
pub mod step;
pub mod traits;
pub mod trail;

pub use chain::StepChain;
pub use error::{ChainError, ChainResult, StoreError, StoreResult};
pub use memory::{InMemoryStepStore, InMemoryTrailStore};
pub use step::{Step, StepProgress, StepStatus};
pub use traits::{StepStore, TrailStore};
pub use trail::Trail;
