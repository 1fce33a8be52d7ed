//! Access gate for the Device Trail Service.
//!
//! Resolves whether a caller may read or write a given trail or step, and
//! computes the effective public-visibility flag. Visibility derives from
//! the owning device's public flag, which lives in the externally managed
//! device directory; this crate owns the seam to it.
//!
//! Reads are wide (owner, device, or anyone when public); writes are
//! narrow per operation: only the device creates its trail and posts
//! progress, only the owner appends, rewrites, and cancels.

pub mod directory;
pub mod error;
pub mod gate;
pub mod link;

pub use directory::{DeviceEntry, DeviceDirectory, InMemoryDeviceDirectory};
pub use error::{GateError, GateResult};
pub use gate::AccessGate;
pub use link::PublicSourceGate;
