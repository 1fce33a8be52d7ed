//! Content-addressed object store for the Device Trail Service.
//!
//! Large binary payloads referenced from device state are held as objects
//! keyed by `(owner, sha-256)`. The same bytes uploaded by two owners are
//! two distinct objects for accounting purposes, but may share the backing
//! bytes through a link. This crate owns the object metadata index, the
//! seams to the byte-transport driver and the quota plan source, and the
//! dedup/link/quota logic on top of them.
//!
//! # Key Pieces
//!
//! - [`ObjectRecord`] — Per-owner object metadata with a derived storage id
//! - [`ObjectIndex`] / [`BlobDriver`] / [`QuotaSource`] — Backend seams
//! - [`ObjectStore`] — Idempotent put, autolink resolution, quota checks

pub mod error;
pub mod memory;
pub mod record;
pub mod store;
pub mod traits;

pub use error::{ObjectError, ObjectResult};
pub use memory::{FixedQuota, InMemoryBlobDriver, InMemoryObjectIndex};
pub use record::ObjectRecord;
pub use store::{ObjectStore, PutOutcome};
pub use traits::{BlobDriver, InsertOutcome, LinkSourceGate, ObjectIndex, QuotaSource};
