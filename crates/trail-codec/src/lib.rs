//! State codec for the Device Trail Service.
//!
//! A device's configuration state is an arbitrary JSON tree. This crate
//! turns such trees into byte-stable canonical encodings with a SHA-256
//! content hash, escapes map keys that the backing document store cannot
//! represent, and extracts the content-addressed object references a state
//! tree carries.
//!
//! # Key Operations
//!
//! - [`canonical_bytes`] / [`state_sha`] — Deterministic encoding and hash
//! - [`escape_keys`] / [`unescape_keys`] — Reversible key transform
//! - [`extract_object_refs`] — Object references in a state tree

pub mod canonical;
pub mod error;
pub mod escape;
pub mod refs;

pub use canonical::{canonical_bytes, state_sha};
pub use error::CodecError;
pub use escape::{escape_keys, unescape_keys};
pub use refs::{extract_object_refs, ObjectRef};
