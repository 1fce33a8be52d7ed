//! Foundation types for the Device Trail Service.
//!
//! This crate provides the identity and value types used throughout the
//! service. Every other trail crate depends on `trail-types`.
//!
//! # Key Types
//!
//! - [`Prn`] — Resource name identifying an account or principal
//! - [`DeviceId`] / [`TrailId`] — Device identity and the trail id derived from it
//! - [`StepId`] — `"{trail}-{rev}"` composite identifier of one revision
//! - [`Sha256Id`] — Content hash (SHA-256) used for state hashes and objects
//! - [`Caller`] — Typed authenticated-caller descriptor (user, session, device)

pub mod caller;
pub mod device;
pub mod error;
pub mod prn;
pub mod sha;
pub mod step;

pub use caller::{Caller, CallerKind};
pub use device::{DeviceId, TrailId};
pub use error::TypeError;
pub use prn::Prn;
pub use sha::Sha256Id;
pub use step::{Rev, RevSelector, RevSpec, StepId};
