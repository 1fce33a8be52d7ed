//! Seam to the externally managed device directory.
//!
//! Enrollment, credentials, and the public flag are owned by the identity
//! subsystem; the gate only reads them.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use trail_types::{DeviceId, Prn};

use crate::error::{GateError, GateResult};

/// Directory view of one enrolled device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: DeviceId,
    pub owner: Prn,
    /// Human-friendly name, unique per owner; used in export paths.
    pub nick: String,
    /// Whether the owner flagged the device public.
    pub public: bool,
}

/// Read access to the device directory.
pub trait DeviceDirectory: Send + Sync {
    /// Whether the device is currently flagged public. Unknown devices are
    /// not public.
    fn is_public(&self, device: &DeviceId) -> GateResult<bool>;

    /// Resolve an owner's device nick to the device identity.
    fn resolve_nick(&self, owner: &Prn, nick: &str) -> GateResult<Option<DeviceId>>;
}

/// In-memory device directory for tests and embedding.
pub struct InMemoryDeviceDirectory {
    devices: RwLock<HashMap<DeviceId, DeviceEntry>>,
}

impl InMemoryDeviceDirectory {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace a directory entry.
    pub fn upsert(&self, entry: DeviceEntry) {
        let mut map = self.devices.write().expect("lock poisoned");
        map.insert(entry.id.clone(), entry);
    }

    /// Flip a device's public flag. Returns `false` for unknown devices.
    pub fn set_public(&self, device: &DeviceId, public: bool) -> bool {
        let mut map = self.devices.write().expect("lock poisoned");
        match map.get_mut(device) {
            Some(entry) => {
                entry.public = public;
                true
            }
            None => false,
        }
    }
}

impl Default for InMemoryDeviceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDirectory for InMemoryDeviceDirectory {
    fn is_public(&self, device: &DeviceId) -> GateResult<bool> {
        let map = self
            .devices
            .read()
            .map_err(|e| GateError::Directory(format!("lock poisoned: {e}")))?;
        Ok(map.get(device).map(|entry| entry.public).unwrap_or(false))
    }

    fn resolve_nick(&self, owner: &Prn, nick: &str) -> GateResult<Option<DeviceId>> {
        let map = self
            .devices
            .read()
            .map_err(|e| GateError::Directory(format!("lock poisoned: {e}")))?;
        Ok(map
            .values()
            .find(|entry| &entry.owner == owner && entry.nick == nick)
            .map(|entry| entry.id.clone()))
    }
}
