use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::prn::Prn;

/// The kind of authenticated principal behind a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallerKind {
    User,
    Session,
    Device,
}

/// Typed authenticated-caller descriptor.
///
/// Produced once at the service boundary from validated credentials and
/// consumed everywhere else as a value. `identity` names the principal
/// itself; `account` names the owning account (for a device caller this is
/// the account the device is claimed by, for users and sessions it equals
/// the identity's account).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub identity: Prn,
    pub kind: CallerKind,
    pub account: Prn,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Caller {
    pub fn user(account: Prn) -> Self {
        Self {
            identity: account.clone(),
            kind: CallerKind::User,
            account,
            scopes: Vec::new(),
        }
    }

    pub fn session(identity: Prn, account: Prn) -> Self {
        Self {
            identity,
            kind: CallerKind::Session,
            account,
            scopes: Vec::new(),
        }
    }

    pub fn device(device: &DeviceId, account: Prn) -> Self {
        Self {
            identity: device.prn(),
            kind: CallerKind::Device,
            account,
            scopes: Vec::new(),
        }
    }

    /// Returns `true` for user and session callers (the account side).
    pub fn is_account_side(&self) -> bool {
        matches!(self.kind, CallerKind::User | CallerKind::Session)
    }

    pub fn is_device(&self) -> bool {
        self.kind == CallerKind::Device
    }

    /// The device identity for device callers, `None` otherwise.
    pub fn device_id(&self) -> Option<DeviceId> {
        if !self.is_device() {
            return None;
        }
        DeviceId::parse(self.identity.id()).ok()
    }

    /// Returns `true` if this caller acts for the given owning account.
    pub fn acts_for(&self, owner: &Prn) -> bool {
        self.is_account_side() && &self.account == owner
    }
}
