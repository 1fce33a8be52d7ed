use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::prn::Prn;

/// Opaque device identity assigned at enrollment.
///
/// The id is restricted to 1..=64 characters of `[a-z0-9_-]` so that it can
/// be embedded verbatim in step ids and URL paths.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Parse and validate a device id.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() || s.len() > 64 {
            return Err(TypeError::InvalidDeviceId(format!(
                "id length must be 1..=64, got {}",
                s.len()
            )));
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
        {
            return Err(TypeError::InvalidDeviceId(format!(
                "id may only contain [a-z0-9_-]: {s:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The device PRN for caller-identity comparisons.
    pub fn prn(&self) -> Prn {
        Prn::device(&self.0)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

/// Per-device trail identifier.
///
/// A trail's id is permanently derived from the device identity: the two
/// share the same textual form, and a device has exactly one trail.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrailId(String);

impl TrailId {
    /// Parse a trail id (same syntax as a device id).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let device = DeviceId::parse(s)?;
        Ok(Self::from_device(&device))
    }

    /// Derive the trail id from the owning device identity.
    pub fn from_device(device: &DeviceId) -> Self {
        Self(device.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TrailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrailId({})", self.0)
    }
}

impl fmt::Display for TrailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TrailId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TrailId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}
