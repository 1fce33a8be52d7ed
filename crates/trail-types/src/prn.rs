use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Resource name identifying an account or principal.
///
/// The textual form is `prn:<authority>:<collection>:/<id>`, e.g.
/// `prn::accounts:/54321` or `prn::devices:/abcdef012345`. A `Prn` is
/// validated once at construction and passed by value afterwards.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prn(String);

impl Prn {
    /// Parse and validate a resource name.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let rest = s
            .strip_prefix("prn:")
            .ok_or_else(|| TypeError::InvalidPrn(format!("missing prn: prefix in {s:?}")))?;
        let mut parts = rest.splitn(2, ":/");
        let head = parts.next().unwrap_or_default();
        let id = parts
            .next()
            .ok_or_else(|| TypeError::InvalidPrn(format!("missing :/ separator in {s:?}")))?;
        if id.is_empty() {
            return Err(TypeError::InvalidPrn(format!("empty id in {s:?}")));
        }
        if head.split(':').count() > 2 {
            return Err(TypeError::InvalidPrn(format!("too many segments in {s:?}")));
        }
        Ok(Self(s.to_string()))
    }

    /// Build the canonical account PRN for an account id.
    pub fn account(id: &str) -> Self {
        Self(format!("prn::accounts:/{id}"))
    }

    /// Build the canonical device PRN for a device id.
    pub fn device(id: &str) -> Self {
        Self(format!("prn::devices:/{id}"))
    }

    /// The full textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing id segment (after `:/`).
    pub fn id(&self) -> &str {
        self.0.rsplit(":/").next().unwrap_or_default()
    }
}

impl fmt::Debug for Prn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prn({})", self.0)
    }
}

impl fmt::Display for Prn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Prn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Prn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}
