use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::device::TrailId;
use crate::error::TypeError;

/// Zero-based sequential revision number within a trail.
pub type Rev = u64;

/// Revision choice when appending a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevSpec {
    /// Resolve to the current maximum revision plus one.
    Auto,
    /// Append at an explicit revision.
    At(Rev),
}

impl RevSpec {
    /// Parse the wire form: `-1` or `auto` selects automatic allocation.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "auto" | "-1" => Ok(Self::Auto),
            other => other
                .parse::<Rev>()
                .map(Self::At)
                .map_err(|_| TypeError::InvalidRevSelector(other.to_string())),
        }
    }
}

/// Revision choice when reading a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevSelector {
    /// The highest existing revision.
    Latest,
    /// An explicit revision.
    At(Rev),
}

impl FromStr for RevSelector {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            other => other
                .parse::<Rev>()
                .map(Self::At)
                .map_err(|_| TypeError::InvalidRevSelector(other.to_string())),
        }
    }
}

/// Composite identifier of one step: `"{trailId}-{rev}"`.
///
/// The id is immutable once the step is created. Because a trail id may
/// itself contain `-`, parsing splits on the last dash and requires a
/// numeric tail.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId {
    trail: TrailId,
    rev: Rev,
}

impl StepId {
    pub fn new(trail: TrailId, rev: Rev) -> Self {
        Self { trail, rev }
    }

    /// Parse from the `"{trailId}-{rev}"` textual form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (trail, rev) = s
            .rsplit_once('-')
            .ok_or_else(|| TypeError::InvalidStepId(format!("missing -rev suffix in {s:?}")))?;
        let rev = rev
            .parse::<Rev>()
            .map_err(|_| TypeError::InvalidStepId(format!("non-numeric rev in {s:?}")))?;
        let trail = TrailId::parse(trail).map_err(|_| {
            TypeError::InvalidStepId(format!("invalid trail id prefix in {s:?}"))
        })?;
        Ok(Self { trail, rev })
    }

    pub fn trail(&self) -> &TrailId {
        &self.trail
    }

    pub fn rev(&self) -> Rev {
        self.rev
    }

    /// The id of the predecessor step, or `None` at rev 0.
    pub fn predecessor(&self) -> Option<StepId> {
        self.rev
            .checked_sub(1)
            .map(|rev| Self::new(self.trail.clone(), rev))
    }
}

impl fmt::Debug for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepId({self})")
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.trail, self.rev)
    }
}

impl Serialize for StepId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StepId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}
