use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use trail_types::{DeviceId, Prn, Sha256Id, TrailId};

/// Per-device append-only configuration history root.
///
/// Created when a device first reports state; the id is permanently
/// derived from the device identity. A trail is never mutated except by
/// appending steps, refreshing the touch timestamps, and the soft garbage
/// mark. It holds only summary fields — steps are stored in their own
/// collection keyed by trail id and rev, never as an in-memory list here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    pub id: TrailId,
    pub owner: Prn,
    pub device: DeviceId,
    /// The state reported at enrollment, as written into the rev-0 step.
    pub factory_state: Value,
    /// Content hashes of the objects `factory_state` references.
    pub used_objects: Vec<Sha256Id>,
    /// Last time the device confirmed a step as `Done`.
    pub last_in_sync: Option<DateTime<Utc>>,
    /// Last time anything on this trail changed.
    pub last_touched: DateTime<Utc>,
    #[serde(default)]
    pub garbage: bool,
}

impl Trail {
    pub fn new(
        device: DeviceId,
        owner: Prn,
        factory_state: Value,
        used_objects: Vec<Sha256Id>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TrailId::from_device(&device),
            owner,
            device,
            factory_state,
            used_objects,
            last_in_sync: Some(now),
            last_touched: now,
            garbage: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_is_derived_from_device() {
        let device = DeviceId::parse("dev1").unwrap();
        let trail = Trail::new(
            device.clone(),
            Prn::account("u"),
            json!({}),
            Vec::new(),
            Utc::now(),
        );
        assert_eq!(trail.id.as_str(), device.as_str());
    }

    #[test]
    fn fresh_trail_is_in_sync() {
        let trail = Trail::new(
            DeviceId::parse("dev1").unwrap(),
            Prn::account("u"),
            json!({"a": 1}),
            Vec::new(),
            Utc::now(),
        );
        assert!(trail.last_in_sync.is_some());
        assert!(!trail.garbage);
    }
}
