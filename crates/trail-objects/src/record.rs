use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trail_types::{Prn, Sha256Id};

/// Per-owner metadata of one content-addressed object.
///
/// Identity is the pair `(owner, sha)`. The storage id locating the backing
/// bytes is a deterministic function of that pair, so a record can always
/// be re-derived from its identity. A record is created once and is
/// otherwise immutable apart from the soft `garbage` mark.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub owner: Prn,
    pub sha: Sha256Id,
    /// Deterministic location key: `sha256("{owner}:{sha}")`.
    pub storage_id: Sha256Id,
    pub size: u64,
    /// Contextual name from the referencing state entry; not part of identity.
    pub object_name: String,
    /// Storage id of another owner's object sharing the same content, when
    /// this record was created by autolink instead of an upload.
    pub linked_object: Option<Sha256Id>,
    pub time_created: DateTime<Utc>,
    #[serde(default)]
    pub garbage: bool,
}

impl ObjectRecord {
    /// Derive the storage id for an `(owner, sha)` pair.
    pub fn derive_storage_id(owner: &Prn, sha: &Sha256Id) -> Sha256Id {
        Sha256Id::digest(format!("{owner}:{sha}").as_bytes())
    }

    /// Create a record for an owner's own upload.
    pub fn new(owner: Prn, sha: Sha256Id, size: u64, object_name: &str, now: DateTime<Utc>) -> Self {
        let storage_id = Self::derive_storage_id(&owner, &sha);
        Self {
            owner,
            sha,
            storage_id,
            size,
            object_name: object_name.to_string(),
            linked_object: None,
            time_created: now,
            garbage: false,
        }
    }

    /// Create a lightweight record whose bytes live under another owner's
    /// storage id.
    pub fn linked(
        owner: Prn,
        source: &ObjectRecord,
        object_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let storage_id = Self::derive_storage_id(&owner, &source.sha);
        Self {
            owner,
            sha: source.sha,
            storage_id,
            size: source.size,
            object_name: object_name.to_string(),
            linked_object: Some(source.backing_storage_id()),
            time_created: now,
            garbage: false,
        }
    }

    /// Where the payload bytes actually live: the link target for linked
    /// records, this record's own storage id otherwise.
    pub fn backing_storage_id(&self) -> Sha256Id {
        self.linked_object.unwrap_or(self.storage_id)
    }

    pub fn is_linked(&self) -> bool {
        self.linked_object.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner_a() -> Prn {
        Prn::account("a")
    }

    fn owner_b() -> Prn {
        Prn::account("b")
    }

    #[test]
    fn storage_id_is_deterministic_per_owner() {
        let sha = Sha256Id::digest(b"payload");
        let id1 = ObjectRecord::derive_storage_id(&owner_a(), &sha);
        let id2 = ObjectRecord::derive_storage_id(&owner_a(), &sha);
        assert_eq!(id1, id2);
        // Same bytes, different owner: distinct object.
        assert_ne!(id1, ObjectRecord::derive_storage_id(&owner_b(), &sha));
    }

    #[test]
    fn own_record_backs_itself() {
        let sha = Sha256Id::digest(b"payload");
        let rec = ObjectRecord::new(owner_a(), sha, 7, "kernel.img", Utc::now());
        assert!(!rec.is_linked());
        assert_eq!(rec.backing_storage_id(), rec.storage_id);
    }

    #[test]
    fn linked_record_points_at_source_bytes() {
        let sha = Sha256Id::digest(b"payload");
        let source = ObjectRecord::new(owner_a(), sha, 7, "kernel.img", Utc::now());
        let link = ObjectRecord::linked(owner_b(), &source, "kernel.img", Utc::now());
        assert!(link.is_linked());
        assert_eq!(link.sha, source.sha);
        assert_eq!(link.size, source.size);
        assert_eq!(link.backing_storage_id(), source.storage_id);
        assert_ne!(link.storage_id, source.storage_id);
    }

    #[test]
    fn link_through_a_link_flattens_to_the_origin() {
        let sha = Sha256Id::digest(b"payload");
        let origin = ObjectRecord::new(owner_a(), sha, 7, "k", Utc::now());
        let first = ObjectRecord::linked(owner_b(), &origin, "k", Utc::now());
        let second = ObjectRecord::linked(Prn::account("c"), &first, "k", Utc::now());
        assert_eq!(second.backing_storage_id(), origin.storage_id);
    }
}
