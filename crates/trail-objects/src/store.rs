//! The object store service: dedup, linking, and quota enforcement on top
//! of the backend seams.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use trail_types::{Prn, Sha256Id};

use crate::error::{ObjectError, ObjectResult};
use crate::record::ObjectRecord;
use crate::traits::{BlobDriver, InsertOutcome, LinkSourceGate, ObjectIndex, QuotaSource};

/// Result of an object put.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// A record was written (or an earlier record without backing bytes was
    /// found, meaning the upload may proceed).
    Created(ObjectRecord),
    /// A record with backing bytes already exists. Not an error: retried
    /// uploads from unreliable device links are expected, and the caller
    /// gets the pre-existing metadata back.
    Conflict(ObjectRecord),
}

impl PutOutcome {
    pub fn record(&self) -> &ObjectRecord {
        match self {
            Self::Created(r) | Self::Conflict(r) => r,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Content-addressable object store keyed by `(owner, sha-256)`.
///
/// Explicitly constructed with its backends; there is no process-wide
/// store instance.
pub struct ObjectStore {
    index: Arc<dyn ObjectIndex>,
    blobs: Arc<dyn BlobDriver>,
    quotas: Arc<dyn QuotaSource>,
}

impl ObjectStore {
    pub fn new(
        index: Arc<dyn ObjectIndex>,
        blobs: Arc<dyn BlobDriver>,
        quotas: Arc<dyn QuotaSource>,
    ) -> Self {
        Self {
            index,
            blobs,
            quotas,
        }
    }

    pub fn index(&self) -> &Arc<dyn ObjectIndex> {
        &self.index
    }

    pub fn blobs(&self) -> &Arc<dyn BlobDriver> {
        &self.blobs
    }

    /// Register an object for `owner`, idempotently.
    ///
    /// The quota check runs before the insert; the insert itself is the
    /// atomic step. When the record exists and its backing bytes are
    /// present this returns [`PutOutcome::Conflict`] with the stored
    /// metadata. When the record exists but the earlier upload never
    /// completed, the existing record rides along as `Created` so the
    /// caller can hand out a fresh upload location.
    pub fn put(
        &self,
        owner: &Prn,
        sha: Sha256Id,
        size: u64,
        object_name: &str,
    ) -> ObjectResult<PutOutcome> {
        if self.index.get(owner, &sha)?.is_none() {
            self.check_quota(owner, size)?;
        }

        let record = ObjectRecord::new(owner.clone(), sha, size, object_name, Utc::now());
        match self.index.insert_new(&record)? {
            InsertOutcome::Created => {
                info!(owner = %owner, sha = %sha.short_hex(), size, "object registered");
                Ok(PutOutcome::Created(record))
            }
            InsertOutcome::Exists(existing) => {
                if self.blobs.exists(&existing.backing_storage_id())? {
                    debug!(owner = %owner, sha = %sha.short_hex(), "object already backed");
                    Ok(PutOutcome::Conflict(existing))
                } else {
                    Ok(PutOutcome::Created(existing))
                }
            }
        }
    }

    /// Resolve an object for `owner`, creating a cross-owner link when a
    /// qualifying public source exists.
    ///
    /// Returns the owner's own record untouched when present. Otherwise,
    /// with autolink enabled, searches other owners' backed records for the
    /// same content and asks `source_gate` whether each may be shared; the
    /// first allowed source backs a lightweight linked record metered
    /// against `owner`'s object list. Fails with
    /// [`ObjectError::NotAvailable`] when autolink is disabled or no public
    /// source exists; the caller must then require an explicit upload.
    pub fn resolve_with_link(
        &self,
        owner: &Prn,
        sha: &Sha256Id,
        object_name: &str,
        auto_link: bool,
        source_gate: &dyn LinkSourceGate,
    ) -> ObjectResult<ObjectRecord> {
        if let Some(own) = self.index.get(owner, sha)? {
            return Ok(own);
        }
        if !auto_link {
            return Err(ObjectError::NotAvailable { sha: *sha });
        }

        for source in self.index.records_for_sha(sha)? {
            if &source.owner == owner {
                continue;
            }
            if !self.blobs.exists(&source.backing_storage_id())? {
                continue;
            }
            if !source_gate.allows(&source)? {
                continue;
            }

            self.check_quota(owner, source.size)?;
            let link = ObjectRecord::linked(owner.clone(), &source, object_name, Utc::now());
            return match self.index.insert_new(&link)? {
                InsertOutcome::Created => {
                    info!(
                        owner = %owner,
                        sha = %sha.short_hex(),
                        source = %source.owner,
                        "object autolinked"
                    );
                    Ok(link)
                }
                // Lost a race against a concurrent resolve; the winner's
                // record is just as good.
                InsertOutcome::Exists(existing) => Ok(existing),
            };
        }

        Err(ObjectError::NotAvailable { sha: *sha })
    }

    /// Precondition check: would adding `candidate` bytes stay within the
    /// owner's quota? Equality to the quota is allowed.
    ///
    /// The sum is computed on demand over live records, so concurrent
    /// uploads can over-commit by a bounded amount; the triggering object
    /// is not rolled back.
    pub fn check_quota(&self, owner: &Prn, candidate: u64) -> ObjectResult<()> {
        let used = self.index.live_size(owner)?;
        let quota = self.quotas.quota_bytes(owner)?;
        if used.saturating_add(candidate) > quota {
            return Err(ObjectError::QuotaExceeded {
                owner: owner.clone(),
                used,
                quota,
                candidate,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FixedQuota, InMemoryBlobDriver, InMemoryObjectIndex};

    struct AllowAll;

    impl LinkSourceGate for AllowAll {
        fn allows(&self, _source: &ObjectRecord) -> ObjectResult<bool> {
            Ok(true)
        }
    }

    struct DenyAll;

    impl LinkSourceGate for DenyAll {
        fn allows(&self, _source: &ObjectRecord) -> ObjectResult<bool> {
            Ok(false)
        }
    }

    fn store_with_quota(quota: u64) -> ObjectStore {
        ObjectStore::new(
            Arc::new(InMemoryObjectIndex::new()),
            Arc::new(InMemoryBlobDriver::default()),
            Arc::new(FixedQuota::new(quota)),
        )
    }

    fn upload(store: &ObjectStore, owner: &Prn, payload: &[u8], name: &str) -> ObjectRecord {
        let sha = Sha256Id::digest(payload);
        let outcome = store
            .put(owner, sha, payload.len() as u64, name)
            .unwrap();
        let record = outcome.record().clone();
        store.blobs.put(&record.storage_id, payload).unwrap();
        record
    }

    #[test]
    fn put_twice_never_creates_two_live_objects() {
        let store = store_with_quota(1024);
        let owner = Prn::account("a");
        let first = upload(&store, &owner, b"payload", "kernel.img");

        // Second put of the same (owner, sha, bytes): Conflict with the
        // first call's metadata.
        let second = store
            .put(&owner, first.sha, first.size, "kernel.img")
            .unwrap();
        match second {
            PutOutcome::Conflict(existing) => assert_eq!(existing, first),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn retried_put_before_upload_completes_is_created() {
        let store = store_with_quota(1024);
        let owner = Prn::account("a");
        let sha = Sha256Id::digest(b"payload");
        store.put(&owner, sha, 7, "kernel.img").unwrap();

        // No bytes were uploaded yet, so the retry may proceed.
        let retry = store.put(&owner, sha, 7, "kernel.img").unwrap();
        assert!(!retry.is_conflict());
    }

    #[test]
    fn quota_boundary_equality_is_allowed() {
        let store = store_with_quota(10);
        let owner = Prn::account("a");
        store.check_quota(&owner, 10).unwrap();

        let err = store.check_quota(&owner, 11).unwrap_err();
        assert!(matches!(err, ObjectError::QuotaExceeded { .. }));
    }

    #[test]
    fn quota_counts_existing_live_objects() {
        let store = store_with_quota(10);
        let owner = Prn::account("a");
        upload(&store, &owner, b"123456", "six.bin"); // 6 bytes

        store.check_quota(&owner, 4).unwrap();
        assert!(store.check_quota(&owner, 5).is_err());
    }

    #[test]
    fn put_rejects_when_quota_would_overflow() {
        let store = store_with_quota(4);
        let owner = Prn::account("a");
        let err = store
            .put(&owner, Sha256Id::digest(b"large"), 5, "big.bin")
            .unwrap_err();
        assert!(matches!(err, ObjectError::QuotaExceeded { .. }));
    }

    #[test]
    fn autolink_creates_linked_record_from_public_source() {
        let store = store_with_quota(1024);
        let owner_a = Prn::account("a");
        let owner_b = Prn::account("b");
        let source = upload(&store, &owner_a, b"shared-bytes", "fw.bin");

        let linked = store
            .resolve_with_link(&owner_b, &source.sha, "fw.bin", true, &AllowAll)
            .unwrap();
        assert!(linked.is_linked());
        assert_eq!(linked.owner, owner_b);
        assert_eq!(linked.backing_storage_id(), source.storage_id);

        // The link is metered against owner_b's own object list.
        assert_eq!(store.index.live_size(&owner_b).unwrap(), source.size);
    }

    #[test]
    fn autolink_disabled_requires_explicit_upload() {
        let store = store_with_quota(1024);
        let owner_a = Prn::account("a");
        let source = upload(&store, &owner_a, b"shared-bytes", "fw.bin");

        let err = store
            .resolve_with_link(&Prn::account("b"), &source.sha, "fw.bin", false, &AllowAll)
            .unwrap_err();
        assert!(matches!(err, ObjectError::NotAvailable { .. }));
    }

    #[test]
    fn autolink_refused_without_public_source() {
        let store = store_with_quota(1024);
        let owner_a = Prn::account("a");
        let source = upload(&store, &owner_a, b"private-bytes", "fw.bin");

        let err = store
            .resolve_with_link(&Prn::account("b"), &source.sha, "fw.bin", true, &DenyAll)
            .unwrap_err();
        assert!(matches!(err, ObjectError::NotAvailable { .. }));
    }

    #[test]
    fn autolink_skips_unbacked_sources() {
        let store = store_with_quota(1024);
        let owner_a = Prn::account("a");
        let sha = Sha256Id::digest(b"never-uploaded");
        store.put(&owner_a, sha, 9, "fw.bin").unwrap(); // record, no bytes

        let err = store
            .resolve_with_link(&Prn::account("b"), &sha, "fw.bin", true, &AllowAll)
            .unwrap_err();
        assert!(matches!(err, ObjectError::NotAvailable { .. }));
    }

    #[test]
    fn resolve_returns_own_record_without_linking() {
        let store = store_with_quota(1024);
        let owner = Prn::account("a");
        let own = upload(&store, &owner, b"mine", "fw.bin");

        let resolved = store
            .resolve_with_link(&owner, &own.sha, "fw.bin", true, &DenyAll)
            .unwrap();
        assert_eq!(resolved, own);
        assert!(!resolved.is_linked());
    }
}
