//! In-memory backends for tests and embedding.

use std::collections::HashMap;
use std::sync::RwLock;

use trail_types::{Prn, Sha256Id};

use crate::error::ObjectResult;
use crate::record::ObjectRecord;
use crate::traits::{BlobDriver, InsertOutcome, ObjectIndex, QuotaSource};

/// In-memory, HashMap-based object index keyed by storage id.
///
/// All records are held behind a `RwLock`; the write lock makes
/// `insert_new` atomic the way a unique index would at a real backend.
pub struct InMemoryObjectIndex {
    records: RwLock<HashMap<Sha256Id, ObjectRecord>>,
}

impl InMemoryObjectIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records currently indexed.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryObjectIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectIndex for InMemoryObjectIndex {
    fn insert_new(&self, record: &ObjectRecord) -> ObjectResult<InsertOutcome> {
        let mut map = self.records.write().expect("lock poisoned");
        if let Some(existing) = map.get(&record.storage_id) {
            return Ok(InsertOutcome::Exists(existing.clone()));
        }
        map.insert(record.storage_id, record.clone());
        Ok(InsertOutcome::Created)
    }

    fn get(&self, owner: &Prn, sha: &Sha256Id) -> ObjectResult<Option<ObjectRecord>> {
        let storage_id = ObjectRecord::derive_storage_id(owner, sha);
        let map = self.records.read().expect("lock poisoned");
        Ok(map.get(&storage_id).cloned())
    }

    fn live_size(&self, owner: &Prn) -> ObjectResult<u64> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map
            .values()
            .filter(|r| &r.owner == owner && !r.garbage)
            .map(|r| r.size)
            .sum())
    }

    fn records_for_sha(&self, sha: &Sha256Id) -> ObjectResult<Vec<ObjectRecord>> {
        let map = self.records.read().expect("lock poisoned");
        let mut found: Vec<ObjectRecord> = map
            .values()
            .filter(|r| &r.sha == sha && !r.garbage)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.owner.cmp(&b.owner));
        Ok(found)
    }

    fn mark_garbage(&self, owner: &Prn, sha: &Sha256Id) -> ObjectResult<bool> {
        let storage_id = ObjectRecord::derive_storage_id(owner, sha);
        let mut map = self.records.write().expect("lock poisoned");
        match map.get_mut(&storage_id) {
            Some(record) if !record.garbage => {
                record.garbage = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl std::fmt::Debug for InMemoryObjectIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectIndex")
            .field("record_count", &self.len())
            .finish()
    }
}

/// In-memory blob driver. Signed URLs are deterministic paths under a
/// configurable base, good enough for handler tests.
pub struct InMemoryBlobDriver {
    blobs: RwLock<HashMap<Sha256Id, Vec<u8>>>,
    base_url: String,
}

impl InMemoryBlobDriver {
    pub fn new(base_url: &str) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for InMemoryBlobDriver {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

impl BlobDriver for InMemoryBlobDriver {
    fn exists(&self, storage_id: &Sha256Id) -> ObjectResult<bool> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.contains_key(storage_id))
    }

    fn put(&self, storage_id: &Sha256Id, bytes: &[u8]) -> ObjectResult<()> {
        let mut map = self.blobs.write().expect("lock poisoned");
        map.insert(*storage_id, bytes.to_vec());
        Ok(())
    }

    fn get(&self, storage_id: &Sha256Id) -> ObjectResult<Option<Vec<u8>>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(storage_id).cloned())
    }

    fn signed_get_url(&self, storage_id: &Sha256Id) -> ObjectResult<String> {
        Ok(format!("{}/{}?op=get", self.base_url, storage_id))
    }

    fn signed_put_url(&self, storage_id: &Sha256Id) -> ObjectResult<String> {
        Ok(format!("{}/{}?op=put", self.base_url, storage_id))
    }
}

/// Quota source with a default and per-owner overrides.
pub struct FixedQuota {
    default_bytes: u64,
    overrides: HashMap<Prn, u64>,
}

impl FixedQuota {
    pub fn new(default_bytes: u64) -> Self {
        Self {
            default_bytes,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, owner: Prn, quota_bytes: u64) -> Self {
        self.overrides.insert(owner, quota_bytes);
        self
    }
}

impl QuotaSource for FixedQuota {
    fn quota_bytes(&self, owner: &Prn) -> ObjectResult<u64> {
        Ok(self
            .overrides
            .get(owner)
            .copied()
            .unwrap_or(self.default_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(owner: &str, payload: &[u8], size: u64) -> ObjectRecord {
        ObjectRecord::new(
            Prn::account(owner),
            Sha256Id::digest(payload),
            size,
            "obj.bin",
            Utc::now(),
        )
    }

    #[test]
    fn insert_then_get_by_identity() {
        let index = InMemoryObjectIndex::new();
        let rec = record("a", b"x", 3);
        assert_eq!(index.insert_new(&rec).unwrap(), InsertOutcome::Created);

        let found = index.get(&rec.owner, &rec.sha).unwrap().unwrap();
        assert_eq!(found, rec);
    }

    #[test]
    fn duplicate_insert_returns_existing_metadata() {
        let index = InMemoryObjectIndex::new();
        let first = record("a", b"x", 3);
        index.insert_new(&first).unwrap();

        let mut retry = first.clone();
        retry.object_name = "renamed.bin".into();
        match index.insert_new(&retry).unwrap() {
            InsertOutcome::Exists(existing) => assert_eq!(existing, first),
            other => panic!("expected Exists, got {other:?}"),
        }
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn live_size_skips_garbage_and_other_owners() {
        let index = InMemoryObjectIndex::new();
        index.insert_new(&record("a", b"one", 10)).unwrap();
        index.insert_new(&record("a", b"two", 20)).unwrap();
        index.insert_new(&record("b", b"three", 40)).unwrap();

        let owner = Prn::account("a");
        assert_eq!(index.live_size(&owner).unwrap(), 30);

        assert!(index
            .mark_garbage(&owner, &Sha256Id::digest(b"two"))
            .unwrap());
        assert_eq!(index.live_size(&owner).unwrap(), 10);
    }

    #[test]
    fn mark_garbage_is_single_shot() {
        let index = InMemoryObjectIndex::new();
        let rec = record("a", b"x", 1);
        index.insert_new(&rec).unwrap();
        assert!(index.mark_garbage(&rec.owner, &rec.sha).unwrap());
        assert!(!index.mark_garbage(&rec.owner, &rec.sha).unwrap());
    }

    #[test]
    fn records_for_sha_spans_owners() {
        let index = InMemoryObjectIndex::new();
        index.insert_new(&record("a", b"shared", 5)).unwrap();
        index.insert_new(&record("b", b"shared", 5)).unwrap();
        index.insert_new(&record("c", b"other", 5)).unwrap();

        let found = index.records_for_sha(&Sha256Id::digest(b"shared")).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn blob_driver_roundtrip() {
        let driver = InMemoryBlobDriver::default();
        let id = Sha256Id::digest(b"blob");
        assert!(!driver.exists(&id).unwrap());

        driver.put(&id, b"payload").unwrap();
        assert!(driver.exists(&id).unwrap());
        assert_eq!(driver.get(&id).unwrap().unwrap(), b"payload");
    }

    #[test]
    fn signed_urls_embed_storage_id() {
        let driver = InMemoryBlobDriver::new("memory://test/");
        let id = Sha256Id::digest(b"blob");
        let url = driver.signed_get_url(&id).unwrap();
        assert!(url.contains(&id.to_hex()));
        assert!(url.starts_with("memory://test/"));
        assert_ne!(url, driver.signed_put_url(&id).unwrap());
    }

    #[test]
    fn quota_overrides_take_precedence() {
        let quotas =
            FixedQuota::new(100).with_override(Prn::account("big"), 1000);
        assert_eq!(quotas.quota_bytes(&Prn::account("small")).unwrap(), 100);
        assert_eq!(quotas.quota_bytes(&Prn::account("big")).unwrap(), 1000);
    }
}
