use trail_types::{Prn, Sha256Id};

use crate::error::ObjectResult;
use crate::record::ObjectRecord;

/// Result of an insert-if-absent on the object index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was written.
    Created,
    /// A record with the same storage id already existed; its metadata is
    /// returned untouched.
    Exists(ObjectRecord),
}

/// Metadata index over per-owner object records.
///
/// Implementations must satisfy these invariants:
/// - `insert_new` is atomic on the storage id: concurrent inserts of the
///   same `(owner, sha)` produce exactly one `Created`.
/// - Records are immutable once written apart from the `garbage` mark.
/// - Every operation is bounded by the backend; exceeding the bound is a
///   timeout error, never a silent retry.
pub trait ObjectIndex: Send + Sync {
    /// Insert a record unless its storage id is already present.
    fn insert_new(&self, record: &ObjectRecord) -> ObjectResult<InsertOutcome>;

    /// Fetch a record by its `(owner, sha)` identity.
    fn get(&self, owner: &Prn, sha: &Sha256Id) -> ObjectResult<Option<ObjectRecord>>;

    /// Sum of sizes of the owner's live (non-garbage) records.
    fn live_size(&self, owner: &Prn) -> ObjectResult<u64>;

    /// All owners' records carrying the given content hash.
    fn records_for_sha(&self, sha: &Sha256Id) -> ObjectResult<Vec<ObjectRecord>>;

    /// Soft-delete a record. Returns `false` if no live record matched.
    fn mark_garbage(&self, owner: &Prn, sha: &Sha256Id) -> ObjectResult<bool>;
}

/// Byte transport for object payloads, addressed by storage id.
///
/// The core never streams payload bytes itself; uploads and downloads go
/// directly between the client and the storage backend via signed URLs.
/// `put`/`get` exist for the in-memory driver and the export read path.
pub trait BlobDriver: Send + Sync {
    /// Whether backing bytes exist under the storage id.
    fn exists(&self, storage_id: &Sha256Id) -> ObjectResult<bool>;

    /// Store payload bytes under the storage id.
    fn put(&self, storage_id: &Sha256Id, bytes: &[u8]) -> ObjectResult<()>;

    /// Read payload bytes. Returns `Ok(None)` when nothing is stored.
    fn get(&self, storage_id: &Sha256Id) -> ObjectResult<Option<Vec<u8>>>;

    /// Mint a short-lived download location for the storage id.
    fn signed_get_url(&self, storage_id: &Sha256Id) -> ObjectResult<String>;

    /// Mint a short-lived upload location for the storage id.
    fn signed_put_url(&self, storage_id: &Sha256Id) -> ObjectResult<String>;
}

/// Per-owner quota in bytes, from the externally managed plan storage.
pub trait QuotaSource: Send + Sync {
    fn quota_bytes(&self, owner: &Prn) -> ObjectResult<u64>;
}

/// Decides whether another owner's record may serve as an autolink source.
///
/// The rule lives above this crate: a source qualifies when it is reachable
/// from a step that is itself publicly visible. Implementations consult the
/// step chain and the visibility flag.
pub trait LinkSourceGate: Send + Sync {
    fn allows(&self, source: &ObjectRecord) -> ObjectResult<bool>;
}
