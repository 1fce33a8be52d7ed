//! Deterministic tar composition of an assembled export.
//!
//! Archive members carry fixed metadata (mode 0644, mtime pinned to the
//! step's modification time), the canonical state always comes first, and
//! objects follow in logical-name order. Identical inputs therefore
//! produce byte-identical archives.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Header;
use tracing::debug;

use trail_objects::BlobDriver;

use crate::assembler::Export;
use crate::error::{ExportError, ExportResult};

/// Archive member name of the canonical state.
pub const STATE_MEMBER: &str = "state.json";

const MEMBER_MODE: u32 = 0o644;

/// Stream an export into a tar archive.
///
/// The first unreadable object aborts the whole stream; a truncated
/// archive is never silently produced.
pub fn write_tar<W: Write>(export: &Export, blobs: &dyn BlobDriver, out: W) -> ExportResult<W> {
    let mtime = export.mod_time.timestamp().max(0) as u64;
    let mut builder = tar::Builder::new(out);

    append_member(
        &mut builder,
        STATE_MEMBER,
        &export.canonical_state,
        mtime,
    )?;

    for entry in &export.objects {
        let bytes = blobs
            .get(&entry.storage_id)?
            .ok_or_else(|| ExportError::MissingObject {
                name: entry.name.clone(),
                sha: entry.sha,
            })?;
        append_member(&mut builder, &entry.name, &bytes, mtime)?;
    }

    debug!(
        trail = %export.trail,
        rev = export.rev,
        members = export.objects.len() + 1,
        "archive written"
    );
    Ok(builder.into_inner()?)
}

/// Stream an export into a gzip-compressed tar archive.
pub fn write_tar_gz<W: Write>(export: &Export, blobs: &dyn BlobDriver, out: W) -> ExportResult<W> {
    // mtime stays at the encoder default (zero) so compression never
    // perturbs reproducibility.
    let encoder = GzEncoder::new(out, Compression::default());
    let encoder = write_tar(export, blobs, encoder)?;
    Ok(encoder.finish()?)
}

fn append_member<W: Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    bytes: &[u8],
    mtime: u64,
) -> ExportResult<()> {
    let mut header = Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(MEMBER_MODE);
    header.set_mtime(mtime);
    builder.append_data(&mut header, name, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use chrono::{TimeZone, Utc};
    use flate2::read::GzDecoder;

    use trail_objects::InMemoryBlobDriver;
    use trail_types::{Sha256Id, TrailId};

    use super::*;
    use crate::assembler::ObjectEntry;

    fn export_with(objects: Vec<ObjectEntry>) -> Export {
        Export {
            trail: TrailId::parse("dev1").unwrap(),
            rev: 2,
            canonical_state: br#"{"a":1}"#.to_vec(),
            objects,
            mod_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn stored(blobs: &InMemoryBlobDriver, name: &str, payload: &[u8]) -> ObjectEntry {
        let sha = Sha256Id::digest(payload);
        let storage_id = Sha256Id::digest(name.as_bytes());
        blobs.put(&storage_id, payload).unwrap();
        ObjectEntry {
            name: name.to_string(),
            sha,
            size: payload.len() as u64,
            storage_id,
        }
    }

    fn member_names(archive: &[u8]) -> Vec<String> {
        let mut reader = tar::Archive::new(archive);
        reader
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn state_comes_first_then_objects_in_order() {
        let blobs = InMemoryBlobDriver::default();
        let export = export_with(vec![
            stored(&blobs, "a.bin", b"alfa"),
            stored(&blobs, "b/c.bin", b"charlie"),
        ]);

        let archive = write_tar(&export, &blobs, Vec::new()).unwrap();
        assert_eq!(member_names(&archive), ["state.json", "a.bin", "b/c.bin"]);
    }

    #[test]
    fn members_carry_pinned_metadata() {
        let blobs = InMemoryBlobDriver::default();
        let export = export_with(vec![stored(&blobs, "fw.bin", b"firmware")]);
        let archive = write_tar(&export, &blobs, Vec::new()).unwrap();

        let mut reader = tar::Archive::new(archive.as_slice());
        for entry in reader.entries().unwrap() {
            let entry = entry.unwrap();
            assert_eq!(entry.header().mode().unwrap(), MEMBER_MODE);
            assert_eq!(
                entry.header().mtime().unwrap(),
                export.mod_time.timestamp() as u64
            );
        }
    }

    #[test]
    fn identical_inputs_produce_identical_bytes() {
        let blobs = InMemoryBlobDriver::default();
        let export = export_with(vec![stored(&blobs, "fw.bin", b"firmware")]);

        let first = write_tar(&export, &blobs, Vec::new()).unwrap();
        let second = write_tar(&export, &blobs, Vec::new()).unwrap();
        assert_eq!(first, second);

        let gz_first = write_tar_gz(&export, &blobs, Vec::new()).unwrap();
        let gz_second = write_tar_gz(&export, &blobs, Vec::new()).unwrap();
        assert_eq!(gz_first, gz_second);
    }

    #[test]
    fn unreadable_object_aborts_the_stream() {
        let blobs = InMemoryBlobDriver::default();
        let mut entry = stored(&blobs, "fw.bin", b"firmware");
        // Point the entry at bytes that were never stored.
        entry.storage_id = Sha256Id::digest(b"elsewhere");
        let export = export_with(vec![entry]);

        let err = write_tar(&export, &blobs, Vec::new()).unwrap_err();
        assert!(matches!(err, ExportError::MissingObject { .. }));
    }

    #[test]
    fn gzip_archive_decompresses_to_the_tar() {
        let blobs = InMemoryBlobDriver::default();
        let export = export_with(vec![stored(&blobs, "fw.bin", b"firmware")]);

        let tar_bytes = write_tar(&export, &blobs, Vec::new()).unwrap();
        let gz_bytes = write_tar_gz(&export, &blobs, Vec::new()).unwrap();

        let mut inflated = Vec::new();
        GzDecoder::new(gz_bytes.as_slice())
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, tar_bytes);
    }

    #[test]
    fn archive_round_trips_member_contents() {
        let blobs = InMemoryBlobDriver::default();
        let export = export_with(vec![stored(&blobs, "fw.bin", b"firmware")]);
        let archive = write_tar(&export, &blobs, Vec::new()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        tar::Archive::new(archive.as_slice())
            .unpack(dir.path())
            .unwrap();

        let state = std::fs::read(dir.path().join("state.json")).unwrap();
        assert_eq!(state, export.canonical_state);
        let fw = std::fs::read(dir.path().join("fw.bin")).unwrap();
        assert_eq!(fw, b"firmware");
    }

    #[test]
    fn empty_object_list_still_carries_state() {
        let blobs = InMemoryBlobDriver::default();
        let export = export_with(Vec::new());
        let archive = write_tar(&export, &blobs, Vec::new()).unwrap();
        assert_eq!(member_names(&archive), ["state.json"]);
    }
}
