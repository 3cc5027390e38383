//! Bundle archive reader.
//!
//! [`BundleArchive::open`] validates the manifest before anything else is
//! touched; an archive that fails validation never yields an entity. The
//! archive is read from disk on demand, so embedded source files are never
//! held in memory whole.

use std::io::{Cursor, ErrorKind, Read, Seek, Write};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::identity::{ContentHasher, ContentIdentity};

use super::entity::{ArchivedDocument, ArchivedEntity, ArchivedGrouping, ArchivedProfile, EntityKind};
use super::error::{BundleError, BundleResult};
use super::manifest::{self, Manifest};
use super::{MANIFEST_ENTRY, SOURCE_FILES_DIR};

/// Maximum decompressed size of a single JSON record (zip-bomb protection).
const MAX_RECORD_BYTES: u64 = 64 * 1024 * 1024;
const COPY_BUF_BYTES: usize = 64 * 1024;

/// Anything a zip archive can be read from.
pub trait ArchiveSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ArchiveSource for T {}

/// One record read from the archive. `record` is an error when the entry
/// could not be read or parsed.
#[derive(Debug)]
pub struct ArchiveItem<T> {
    pub entry: String,
    pub record: BundleResult<T>,
}

/// An opened, manifest-validated bundle.
pub struct BundleArchive {
    path: PathBuf,
    manifest: Manifest,
    names: Vec<String>,
    zip: ZipArchive<Box<dyn ArchiveSource>>,
}

impl BundleArchive {
    pub async fn open(path: &Path) -> BundleResult<Self> {
        let file = tokio::fs::File::open(path).await?.into_std().await;
        Self::from_source(path.to_path_buf(), Box::new(file))
    }

    /// Open an archive already held in memory. `path` is only used for
    /// reporting.
    pub fn from_bytes(path: PathBuf, bytes: Vec<u8>) -> BundleResult<Self> {
        Self::from_source(path, Box::new(Cursor::new(bytes)))
    }

    fn from_source(path: PathBuf, source: Box<dyn ArchiveSource>) -> BundleResult<Self> {
        let mut zip = ZipArchive::new(source)?;

        let manifest_bytes = match read_entry_bounded(&mut zip, MANIFEST_ENTRY, MAX_RECORD_BYTES) {
            Ok(b) => b,
            Err(BundleError::Archive(zip::result::ZipError::FileNotFound)) => {
                return Err(BundleError::missing_entry(MANIFEST_ENTRY))
            }
            Err(e) => return Err(e),
        };
        let manifest = manifest::decode(&manifest_bytes)?;

        let mut names = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i)?;
            if !entry.is_dir() {
                names.push(entry.name().to_string());
            }
        }

        Ok(Self {
            path,
            manifest,
            names,
            zip,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Entry names of one entity kind, in archive order.
    pub fn entry_names(&self, kind: EntityKind) -> Vec<String> {
        self.names
            .iter()
            .filter(|n| matches!(EntityKind::from_entry_name(n), Some((k, _)) if k == kind))
            .cloned()
            .collect()
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn read_entity(&mut self, name: &str) -> BundleResult<ArchivedEntity> {
        let (kind, _) = EntityKind::from_entry_name(name)
            .ok_or_else(|| BundleError::validation(format!("not an entity entry: {}", name)))?;
        let bytes = read_entry_bounded(&mut self.zip, name, MAX_RECORD_BYTES)?;
        ArchivedEntity::from_json(kind, &bytes)
    }

    pub fn read_document(&mut self, name: &str) -> BundleResult<ArchivedDocument> {
        match self.read_entity(name)? {
            ArchivedEntity::Document(d) => Ok(d),
            other => Err(wrong_kind(name, other.kind())),
        }
    }

    pub fn read_grouping(&mut self, name: &str) -> BundleResult<ArchivedGrouping> {
        match self.read_entity(name)? {
            ArchivedEntity::Grouping(g) => Ok(g),
            other => Err(wrong_kind(name, other.kind())),
        }
    }

    pub fn read_profile(&mut self, name: &str) -> BundleResult<ArchivedProfile> {
        match self.read_entity(name)? {
            ArchivedEntity::Profile(p) => Ok(p),
            other => Err(wrong_kind(name, other.kind())),
        }
    }

    pub fn documents(&mut self) -> Vec<ArchiveItem<ArchivedDocument>> {
        self.entry_names(EntityKind::Document)
            .into_iter()
            .map(|entry| {
                let record = self.read_document(&entry);
                ArchiveItem { entry, record }
            })
            .collect()
    }

    pub fn groupings(&mut self) -> Vec<ArchiveItem<ArchivedGrouping>> {
        self.entry_names(EntityKind::Grouping)
            .into_iter()
            .map(|entry| {
                let record = self.read_grouping(&entry);
                ArchiveItem { entry, record }
            })
            .collect()
    }

    pub fn profiles(&mut self) -> Vec<ArchiveItem<ArchivedProfile>> {
        self.entry_names(EntityKind::Profile)
            .into_iter()
            .map(|entry| {
                let record = self.read_profile(&entry);
                ArchiveItem { entry, record }
            })
            .collect()
    }

    /// Stream an embedded source file (`sourcefiles/...`) into `out`,
    /// returning the digest of the bytes copied.
    pub fn copy_source_file(
        &mut self,
        name: &str,
        out: &mut dyn Write,
    ) -> BundleResult<ContentIdentity> {
        let in_dir = name
            .strip_prefix(SOURCE_FILES_DIR)
            .is_some_and(|rest| rest.starts_with('/'));
        if !in_dir {
            return Err(BundleError::validation(format!(
                "not a source file entry: {}",
                name
            )));
        }

        let mut entry = self.zip.by_name(name)?;
        let mut hasher = ContentHasher::default();
        let mut buf = vec![0u8; COPY_BUF_BYTES];
        loop {
            let n = match entry.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n])?;
        }
        Ok(hasher.finish())
    }
}

fn wrong_kind(name: &str, found: EntityKind) -> BundleError {
    BundleError::validation(format!(
        "entry {} holds a {} record",
        name,
        found.dir()
    ))
}

fn read_entry_bounded<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_bytes: u64,
) -> BundleResult<Vec<u8>> {
    let entry = archive.by_name(name)?;
    let mut out = Vec::new();
    entry.take(max_bytes).read_to_end(&mut out)?;
    if out.len() as u64 >= max_bytes {
        return Err(BundleError::validation(format!(
            "entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn manifest_json() -> Vec<u8> {
        let m = Manifest::new(super::super::manifest::ManifestSource {
            workspace_id: "w".into(),
            workspace_name: "W".into(),
            app_version: "test".into(),
        });
        manifest::encode(&m).unwrap()
    }

    #[test]
    fn missing_manifest_is_rejected() {
        let bytes = zip_with(&[("documents/a.json", b"{}")]);
        let err = BundleArchive::from_bytes("x.lens".into(), bytes).err().unwrap();
        assert!(matches!(err, BundleError::MissingEntry(ref n) if n == "manifest.json"));
    }

    #[test]
    fn not_a_zip_is_an_archive_error() {
        let err = BundleArchive::from_bytes("x.lens".into(), b"plain text".to_vec())
            .err()
            .unwrap();
        assert!(matches!(err, BundleError::Archive(_)));
    }

    #[test]
    fn entries_are_grouped_by_kind_in_archive_order() {
        let manifest = manifest_json();
        let bytes = zip_with(&[
            ("documents/b.json", b"{}"),
            ("groupings/g.json", b"{}"),
            ("documents/a.json", b"{}"),
            ("sourcefiles/a.pdf", b"%PDF"),
            ("manifest.json", manifest.as_slice()),
        ]);
        let archive = BundleArchive::from_bytes("x.lens".into(), bytes).unwrap();
        assert_eq!(
            archive.entry_names(EntityKind::Document),
            vec!["documents/b.json", "documents/a.json"]
        );
        assert_eq!(archive.entry_names(EntityKind::Profile), Vec::<String>::new());
        assert!(archive.has_entry("sourcefiles/a.pdf"));
    }

    #[test]
    fn malformed_record_is_reported_per_entry() {
        let manifest = manifest_json();
        let bytes = zip_with(&[
            ("manifest.json", manifest.as_slice()),
            ("profiles/p.json", b"{ not json"),
            ("profiles/q.json", br#"{"id": "q", "name": "Q", "created_at": 1}"#),
        ]);
        let mut archive = BundleArchive::from_bytes("x.lens".into(), bytes).unwrap();
        let items = archive.profiles();
        assert_eq!(items.len(), 2);
        assert!(items[0].record.is_err());
        assert_eq!(items[1].record.as_ref().unwrap().name, "Q");
    }

    #[test]
    fn source_file_reads_are_confined_to_sourcefiles() {
        let manifest = manifest_json();
        let bytes = zip_with(&[("manifest.json", manifest.as_slice()), ("sourcefiles/a.txt", b"hello")]);
        let mut archive = BundleArchive::from_bytes("x.lens".into(), bytes).unwrap();

        let mut out = Vec::new();
        let digest = archive.copy_source_file("sourcefiles/a.txt", &mut out).unwrap();
        assert_eq!(out, b"hello");
        assert_eq!(digest, ContentIdentity::from_bytes(b"hello"));
        assert!(archive
            .copy_source_file("manifest.json", &mut std::io::sink())
            .is_err());
    }

    #[tokio::test]
    async fn large_source_file_streams_from_disk() {
        let manifest = manifest_json();
        let big: Vec<u8> = (0..3_000_000u32).map(|i| (i % 251) as u8).collect();
        let bytes = zip_with(&[("manifest.json", manifest.as_slice()), ("sourcefiles/big.bin", big.as_slice())]);
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("big.lens");
        std::fs::write(&path, bytes).unwrap();

        let mut archive = BundleArchive::open(&path).await.unwrap();
        let digest = archive
            .copy_source_file("sourcefiles/big.bin", &mut std::io::sink())
            .unwrap();
        assert_eq!(digest, ContentIdentity::from_bytes(&big));
    }
}
