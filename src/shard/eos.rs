/*! Native shard backend (manifest type `"eosshard"`).

File layout: an 8-byte magic, a little-endian u64 pointing at the table of
contents, the blob bytes, then the bincode TOC itself. Records are keyed by
40-hex id and kept sorted, so lookups are binary searches over the TOC.
Record metadata blobs are JSON object-model documents; the link table is
the JSON data blob of the record at the well-known [`LINK_TABLE_ID`]. The
full-text index offset is supplied by the subscription manifest, never
derived here.
!*/
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DataStream, DbOffset, Shard, ShardRecord};
use crate::error::Error;
use crate::index::IndexData;
use crate::model::Model;

/// SHA-1 of `"link-table"`: the hardcoded record id of per-shard link
/// tables.
pub const LINK_TABLE_ID: &str = "4dba9091495e8f277893e0d400e9e092f9f6f551";

const MAGIC: &[u8; 8] = b"EKNSHRD2";
const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlobRef {
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntry {
    pub id: String,
    pub metadata: BlobRef,
    pub data: Option<BlobRef>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Toc {
    records: Vec<RecordEntry>,
}

struct EosRecord {
    entry: RecordEntry,
}

/// A native shard file, mapped once and shared by every reader.
pub struct EosShard {
    path: PathBuf,
    map: Arc<Mmap>,
    records: Vec<RecordEntry>,
    link_table: Option<HashMap<String, String>>,
    db_offset: DbOffset,
}

impl EosShard {
    /// Opens and validates a shard file. Runs on a worker during domain
    /// initialization.
    pub fn open(path: &Path, db_offset_override: Option<i64>) -> Result<EosShard, Error> {
        let file = File::open(path)?;
        let map = Arc::new(unsafe { Mmap::map(&file)? });

        if map.len() < HEADER_LEN || &map[..8] != MAGIC {
            return Err(Error::UnsupportedVersion(format!(
                "{} is not a supported shard file",
                path.display()
            )));
        }
        let mut toc_offset_bytes = [0u8; 8];
        toc_offset_bytes.copy_from_slice(&map[8..16]);
        let toc_offset = u64::from_le_bytes(toc_offset_bytes) as usize;
        if toc_offset < HEADER_LEN || toc_offset > map.len() {
            return Err(Error::UnsupportedVersion(format!(
                "{} has a corrupt table of contents",
                path.display()
            )));
        }

        let toc: Toc = bincode::deserialize(&map[toc_offset..]).map_err(|e| {
            Error::UnsupportedVersion(format!(
                "cannot read table of contents of {}: {e}",
                path.display()
            ))
        })?;

        let mut shard = EosShard {
            path: path.to_path_buf(),
            map,
            records: toc.records,
            link_table: None,
            db_offset: DbOffset::new(db_offset_override),
        };
        shard.load_link_table()?;
        Ok(shard)
    }

    fn load_link_table(&mut self) -> Result<(), Error> {
        let entry = match self.entry(LINK_TABLE_ID) {
            Some(entry) => entry.clone(),
            None => return Ok(()),
        };
        let blob = match entry.data {
            Some(blob) => blob,
            None => return Ok(()),
        };
        let bytes = self.blob_slice(&blob)?;
        let table: HashMap<String, String> = serde_json::from_slice(bytes)
            .map_err(|e| Error::BadFormat(format!("link table of {}: {e}", self.path.display())))?;
        debug!(
            "loaded link table with {} entries from {}",
            table.len(),
            self.path.display()
        );
        self.link_table = Some(table);
        Ok(())
    }

    fn entry(&self, object_id: &str) -> Option<&RecordEntry> {
        self.records
            .binary_search_by(|record| record.id.as_str().cmp(object_id))
            .ok()
            .map(|i| &self.records[i])
    }

    fn blob_slice(&self, blob: &BlobRef) -> Result<&[u8], Error> {
        let start = blob.offset as usize;
        let end = start.saturating_add(blob.size as usize);
        if end > self.map.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("blob past the end of {}", self.path.display()),
            )));
        }
        Ok(&self.map[start..end])
    }

    fn record_of<'a>(&self, record: &'a ShardRecord) -> Result<&'a EosRecord, Error> {
        record.native::<EosRecord>().ok_or_else(|| {
            Error::BadFormat(format!(
                "record does not belong to shard {}",
                self.path.display()
            ))
        })
    }
}

impl Shard for EosShard {
    fn path(&self) -> &Path {
        &self.path
    }

    fn find_by_id(self: Arc<Self>, object_id: &str) -> Option<ShardRecord> {
        let entry = self.entry(object_id)?.clone();
        Some(ShardRecord::new(self, Box::new(EosRecord { entry })))
    }

    fn model(&self, record: &ShardRecord) -> Result<Model, Error> {
        let native = self.record_of(record)?;
        let bytes = self.blob_slice(&native.entry.metadata)?;
        let node: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::BadFormat(format!("record {}: {e}", native.entry.id)))?;
        Model::from_json(&node)
    }

    fn stream_data(&self, record: &ShardRecord) -> Result<DataStream, Error> {
        let native = self.record_of(record)?;
        let blob = native.entry.data.as_ref().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("record {} has no data blob", native.entry.id),
            ))
        })?;
        Ok(DataStream::new(
            self.map.clone(),
            blob.offset as usize,
            blob.size as usize,
        ))
    }

    fn data_size(&self, record: &ShardRecord) -> u64 {
        record
            .native::<EosRecord>()
            .and_then(|native| native.entry.data.as_ref())
            .map(|blob| blob.size)
            .unwrap_or(0)
    }

    fn test_link(&self, link: &str) -> Option<String> {
        self.link_table.as_ref()?.get(link).cloned()
    }

    fn compute_db_offset(&self) -> i64 {
        // native shards get their index offset from the manifest
        -1
    }

    fn db_offset(&self) -> i64 {
        self.db_offset.resolve(|| self.compute_db_offset())
    }
}

/// Writes native shard files; the counterpart of [`EosShard`].
#[derive(Default)]
pub struct ShardWriter {
    records: Vec<(String, Vec<u8>, Option<Vec<u8>>)>,
    index: Option<IndexData>,
}

impl ShardWriter {
    pub fn new() -> ShardWriter {
        ShardWriter::default()
    }

    pub fn add_record(&mut self, id: &str, metadata: &Value, data: Option<&[u8]>) {
        // metadata documents are compact JSON on disk
        let bytes = serde_json::to_vec(metadata).unwrap_or_else(|_| b"{}".to_vec());
        self.records
            .push((id.to_string(), bytes, data.map(|d| d.to_vec())));
    }

    /// Stores the link table as the data blob of the well-known record.
    pub fn set_link_table(&mut self, table: &HashMap<String, String>) {
        let bytes = serde_json::to_vec(table).unwrap_or_else(|_| b"{}".to_vec());
        self.records
            .push((LINK_TABLE_ID.to_string(), b"{}".to_vec(), Some(bytes)));
    }

    pub fn set_index(&mut self, index: IndexData) {
        self.index = Some(index);
    }

    /// Writes the shard and returns the byte offset of the embedded index
    /// blob, to be distributed through the manifest.
    pub fn write_to(&self, path: &Path) -> Result<Option<u64>, Error> {
        let mut blob_bytes: Vec<u8> = Vec::new();
        let mut entries: Vec<RecordEntry> = Vec::new();

        let append = |bytes: &[u8], blob_bytes: &mut Vec<u8>| -> BlobRef {
            let blob = BlobRef {
                offset: (HEADER_LEN + blob_bytes.len()) as u64,
                size: bytes.len() as u64,
            };
            blob_bytes.extend_from_slice(bytes);
            blob
        };

        for (id, metadata, data) in &self.records {
            let metadata_ref = append(metadata, &mut blob_bytes);
            let data_ref = data.as_ref().map(|bytes| append(bytes, &mut blob_bytes));
            entries.push(RecordEntry {
                id: id.clone(),
                metadata: metadata_ref,
                data: data_ref,
            });
        }

        let index_offset = match &self.index {
            Some(index) => {
                let bytes = index.to_bytes()?;
                Some(append(&bytes, &mut blob_bytes).offset)
            }
            None => None,
        };

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        let toc = Toc { records: entries };
        let toc_bytes =
            bincode::serialize(&toc).map_err(|e| Error::BadFormat(e.to_string()))?;

        let toc_offset = (HEADER_LEN + blob_bytes.len()) as u64;
        let mut file = File::create(path)?;
        file.write_all(MAGIC)?;
        file.write_all(&toc_offset.to_le_bytes())?;
        file.write_all(&blob_bytes)?;
        file.write_all(&toc_bytes)?;

        Ok(index_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sha1::{Digest, Sha1};
    use std::io::Read;

    fn hash(n: u8) -> String {
        format!("{n:040x}")
    }

    fn write_sample(dir: &Path) -> PathBuf {
        let path = dir.join("content.shard");
        let mut writer = ShardWriter::new();
        writer.add_record(
            &hash(1),
            &json!({
                "@type": "ekn://_vocab/ArticleObject",
                "@id": format!("ekn:///{}", hash(1)),
                "title": "Apple",
                "contentType": "text/html",
            }),
            Some(b"<html>apple</html>"),
        );
        writer.add_record(
            &hash(2),
            &json!({
                "@type": "ekn://_vocab/ContentObject",
                "@id": format!("ekn:///{}", hash(2)),
                "title": "Bare record",
            }),
            None,
        );
        writer.set_link_table(&HashMap::from([(
            "https://example.com/apple".to_string(),
            format!("ekn:///{}", hash(1)),
        )]));
        writer.write_to(&path).unwrap();
        path
    }

    #[test]
    fn link_table_id_is_sha1_of_link_table() {
        let mut hasher = Sha1::new();
        hasher.update(b"link-table");
        assert_eq!(format!("{:x}", hasher.finalize()), LINK_TABLE_ID);
    }

    #[test]
    fn finds_records_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let shard = Arc::new(EosShard::open(&write_sample(dir.path()), None).unwrap());

        let record = shard.clone().find_by_id(&hash(1)).unwrap();
        let model = record.model().unwrap();
        assert_eq!(model.title(), "Apple");
        assert_eq!(model.id(), format!("ekn:///{}", hash(1)));

        assert!(shard.clone().find_by_id(&hash(9)).is_none());
    }

    #[test]
    fn streams_record_data() {
        let dir = tempfile::tempdir().unwrap();
        let shard = Arc::new(EosShard::open(&write_sample(dir.path()), None).unwrap());

        let record = shard.clone().find_by_id(&hash(1)).unwrap();
        assert_eq!(record.data_size(), 18);
        let mut bytes = Vec::new();
        record.stream_data().unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"<html>apple</html>");
    }

    #[test]
    fn looks_up_links() {
        let dir = tempfile::tempdir().unwrap();
        let shard = Arc::new(EosShard::open(&write_sample(dir.path()), None).unwrap());

        assert_eq!(
            shard.test_link("https://example.com/apple").as_deref(),
            Some(format!("ekn:///{}", hash(1)).as_str())
        );
        assert_eq!(shard.test_link("https://example.com/pear"), None);
    }

    #[test]
    fn offset_defaults_to_none_without_manifest_override() {
        let dir = tempfile::tempdir().unwrap();
        let shard = EosShard::open(&write_sample(dir.path()), None).unwrap();
        assert_eq!(shard.db_offset(), -1);

        let shard = EosShard::open(&write_sample(dir.path()), Some(64)).unwrap();
        assert_eq!(shard.db_offset(), 64);
    }

    #[test]
    fn rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-shard");
        std::fs::write(&path, b"something else entirely").unwrap();
        assert!(matches!(
            EosShard::open(&path, None),
            Err(Error::UnsupportedVersion(_))
        ));
    }
}
