/*! Openzim-style shard backend (manifest type `"openzim"`).

Entries are keyed `<namespace char>/<url>` and kept sorted for binary
search. A lookup landing on a redirect entry follows it to its target, one
hop. There is no per-record metadata document: models are synthesized from
the entry's namespace and mime type, with ids of the form
`ekn+zim:///<namespace>/<url>`. The full-text index blob is the payload of
the entry at [`FULLTEXT_INDEX_URL`]; its byte offset is this backend's
computed index offset.
!*/
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::eos::BlobRef;
use super::{DataStream, DbOffset, Shard, ShardRecord};
use crate::error::Error;
use crate::index::IndexData;
use crate::model::{Model, ARTICLE_OBJECT, CONTENT_OBJECT, IMAGE_OBJECT};

/// Fixed path of the embedded full-text index.
pub const FULLTEXT_INDEX_URL: &str = "X/fulltext/xapian";

const MAGIC: &[u8; 8] = b"EKNZIMF1";
const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntryTarget {
    Blob(BlobRef),
    /// Redirect to another entry key (`<namespace>/<url>`).
    Redirect(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZimEntry {
    pub namespace: char,
    pub url: String,
    pub title: String,
    pub mime_type: String,
    pub target: EntryTarget,
}

impl ZimEntry {
    fn key(&self) -> (char, &str) {
        (self.namespace, self.url.as_str())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Toc {
    entries: Vec<ZimEntry>,
}

struct ZimRecord {
    entry: ZimEntry,
    blob: BlobRef,
}

/// An openzim-style shard file, mapped once and shared by every reader.
pub struct ZimShard {
    path: PathBuf,
    map: Arc<Mmap>,
    entries: Vec<ZimEntry>,
    db_offset: DbOffset,
}

impl ZimShard {
    /// Opens and validates a shard file. Runs on a worker during domain
    /// initialization.
    pub fn open(path: &Path, db_offset_override: Option<i64>) -> Result<ZimShard, Error> {
        let file = File::open(path)?;
        let map = Arc::new(unsafe { Mmap::map(&file)? });

        if map.len() < HEADER_LEN || &map[..8] != MAGIC {
            return Err(Error::UnsupportedVersion(format!(
                "{} is not a supported zim file",
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

        Ok(ZimShard {
            path: path.to_path_buf(),
            map,
            entries: toc.entries,
            db_offset: DbOffset::new(db_offset_override),
        })
    }

    fn entry(&self, namespace: char, url: &str) -> Option<&ZimEntry> {
        self.entries
            .binary_search_by(|entry| entry.key().cmp(&(namespace, url)))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Resolves an object id to a blob-backed entry, following at most one
    /// redirect.
    fn resolve(&self, object_id: &str) -> Option<(ZimEntry, BlobRef)> {
        let (namespace, url) = object_id.split_once('/')?;
        let namespace = single_char(namespace)?;
        let entry = self.entry(namespace, url)?;

        let entry = match &entry.target {
            EntryTarget::Blob(_) => entry,
            EntryTarget::Redirect(target) => {
                let (namespace, url) = target.split_once('/')?;
                self.entry(single_char(namespace)?, url)?
            }
        };
        match entry.target {
            EntryTarget::Blob(blob) => Some((entry.clone(), blob)),
            EntryTarget::Redirect(_) => None,
        }
    }

    fn record_of<'a>(&self, record: &'a ShardRecord) -> Result<&'a ZimRecord, Error> {
        record.native::<ZimRecord>().ok_or_else(|| {
            Error::BadFormat(format!(
                "record does not belong to shard {}",
                self.path.display()
            ))
        })
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

impl Shard for ZimShard {
    fn path(&self) -> &Path {
        &self.path
    }

    fn find_by_id(self: Arc<Self>, object_id: &str) -> Option<ShardRecord> {
        let (entry, blob) = self.resolve(object_id)?;
        Some(ShardRecord::new(self, Box::new(ZimRecord { entry, blob })))
    }

    fn model(&self, record: &ShardRecord) -> Result<Model, Error> {
        let native = self.record_of(record)?;
        let entry = &native.entry;

        let (discriminator, tags) = match entry.namespace {
            'A' => (ARTICLE_OBJECT, vec!["EknArticleObject"]),
            'I' => (IMAGE_OBJECT, vec!["EknMediaObject"]),
            _ => (CONTENT_OBJECT, vec![]),
        };
        let node = json!({
            "@type": discriminator,
            "@id": format!("ekn+zim:///{}/{}", entry.namespace, entry.url),
            "title": entry.title,
            "contentType": entry.mime_type,
            "isServerTemplated": true,
            "tags": tags,
        });
        Model::from_json(&node)
    }

    fn stream_data(&self, record: &ShardRecord) -> Result<DataStream, Error> {
        let native = self.record_of(record)?;
        Ok(DataStream::new(
            self.map.clone(),
            native.blob.offset as usize,
            native.blob.size as usize,
        ))
    }

    fn data_size(&self, record: &ShardRecord) -> u64 {
        record
            .native::<ZimRecord>()
            .map(|native| native.blob.size)
            .unwrap_or(0)
    }

    fn test_link(&self, _link: &str) -> Option<String> {
        // zim files carry no link table
        None
    }

    fn compute_db_offset(&self) -> i64 {
        match self.resolve(FULLTEXT_INDEX_URL) {
            Some((_, blob)) => blob.offset as i64,
            None => {
                warn!(
                    "the full-text index for {} was not found",
                    self.path.display()
                );
                -1
            }
        }
    }

    fn db_offset(&self) -> i64 {
        self.db_offset.resolve(|| self.compute_db_offset())
    }
}

/// Writes openzim-style shard files; the counterpart of [`ZimShard`].
#[derive(Default)]
pub struct ZimWriter {
    entries: Vec<(char, String, String, String, Option<Vec<u8>>, Option<String>)>,
    index: Option<IndexData>,
}

impl ZimWriter {
    pub fn new() -> ZimWriter {
        ZimWriter::default()
    }

    pub fn add_entry(&mut self, namespace: char, url: &str, title: &str, mime: &str, data: &[u8]) {
        self.entries.push((
            namespace,
            url.to_string(),
            title.to_string(),
            mime.to_string(),
            Some(data.to_vec()),
            None,
        ));
    }

    /// Adds a redirect entry pointing at `target` (`<namespace>/<url>`).
    pub fn add_redirect(&mut self, namespace: char, url: &str, title: &str, target: &str) {
        self.entries.push((
            namespace,
            url.to_string(),
            title.to_string(),
            String::new(),
            None,
            Some(target.to_string()),
        ));
    }

    /// Embeds the full-text index as the entry at [`FULLTEXT_INDEX_URL`].
    pub fn set_index(&mut self, index: IndexData) {
        self.index = Some(index);
    }

    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        let mut blob_bytes: Vec<u8> = Vec::new();
        let mut entries: Vec<ZimEntry> = Vec::new();

        let append = |bytes: &[u8], blob_bytes: &mut Vec<u8>| -> BlobRef {
            let blob = BlobRef {
                offset: (HEADER_LEN + blob_bytes.len()) as u64,
                size: bytes.len() as u64,
            };
            blob_bytes.extend_from_slice(bytes);
            blob
        };

        for (namespace, url, title, mime, data, redirect) in &self.entries {
            let target = match (data, redirect) {
                (Some(bytes), _) => EntryTarget::Blob(append(bytes, &mut blob_bytes)),
                (None, Some(target)) => EntryTarget::Redirect(target.clone()),
                (None, None) => continue,
            };
            entries.push(ZimEntry {
                namespace: *namespace,
                url: url.clone(),
                title: title.clone(),
                mime_type: mime.clone(),
                target,
            });
        }

        if let Some(index) = &self.index {
            let bytes = index.to_bytes()?;
            entries.push(ZimEntry {
                namespace: 'X',
                url: "fulltext/xapian".to_string(),
                title: String::new(),
                mime_type: "application/octet-stream".to_string(),
                target: EntryTarget::Blob(append(&bytes, &mut blob_bytes)),
            });
        }

        entries.sort_by(|a, b| a.key().cmp(&b.key()));
        let toc = Toc { entries };
        let toc_bytes =
            bincode::serialize(&toc).map_err(|e| Error::BadFormat(e.to_string()))?;

        let toc_offset = (HEADER_LEN + blob_bytes.len()) as u64;
        let mut file = File::create(path)?;
        file.write_all(MAGIC)?;
        file.write_all(&toc_offset.to_le_bytes())?;
        file.write_all(&blob_bytes)?;
        file.write_all(&toc_bytes)?;
        Ok(())
    }
}
