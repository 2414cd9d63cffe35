use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Value slot holding the zero-padded sequence number.
pub const VALUE_SEQUENCE_NUMBER: u32 = 0;
/// Value slot holding the ISO-8601 modification date.
pub const VALUE_DATE: u32 = 1;
/// Value slot holding the lower-cased title.
pub const VALUE_TITLE: u32 = 2;

/// One posting of a term inside one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub docid: u32,
    /// Within-document frequency.
    pub wdf: u32,
}

/// Per-document payload of the index.
///
/// `data` carries the record identifier the document hydrates into; `values`
/// are the sortable columns keyed by slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentData {
    pub data: String,
    pub values: BTreeMap<u32, String>,
}

/// One shard's index blob: the tables serialized at some byte offset inside
/// the shard file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexData {
    pub docs: Vec<DocumentData>,
    /// Term dictionary with postings sorted by docid.
    pub postings: BTreeMap<String, Vec<Posting>>,
    /// Spelling dictionary: word to corpus frequency.
    pub spellings: BTreeMap<String, u32>,
    /// String-keyed metadata table.
    pub metadata: BTreeMap<String, String>,
}

impl IndexData {
    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        bincode::serialize(self).map_err(|e| Error::DatabaseInvalid(e.to_string()))
    }

    /// Decodes an index blob from a byte slice. Trailing bytes after the
    /// tables are allowed, so a slice running to the end of the shard file
    /// is fine.
    pub fn from_bytes(bytes: &[u8]) -> Result<IndexData, Error> {
        bincode::deserialize(bytes).map_err(|e| Error::DatabaseInvalid(e.to_string()))
    }

    /// Reads an index blob embedded in `path` at `offset`.
    pub fn read_from(path: &Path, offset: u64) -> Result<IndexData, Error> {
        let mut file = File::open(path).map_err(|e| {
            Error::DatabaseInvalid(format!("cannot open {}: {e}", path.display()))
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let offset = offset as usize;
        if offset >= bytes.len() {
            return Err(Error::DatabaseInvalid(format!(
                "index offset {offset} is past the end of {}",
                path.display()
            )));
        }
        IndexData::from_bytes(&bytes[offset..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        let mut data = IndexData::default();
        data.docs.push(DocumentData {
            data: "ekn:///0000000000000000000000000000000000000000".into(),
            values: BTreeMap::from([(VALUE_TITLE, "apple".to_string())]),
        });
        data.postings
            .insert("Sapple".into(), vec![Posting { docid: 0, wdf: 1 }]);
        data.spellings.insert("apple".into(), 1);
        data.metadata.insert("XbStopwords".into(), "[]".into());

        let bytes = data.to_bytes().unwrap();
        let back = IndexData::from_bytes(&bytes).unwrap();
        assert_eq!(back.doc_count(), 1);
        assert_eq!(back.postings["Sapple"], data.postings["Sapple"]);
        assert_eq!(back.metadata["XbStopwords"], "[]");
    }

    #[test]
    fn tolerates_trailing_bytes() {
        let data = IndexData::default();
        let mut bytes = data.to_bytes().unwrap();
        bytes.extend_from_slice(b"trailing garbage");
        assert!(IndexData::from_bytes(&bytes).is_ok());
    }

    #[test]
    fn offset_past_eof_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, b"tiny").unwrap();
        assert!(matches!(
            IndexData::read_from(&path, 4096),
            Err(Error::DatabaseInvalid(_))
        ));
    }
}
