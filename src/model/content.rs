use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};

fn default_true() -> bool {
    true
}

/// Sentinel meaning "no position in a sequence".
pub const SEQUENCE_NUMBER_UNSET: u32 = u32::MAX;

fn default_sequence_number() -> u32 {
    SEQUENCE_NUMBER_UNSET
}

/// Base property bag shared by every content object.
///
/// Instances are snapshots of per-record metadata: they are built by the
/// parser and never updated afterwards. `id` always satisfies
/// [`crate::utils::is_valid_id`] for records coming out of a shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "@id", default)]
    pub id: String,
    /// Mimetype of the source content.
    #[serde(rename = "contentType", default)]
    pub content_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "originalTitle", default)]
    pub original_title: String,
    /// URI where the original version of this content can be downloaded.
    /// Distinct from `source_uri`, which is where the content was fetched
    /// from while the database was built.
    #[serde(rename = "originalURI", default)]
    pub original_uri: String,
    /// Usually the id of an image record.
    #[serde(rename = "thumbnail", default)]
    pub thumbnail_uri: String,
    #[serde(default)]
    pub language: String,
    #[serde(rename = "copyrightHolder", default)]
    pub copyright_holder: String,
    #[serde(rename = "sourceURI", default)]
    pub source_uri: String,
    #[serde(default)]
    pub synopsis: String,
    /// ISO-8601 date of last modification.
    #[serde(rename = "lastModifiedDate", default)]
    pub last_modified_date: String,
    #[serde(default)]
    pub license: String,
    /// Whether this content should be given priority in the UI.
    #[serde(default)]
    pub featured: bool,
    #[serde(rename = "canPrint", default = "default_true")]
    pub can_print: bool,
    #[serde(rename = "canExport", default = "default_true")]
    pub can_export: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ids of related records. References only; a missing resource is a
    /// lookup miss, never a dangling pointer.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Opaque blob consumed by the discovery feed generator.
    #[serde(
        rename = "discoveryFeedContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub discovery_feed_content: Option<Value>,
    /// Position of the object in a sequence of objects.
    #[serde(rename = "sequenceNumber", default = "default_sequence_number")]
    pub sequence_number: u32,
}

impl Default for Content {
    fn default() -> Content {
        Content {
            id: String::new(),
            content_type: String::new(),
            title: String::new(),
            original_title: String::new(),
            original_uri: String::new(),
            thumbnail_uri: String::new(),
            language: String::new(),
            copyright_holder: String::new(),
            source_uri: String::new(),
            synopsis: String::new(),
            last_modified_date: String::new(),
            license: String::new(),
            featured: false,
            can_print: true,
            can_export: true,
            tags: Vec::new(),
            resources: Vec::new(),
            discovery_feed_content: None,
            sequence_number: SEQUENCE_NUMBER_UNSET,
        }
    }
}

/// Deterministic stand-in id for records that carry none.
///
/// Production records always carry an id; this keeps the "every model has a
/// well-formed id" invariant alive for hand-built test records.
pub(crate) fn synthetic_id() -> String {
    static MOCKED_OBJECTS: AtomicU64 = AtomicU64::new(0);
    let n = MOCKED_OBJECTS.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha1::new();
    hasher.update(n.to_le_bytes());
    format!("ekn:///{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_valid_id;

    #[test]
    fn synthetic_ids_are_valid_and_distinct() {
        let a = synthetic_id();
        let b = synthetic_id();
        assert!(is_valid_id(&a));
        assert!(is_valid_id(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn defaults_match_unset_record() {
        let content = Content::default();
        assert!(content.can_print);
        assert!(content.can_export);
        assert!(!content.featured);
        assert_eq!(content.sequence_number, SEQUENCE_NUMBER_UNSET);
    }
}
