use serde::{Deserialize, Serialize};

use super::content::Content;

/// A set groups other content objects by tag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Set {
    #[serde(flatten)]
    pub content: Content,
    /// Objects tagged with any of these belong to the set.
    #[serde(rename = "childTags", default)]
    pub child_tags: Vec<String>,
}
