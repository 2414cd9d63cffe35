use serde::{Deserialize, Serialize};

use super::content::Content;

/// Base class for embeddable media records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Media {
    #[serde(flatten)]
    pub content: Content,
    /// Displayable caption, in the same language as the media.
    #[serde(default)]
    pub caption: String,
    /// Width in pixels.
    #[serde(default)]
    pub width: u32,
    /// Height in pixels.
    #[serde(default)]
    pub height: u32,
    /// URI of the content object that embeds this media.
    #[serde(rename = "parent", default, skip_serializing_if = "Option::is_none")]
    pub parent_uri: Option<String>,
}
