use serde::{Deserialize, Serialize};

use super::media::Media;

/// A video record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Video {
    #[serde(flatten)]
    pub media: Media,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: u32,
    /// Transcript, in the same language as the video.
    #[serde(default)]
    pub transcript: String,
    /// URI of the poster image, usually the id of an image record.
    #[serde(rename = "poster", default)]
    pub poster_uri: String,
}
