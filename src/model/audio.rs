use serde::{Deserialize, Serialize};

use super::media::Media;

/// An audio record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Audio {
    #[serde(flatten)]
    pub media: Media,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: u32,
    /// Transcript, in the same language as the audio.
    #[serde(default)]
    pub transcript: String,
}
