use serde::{Deserialize, Serialize};

use super::media::Media;

/// An image record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Image {
    #[serde(flatten)]
    pub media: Media,
}
