use serde::{Deserialize, Serialize};

use super::content::Content;

/// A dictionary entry. Carries only the base property bag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DictionaryEntry {
    #[serde(flatten)]
    pub content: Content,
}
