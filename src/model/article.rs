use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::Content;

/// An article: long-form document content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Article {
    #[serde(flatten)]
    pub content: Content,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Dates or date ranges the article covers.
    #[serde(rename = "temporalCoverage", default)]
    pub temporal_coverage: Vec<String>,
    /// Ids of records this article links to.
    #[serde(rename = "outgoingLinks", default)]
    pub outgoing_links: Vec<String>,
    /// Structured table of contents, kept opaque for the renderer.
    #[serde(
        rename = "tableOfContents",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub table_of_contents: Option<Value>,
}
