use std::collections::HashMap;
use std::sync::Arc;

use rust_stemmers::Stemmer;

use super::data::{
    DocumentData, IndexData, Posting, VALUE_DATE, VALUE_SEQUENCE_NUMBER, VALUE_TITLE,
};
use super::parser::tokenize;

/// Shortest word kept in the spelling dictionary.
const MIN_SPELLING_LEN: usize = 2;

/// Everything the index stores about one record.
#[derive(Debug, Clone, Default)]
pub struct IndexableDocument {
    /// Record identifier handed back at hydration time.
    pub data: String,
    /// Id filter term source (`Q` prefix).
    pub id: String,
    pub title: String,
    pub synopsis: String,
    pub tags: Vec<String>,
    pub content_type: String,
    pub sequence_number: Option<u32>,
    /// ISO-8601 modification date.
    pub date: Option<String>,
}

/// Exact-title term for a piece of text: `XEXACTS` + lowercase tokens
/// joined by underscores. Shared between indexing and query rendering.
pub fn exact_title_term(text: &str) -> String {
    format!("XEXACTS{}", tokenize(text).join("_"))
}

/// Builds one shard's index blob.
///
/// Term conventions: free text raw-lowercase plus `Z`-stemmed, titles under
/// `S`/`ZS`, exact titles under `XEXACTS`, tags under `K`, ids under `Q`,
/// content types under `T`.
#[derive(Default)]
pub struct IndexBuilder {
    data: IndexData,
    stemmer: Option<Arc<Stemmer>>,
}

impl IndexBuilder {
    pub fn new() -> IndexBuilder {
        IndexBuilder::default()
    }

    /// Stems free-text and title terms while indexing, so stemmed queries
    /// land. Without a stemmer only raw terms are generated.
    pub fn set_stemmer(&mut self, stemmer: Option<Arc<Stemmer>>) {
        self.stemmer = stemmer;
    }

    pub fn set_metadata(&mut self, key: &str, value: &str) {
        self.data
            .metadata
            .insert(key.to_string(), value.to_string());
    }

    /// Adds one document and returns its docid within this blob.
    pub fn add_document(&mut self, doc: &IndexableDocument) -> u32 {
        let docid = self.data.docs.len() as u32;

        let mut values = std::collections::BTreeMap::new();
        if let Some(sequence) = doc.sequence_number {
            values.insert(VALUE_SEQUENCE_NUMBER, format!("{sequence:020}"));
        }
        if let Some(date) = &doc.date {
            values.insert(VALUE_DATE, date.clone());
        }
        if !doc.title.is_empty() {
            values.insert(VALUE_TITLE, doc.title.to_lowercase());
        }
        self.data.docs.push(DocumentData {
            data: doc.data.clone(),
            values,
        });

        let mut terms: HashMap<String, u32> = HashMap::new();
        let mut bump = |term: String| *terms.entry(term).or_insert(0) += 1;

        for token in tokenize(&doc.title) {
            bump(format!("S{token}"));
            bump(token.clone());
            if let Some(stemmer) = &self.stemmer {
                let stem = stemmer.stem(&token);
                bump(format!("ZS{stem}"));
                bump(format!("Z{stem}"));
            }
        }
        for token in tokenize(&doc.synopsis) {
            bump(token.clone());
            if let Some(stemmer) = &self.stemmer {
                bump(format!("Z{}", stemmer.stem(&token)));
            }
        }
        if !doc.title.is_empty() {
            bump(exact_title_term(&doc.title));
        }
        for tag in &doc.tags {
            bump(format!("K{tag}"));
        }
        if !doc.id.is_empty() {
            bump(format!("Q{}", doc.id));
        }
        if !doc.content_type.is_empty() {
            bump(format!("T{}", doc.content_type));
        }

        for (term, wdf) in terms {
            self.data
                .postings
                .entry(term)
                .or_default()
                .push(Posting { docid, wdf });
        }

        for token in tokenize(&doc.title).into_iter().chain(tokenize(&doc.synopsis)) {
            if token.len() >= MIN_SPELLING_LEN {
                *self.data.spellings.entry(token).or_insert(0) += 1;
            }
        }

        docid
    }

    pub fn build(mut self) -> IndexData {
        // postings were appended in docid order per term, keep that invariant
        for postings in self.data.postings.values_mut() {
            postings.sort_by_key(|p| p.docid);
        }
        self.data
    }
}
