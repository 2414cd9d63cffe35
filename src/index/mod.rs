/*! Embedded full-text index.

Every shard may carry an index blob at some byte offset; this module reads
those blobs, federates them into one [`Database`], and evaluates parsed
[`Query`] trees against it with relevance weighting, value-slot sorting,
cutoff filtering and paging. [`QueryParser`] turns free text into query
trees (prefixes, stop words, stemming, wildcard expansion) and produces
spelling corrections from the indexed dictionary. [`IndexBuilder`] writes
blobs; the content pipeline and the test fixtures share it.
!*/
mod data;
mod db;
mod parser;
mod query;
mod writer;

pub use data::{
    DocumentData, IndexData, Posting, VALUE_DATE, VALUE_SEQUENCE_NUMBER, VALUE_TITLE,
};
pub use db::{Database, Enquire, MSet, Match};
pub use parser::{ParseFlags, QueryParser, StemStrategy};
pub use query::Query;
pub use writer::{exact_title_term, IndexBuilder, IndexableDocument};
