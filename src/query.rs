/*! Declarative search requests.

A [`Query`] is an immutable description of one search: free text, tag and
id filters, match and sort configuration, and paging. Construction goes
through [`QueryBuilder`]; deriving a variant of an existing query is
copy-on-modify via [`Query::to_builder`].

Rendering into the index query language happens in
[`Query::to_index_query`]; the textual dump of [`std::fmt::Display`] is
stable and byte-identical for identical inputs.
!*/
use std::fmt;

use crate::index;
use crate::index::{
    exact_title_term, ParseFlags, QueryParser, VALUE_DATE, VALUE_SEQUENCE_NUMBER, VALUE_TITLE,
};

/// Weight boost of the exact-title clause relative to parsed text terms.
const EXACT_TITLE_WEIGHT: f64 = 10.0;

/// Whether free text matches partially typed words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Queries match partially typed words; `dragonba` finds Dragonball.
    Incremental,
    /// Queries are assumed to be entire words.
    Delimited,
}

/// Which document fields free text is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMatch {
    /// Only titles match the query string.
    OnlyTitle,
    /// Titles and synopses match the query string.
    TitleSynopsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySort {
    /// Relevance ranking; exact title matches weigh most.
    Relevance,
    /// Position of the record in its sequence.
    SequenceNumber,
    /// Modification date.
    Date,
    /// Title.
    Alphabetical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrder {
    Ascending,
    Descending,
}

/// An immutable search request.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    app_id: String,
    search_terms: String,
    stopword_free_terms: Option<String>,
    corrected_terms: Option<String>,
    mode: QueryMode,
    match_type: QueryMatch,
    sort: QuerySort,
    order: QueryOrder,
    /// Minimum relevance as a percentage of the best match.
    cutoff: u32,
    offset: u32,
    limit: u32,
    tags_match_all: Vec<String>,
    tags_match_any: Vec<String>,
    excluded_tags: Vec<String>,
    ids: Vec<String>,
    excluded_ids: Vec<String>,
    content_type: String,
    excluded_content_type: String,
}

impl Default for Query {
    fn default() -> Query {
        Query {
            app_id: String::new(),
            search_terms: String::new(),
            stopword_free_terms: None,
            corrected_terms: None,
            mode: QueryMode::Incremental,
            match_type: QueryMatch::OnlyTitle,
            sort: QuerySort::Relevance,
            order: QueryOrder::Ascending,
            cutoff: 0,
            offset: 0,
            limit: 10,
            tags_match_all: Vec::new(),
            tags_match_any: Vec::new(),
            excluded_tags: Vec::new(),
            ids: Vec::new(),
            excluded_ids: Vec::new(),
            content_type: String::new(),
            excluded_content_type: String::new(),
        }
    }
}

impl Query {
    pub fn builder() -> QueryBuilder {
        QueryBuilder {
            query: Query::default(),
        }
    }

    /// Copy-on-modify: a builder seeded with every field of `self`.
    pub fn to_builder(&self) -> QueryBuilder {
        QueryBuilder {
            query: self.clone(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn search_terms(&self) -> &str {
        &self.search_terms
    }

    pub fn stopword_free_terms(&self) -> Option<&str> {
        self.stopword_free_terms.as_deref()
    }

    pub fn corrected_terms(&self) -> Option<&str> {
        self.corrected_terms.as_deref()
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn match_type(&self) -> QueryMatch {
        self.match_type
    }

    pub fn sort(&self) -> QuerySort {
        self.sort
    }

    pub fn order(&self) -> QueryOrder {
        self.order
    }

    pub fn cutoff(&self) -> u32 {
        self.cutoff
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn tags_match_all(&self) -> &[String] {
        &self.tags_match_all
    }

    pub fn tags_match_any(&self) -> &[String] {
        &self.tags_match_any
    }

    pub fn excluded_tags(&self) -> &[String] {
        &self.excluded_tags
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn excluded_ids(&self) -> &[String] {
        &self.excluded_ids
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn excluded_content_type(&self) -> &str {
        &self.excluded_content_type
    }

    /// The text the index query is built from: corrected terms when
    /// present, stop-word-free terms next, the raw terms otherwise.
    pub(crate) fn effective_terms(&self) -> &str {
        self.corrected_terms
            .as_deref()
            .or(self.stopword_free_terms.as_deref())
            .unwrap_or(&self.search_terms)
    }

    fn sort_value(&self) -> Option<u32> {
        match self.sort {
            QuerySort::Relevance => None,
            QuerySort::SequenceNumber => Some(VALUE_SEQUENCE_NUMBER),
            QuerySort::Date => Some(VALUE_DATE),
            QuerySort::Alphabetical => Some(VALUE_TITLE),
        }
    }

    /// Applies sort column, order and relevance cutoff.
    pub(crate) fn configure_enquire(&self, enquire: &mut index::Enquire<'_>) {
        if let Some(slot) = self.sort_value() {
            enquire.set_sort_by_value(slot, self.order == QueryOrder::Descending);
        }
        if self.cutoff > 0 {
            enquire.set_cutoff(self.cutoff);
        }
    }

    /// Renders the request into the index query language.
    pub(crate) fn to_index_query(
        &self,
        parser: &QueryParser,
        db: &index::Database,
    ) -> index::Query {
        let mut clauses: Vec<index::Query> = Vec::new();

        let terms = self.effective_terms();
        if !terms.trim().is_empty() {
            let fields: &[&str] = match self.match_type {
                QueryMatch::OnlyTitle => &["title"],
                QueryMatch::TitleSynopsis => &["", "title"],
            };
            let flags = ParseFlags {
                wildcard: self.mode == QueryMode::Incremental,
            };
            let parsed = parser.parse_query(db, terms, fields, flags);
            let exact = index::Query::Scale(
                EXACT_TITLE_WEIGHT,
                Box::new(index::Query::term(exact_title_term(terms))),
            );
            clauses.push(index::Query::or(vec![exact, parsed]));
        }

        let tag_prefix = parser.boolean_prefix("tag").unwrap_or("K").to_string();
        let id_prefix = parser.boolean_prefix("id").unwrap_or("Q").to_string();
        let content_type_prefix = "T";

        if !self.tags_match_all.is_empty() {
            clauses.push(index::Query::and(
                self.tags_match_all
                    .iter()
                    .map(|tag| index::Query::term(format!("{tag_prefix}{tag}")))
                    .collect(),
            ));
        }
        if !self.tags_match_any.is_empty() {
            clauses.push(index::Query::or(
                self.tags_match_any
                    .iter()
                    .map(|tag| index::Query::term(format!("{tag_prefix}{tag}")))
                    .collect(),
            ));
        }
        if !self.ids.is_empty() {
            clauses.push(index::Query::or(
                self.ids
                    .iter()
                    .map(|id| index::Query::term(format!("{id_prefix}{id}")))
                    .collect(),
            ));
        }
        if !self.content_type.is_empty() {
            clauses.push(index::Query::term(format!(
                "{content_type_prefix}{}",
                self.content_type
            )));
        }

        let positive = index::Query::and(clauses);

        let mut negatives: Vec<index::Query> = Vec::new();
        negatives.extend(
            self.excluded_tags
                .iter()
                .map(|tag| index::Query::term(format!("{tag_prefix}{tag}"))),
        );
        negatives.extend(
            self.excluded_ids
                .iter()
                .map(|id| index::Query::term(format!("{id_prefix}{id}"))),
        );
        if !self.excluded_content_type.is_empty() {
            negatives.push(index::Query::term(format!(
                "{content_type_prefix}{}",
                self.excluded_content_type
            )));
        }

        if negatives.is_empty() {
            positive
        } else {
            index::Query::AndNot(Box::new(positive), Box::new(index::Query::or(negatives)))
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Query {{ app-id: {:?}, search-terms: {:?}, stopword-free-terms: {:?}, \
             corrected-terms: {:?}, mode: {:?}, match: {:?}, sort: {:?}, order: {:?}, \
             cutoff: {}, offset: {}, limit: {}, tags-match-all: {:?}, tags-match-any: {:?}, \
             excluded-tags: {:?}, ids: {:?}, excluded-ids: {:?}, content-type: {:?}, \
             excluded-content-type: {:?} }}",
            self.app_id,
            self.search_terms,
            self.stopword_free_terms,
            self.corrected_terms,
            self.mode,
            self.match_type,
            self.sort,
            self.order,
            self.cutoff,
            self.offset,
            self.limit,
            self.tags_match_all,
            self.tags_match_any,
            self.excluded_tags,
            self.ids,
            self.excluded_ids,
            self.content_type,
            self.excluded_content_type,
        )
    }
}

/// Builder for [`Query`]; every setter overrides one field.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.query.app_id = app_id.into();
        self
    }

    pub fn search_terms(mut self, terms: impl Into<String>) -> Self {
        self.query.search_terms = terms.into();
        self
    }

    pub fn stopword_free_terms(mut self, terms: impl Into<String>) -> Self {
        self.query.stopword_free_terms = Some(terms.into());
        self
    }

    pub fn corrected_terms(mut self, terms: impl Into<String>) -> Self {
        self.query.corrected_terms = Some(terms.into());
        self
    }

    pub fn mode(mut self, mode: QueryMode) -> Self {
        self.query.mode = mode;
        self
    }

    pub fn match_type(mut self, match_type: QueryMatch) -> Self {
        self.query.match_type = match_type;
        self
    }

    pub fn sort(mut self, sort: QuerySort) -> Self {
        self.query.sort = sort;
        self
    }

    pub fn order(mut self, order: QueryOrder) -> Self {
        self.query.order = order;
        self
    }

    pub fn cutoff(mut self, cutoff: u32) -> Self {
        self.query.cutoff = cutoff;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.query.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.query.limit = limit;
        self
    }

    pub fn tags_match_all(mut self, tags: Vec<String>) -> Self {
        self.query.tags_match_all = tags;
        self
    }

    pub fn tags_match_any(mut self, tags: Vec<String>) -> Self {
        self.query.tags_match_any = tags;
        self
    }

    pub fn excluded_tags(mut self, tags: Vec<String>) -> Self {
        self.query.excluded_tags = tags;
        self
    }

    pub fn ids(mut self, ids: Vec<String>) -> Self {
        self.query.ids = ids;
        self
    }

    pub fn excluded_ids(mut self, ids: Vec<String>) -> Self {
        self.query.excluded_ids = ids;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.query.content_type = content_type.into();
        self
    }

    pub fn excluded_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.query.excluded_content_type = content_type.into();
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}
