use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rust_stemmers::Stemmer;

use super::db::Database;
use super::query::Query;

/// How many terms a trailing wildcard may expand into.
const WILDCARD_EXPANSION_LIMIT: usize = 100;

/// Maximum edit distance accepted by the spelling corrector.
const MAX_EDIT_DISTANCE: usize = 2;

/// Words shorter than this are never "corrected"; almost everything is
/// within two edits of a two-letter fragment.
const MIN_CORRECTABLE_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemStrategy {
    /// No stemmed term generation.
    None,
    /// Free-text terms match both their raw and their stemmed form.
    StemSome,
}

/// Flags steering one parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseFlags {
    /// Treat the final token as a prefix and expand it over the term
    /// dictionary.
    pub wildcard: bool,
}

/// Splits free text into lowercase word tokens.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Turns free text and structured field references into [`Query`] trees.
///
/// Prefix configuration mirrors the index metadata: free-text fields map to
/// term prefixes (`title` to `S`), boolean fields to filter prefixes (`tag`
/// to `K`). The stop-word set, the stemmer and the stemming strategy are
/// installed by the database manager before each use.
pub struct QueryParser {
    prefixes: BTreeMap<String, String>,
    boolean_prefixes: BTreeMap<String, String>,
    stopwords: HashSet<String>,
    stemmer: Option<Arc<Stemmer>>,
    strategy: StemStrategy,
}

impl Default for QueryParser {
    fn default() -> QueryParser {
        QueryParser::new()
    }
}

impl QueryParser {
    pub fn new() -> QueryParser {
        QueryParser {
            prefixes: BTreeMap::new(),
            boolean_prefixes: BTreeMap::new(),
            stopwords: HashSet::new(),
            stemmer: None,
            strategy: StemStrategy::None,
        }
    }

    pub fn add_prefix(&mut self, field: &str, prefix: &str) {
        self.prefixes.insert(field.to_string(), prefix.to_string());
    }

    pub fn add_boolean_prefix(&mut self, field: &str, prefix: &str) {
        self.boolean_prefixes
            .insert(field.to_string(), prefix.to_string());
    }

    pub fn prefix(&self, field: &str) -> Option<&str> {
        self.prefixes.get(field).map(String::as_str)
    }

    pub fn boolean_prefix(&self, field: &str) -> Option<&str> {
        self.boolean_prefixes.get(field).map(String::as_str)
    }

    pub fn set_stopwords<I>(&mut self, words: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.stopwords = words.into_iter().collect();
    }

    pub fn has_stopper(&self) -> bool {
        !self.stopwords.is_empty()
    }

    pub fn is_stop_term(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    pub fn set_stemmer(&mut self, stemmer: Option<Arc<Stemmer>>) {
        self.stemmer = stemmer;
    }

    pub fn set_stemming_strategy(&mut self, strategy: StemStrategy) {
        self.strategy = strategy;
    }

    fn stem(&self, token: &str) -> Option<String> {
        match (self.strategy, &self.stemmer) {
            (StemStrategy::StemSome, Some(stemmer)) => {
                Some(stemmer.stem(token).into_owned())
            }
            _ => None,
        }
    }

    /// Parses free text into a query over the given fields. An empty field
    /// name stands for the default (unprefixed) text; any other name is
    /// resolved through the registered prefixes.
    pub fn parse_query(
        &self,
        db: &Database,
        text: &str,
        fields: &[&str],
        flags: ParseFlags,
    ) -> Query {
        let mut tokens = tokenize(text);
        tokens.retain(|t| !self.is_stop_term(t));
        if tokens.is_empty() {
            return Query::MatchNothing;
        }

        let last = tokens.len() - 1;
        let clauses = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let mut alternatives = Vec::new();
                for field in fields {
                    let prefix = if field.is_empty() {
                        ""
                    } else {
                        self.prefix(field).unwrap_or(field)
                    };
                    if flags.wildcard && i == last {
                        for term in
                            db.expand_wildcard(&format!("{prefix}{token}"), WILDCARD_EXPANSION_LIMIT)
                        {
                            alternatives.push(Query::Term(term));
                        }
                    } else {
                        alternatives.push(Query::term(format!("{prefix}{token}")));
                        if let Some(stem) = self.stem(token) {
                            alternatives.push(Query::term(format!("Z{prefix}{stem}")));
                        }
                    }
                }
                Query::or(alternatives)
            })
            .collect();

        Query::and(clauses)
    }

    /// Spell-corrected version of `text`, or an empty string when no word
    /// was replaced. Unknown words are replaced by the closest spelling
    /// dictionary entry within two edits, ties broken by corpus frequency.
    pub fn corrected_query_string(&self, db: &Database, text: &str) -> String {
        let mut changed = false;
        let corrected: Vec<String> = text
            .split_whitespace()
            .map(|word| {
                let lower = word.to_lowercase();
                if lower.len() < MIN_CORRECTABLE_LEN || db.has_spelling(&lower) {
                    return word.to_string();
                }
                match best_spelling_candidate(db, &lower) {
                    Some(candidate) if candidate != lower => {
                        changed = true;
                        candidate
                    }
                    _ => word.to_string(),
                }
            })
            .collect();

        if changed {
            corrected.join(" ")
        } else {
            String::new()
        }
    }
}

fn best_spelling_candidate(db: &Database, word: &str) -> Option<String> {
    let mut best: Option<(usize, u32, &str)> = None;
    for (candidate, frequency) in db.spelling_entries() {
        if candidate.len().abs_diff(word.len()) > MAX_EDIT_DISTANCE {
            continue;
        }
        let distance = strsim::levenshtein(word, candidate);
        if distance == 0 || distance > MAX_EDIT_DISTANCE {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_distance, best_frequency, _)) => {
                distance < best_distance
                    || (distance == best_distance && frequency > best_frequency)
            }
        };
        if better {
            best = Some((distance, frequency, candidate));
        }
    }
    best.map(|(_, _, candidate)| candidate.to_string())
}
