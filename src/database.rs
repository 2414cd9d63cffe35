/*! Federation of per-shard search indices into one queryable database.

The [`DatabaseManager`] owns the federated [`index::Database`] and its
[`index::QueryParser`]. Both are created lazily on first use: every shard
contributes the index blob at its reported offset, then the prefix and
stop-word metadata stored in the index configure the parser. Registration
failures are logged and downgraded; the database stays queryable with
standard defaults.
!*/
use std::collections::HashMap;
use std::sync::Arc;

use rust_stemmers::{Algorithm, Stemmer};
use serde::Deserialize;

use crate::error::Error;
use crate::index;
use crate::index::{IndexData, StemStrategy};
use crate::query::Query;
use crate::shard::Shard;

/// Index metadata key holding the prefix association JSON.
pub const PREFIX_METADATA_KEY: &str = "XbPrefixes";
/// Index metadata key holding the stop-word JSON array.
pub const STOPWORDS_METADATA_KEY: &str = "XbStopwords";

#[derive(Debug, Deserialize)]
struct PrefixEntry {
    field: String,
    prefix: String,
}

#[derive(Debug, Default, Deserialize)]
struct PrefixMap {
    #[serde(default)]
    prefixes: Vec<PrefixEntry>,
    #[serde(default, rename = "booleanPrefixes")]
    boolean_prefixes: Vec<PrefixEntry>,
}

struct DbState {
    database: index::Database,
    parser: index::QueryParser,
}

/// Serialized access to the federated index of one domain.
///
/// Not internally synchronized: the owning domain guards it with its index
/// lock.
pub struct DatabaseManager {
    shards: Vec<Arc<dyn Shard>>,
    /// lang name to stemmer; "none" is always present
    stemmers: HashMap<String, Option<Arc<Stemmer>>>,
    state: Option<DbState>,
}

impl DatabaseManager {
    pub fn new(shards: Vec<Arc<dyn Shard>>) -> DatabaseManager {
        let mut stemmers: HashMap<String, Option<Arc<Stemmer>>> = HashMap::new();
        stemmers.insert("none".to_string(), None);
        DatabaseManager {
            shards,
            stemmers,
            state: None,
        }
    }

    fn ensure_db(&mut self) -> Result<(), Error> {
        if self.state.is_some() {
            return Ok(());
        }

        let mut database = index::Database::new();
        for shard in &self.shards {
            let offset = shard.db_offset();
            if offset < 0 {
                continue;
            }
            let data = IndexData::read_from(shard.path(), offset as u64).map_err(|e| {
                Error::DatabaseInvalid(format!(
                    "index of {}: {e}",
                    shard.path().display()
                ))
            })?;
            database.add_index(data);
        }

        let mut parser = index::QueryParser::new();
        if let Err(message) = register_prefixes(&mut parser, &database) {
            // Non-fatal
            warn!("could not register database prefixes: {message}");
        }
        if let Err(message) = register_stopwords(&mut parser, &database) {
            // Non-fatal
            warn!("could not add database stop words: {message}");
        }

        self.state = Some(DbState { database, parser });
        Ok(())
    }

    fn state_mut(&mut self) -> Result<&mut DbState, Error> {
        match self.state.as_mut() {
            Some(state) => Ok(state),
            None => Err(Error::DatabaseInvalid(
                "search database was not initialized".to_string(),
            )),
        }
    }

    /// Derives the two corrected variants of a free-text query: the terms
    /// with stop words removed, and the terms with spelling fixes applied
    /// to the original string. Either is `None` when nothing changed.
    pub fn fix_query(
        &mut self,
        search_terms: &str,
    ) -> Result<(Option<String>, Option<String>), Error> {
        self.ensure_db()?;
        let state = self.state_mut()?;

        let stop_fixed = if state.parser.has_stopper() {
            let filtered: Vec<&str> = search_terms
                .split(' ')
                .filter(|word| !state.parser.is_stop_term(word))
                .collect();
            let filtered = filtered.join(" ");
            if filtered != search_terms {
                Some(filtered)
            } else {
                None
            }
        } else {
            None
        };

        // Older databases carried spelling entries with trailing newlines;
        // collapsing whitespace runs scrubs any that leak into corrections.
        let corrected = state
            .parser
            .corrected_query_string(&state.database, search_terms);
        let spell_fixed = if corrected.is_empty() {
            None
        } else {
            let trimmed: Vec<&str> = corrected.split_whitespace().collect();
            let trimmed = trimmed.join(" ");
            if trimmed != search_terms {
                Some(trimmed)
            } else {
                None
            }
        };

        debug!(
            "fix_query: search terms: {search_terms:?}, stop fixed: {stop_fixed:?}, \
             spell fixed: {spell_fixed:?}"
        );

        Ok((stop_fixed, spell_fixed))
    }

    /// Runs a query, stemming for `lang`, and returns the match window.
    pub fn query(&mut self, query: &Query, lang: &str) -> Result<index::MSet, Error> {
        self.ensure_db()?;
        let stemmer = self.stemmer_for(lang);
        let state = self.state_mut()?;

        if state.database.doc_count() == 0 {
            return Err(Error::DatabaseEmpty);
        }

        state.parser.set_stemmer(stemmer);
        state.parser.set_stemming_strategy(StemStrategy::StemSome);

        let mut enquire = state.database.enquire();
        query.configure_enquire(&mut enquire);

        debug!("{query}");
        let parsed = query.to_index_query(&state.parser, &state.database);
        debug!("{}", parsed.description());

        Ok(enquire.mset(&parsed, query.offset(), query.limit()))
    }

    fn stemmer_for(&mut self, lang: &str) -> Option<Arc<Stemmer>> {
        if let Some(cached) = self.stemmers.get(lang) {
            return cached.clone();
        }
        match stemmer_for_language(lang) {
            Some(stemmer) => {
                let stemmer = Arc::new(stemmer);
                self.stemmers
                    .insert(lang.to_string(), Some(stemmer.clone()));
                Some(stemmer)
            }
            None => {
                warn!("cannot create a stemmer for language {lang}");
                self.stemmers.get("none").cloned().flatten()
            }
        }
    }
}

fn stemmer_for_language(lang: &str) -> Option<Stemmer> {
    let algorithm = match lang {
        "ar" => Algorithm::Arabic,
        "da" => Algorithm::Danish,
        "nl" => Algorithm::Dutch,
        "en" => Algorithm::English,
        "fi" => Algorithm::Finnish,
        "fr" => Algorithm::French,
        "de" => Algorithm::German,
        "el" => Algorithm::Greek,
        "hu" => Algorithm::Hungarian,
        "it" => Algorithm::Italian,
        "no" | "nb" | "nn" => Algorithm::Norwegian,
        "pt" => Algorithm::Portuguese,
        "ro" => Algorithm::Romanian,
        "ru" => Algorithm::Russian,
        "es" => Algorithm::Spanish,
        "sv" => Algorithm::Swedish,
        "ta" => Algorithm::Tamil,
        "tr" => Algorithm::Turkish,
        _ => return None,
    };
    Some(Stemmer::create(algorithm))
}

/// Installs the prefix associations stored in the index metadata, or the
/// standard defaults when the metadata is missing or malformed.
fn register_prefixes(
    parser: &mut index::QueryParser,
    database: &index::Database,
) -> Result<(), String> {
    let raw = match database.metadata(PREFIX_METADATA_KEY) {
        Some(raw) => raw,
        None => {
            add_standard_prefixes(parser);
            return Err(format!("no {PREFIX_METADATA_KEY} metadata"));
        }
    };
    let map: PrefixMap = match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            add_standard_prefixes(parser);
            return Err(e.to_string());
        }
    };
    for entry in &map.prefixes {
        parser.add_prefix(&entry.field, &entry.prefix);
    }
    for entry in &map.boolean_prefixes {
        parser.add_boolean_prefix(&entry.field, &entry.prefix);
    }
    Ok(())
}

fn add_standard_prefixes(parser: &mut index::QueryParser) {
    for (field, prefix) in [("title", "S"), ("exact_title", "XEXACTS")] {
        parser.add_prefix(field, prefix);
    }
    for (field, prefix) in [("tag", "K"), ("id", "Q")] {
        parser.add_boolean_prefix(field, prefix);
    }
}

/// Installs the stop-word set stored in the index metadata. A missing key
/// is not an error; stop words are optional.
fn register_stopwords(
    parser: &mut index::QueryParser,
    database: &index::Database,
) -> Result<(), String> {
    let raw = match database.metadata(STOPWORDS_METADATA_KEY) {
        Some(raw) => raw,
        None => return Ok(()),
    };
    let words: Vec<String> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    // In older databases each stop word had a newline appended. This has
    // been fixed, but stripping them here avoids a mass content rebuild.
    parser.set_stopwords(
        words
            .into_iter()
            .map(|word| word.trim_end_matches('\n').to_string()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexBuilder, IndexableDocument};
    use crate::shard::eos::ShardWriter;
    use crate::shard::eos::EosShard;
    use serde_json::json;
    use std::path::Path;

    fn hash(n: u8) -> String {
        format!("{n:040x}")
    }

    fn write_shard(
        dir: &Path,
        titles: &[&str],
        metadata: &[(&str, &str)],
    ) -> Arc<dyn Shard> {
        let mut builder = IndexBuilder::new();
        for (i, title) in titles.iter().enumerate() {
            builder.add_document(&IndexableDocument {
                data: format!("ekn:///{}", hash(i as u8)),
                id: format!("ekn:///{}", hash(i as u8)),
                title: title.to_string(),
                ..Default::default()
            });
        }
        for (key, value) in metadata {
            builder.set_metadata(key, value);
        }

        let mut writer = ShardWriter::new();
        for (i, title) in titles.iter().enumerate() {
            writer.add_record(
                &hash(i as u8),
                &json!({
                    "@type": "ekn://_vocab/ArticleObject",
                    "@id": format!("ekn:///{}", hash(i as u8)),
                    "title": title,
                }),
                None,
            );
        }
        writer.set_index(builder.build());
        let path = dir.join("content.shard");
        let offset = writer.write_to(&path).unwrap().unwrap();
        Arc::new(EosShard::open(&path, Some(offset as i64)).unwrap())
    }

    #[test]
    fn standard_prefixes_installed_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let shard = write_shard(dir.path(), &["Apple"], &[]);
        let mut manager = DatabaseManager::new(vec![shard]);

        // title-restricted match works, so the S prefix default is in place
        let query = Query::builder().search_terms("apple").build();
        let mset = manager.query(&query, "none").unwrap();
        assert_eq!(mset.len(), 1);
    }

    #[test]
    fn stopwords_are_registered_and_chomped() {
        let dir = tempfile::tempdir().unwrap();
        let shard = write_shard(
            dir.path(),
            &["Apple"],
            &[(STOPWORDS_METADATA_KEY, "[\"the\\n\", \"an\"]")],
        );
        let mut manager = DatabaseManager::new(vec![shard]);

        let (stop, _) = manager.fix_query("the apple").unwrap();
        assert_eq!(stop.as_deref(), Some("apple"));

        // no stop words hit: no change reported
        let (stop, _) = manager.fix_query("apple").unwrap();
        assert_eq!(stop, None);
    }

    #[test]
    fn spelling_fix_reported_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let shard = write_shard(dir.path(), &["Banana"], &[]);
        let mut manager = DatabaseManager::new(vec![shard]);

        let (_, spell) = manager.fix_query("bananna").unwrap();
        assert_eq!(spell.as_deref(), Some("banana"));

        let (_, spell) = manager.fix_query("banana").unwrap();
        assert_eq!(spell, None);
    }

    #[test]
    fn empty_database_fails_queries() {
        let dir = tempfile::tempdir().unwrap();
        let shard = write_shard(dir.path(), &[], &[]);
        let mut manager = DatabaseManager::new(vec![shard]);
        let query = Query::builder().search_terms("apple").build();
        assert!(matches!(
            manager.query(&query, "none"),
            Err(Error::DatabaseEmpty)
        ));
    }

    #[test]
    fn stemming_matches_inflected_queries() {
        let dir = tempfile::tempdir().unwrap();

        let mut builder = IndexBuilder::new();
        builder.set_stemmer(Some(Arc::new(Stemmer::create(Algorithm::English))));
        builder.add_document(&IndexableDocument {
            data: format!("ekn:///{}", hash(0)),
            id: format!("ekn:///{}", hash(0)),
            title: "Run".into(),
            ..Default::default()
        });
        let mut writer = ShardWriter::new();
        writer.add_record(
            &hash(0),
            &json!({
                "@type": "ekn://_vocab/ArticleObject",
                "@id": format!("ekn:///{}", hash(0)),
                "title": "Run",
            }),
            None,
        );
        writer.set_index(builder.build());
        let path = dir.path().join("content.shard");
        let offset = writer.write_to(&path).unwrap().unwrap();
        let shard: Arc<dyn Shard> = Arc::new(EosShard::open(&path, Some(offset as i64)).unwrap());

        let mut manager = DatabaseManager::new(vec![shard]);
        let query = Query::builder()
            .search_terms("running")
            .mode(crate::query::QueryMode::Delimited)
            .build();
        let mset = manager.query(&query, "en").unwrap();
        assert_eq!(mset.len(), 1);
    }
}
