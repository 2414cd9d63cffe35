use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::data::{DocumentData, IndexData, Posting};
use super::query::Query;

/// The federated index: the union of per-shard index blobs, queried as one.
///
/// Sub-index document ids are remapped onto one docid space by adding a per
/// sub-index base.
#[derive(Debug, Default)]
pub struct Database {
    shards: Vec<IndexData>,
    bases: Vec<u32>,
    doc_count: u32,
}

impl Database {
    pub fn new() -> Database {
        Database::default()
    }

    pub fn add_index(&mut self, data: IndexData) {
        self.bases.push(self.doc_count);
        self.doc_count += data.doc_count();
        self.shards.push(data);
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Value of a metadata key. With several sub-indices, the first one
    /// holding the key wins.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.shards
            .iter()
            .find_map(|shard| shard.metadata.get(key).map(String::as_str))
    }

    pub fn document(&self, docid: u32) -> Option<&DocumentData> {
        for (shard, base) in self.shards.iter().zip(&self.bases) {
            if docid >= *base && docid - base < shard.doc_count() {
                return shard.docs.get((docid - base) as usize);
            }
        }
        None
    }

    pub fn has_term(&self, term: &str) -> bool {
        self.shards.iter().any(|s| s.postings.contains_key(term))
    }

    fn postings(&self, term: &str) -> Vec<Posting> {
        let mut merged = Vec::new();
        for (shard, base) in self.shards.iter().zip(&self.bases) {
            if let Some(postings) = shard.postings.get(term) {
                merged.extend(postings.iter().map(|p| Posting {
                    docid: p.docid + base,
                    wdf: p.wdf,
                }));
            }
        }
        merged
    }

    /// Distinct term names starting with `prefix`, at most `limit` of them.
    pub(crate) fn expand_wildcard(&self, prefix: &str, limit: usize) -> Vec<String> {
        let mut terms = std::collections::BTreeSet::new();
        for shard in &self.shards {
            for term in shard
                .postings
                .range(prefix.to_string()..)
                .map(|(t, _)| t)
                .take_while(|t| t.starts_with(prefix))
            {
                terms.insert(term.clone());
            }
        }
        terms.into_iter().take(limit).collect()
    }

    pub(crate) fn has_spelling(&self, word: &str) -> bool {
        self.shards.iter().any(|s| s.spellings.contains_key(word))
    }

    pub(crate) fn spelling_entries(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.shards
            .iter()
            .flat_map(|s| s.spellings.iter().map(|(w, f)| (w.as_str(), *f)))
    }

    pub fn enquire(&self) -> Enquire<'_> {
        Enquire {
            db: self,
            sort: None,
            cutoff: 0,
        }
    }

    /// Weights every matching document. `MatchAll` contributes documents at
    /// zero weight; term weights are tf-idf.
    fn evaluate(&self, query: &Query) -> BTreeMap<u32, f64> {
        match query {
            Query::MatchAll => (0..self.doc_count).map(|docid| (docid, 0.0)).collect(),
            Query::MatchNothing => BTreeMap::new(),
            Query::Term(term) => {
                let postings = self.postings(term);
                if postings.is_empty() {
                    return BTreeMap::new();
                }
                let idf = (1.0 + self.doc_count as f64 / postings.len() as f64).ln();
                postings
                    .into_iter()
                    .map(|p| (p.docid, p.wdf as f64 * idf))
                    .collect()
            }
            Query::And(clauses) => {
                let mut maps = clauses.iter().map(|c| self.evaluate(c));
                let mut result = match maps.next() {
                    Some(m) => m,
                    None => return BTreeMap::new(),
                };
                for map in maps {
                    result.retain(|docid, weight| {
                        if let Some(extra) = map.get(docid) {
                            *weight += extra;
                            true
                        } else {
                            false
                        }
                    });
                }
                result
            }
            Query::Or(clauses) => {
                let mut result = BTreeMap::new();
                for clause in clauses {
                    for (docid, weight) in self.evaluate(clause) {
                        *result.entry(docid).or_insert(0.0) += weight;
                    }
                }
                result
            }
            Query::AndNot(keep, drop) => {
                let mut result = self.evaluate(keep);
                let dropped = self.evaluate(drop);
                result.retain(|docid, _| !dropped.contains_key(docid));
                result
            }
            Query::Scale(factor, inner) => self
                .evaluate(inner)
                .into_iter()
                .map(|(docid, weight)| (docid, weight * factor))
                .collect(),
        }
    }
}

/// One query execution over a [`Database`]: sort order, relevance cutoff and
/// the match window.
pub struct Enquire<'a> {
    db: &'a Database,
    sort: Option<(u32, bool)>,
    cutoff: u32,
}

impl<'a> Enquire<'a> {
    /// Sort by a value slot instead of relevance. `descending` flips the
    /// order; relevance breaks ties.
    pub fn set_sort_by_value(&mut self, slot: u32, descending: bool) {
        self.sort = Some((slot, descending));
    }

    /// Drop matches weighing less than `percent` of the best match.
    pub fn set_cutoff(&mut self, percent: u32) {
        self.cutoff = percent;
    }

    pub fn mset(&self, query: &Query, offset: u32, limit: u32) -> MSet {
        let mut candidates: Vec<(u32, f64)> = self.db.evaluate(query).into_iter().collect();

        if self.cutoff > 0 {
            let best = candidates.iter().map(|(_, w)| *w).fold(0.0_f64, f64::max);
            if best > 0.0 {
                let threshold = best * self.cutoff as f64 / 100.0;
                candidates.retain(|(_, weight)| *weight >= threshold);
            }
        }

        match self.sort {
            None => candidates.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            }),
            Some((slot, descending)) => candidates.sort_by(|a, b| {
                let key_a = self.value_key(a.0, slot);
                let key_b = self.value_key(b.0, slot);
                let by_value = if descending {
                    key_b.cmp(key_a)
                } else {
                    key_a.cmp(key_b)
                };
                by_value
                    .then(b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
                    .then(a.0.cmp(&b.0))
            }),
        }

        let upper_bound = candidates.len() as u32;
        let matches = candidates
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(docid, weight)| Match {
                docid,
                weight,
                data: self
                    .db
                    .document(docid)
                    .map(|d| d.data.clone())
                    .unwrap_or_default(),
            })
            .collect();

        MSet {
            matches,
            upper_bound,
        }
    }

    fn value_key(&self, docid: u32, slot: u32) -> &str {
        self.db
            .document(docid)
            .and_then(|d| d.values.get(&slot))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One entry of a match-set.
#[derive(Debug, Clone)]
pub struct Match {
    pub docid: u32,
    pub weight: f64,
    /// The document's `data` payload: the record identifier to hydrate.
    pub data: String,
}

/// The ordered page of hits for a query.
#[derive(Debug, Clone, Default)]
pub struct MSet {
    matches: Vec<Match>,
    upper_bound: u32,
}

impl MSet {
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Upper-bound estimate of the total number of matching documents.
    pub fn upper_bound(&self) -> u32 {
        self.upper_bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::data::{VALUE_SEQUENCE_NUMBER, VALUE_TITLE};
    use crate::index::writer::{IndexBuilder, IndexableDocument};

    fn doc(n: u32, title: &str, tags: &[&str]) -> IndexableDocument {
        IndexableDocument {
            data: format!("ekn:///{n:040x}"),
            id: format!("ekn:///{n:040x}"),
            title: title.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            sequence_number: Some(n),
            ..Default::default()
        }
    }

    fn fruit_db() -> Database {
        let mut builder = IndexBuilder::new();
        builder.add_document(&doc(0, "Apple", &["fruit"]));
        builder.add_document(&doc(1, "Apricot", &["fruit"]));
        builder.add_document(&doc(2, "Banana", &["fruit", "tropical"]));
        let mut db = Database::new();
        db.add_index(builder.build());
        db
    }

    #[test]
    fn term_lookup_matches_tagged_docs() {
        let db = fruit_db();
        let mset = db.enquire().mset(&Query::term("Kfruit"), 0, 10);
        assert_eq!(mset.len(), 3);
        assert_eq!(mset.upper_bound(), 3);

        let mset = db.enquire().mset(&Query::term("Ktropical"), 0, 10);
        assert_eq!(mset.len(), 1);
        assert_eq!(mset.matches()[0].data, format!("ekn:///{:040x}", 2));
    }

    #[test]
    fn missing_term_matches_nothing() {
        let db = fruit_db();
        assert!(db.enquire().mset(&Query::term("Kvegetable"), 0, 10).is_empty());
    }

    #[test]
    fn and_not_excludes() {
        let db = fruit_db();
        let q = Query::AndNot(
            Box::new(Query::term("Kfruit")),
            Box::new(Query::term("Ktropical")),
        );
        let mset = db.enquire().mset(&q, 0, 10);
        assert_eq!(mset.len(), 2);
    }

    #[test]
    fn federated_union_offsets_docids() {
        let mut builder_a = IndexBuilder::new();
        builder_a.add_document(&doc(0, "Apple", &["fruit"]));
        let mut builder_b = IndexBuilder::new();
        builder_b.add_document(&doc(1, "Banana", &["fruit"]));

        let mut db = Database::new();
        db.add_index(builder_a.build());
        db.add_index(builder_b.build());

        assert_eq!(db.doc_count(), 2);
        let mset = db.enquire().mset(&Query::term("Kfruit"), 0, 10);
        let data: Vec<_> = mset.matches().iter().map(|m| m.data.as_str()).collect();
        assert_eq!(
            data,
            vec![
                "ekn:///0000000000000000000000000000000000000000",
                "ekn:///0000000000000000000000000000000000000001"
            ]
        );
    }

    #[test]
    fn metadata_first_subindex_wins() {
        let mut a = IndexData::default();
        a.metadata.insert("XbStopwords".into(), "[\"the\"]".into());
        let mut b = IndexData::default();
        b.metadata.insert("XbStopwords".into(), "[\"le\"]".into());
        let mut db = Database::new();
        db.add_index(a);
        db.add_index(b);
        assert_eq!(db.metadata("XbStopwords"), Some("[\"the\"]"));
        assert_eq!(db.metadata("XbPrefixes"), None);
    }

    #[test]
    fn sort_by_sequence_value() {
        let mut builder = IndexBuilder::new();
        builder.add_document(&doc(12, "Apple pie", &["fruit"]));
        builder.add_document(&doc(3, "Apple sauce", &["fruit"]));
        builder.add_document(&doc(7, "Apple juice", &["fruit"]));
        let mut db = Database::new();
        db.add_index(builder.build());

        let mut enquire = db.enquire();
        enquire.set_sort_by_value(VALUE_SEQUENCE_NUMBER, false);
        let mset = enquire.mset(&Query::term("Kfruit"), 0, 10);
        let seqs: Vec<_> = mset
            .matches()
            .iter()
            .map(|m| db.document(m.docid).unwrap().values[&VALUE_SEQUENCE_NUMBER].clone())
            .collect();
        let mut sorted = seqs.clone();
        sorted.sort();
        assert_eq!(seqs, sorted);

        let mut enquire = db.enquire();
        enquire.set_sort_by_value(VALUE_TITLE, true);
        let mset = enquire.mset(&Query::term("Kfruit"), 0, 10);
        assert_eq!(mset.matches()[0].docid, 1); // "apple sauce" sorts last
    }

    #[test]
    fn offset_past_upper_bound_is_empty() {
        let db = fruit_db();
        let mset = db.enquire().mset(&Query::term("Kfruit"), 10, 10);
        assert!(mset.is_empty());
        assert_eq!(mset.upper_bound(), 3);
    }

    #[test]
    fn cutoff_drops_weak_matches() {
        let mut builder = IndexBuilder::new();
        // "apple apple" gives the title term a wdf of 2
        builder.add_document(&doc(0, "Apple apple", &[]));
        builder.add_document(&doc(1, "Apple", &[]));
        let mut db = Database::new();
        db.add_index(builder.build());

        let mut enquire = db.enquire();
        enquire.set_cutoff(80);
        let mset = enquire.mset(&Query::term("Sapple"), 0, 10);
        assert_eq!(mset.len(), 1);
        assert_eq!(mset.matches()[0].docid, 0);
    }

    #[test]
    fn scale_boosts_weight() {
        let db = fruit_db();
        let q = Query::Or(vec![
            Query::Scale(10.0, Box::new(Query::term("Sbanana"))),
            Query::term("Kfruit"),
        ]);
        let mset = db.enquire().mset(&q, 0, 10);
        assert_eq!(mset.matches()[0].docid, 2);
    }
}
