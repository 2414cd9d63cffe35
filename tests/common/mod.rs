//! Shared fixture builders: subscription directories with native or
//! openzim-style shards, index blobs and manifests.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use ekncontent::index::{IndexBuilder, IndexableDocument};
use ekncontent::shard::eos::ShardWriter;
use ekncontent::shard::zim::ZimWriter;

/// A deterministic 40-hex record hash.
pub fn hash(n: u8) -> String {
    format!("{n:040x}")
}

pub fn ekn_id(n: u8) -> String {
    format!("ekn:///{}", hash(n))
}

/// One article destined for a native shard.
pub struct Article {
    pub n: u8,
    pub title: String,
    pub synopsis: String,
    pub tags: Vec<String>,
    pub sequence_number: Option<u32>,
    pub date: Option<String>,
}

impl Article {
    pub fn new(n: u8, title: &str, tags: &[&str]) -> Article {
        Article {
            n,
            title: title.to_string(),
            synopsis: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            sequence_number: None,
            date: None,
        }
    }

    pub fn synopsis(mut self, synopsis: &str) -> Article {
        self.synopsis = synopsis.to_string();
        self
    }

    pub fn sequence(mut self, n: u32) -> Article {
        self.sequence_number = Some(n);
        self
    }

    pub fn date(mut self, date: &str) -> Article {
        self.date = Some(date.to_string());
        self
    }

    fn metadata(&self) -> Value {
        json!({
            "@type": "ekn://_vocab/ArticleObject",
            "@id": ekn_id(self.n),
            "title": self.title,
            "synopsis": self.synopsis,
            "contentType": "text/html",
            "tags": self.tags,
            "sequenceNumber": self.sequence_number.unwrap_or(u32::MAX),
            "lastModifiedDate": self.date.clone().unwrap_or_default(),
        })
    }
}

/// Accumulates records for one native shard file and its index blob.
pub struct NativeShard {
    name: String,
    articles: Vec<Article>,
    link_table: Option<HashMap<String, String>>,
    index_metadata: Vec<(String, String)>,
    with_index: bool,
}

impl NativeShard {
    pub fn new(name: &str) -> NativeShard {
        NativeShard {
            name: name.to_string(),
            articles: Vec::new(),
            link_table: None,
            index_metadata: Vec::new(),
            with_index: true,
        }
    }

    pub fn article(mut self, article: Article) -> NativeShard {
        self.articles.push(article);
        self
    }

    pub fn link(mut self, from: &str, to: &str) -> NativeShard {
        self.link_table
            .get_or_insert_with(HashMap::new)
            .insert(from.to_string(), to.to_string());
        self
    }

    pub fn index_metadata(mut self, key: &str, value: &str) -> NativeShard {
        self.index_metadata.push((key.to_string(), value.to_string()));
        self
    }

    pub fn without_index(mut self) -> NativeShard {
        self.with_index = false;
        self
    }

    /// Writes the shard into `dir`, returning its manifest entries:
    /// the shard path and, when an index was embedded, its offset.
    fn write(&self, dir: &Path) -> (String, Option<u64>) {
        let mut writer = ShardWriter::new();
        let mut index = IndexBuilder::new();

        for article in &self.articles {
            writer.add_record(
                &hash(article.n),
                &article.metadata(),
                Some(format!("<html>{}</html>", article.title).as_bytes()),
            );
            index.add_document(&IndexableDocument {
                data: ekn_id(article.n),
                id: ekn_id(article.n),
                title: article.title.clone(),
                synopsis: article.synopsis.clone(),
                tags: article.tags.clone(),
                content_type: "text/html".to_string(),
                sequence_number: article.sequence_number,
                date: article.date.clone(),
            });
        }
        if let Some(table) = &self.link_table {
            writer.set_link_table(table);
        }
        for (key, value) in &self.index_metadata {
            index.set_metadata(key, value);
        }
        if self.with_index {
            writer.set_index(index.build());
        }

        let offset = writer.write_to(&dir.join(&self.name)).unwrap();
        (self.name.clone(), offset)
    }
}

/// Writes a subscription directory: the given shards plus a manifest
/// carrying their index offsets.
pub fn write_native_subscription(dir: &Path, shards: &[NativeShard]) {
    fs::create_dir_all(dir).unwrap();
    let mut shard_entries = Vec::new();
    let mut database_entries = Vec::new();

    for shard in shards {
        let (name, offset) = shard.write(dir);
        shard_entries.push(json!({ "path": name }));
        if let Some(offset) = offset {
            database_entries.push(json!({ "path": name, "offset": offset }));
        }
    }

    let manifest = json!({
        "shards": shard_entries,
        "xapian_databases": database_entries,
    });
    fs::write(
        dir.join("manifest.json"),
        serde_json::to_vec_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

/// Writes a subscription holding one openzim-style shard. Entries are
/// `(namespace, url, title, payload)`; articles land in the index with
/// their bare `<namespace>/<url>` as document data.
pub fn write_zim_subscription(dir: &Path, entries: &[(char, &str, &str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    let mut writer = ZimWriter::new();
    let mut index = IndexBuilder::new();

    for (namespace, url, title, payload) in entries {
        let mime = match namespace {
            'I' => "image/png",
            _ => "text/html",
        };
        writer.add_entry(*namespace, url, title, mime, payload.as_bytes());
        index.add_document(&IndexableDocument {
            data: format!("{namespace}/{url}"),
            title: title.to_string(),
            ..Default::default()
        });
    }
    writer.set_index(index.build());
    writer.write_to(&dir.join("content.zim")).unwrap();

    let manifest = json!({
        "shards": [{ "path": "content.zim", "type": "openzim" }],
    });
    fs::write(
        dir.join("manifest.json"),
        serde_json::to_vec_pretty(&manifest).unwrap(),
    )
    .unwrap();
}
