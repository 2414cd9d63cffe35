/*! One application's content: shard discovery, search and record fetches.

A domain is built once from its subscriptions (directories holding a
`manifest.json` plus shard files), initializes every shard concurrently,
and is read-only afterwards. Search operations run on worker tasks and hold
the domain's index lock for their whole duration, so concurrent searches on
one domain serialize while searches across domains proceed in parallel.
Record lookups, link resolution and byte streaming never touch the lock.
!*/
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::database::DatabaseManager;
use crate::error::Error;
use crate::model::Model;
use crate::query::{Query, QueryMatch};
use crate::results::QueryResults;
use crate::shard::eos::EosShard;
use crate::shard::zim::ZimShard;
use crate::shard::{Shard, ShardRecord};
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShardKind {
    EosShard,
    OpenZim,
}

#[derive(Debug)]
struct ShardSpec {
    path: PathBuf,
    kind: ShardKind,
    db_offset: Option<i64>,
}

/// Runtime state for one application's content.
pub struct Domain {
    app_id: String,
    path: Option<PathBuf>,
    language: String,
    subscriptions: Vec<String>,
    shards: Vec<Arc<dyn Shard>>,
    db: Arc<Mutex<DatabaseManager>>,
    using_third_party_index: bool,
}

impl Domain {
    /// Discovers subscriptions and opens a domain. With an explicit `path`,
    /// that directory is the single subscription; otherwise subscriptions
    /// are read from the app's data directory and every extension
    /// directory. All shards are initialized concurrently; if any of them
    /// fails, no domain is published.
    pub async fn for_app_id(
        app_id: &str,
        path: Option<&Path>,
        language: &str,
        cancellable: Option<&CancellationToken>,
    ) -> Result<Arc<Domain>, Error> {
        let mut specs: Vec<ShardSpec> = Vec::new();
        let mut kind: Option<ShardKind> = None;
        let mut subscriptions: Vec<String> = Vec::new();

        let explicit_path = path.filter(|p| !p.as_os_str().is_empty());

        if let Some(path) = explicit_path {
            if !path.is_dir() {
                return Err(Error::PathNotFound(path.to_path_buf()));
            }
            process_subscription(path, &mut specs, &mut kind)?;
        } else if !app_id.is_empty() {
            if let Some(dir) = utils::subscriptions_dir(app_id) {
                if dir.is_dir() {
                    import_subscriptions(&dir, &mut specs, &mut kind, &mut subscriptions)?;
                }
            }
            for dir in utils::extensions_dirs(app_id) {
                if dir.is_dir() {
                    import_subscriptions(&dir, &mut specs, &mut kind, &mut subscriptions)?;
                }
            }
        } else {
            return Err(Error::AppIdNotSet);
        }

        if specs.is_empty() {
            return Err(Error::Empty);
        }

        let using_third_party_index = kind == Some(ShardKind::OpenZim);
        let shards = parallel_init(specs, cancellable).await?;

        let db = Arc::new(Mutex::new(DatabaseManager::new(shards.clone())));
        Ok(Arc::new(Domain {
            app_id: app_id.to_string(),
            path: path.map(Path::to_path_buf),
            language: language.to_string(),
            subscriptions,
            shards,
            db,
            using_third_party_index,
        }))
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Names of the discovered subscription directories, in import order.
    pub fn subscription_ids(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn shards(&self) -> &[Arc<dyn Shard>] {
        &self.shards
    }

    /// Asynchronously loads the object model for a URI.
    pub async fn object(
        &self,
        uri: &str,
        cancellable: Option<&CancellationToken>,
    ) -> Result<Model, Error> {
        let shards = self.shards.clone();
        let uri = uri.to_string();
        spawn_worker(cancellable, move |_| {
            load_record(&shards, &uri)?.model()
        })
        .await
    }

    /// Asks the shards' link tables whether an external URL maps to content
    /// within this domain. The earliest shard holding the link wins.
    pub async fn test_link(
        &self,
        link: &str,
        cancellable: Option<&CancellationToken>,
    ) -> Result<Option<String>, Error> {
        let shards = self.shards.clone();
        let link = link.to_string();
        spawn_worker(cancellable, move |_| {
            Ok(shards.iter().find_map(|shard| shard.test_link(&link)))
        })
        .await
    }

    /// Asynchronously derives a corrected variant of `query`: stop words
    /// removed and spelling fixed, each only when it changes the terms. The
    /// original query comes back untouched when there is nothing to fix.
    pub async fn fixed_query(
        &self,
        query: &Query,
        cancellable: Option<&CancellationToken>,
    ) -> Result<Query, Error> {
        let db = self.db.clone();
        let query = query.clone();
        spawn_worker(cancellable, move |_| {
            let mut db = db.lock().unwrap_or_else(PoisonError::into_inner);
            let (stop_fixed, spell_fixed) = db.fix_query(query.search_terms())?;

            if stop_fixed.is_none() && spell_fixed.is_none() {
                return Ok(query);
            }
            let mut builder = query.to_builder();
            if let Some(terms) = stop_fixed {
                builder = builder.stopword_free_terms(terms);
            }
            if let Some(terms) = spell_fixed {
                builder = builder.corrected_terms(terms);
            }
            Ok(builder.build())
        })
        .await
    }

    /// Asynchronously runs a query and hydrates every match into its typed
    /// model. A hydration failure aborts the whole query.
    pub async fn query(
        &self,
        query: &Query,
        cancellable: Option<&CancellationToken>,
    ) -> Result<QueryResults, Error> {
        let shards = self.shards.clone();
        let db = self.db.clone();
        let language = self.language.clone();
        let third_party = self.using_third_party_index;
        let query = query.clone();

        spawn_worker(cancellable, move |cancel| {
            // the third-party index represents neither tags nor content
            // types, and only searches titles and synopses
            let query = if third_party {
                query
                    .to_builder()
                    .match_type(QueryMatch::TitleSynopsis)
                    .tags_match_all(Vec::new())
                    .tags_match_any(Vec::new())
                    .content_type("")
                    .excluded_content_type("")
                    .build()
            } else {
                query
            };

            let mut db = db.lock().unwrap_or_else(PoisonError::into_inner);
            let lang = if language.is_empty() {
                "none"
            } else {
                language.as_str()
            };
            let mset = db.query(&query, lang)?;
            debug!(
                "found {} results (upper bound: {})",
                mset.len(),
                mset.upper_bound()
            );

            let mut models = Vec::with_capacity(mset.len());
            for m in mset.matches() {
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                }
                // legacy records store fully qualified ekn ids, third-party
                // records a bare namespace path
                let uri = if m.data.starts_with("ekn://") {
                    m.data.clone()
                } else {
                    format!("ekn+zim:///{}", m.data)
                };
                debug!("retrieving document object {uri:?}");
                models.push(load_record(&shards, &uri)?.model()?);
            }
            debug!("models found: {} of {} matches", models.len(), mset.len());

            Ok(QueryResults::new(models, mset.upper_bound()))
        })
        .await
    }

    /// Reads the payload of a URI: its bytes and its mime type. The mime
    /// string is an owned copy, independent of the record's lifetime.
    pub async fn read_uri(
        &self,
        uri: &str,
        cancellable: Option<&CancellationToken>,
    ) -> Result<(Vec<u8>, String), Error> {
        let shards = self.shards.clone();
        let uri = uri.to_string();
        spawn_worker(cancellable, move |_| {
            let record = load_record(&shards, &uri)?;
            let model = record.model()?;
            let mime = model.content().content_type.clone();

            let size = record.data_size();
            let stream = record.stream_data()?;
            let mut bytes = Vec::with_capacity(size as usize);
            stream.take(size).read_to_end(&mut bytes)?;
            Ok((bytes, mime))
        })
        .await
    }
}

/// Submits one work item to the shared blocking pool. The body runs
/// synchronously on its worker; cancellation is checked before it starts
/// and wherever the body polls the token.
async fn spawn_worker<T, F>(
    cancellable: Option<&CancellationToken>,
    body: F,
) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce(Option<&CancellationToken>) -> Result<T, Error> + Send + 'static,
{
    let cancel = cancellable.cloned();
    let handle = tokio::task::spawn_blocking(move || {
        if let Some(token) = &cancel {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
        body(cancel.as_ref())
    });
    handle.await.unwrap_or_else(|e| {
        Err(Error::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("worker task failed: {e}"),
        )))
    })
}

fn load_record(shards: &[Arc<dyn Shard>], uri: &str) -> Result<ShardRecord, Error> {
    let object_id =
        utils::uri_object_id(uri).ok_or_else(|| Error::IdNotValid(uri.to_string()))?;
    for shard in shards {
        if let Some(record) = Arc::clone(shard).find_by_id(&object_id) {
            return Ok(record);
        }
    }
    Err(Error::IdNotFound(uri.to_string()))
}

/// Opens every shard on the blocking pool and waits for all of them; one
/// failure fails the whole initialization.
async fn parallel_init(
    specs: Vec<ShardSpec>,
    cancellable: Option<&CancellationToken>,
) -> Result<Vec<Arc<dyn Shard>>, Error> {
    let handles: Vec<_> = specs
        .into_iter()
        .map(|spec| {
            tokio::task::spawn_blocking(move || -> Result<Arc<dyn Shard>, Error> {
                match spec.kind {
                    ShardKind::EosShard => {
                        Ok(Arc::new(EosShard::open(&spec.path, spec.db_offset)?))
                    }
                    ShardKind::OpenZim => {
                        Ok(Arc::new(ZimShard::open(&spec.path, spec.db_offset)?))
                    }
                }
            })
        })
        .collect();

    let mut shards = Vec::with_capacity(handles.len());
    for handle in futures::future::join_all(handles).await {
        if let Some(token) = cancellable {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
        let shard = handle.unwrap_or_else(|e| {
            Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("shard init task failed: {e}"),
            )))
        })?;
        shards.push(shard);
    }
    Ok(shards)
}

fn malformed_manifest(element: &str) -> Error {
    Error::BadManifest(format!("manifest element '{element}' is not valid"))
}

/// Parses one subscription directory: bundle version gate, manifest walk,
/// shard spec collection. `kind` carries the shard type across
/// subscriptions so a domain cannot end up with mixed backends.
fn process_subscription(
    dir: &Path,
    specs: &mut Vec<ShardSpec>,
    kind: &mut Option<ShardKind>,
) -> Result<(), Error> {
    if let Some(version) = utils::bundle_version(dir)? {
        if version != utils::SUPPORTED_BUNDLE_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
    }

    let manifest_path = dir.join("manifest.json");
    let raw = fs::read(&manifest_path).map_err(|e| {
        Error::BadManifest(format!("cannot read {}: {e}", manifest_path.display()))
    })?;
    let manifest: Value = serde_json::from_slice(&raw).map_err(|e| {
        Error::BadManifest(format!("cannot parse {}: {e}", manifest_path.display()))
    })?;
    let manifest = manifest
        .as_object()
        .ok_or_else(|| malformed_manifest("(root)"))?;

    // optional per-shard index offsets, keyed by relative shard path
    let mut db_offset_by_path: Vec<(String, i64)> = Vec::new();
    if let Some(databases) = manifest.get("xapian_databases").and_then(Value::as_array) {
        for node in databases {
            let object = node
                .as_object()
                .ok_or_else(|| malformed_manifest("xapian_databases.[]"))?;
            let path = object
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed_manifest("xapian_databases.[].path"))?;
            let offset = object
                .get("offset")
                .and_then(Value::as_i64)
                .ok_or_else(|| malformed_manifest("xapian_databases.[].offset"))?;
            db_offset_by_path.push((path.to_string(), offset));
        }
    }

    let shards = manifest
        .get("shards")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed_manifest("shards"))?;

    for node in shards {
        let object = node
            .as_object()
            .ok_or_else(|| malformed_manifest("shards.[]"))?;
        let relative_path = object
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed_manifest("shards.[].path"))?;

        let shard_type = match object.get("type") {
            Some(Value::String(t)) => t.as_str(),
            _ => "eosshard",
        };
        let shard_kind = match shard_type {
            "eosshard" => ShardKind::EosShard,
            "openzim" => ShardKind::OpenZim,
            other => {
                return Err(Error::BadManifest(format!(
                    "invalid shard type \"{other}\""
                )))
            }
        };
        match kind {
            None => *kind = Some(shard_kind),
            Some(current) if *current != shard_kind => {
                return Err(Error::BadManifest(
                    "mixing shard types is not supported".to_string(),
                ));
            }
            Some(_) => {}
        }

        let db_offset = db_offset_by_path
            .iter()
            .find(|(path, _)| path == relative_path)
            .map(|(_, offset)| *offset);

        specs.push(ShardSpec {
            path: dir.join(relative_path),
            kind: shard_kind,
            db_offset,
        });
    }

    Ok(())
}

/// Imports every subscription directory below `dir`, sorted by name so
/// shard order (and with it link-resolution precedence) is stable.
fn import_subscriptions(
    dir: &Path,
    specs: &mut Vec<ShardSpec>,
    kind: &mut Option<ShardKind>,
    subscriptions: &mut Vec<String>,
) -> Result<(), Error> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    children.sort();

    for child in children {
        process_subscription(&child, specs, kind)?;
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            subscriptions.push(name.to_string());
        }
    }
    Ok(())
}
