/*! Process-wide façade mapping application ids to domains.

One [`Engine`] caches a [`Domain`] per application id and routes object
fetches, link tests and queries to the right one. [`Engine::shared`] hands
out the lazily created process-wide instance, with the default language
detected from the environment once.
!*/
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use tokio_util::sync::CancellationToken;

use crate::domain::Domain;
use crate::error::Error;
use crate::model::Model;
use crate::query::Query;
use crate::results::QueryResults;
use crate::utils;

lazy_static! {
    static ref DEFAULT_ENGINE: Engine = Engine::with_language(utils::current_language());
}

/// The main portal for querying and fetching knowledge content.
///
/// Usually content is served for a single application; set
/// [`Engine::set_default_app_id`] once and use the short-form calls.
pub struct Engine {
    default_app_id: RwLock<String>,
    language: String,
    domains: RwLock<HashMap<String, Arc<Domain>>>,
}

impl Engine {
    /// The process-wide engine, created on first use and alive until exit.
    pub fn shared() -> &'static Engine {
        &DEFAULT_ENGINE
    }

    /// An engine stemming and spell-checking for `language` (an ISO 639
    /// code, or empty for none).
    pub fn with_language(language: impl Into<String>) -> Engine {
        Engine {
            default_app_id: RwLock::new(String::new()),
            language: language.into(),
            domains: RwLock::new(HashMap::new()),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn default_app_id(&self) -> String {
        self.default_app_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The application served by the short-form calls.
    pub fn set_default_app_id(&self, app_id: &str) {
        *self
            .default_app_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = app_id.to_string();
    }

    /// The domain for the default application, created synchronously on
    /// first reference.
    pub async fn domain(&self) -> Result<Arc<Domain>, Error> {
        self.domain_for_app(&self.default_app_id()).await
    }

    /// The domain for an application id: the cached one when present, a
    /// newly initialized one otherwise. Initialization errors propagate and
    /// nothing is cached on failure.
    pub async fn domain_for_app(&self, app_id: &str) -> Result<Arc<Domain>, Error> {
        if app_id.is_empty() {
            return Err(Error::AppIdNotSet);
        }
        if let Some(domain) = self
            .domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(app_id)
        {
            return Ok(domain.clone());
        }

        let domain = Domain::for_app_id(app_id, None, &self.language, None).await?;
        let mut domains = self
            .domains
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // a concurrent creator may have won the race; keep the first one
        Ok(domains
            .entry(app_id.to_string())
            .or_insert(domain)
            .clone())
    }

    /// Registers a domain backed by an explicit content directory. A no-op
    /// when the application already has one.
    pub async fn add_domain_for_path(&self, app_id: &str, path: &Path) -> Result<(), Error> {
        if app_id.is_empty() {
            return Err(Error::AppIdNotSet);
        }
        if self
            .domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(app_id)
        {
            return Ok(());
        }

        let domain = Domain::for_app_id(app_id, Some(path), &self.language, None).await?;
        self.domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(app_id.to_string())
            .or_insert(domain);
        Ok(())
    }

    /// Asynchronously fetches the object with `uri` from the default
    /// application.
    pub async fn object(
        &self,
        uri: &str,
        cancellable: Option<&CancellationToken>,
    ) -> Result<Model, Error> {
        self.object_for_app(uri, &self.default_app_id(), cancellable)
            .await
    }

    /// Asynchronously fetches the object with `uri` from `app_id`.
    pub async fn object_for_app(
        &self,
        uri: &str,
        app_id: &str,
        cancellable: Option<&CancellationToken>,
    ) -> Result<Model, Error> {
        let domain = self.domain_for_app(app_id).await?;
        domain.object(uri, cancellable).await
    }

    /// Whether an external link corresponds to content in the default
    /// domain; returns the content URI when it does.
    pub async fn test_link(&self, link: &str) -> Result<Option<String>, Error> {
        self.test_link_for_app(link, &self.default_app_id()).await
    }

    pub async fn test_link_for_app(
        &self,
        link: &str,
        app_id: &str,
    ) -> Result<Option<String>, Error> {
        let domain = self.domain_for_app(app_id).await?;
        domain.test_link(link, None).await
    }

    /// Asynchronously runs `query` against the domain it addresses (its
    /// `app_id` field, or the engine default). Queries with free text are
    /// first corrected through the domain; tag-only queries go straight to
    /// the index.
    pub async fn query(
        &self,
        query: &Query,
        cancellable: Option<&CancellationToken>,
    ) -> Result<QueryResults, Error> {
        let app_id = if !query.app_id().is_empty() {
            query.app_id().to_string()
        } else {
            self.default_app_id()
        };
        let domain = self.domain_for_app(&app_id).await?;

        if !query.search_terms().is_empty() {
            let fixed = domain.fixed_query(query, cancellable).await?;
            domain.query(&fixed, cancellable).await
        } else {
            // searching for tags without a query string
            domain.query(query, cancellable).await
        }
    }
}
