//! Signed fetching with cache fallback
//!
//! Every read follows the same path:
//!
//! ```text
//! sign ─▶ send ─▶ 2xx? ─▶ decode ok? ─▶ cache.put ─▶ Fetched { Network }
//!                   │          │
//!                   └────┬─────┘
//!                        ▼
//!                 cache.get(key) ─▶ decode ok? ─▶ Fetched { Cache }
//!                                        │
//!                                        ▼
//!                                 Fetched { Empty }
//! ```
//!
//! Expected failures never surface as errors; they are logged and resolved
//! to the last good copy or to the empty value.

use crate::error::FetchError;
use crate::node::NodeId;
use crate::schema::{CatalogSchema, RawChildren, RawNode};
use crate::transport::{HttpRequest, Method, Transport};
use archops_auth::RequestSigner;
use archops_cache::PersistentCache;
use archops_core::ResourcePath;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Where a fetched value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Fresh network response
    Network,
    /// Last persisted copy
    Cache,
    /// Neither network nor cache produced a value
    Empty,
}

/// A value plus its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<T> {
    /// The value (empty when `origin` is [`Origin::Empty`])
    pub value: T,
    /// Provenance
    pub origin: Origin,
}

impl<T> Fetched<T> {
    /// Whether the value came straight from the network
    #[inline]
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.origin == Origin::Network
    }

    /// Transform the value, keeping provenance
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            origin: self.origin,
        }
    }
}

impl<T: Default> Fetched<T> {
    fn empty() -> Self {
        Self {
            value: T::default(),
            origin: Origin::Empty,
        }
    }
}

/// Fetches catalog resources from the service
#[derive(Clone)]
pub struct CatalogFetcher {
    base_url: String,
    signer: RequestSigner,
    transport: Arc<dyn Transport>,
    cache: Arc<dyn PersistentCache>,
}

impl std::fmt::Debug for CatalogFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogFetcher")
            .field("base_url", &self.base_url)
            .field("signed", &self.signer.is_enabled())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl CatalogFetcher {
    /// Create fetcher
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        signer: RequestSigner,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn PersistentCache>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            signer,
            transport,
            cache,
        }
    }

    /// Service base URL
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and decode with a caller-supplied decoder
    ///
    /// The raw body is persisted only after it decoded successfully, so the
    /// cache never holds a payload the caller could not read.
    pub async fn fetch_with<T, F>(&self, resource: &ResourcePath, decode: F) -> Fetched<Option<T>>
    where
        F: Fn(&str) -> Result<T, FetchError> + Send + Sync,
        T: Send,
    {
        let attempt = match self.request(Method::Get, resource, None).await {
            Ok(body) => decode(&body).map(|value| (body, value)),
            Err(e) => Err(e),
        };

        match attempt {
            Ok((body, value)) => {
                if let Err(e) = self.cache.put(resource.cache_key(), &body).await {
                    tracing::warn!("could not persist {}: {}", resource, e);
                }
                Fetched {
                    value: Some(value),
                    origin: Origin::Network,
                }
            }
            Err(e) => {
                tracing::warn!("fetch of {} failed, falling back to cache: {}", resource, e);
                self.from_cache(resource, decode).await
            }
        }
    }

    async fn from_cache<T, F>(&self, resource: &ResourcePath, decode: F) -> Fetched<Option<T>>
    where
        F: Fn(&str) -> Result<T, FetchError>,
    {
        let body = match self.cache.get(resource.cache_key()).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::debug!("no cached copy of {}", resource);
                return Fetched::empty();
            }
            Err(e) => {
                tracing::warn!("cache read for {} failed: {}", resource, e);
                return Fetched::empty();
            }
        };

        match decode(&body) {
            Ok(value) => Fetched {
                value: Some(value),
                origin: Origin::Cache,
            },
            Err(e) => {
                tracing::warn!("cached copy of {} is unreadable: {}", resource, e);
                Fetched::empty()
            }
        }
    }

    /// Raw text of a resource
    pub async fn fetch_text(&self, resource: &ResourcePath) -> Fetched<Option<String>> {
        self.fetch_with(resource, |body| Ok(body.to_string())).await
    }

    /// One JSON object
    pub async fn fetch_one<T>(&self, resource: &ResourcePath) -> Fetched<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.fetch_with(resource, |body| Ok(serde_json::from_str(body)?))
            .await
    }

    /// JSON array; failures resolve to an empty list
    pub async fn fetch_list<T>(&self, resource: &ResourcePath) -> Fetched<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let fetched = self
            .fetch_with(resource, |body| Ok(serde_json::from_str::<Vec<T>>(body)?))
            .await;
        fetched.map(Option::unwrap_or_default)
    }

    /// Nodes at a resource, decoded by `schema`
    pub async fn fetch_nodes(
        &self,
        schema: &dyn CatalogSchema,
        resource: &ResourcePath,
    ) -> Fetched<Vec<RawNode>> {
        self.fetch_with(resource, |body| schema.decode(body))
            .await
            .map(Option::unwrap_or_default)
    }

    /// Root nodes of a schema
    ///
    /// When the schema collapses singleton roots and the root list has exactly
    /// one element, that element's children are returned instead.
    pub async fn fetch_root(&self, schema: &dyn CatalogSchema) -> Fetched<Vec<RawNode>> {
        let root = self.fetch_nodes(schema, &schema.root()).await;
        if !schema.collapses_singleton_root() || root.value.len() != 1 {
            return root;
        }

        let origin = root.origin;
        let Some(single) = root.value.into_iter().next() else {
            return Fetched::empty();
        };
        tracing::debug!("collapsing singleton {} root {:?}", schema.name(), single.label);
        match single.children {
            RawChildren::Embedded(children) => Fetched {
                value: children,
                origin,
            },
            RawChildren::Leaf => Fetched {
                value: Vec::new(),
                origin,
            },
            RawChildren::Deferred => match single.id {
                Some(id) => self.fetch_children(schema, &NodeId::new(id)).await,
                None => Fetched::empty(),
            },
        }
    }

    /// Deferred children of a node
    pub async fn fetch_children(
        &self,
        schema: &dyn CatalogSchema,
        parent: &NodeId,
    ) -> Fetched<Vec<RawNode>> {
        match schema.children_resource(parent) {
            Some(resource) => self.fetch_nodes(schema, &resource).await,
            None => Fetched::empty(),
        }
    }

    /// Refresh the cached copy of a resource; failures are ignored
    ///
    /// Returns whether a fresh copy was stored.
    pub async fn warm(&self, resource: &ResourcePath) -> bool {
        match self.request(Method::Get, resource, None).await {
            Ok(body) => match self.cache.put(resource.cache_key(), &body).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("warm-up of {} not persisted: {}", resource, e);
                    false
                }
            },
            Err(e) => {
                tracing::debug!("warm-up of {} skipped: {}", resource, e);
                false
            }
        }
    }

    /// Signed POST; the response is neither cached nor decoded
    ///
    /// # Errors
    /// Returns the [`FetchError`] of the failed attempt
    pub async fn post(
        &self,
        resource: &ResourcePath,
        body: &[u8],
        content_type: &str,
    ) -> Result<String, FetchError> {
        self.request(Method::Post, resource, Some((body, content_type)))
            .await
    }

    async fn request(
        &self,
        method: Method,
        resource: &ResourcePath,
        body: Option<(&[u8], &str)>,
    ) -> Result<String, FetchError> {
        let headers = self.signer.sign(
            method.as_str(),
            &resource.signing_path(),
            body.map(|(bytes, _)| bytes),
            body.map(|(_, content_type)| content_type),
        )?;

        let url = resource.url(&self.base_url);
        let mut request = HttpRequest {
            method,
            url: url.clone(),
            headers: Vec::new(),
            body: body.map(|(bytes, ct)| (bytes.to_vec(), ct.to_string())),
        };
        for (name, value) in headers.iter() {
            request = request.with_header(name, value);
        }

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                url,
            });
        }
        Ok(response.body)
    }
}
