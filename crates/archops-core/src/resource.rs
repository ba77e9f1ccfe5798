//! Resource paths
//!
//! A [`ResourcePath`] names one fetchable unit of catalog content. The same
//! value yields the HTTP path that gets signed, the request URL (signing path
//! plus optional query) and the key under which the last good body is cached.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Logical identifier of a fetchable catalog resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePath {
    service: String,
    path: String,
    query: Option<String>,
}

impl ResourcePath {
    /// Create a resource under a service prefix, e.g. `("/architecture-center", "/index")`
    #[must_use]
    pub fn new(service: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
            query: None,
        }
    }

    /// Attach a query string (without the leading `?`)
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    /// Service prefix
    #[inline]
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Resource path below the service prefix
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string, if any
    #[inline]
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Path covered by the request signature. The query string is never signed.
    #[must_use]
    pub fn signing_path(&self) -> String {
        format!("{}{}", self.service, self.path)
    }

    /// Key used for the persistent cache entry of this resource
    #[inline]
    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.path
    }

    /// Absolute request URL against a base URL
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match &self.query {
            Some(query) => format!("{base}{}?{query}", self.signing_path()),
            None => format!("{base}{}", self.signing_path()),
        }
    }
}

impl Display for ResourcePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.service, self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}
