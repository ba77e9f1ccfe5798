//! Companion configuration
//!
//! Loaded from a TOML file, then overridden from the environment. Every field
//! has a default so an empty file is a valid (unsigned, local-preview) setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Address of the hosted renderer; selecting it switches preview to the remote backend
pub const HOSTED_RENDERER: &str = "https://structurizr.com";

/// Environment variable overriding [`ApiConfig::url`]
pub const ENV_API_URL: &str = "ARCHOPS_API_URL";
/// Environment variable overriding [`ApiConfig::key`]
pub const ENV_API_KEY: &str = "ARCHOPS_API_KEY";
/// Environment variable overriding [`ApiConfig::secret`]
pub const ENV_API_SECRET: &str = "ARCHOPS_API_SECRET";

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Remote architecture service
    pub api: ApiConfig,
    /// Diagram preview
    pub preview: PreviewConfig,
    /// Persistent cache
    pub cache: CacheConfig,
}

impl CompanionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed input
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a file, then apply environment overrides
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(Self::from_toml_str(&text)?.apply_env())
    }

    /// Apply `ARCHOPS_API_*` overrides from the process environment
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production)
    #[must_use]
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_URL) {
            tracing::debug!("api url overridden by {}", ENV_API_URL);
            self.api.url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api.key = key;
        }
        if let Some(secret) = lookup(ENV_API_SECRET) {
            self.api.secret = secret;
        }
        self
    }

    /// With API base URL
    #[inline]
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api.url = url.into();
        self
    }

    /// With API credentials
    #[inline]
    #[must_use]
    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.api.key = key.into();
        self.api.secret = secret.into();
        self
    }

    /// With preview render target (`"local"` or a service URL)
    #[inline]
    #[must_use]
    pub fn with_render(mut self, render: impl Into<String>) -> Self {
        self.preview.render = render.into();
        self
    }
}

/// Remote service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the architecture service
    pub url: String,
    /// API key; empty disables request signing
    pub key: String,
    /// API secret; empty disables request signing
    pub secret: String,
    /// Verify TLS certificates
    pub verify_certificates: bool,
    /// Transport timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl ApiConfig {
    /// Base URL without trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Both key and secret are configured
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            secret: String::new(),
            verify_certificates: true,
            timeout_secs: 30,
            user_agent: concat!("archops/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Preview settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// `"local"` or the URL of a hosted rendering service
    pub render: String,
    /// Graphviz executable used by the local backend
    pub graphviz: PathBuf,
    /// Seconds to wait for the surface to answer an export request
    pub export_timeout_secs: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            render: "local".to_string(),
            graphviz: PathBuf::from("dot"),
            export_timeout_secs: 30,
        }
    }
}

impl PreviewConfig {
    /// Resolve the configured backend
    #[must_use]
    pub fn mode(&self) -> RenderMode {
        let render = self.render.trim().trim_end_matches('/');
        if render.is_empty() || render.eq_ignore_ascii_case("local") {
            RenderMode::Local
        } else if render == HOSTED_RENDERER {
            RenderMode::Remote {
                service_url: format!("{HOSTED_RENDERER}/json"),
            }
        } else {
            RenderMode::Remote {
                service_url: render.to_string(),
            }
        }
    }
}

/// Which rendering backend the preview uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderMode {
    /// Layout computed locally, streamed into the surface
    Local,
    /// Content posted to a hosted renderer inside an embedded frame
    Remote {
        /// Endpoint receiving the form post
        service_url: String,
    },
}

/// Persistent cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory; defaults to `<workspace>/.archops/cache`
    pub dir: Option<PathBuf>,
    /// Entries kept in the in-memory read-through layer
    pub memory_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            memory_capacity: 1_024,
        }
    }
}

impl CacheConfig {
    /// Directory to use for a workspace
    #[must_use]
    pub fn resolve_dir(&self, workspace: &Path) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| workspace.join(".archops").join("cache"))
    }
}
