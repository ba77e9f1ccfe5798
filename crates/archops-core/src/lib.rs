//! archops core vocabulary
//!
//! Types shared by every archops crate:
//!
//! - [`ContentHash`]: Blake3 digest used to deduplicate preview renders
//! - [`ResourcePath`]: logical catalog resource (signing path, URL, cache key)
//! - [`CompanionConfig`]: TOML + environment configuration
//! - [`telemetry`]: tracing subscriber bootstrap
//!
//! # Example
//!
//! ```rust,ignore
//! use archops_core::{CompanionConfig, ResourcePath};
//!
//! let config = CompanionConfig::load("archops.toml".as_ref())?;
//! let index = ResourcePath::new("/architecture-center", "/index");
//! println!("GET {}", index.url(config.api.base_url()));
//! ```

#![warn(unreachable_pub)]

pub mod config;
mod hash;
mod resource;
pub mod telemetry;

pub use config::{
    ApiConfig, CacheConfig, CompanionConfig, ConfigError, PreviewConfig, RenderMode,
    HOSTED_RENDERER,
};
pub use hash::{ContentHash, HashError};
pub use resource::ResourcePath;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
