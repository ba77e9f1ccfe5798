//! archops persistent cache
//!
//! Last-known-good response bodies, keyed by resource path and scoped to the
//! current workspace. The catalog fetcher writes on every successful call and
//! reads only when the network fails.
//!
//! ```text
//! fetch ok   ──put──▶ FileCache (moka hot layer ─▶ <dir>/<blake3(key)>.json)
//! fetch fail ──get──▶ FileCache ──▶ stale body | miss
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use store::{CacheEntry, FileCache, MemoryCache, PersistentCache};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
