//! Catalog browsing for archops
//!
//! Fetches the architecture service's catalogs, falls back to the last good
//! copy when the service is unreachable, and exposes each catalog as a lazily
//! expanded tree.
//!
//! ```text
//! TreeMaterializer ─▶ CatalogFetcher ─▶ RequestSigner ─▶ Transport
//!        │                  │
//!        ▼                  ▼
//!   CatalogSchema     PersistentCache
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use archops_catalog::{ArchitectureCenter, CatalogFetcher, TreeMaterializer};
//!
//! let tree = TreeMaterializer::new(Arc::new(ArchitectureCenter), Arc::new(fetcher));
//! for node in tree.materialize_root().await {
//!     println!("{}", node.display_name);
//! }
//! ```

#![warn(unreachable_pub)]

mod actions;
pub mod error;
mod fetcher;
mod materializer;
mod node;
pub mod schema;
pub mod transport;

pub use actions::{install_artifact, Description, DescriptionView};
pub use error::{CatalogError, FetchError, TransportError};
pub use fetcher::{CatalogFetcher, Fetched, Origin};
pub use materializer::TreeMaterializer;
pub use node::{CatalogNode, NodeId};
pub use schema::{
    ArchitectureCenter, BusinessCapabilities, CatalogSchema, CustomerJourneys, RawChildren,
    RawNode,
};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
