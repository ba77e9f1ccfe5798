//! Live diagram preview for archops
//!
//! [`PreviewCoordinator`] keeps one preview panel in sync with the document
//! being edited. Re-renders happen only when the engine's intermediate form
//! actually changed, and results that arrive after a newer request or after
//! the panel closed are dropped.
//!
//! ```text
//! show / document_saved
//!        │
//!        ▼
//!  DiagramEngine::translate ─▶ hash ─▶ RenderBackend ─▶ PreviewPanel
//!                                        ├─ LocalBackend  (GraphLayout + engine layout)
//!                                        └─ RemoteBackend (hosted renderer page)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use archops_preview::PreviewCoordinator;
//!
//! let coordinator = PreviewCoordinator::from_config(&config.preview, engine, host);
//! coordinator.show("SystemContext", "/ws/model.dsl", &dot).await;
//! coordinator.document_saved("/ws/model.dsl").await;
//! ```

#![warn(unreachable_pub)]

pub mod backend;
mod coordinator;
mod engine;
pub mod error;
pub mod layout;
pub mod panel;
mod session;

pub use backend::{BackendKind, LocalBackend, RemoteBackend, RenderBackend, Rendered};
pub use coordinator::{default_export_path, PreviewCoordinator, DEFAULT_EXPORT_TIMEOUT};
pub use engine::{DiagramEngine, IntermediateFormat};
pub use error::{PreviewError, PreviewResult};
pub use layout::{GraphLayout, GraphvizCli};
pub use panel::{
    ChannelPanel, PanelEvent, PanelHost, PreviewPanel, SurfaceEndpoint, SurfaceMessage,
    SurfaceReply,
};
pub use session::{PreviewState, RenderOutcome};

/// Title of the preview panel
pub const PANEL_TITLE: &str = "Architecture Preview";

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
