//! Authoring engine seam
//!
//! The engine owns the diagram language. The preview only asks it for two
//! things: the intermediate form of a view, and the final body for a view
//! once the layout is known.

use crate::error::PreviewResult;
use async_trait::async_trait;
use std::fmt::Debug;

/// Shape of the intermediate form requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntermediateFormat {
    /// Graphviz DOT, laid out locally
    Dot,
    /// Serialized workspace, rendered by a hosted service
    Workspace,
}

/// External diagram engine
#[async_trait]
pub trait DiagramEngine: Send + Sync + Debug {
    /// Translate `document` into the intermediate form of `view_key`
    ///
    /// # Errors
    /// Returns [`PreviewError::Engine`](crate::PreviewError::Engine) on failure
    async fn translate(
        &self,
        view_key: &str,
        document: &str,
        format: IntermediateFormat,
    ) -> PreviewResult<String>;

    /// Final renderable body for `view_key`, given the laid out SVG
    ///
    /// # Errors
    /// Returns [`PreviewError::Engine`](crate::PreviewError::Engine) on failure
    async fn layout(&self, view_key: &str, document: &str, svg: &str) -> PreviewResult<String>;
}
