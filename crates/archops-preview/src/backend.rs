//! Rendering backends
//!
//! Exactly one backend serves a coordinator for its whole lifetime:
//!
//! - [`LocalBackend`]: DOT → local layout → engine layout → `{ body, view }`
//!   message. Supports SVG export.
//! - [`RemoteBackend`]: workspace → base64 → page posting to a hosted
//!   renderer inside an embedded frame. No export.

use crate::engine::{DiagramEngine, IntermediateFormat};
use crate::error::PreviewResult;
use crate::layout::{GraphLayout, GraphvizCli};
use crate::panel::SurfaceMessage;
use archops_core::{PreviewConfig, RenderMode};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt::Debug;
use std::sync::Arc;

/// Backend identity, handed to the host when a panel is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Local layout, message-driven surface
    Local,
    /// Hosted renderer in an embedded frame
    Remote,
}

impl BackendKind {
    /// Lower-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// What to apply to the panel once a render completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Post to the surface
    Message(SurfaceMessage),
    /// Replace the page
    Html(String),
}

/// Turns an intermediate form into panel content
#[async_trait]
pub trait RenderBackend: Send + Sync + Debug {
    /// Backend identity
    fn kind(&self) -> BackendKind;

    /// Intermediate form this backend consumes
    fn format(&self) -> IntermediateFormat;

    /// Whether SVG export is available
    fn supports_export(&self) -> bool {
        false
    }

    /// Render `intermediate` for `view_key`
    ///
    /// # Errors
    /// Returns the engine or layout failure
    async fn render(
        &self,
        engine: &dyn DiagramEngine,
        view_key: &str,
        document: &str,
        intermediate: &str,
    ) -> PreviewResult<Rendered>;
}

/// Backend selected by configuration
#[must_use]
pub fn from_config(config: &PreviewConfig) -> Arc<dyn RenderBackend> {
    match config.mode() {
        RenderMode::Local => {
            tracing::info!("preview renders locally with {}", config.graphviz.display());
            Arc::new(LocalBackend::new(Arc::new(GraphvizCli::new(
                config.graphviz.clone(),
            ))))
        }
        RenderMode::Remote { service_url } => {
            tracing::info!("preview renders remotely via {}", service_url);
            Arc::new(RemoteBackend::new(service_url))
        }
    }
}

/// Local layout backend
#[derive(Debug, Clone)]
pub struct LocalBackend {
    layout: Arc<dyn GraphLayout>,
}

impl LocalBackend {
    /// Create backend over a layout implementation
    #[must_use]
    pub fn new(layout: Arc<dyn GraphLayout>) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl RenderBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn format(&self) -> IntermediateFormat {
        IntermediateFormat::Dot
    }

    fn supports_export(&self) -> bool {
        true
    }

    async fn render(
        &self,
        engine: &dyn DiagramEngine,
        view_key: &str,
        document: &str,
        intermediate: &str,
    ) -> PreviewResult<Rendered> {
        let svg = self.layout.layout(intermediate).await?;
        let body = engine.layout(view_key, document, &svg).await?;
        Ok(Rendered::Message(SurfaceMessage::Load {
            body,
            view: view_key.to_string(),
        }))
    }
}

/// Hosted renderer backend
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    service_url: String,
}

impl RemoteBackend {
    /// Create backend posting to `service_url`
    #[must_use]
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
        }
    }

    /// Render service endpoint
    #[inline]
    #[must_use]
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// Full page embedding the render form
    #[must_use]
    pub fn page(&self, view_key: &str, intermediate: &str) -> String {
        let source = STANDARD.encode(intermediate.as_bytes());
        let action = escape_attr(&self.service_url);
        let diagram = escape_attr(view_key);
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        html, body, iframe {{ margin: 0; padding: 0; width: 100%; height: 100%; border: none; }}
    </style>
</head>
<body>
    <iframe id="preview" name="preview" width="100%" marginwidth="0" marginheight="0" frameborder="0" scrolling="no"></iframe>
    <form id="previewForm" method="post" action="{action}" target="preview" style="display: none;">
        <input type="hidden" name="iframe" value="preview" />
        <input type="hidden" name="preview" value="true" />
        <input type="hidden" name="source" value="{source}" />
        <input type="hidden" name="diagram" value="{diagram}" />
    </form>
    <script>document.getElementById("previewForm").submit();</script>
</body>
</html>
"#,
            title = crate::PANEL_TITLE,
        )
    }
}

#[async_trait]
impl RenderBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn format(&self) -> IntermediateFormat {
        IntermediateFormat::Workspace
    }

    async fn render(
        &self,
        _engine: &dyn DiagramEngine,
        view_key: &str,
        _document: &str,
        intermediate: &str,
    ) -> PreviewResult<Rendered> {
        Ok(Rendered::Html(self.page(view_key, intermediate)))
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
