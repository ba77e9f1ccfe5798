//! Preview coordinator
//!
//! ```text
//!            show                      document_saved (hash changed)
//!   Idle ───────────▶ Displaying ◀──────────────────────────┐
//!    ▲                    │ │                                │
//!    │   panel_closed     │ └────────────────────────────────┘
//!    └────────────────────┘
//! ```
//!
//! Only the newest transition may touch the panel. A render that resolves
//! after a later `show`, a changed save, or a close is discarded.

use crate::backend::{self, BackendKind, RenderBackend, Rendered};
use crate::engine::DiagramEngine;
use crate::error::{PreviewError, PreviewResult};
use crate::panel::{PanelHost, PreviewPanel, SurfaceMessage};
use crate::session::{PreviewState, RenderOutcome, Session};
use crate::PANEL_TITLE;
use archops_core::{ContentHash, PreviewConfig};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default wait for the surface to answer an export request
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct Inner {
    last_ticket: u64,
    session: Option<Session>,
    panel: Option<Arc<dyn PreviewPanel>>,
}

impl Inner {
    fn next_ticket(&mut self) -> u64 {
        self.last_ticket += 1;
        self.last_ticket
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.ticket == ticket)
    }
}

/// Owns the live preview panel of one host
#[derive(Debug)]
pub struct PreviewCoordinator {
    engine: Arc<dyn DiagramEngine>,
    backend: Arc<dyn RenderBackend>,
    host: Arc<dyn PanelHost>,
    export_timeout: Duration,
    inner: Mutex<Inner>,
}

impl PreviewCoordinator {
    /// Create coordinator with a fixed backend
    #[must_use]
    pub fn new(
        engine: Arc<dyn DiagramEngine>,
        backend: Arc<dyn RenderBackend>,
        host: Arc<dyn PanelHost>,
    ) -> Self {
        Self {
            engine,
            backend,
            host,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Create coordinator with the backend selected by `config`
    #[must_use]
    pub fn from_config(
        config: &PreviewConfig,
        engine: Arc<dyn DiagramEngine>,
        host: Arc<dyn PanelHost>,
    ) -> Self {
        Self::new(engine, backend::from_config(config), host)
            .with_export_timeout(Duration::from_secs(config.export_timeout_secs))
    }

    /// With export reply timeout
    #[inline]
    #[must_use]
    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    /// Backend serving this coordinator
    #[inline]
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PreviewState {
        self.inner
            .lock()
            .session
            .as_ref()
            .map_or(PreviewState::Idle, Session::state)
    }

    /// Show `diagram_key` of `document`, given its intermediate form
    ///
    /// Reuses the open panel (revealed and retitled) or asks the host for one.
    pub async fn show(&self, diagram_key: &str, document: &str, intermediate: &str) -> RenderOutcome {
        let (ticket, panel) = {
            let mut inner = self.inner.lock();
            let ticket = inner.next_ticket();
            inner.session = Some(Session {
                ticket,
                diagram_key: diagram_key.to_string(),
                document: document.to_string(),
                content_hash: Some(ContentHash::of_text(intermediate)),
            });
            let panel = self.open_panel(&mut inner);
            panel.set_title(&format!("{PANEL_TITLE}: {diagram_key}"));
            (ticket, panel)
        };

        tracing::info!("showing {} of {}", diagram_key, document);
        self.render(ticket, &panel, diagram_key, document, intermediate)
            .await
    }

    /// React to `document` being saved
    ///
    /// Asks the engine for a fresh intermediate form and re-renders only when
    /// its hash differs from the last one rendered.
    pub async fn document_saved(&self, document: &str) -> RenderOutcome {
        let (ticket, diagram_key) = {
            let inner = self.inner.lock();
            match &inner.session {
                Some(session) if session.document == document => {
                    (session.ticket, session.diagram_key.clone())
                }
                _ => return RenderOutcome::NotShowing,
            }
        };

        let intermediate = match self
            .engine
            .translate(&diagram_key, document, self.backend.format())
            .await
        {
            Ok(intermediate) => intermediate,
            Err(e) => return self.fail(ticket, &e),
        };
        let hash = ContentHash::of_text(&intermediate);

        let (ticket, panel) = {
            let mut inner = self.inner.lock();
            if !inner.is_current(ticket) {
                tracing::debug!("save of {} superseded during translate", document);
                return RenderOutcome::Superseded;
            }
            let Some(panel) = inner.panel.clone() else {
                return RenderOutcome::Superseded;
            };
            let next = inner.next_ticket();
            let Some(session) = inner.session.as_mut() else {
                return RenderOutcome::Superseded;
            };
            if session.content_hash == Some(hash) {
                tracing::debug!("{} unchanged ({}), skipping render", diagram_key, hash.short());
                return RenderOutcome::Unchanged;
            }
            session.ticket = next;
            session.content_hash = Some(hash);
            (next, panel)
        };

        self.render(ticket, &panel, &diagram_key, document, &intermediate)
            .await
    }

    /// The host disposed the panel
    pub fn panel_closed(&self) {
        let mut inner = self.inner.lock();
        inner.next_ticket();
        inner.panel = None;
        if let Some(session) = inner.session.take() {
            tracing::info!("preview of {} closed", session.diagram_key);
        }
    }

    /// Export the shown diagram as SVG
    ///
    /// Writes to `destination`, or to the path the host picks starting from
    /// `<documents>/<diagram key>.svg`. `Ok(None)` means the host cancelled.
    ///
    /// # Errors
    /// - [`PreviewError::ExportUnsupported`] on the remote backend
    /// - [`PreviewError::NoActivePanel`] when nothing is showing
    /// - [`PreviewError::Timeout`] when the surface does not answer
    /// - [`PreviewError::ExportSuperseded`] when another diagram was shown,
    ///   or the panel closed, before the reply arrived
    /// - [`PreviewError::Io`] when the file cannot be written
    pub async fn export_svg(&self, destination: Option<PathBuf>) -> PreviewResult<Option<PathBuf>> {
        if !self.backend.supports_export() {
            return Err(PreviewError::ExportUnsupported(self.backend.kind().as_str()));
        }
        let (ticket, diagram_key, panel) = {
            let inner = self.inner.lock();
            match (&inner.session, &inner.panel) {
                (Some(session), Some(panel)) => (
                    session.ticket,
                    session.diagram_key.clone(),
                    Arc::clone(panel),
                ),
                _ => return Err(PreviewError::NoActivePanel),
            }
        };

        let stale = panel.discard_replies();
        if stale > 0 {
            tracing::debug!("dropped {} stale export replies", stale);
        }
        panel.post_message(SurfaceMessage::export_request()).await?;
        let reply = tokio::time::timeout(self.export_timeout, panel.receive_reply())
            .await
            .map_err(|_| PreviewError::Timeout(self.export_timeout.as_secs()))??;

        if !self.inner.lock().is_current(ticket) {
            tracing::info!("export of {} superseded", diagram_key);
            return Err(PreviewError::ExportSuperseded);
        }

        let target = match destination {
            Some(path) => path,
            None => match self.host.choose_export_path(&default_export_path(&diagram_key)) {
                Some(path) => path,
                None => {
                    tracing::info!("export of {} cancelled", diagram_key);
                    return Ok(None);
                }
            },
        };
        tokio::fs::write(&target, reply.svg.as_bytes())
            .await
            .map_err(|e| PreviewError::io_error(&target, e))?;
        tracing::info!("exported {} to {}", diagram_key, target.display());
        Ok(Some(target))
    }

    fn open_panel(&self, inner: &mut Inner) -> Arc<dyn PreviewPanel> {
        if let Some(panel) = &inner.panel {
            panel.reveal();
            return Arc::clone(panel);
        }
        let panel = self.host.create_panel(PANEL_TITLE, self.backend.kind());
        inner.panel = Some(Arc::clone(&panel));
        panel
    }

    async fn render(
        &self,
        ticket: u64,
        panel: &Arc<dyn PreviewPanel>,
        diagram_key: &str,
        document: &str,
        intermediate: &str,
    ) -> RenderOutcome {
        let rendered = match self
            .backend
            .render(self.engine.as_ref(), diagram_key, document, intermediate)
            .await
        {
            Ok(rendered) => rendered,
            Err(e) => return self.fail(ticket, &e),
        };

        if !self.inner.lock().is_current(ticket) {
            tracing::debug!("discarding stale render of {}", diagram_key);
            return RenderOutcome::Superseded;
        }
        let applied = match rendered {
            Rendered::Html(html) => {
                panel.set_html(&html);
                Ok(())
            }
            Rendered::Message(message) => panel.post_message(message).await,
        };
        match applied {
            Ok(()) => RenderOutcome::Rendered,
            Err(e) => self.fail(ticket, &e),
        }
    }

    fn fail(&self, ticket: u64, error: &PreviewError) -> RenderOutcome {
        {
            let mut inner = self.inner.lock();
            match inner.session.as_mut() {
                Some(session) if session.ticket == ticket => session.content_hash = None,
                _ => {
                    tracing::debug!("dropping failure of superseded render: {}", error);
                    return RenderOutcome::Superseded;
                }
            }
        }
        let message = format!("Preview failed: {error}");
        tracing::warn!("{}", message);
        self.host.notify_error(&message);
        RenderOutcome::Failed(message)
    }
}

/// `<documents>/<diagram key>.svg`
#[must_use]
pub fn default_export_path(diagram_key: &str) -> PathBuf {
    let dir = dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        .unwrap_or_else(|| Path::new(".").to_path_buf());
    let name: String = diagram_key
        .chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect();
    dir.join(format!("{name}.svg"))
}
