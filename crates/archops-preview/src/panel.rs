//! Preview surface
//!
//! The host owns the actual surface (an editor web view, a browser tab). The
//! coordinator drives it through [`PreviewPanel`] and asks the host for new
//! panels, notifications and export destinations through [`PanelHost`].
//!
//! Local surface protocol:
//!
//! | direction          | message                     |
//! |--------------------|-----------------------------|
//! | core → surface     | `{"body": ..., "view": ...}` load or switch a diagram |
//! | core → surface     | `{"svg": "svg"}` export request |
//! | surface → core     | `{"svg": "<svg ...>"}` export reply |

use crate::backend::BackendKind;
use crate::error::{PreviewError, PreviewResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Message posted to the surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SurfaceMessage {
    /// Load a rendered body and show `view`
    Load {
        /// Renderable body
        body: String,
        /// Diagram key
        view: String,
    },
    /// Ask the surface for the current diagram as SVG
    Export {
        /// Always `"svg"`
        svg: String,
    },
}

impl SurfaceMessage {
    /// The export request
    #[must_use]
    pub fn export_request() -> Self {
        Self::Export {
            svg: "svg".to_string(),
        }
    }

    /// JSON as posted to the surface
    ///
    /// # Errors
    /// Returns [`PreviewError::Surface`] if serialization fails
    pub fn to_json(&self) -> PreviewResult<String> {
        serde_json::to_string(self).map_err(|e| PreviewError::Surface(e.to_string()))
    }
}

/// Reply from the surface to an export request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceReply {
    /// SVG markup of the current diagram
    pub svg: String,
}

impl SurfaceReply {
    /// Parse a raw reply
    ///
    /// # Errors
    /// Returns [`PreviewError::Surface`] if the reply is not `{ "svg": ... }`
    pub fn from_json(raw: &str) -> PreviewResult<Self> {
        serde_json::from_str(raw).map_err(|e| PreviewError::Surface(e.to_string()))
    }
}

/// One open preview surface
#[async_trait]
pub trait PreviewPanel: Send + Sync + Debug {
    /// Retitle the panel
    fn set_title(&self, title: &str);

    /// Bring the panel to front
    fn reveal(&self);

    /// Replace the whole page (remote backend)
    fn set_html(&self, html: &str);

    /// Post a message to the page (local backend)
    ///
    /// # Errors
    /// Returns [`PreviewError::Surface`] if the page is gone
    async fn post_message(&self, message: SurfaceMessage) -> PreviewResult<()>;

    /// Next reply posted by the page
    ///
    /// # Errors
    /// Returns [`PreviewError::Surface`] if the page is gone
    async fn receive_reply(&self) -> PreviewResult<SurfaceReply>;

    /// Drop replies still queued from earlier requests
    ///
    /// Returns how many were dropped.
    fn discard_replies(&self) -> usize {
        0
    }
}

/// Services the host provides to the coordinator
pub trait PanelHost: Send + Sync + Debug {
    /// Open a new panel for the given backend
    fn create_panel(&self, title: &str, kind: BackendKind) -> Arc<dyn PreviewPanel>;

    /// Show a one-line error to the user
    fn notify_error(&self, message: &str);

    /// Where to save an export; `None` cancels
    fn choose_export_path(&self, suggested: &Path) -> Option<PathBuf> {
        Some(suggested.to_path_buf())
    }
}

/// Everything the coordinator did to a [`ChannelPanel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// New title
    Title(String),
    /// Panel revealed
    Reveal,
    /// Page replaced
    Html(String),
    /// Message posted
    Message(SurfaceMessage),
}

/// Panel that forwards to channels, for hosts bridging to another process
#[derive(Debug)]
pub struct ChannelPanel {
    events: mpsc::UnboundedSender<PanelEvent>,
    replies: Mutex<mpsc::Receiver<SurfaceReply>>,
}

/// Surface side of a [`ChannelPanel`]
#[derive(Debug)]
pub struct SurfaceEndpoint {
    /// Events emitted by the coordinator
    pub events: mpsc::UnboundedReceiver<PanelEvent>,
    /// Replies back to the coordinator
    pub replies: mpsc::Sender<SurfaceReply>,
}

impl ChannelPanel {
    /// Create a connected panel/surface pair
    #[must_use]
    pub fn pair(reply_capacity: usize) -> (Self, SurfaceEndpoint) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (replies_tx, replies_rx) = mpsc::channel(reply_capacity);
        (
            Self {
                events: events_tx,
                replies: Mutex::new(replies_rx),
            },
            SurfaceEndpoint {
                events: events_rx,
                replies: replies_tx,
            },
        )
    }

    fn emit(&self, event: PanelEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("preview surface dropped, event discarded");
        }
    }
}

#[async_trait]
impl PreviewPanel for ChannelPanel {
    fn set_title(&self, title: &str) {
        self.emit(PanelEvent::Title(title.to_string()));
    }

    fn reveal(&self) {
        self.emit(PanelEvent::Reveal);
    }

    fn set_html(&self, html: &str) {
        self.emit(PanelEvent::Html(html.to_string()));
    }

    async fn post_message(&self, message: SurfaceMessage) -> PreviewResult<()> {
        self.events
            .send(PanelEvent::Message(message))
            .map_err(|_| PreviewError::Surface("surface closed".to_string()))
    }

    async fn receive_reply(&self) -> PreviewResult<SurfaceReply> {
        self.replies
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| PreviewError::Surface("surface closed".to_string()))
    }

    fn discard_replies(&self) -> usize {
        let Ok(mut replies) = self.replies.try_lock() else {
            return 0;
        };
        let mut dropped = 0;
        while replies.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
