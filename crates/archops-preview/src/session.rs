//! Preview session state
//!
//! Every transition replaces the session and bumps a ticket. Work that
//! suspends captures the ticket it started with and checks it again before
//! touching the panel, so a superseded render is dropped on arrival.

use archops_core::ContentHash;

/// Observable coordinator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    /// No diagram shown
    Idle,
    /// A diagram is shown in an open panel
    Displaying {
        /// View being shown
        diagram_key: String,
        /// Document it was rendered from
        document: String,
        /// Hash of the intermediate form last rendered; `None` after a failure
        content_hash: Option<ContentHash>,
    },
}

impl PreviewState {
    /// Whether a diagram is showing
    #[inline]
    #[must_use]
    pub fn is_displaying(&self) -> bool {
        matches!(self, Self::Displaying { .. })
    }
}

/// Result of one `show` or `document_saved` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// New content reached the panel
    Rendered,
    /// Intermediate form unchanged, backend not called
    Unchanged,
    /// No preview for that document
    NotShowing,
    /// A later transition replaced this one; its result was discarded
    Superseded,
    /// Rendering failed; the user was notified, prior content kept
    Failed(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub(crate) ticket: u64,
    pub(crate) diagram_key: String,
    pub(crate) document: String,
    pub(crate) content_hash: Option<ContentHash>,
}

impl Session {
    pub(crate) fn state(&self) -> PreviewState {
        PreviewState::Displaying {
            diagram_key: self.diagram_key.clone(),
            document: self.document.clone(),
            content_hash: self.content_hash,
        }
    }
}
