//! Testing utilities for the archops workspace
//!
//! Scripted transport, recording panel host, and controllable engine and
//! layout fakes shared by the integration tests.

#![allow(missing_docs)]

use archops_catalog::{HttpRequest, HttpResponse, Transport, TransportError};
use archops_preview::{
    BackendKind, ChannelPanel, DiagramEngine, GraphLayout, IntermediateFormat, PanelEvent,
    PanelHost, PreviewError, PreviewPanel, PreviewResult, RenderBackend, Rendered,
    SurfaceEndpoint, SurfaceMessage, SurfaceReply,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub const BASE_URL: &str = "https://arch.example.com";

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Transport answering from a table keyed by URL path (plus query)
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, HttpResponse>>,
    calls: Mutex<Vec<HttpRequest>>,
    offline: Mutex<bool>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `path` with 200 and `body`
    pub fn route(&self, path: &str, body: &str) {
        self.routes
            .lock()
            .insert(path.to_string(), HttpResponse::ok(body));
    }

    /// Answer `path` with `status`
    pub fn route_status(&self, path: &str, status: u16) {
        self.routes.lock().insert(
            path.to_string(),
            HttpResponse {
                status,
                body: String::new(),
            },
        );
    }

    /// Fail every request at the transport level
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    /// Requests received for `path`
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| strip_base(&r.url) == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.calls.lock().clone()
    }
}

fn strip_base(url: &str) -> &str {
    url.strip_prefix(BASE_URL).unwrap_or(url)
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.lock().push(request.clone());
        tokio::task::yield_now().await;
        if *self.offline.lock() {
            return Err(TransportError::Request("connection refused".to_string()));
        }
        let path = strip_base(&request.url);
        Ok(self.routes.lock().get(path).cloned().unwrap_or(HttpResponse {
            status: 404,
            body: String::new(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Preview surface
// ---------------------------------------------------------------------------

/// Panel recording everything it is told
#[derive(Debug, Default)]
pub struct RecordingPanel {
    events: Mutex<Vec<PanelEvent>>,
    export_svg: Mutex<Option<String>>,
    broken: Mutex<bool>,
}

impl RecordingPanel {
    pub fn events(&self) -> Vec<PanelEvent> {
        self.events.lock().clone()
    }

    /// Messages posted, in order
    pub fn messages(&self) -> Vec<SurfaceMessage> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                PanelEvent::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Views loaded via `{ body, view }`, in order
    pub fn loaded_views(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                SurfaceMessage::Load { view, .. } => Some(view),
                SurfaceMessage::Export { .. } => None,
            })
            .collect()
    }

    pub fn pages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                PanelEvent::Html(h) => Some(h.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn reveals(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, PanelEvent::Reveal))
            .count()
    }

    /// Markup returned to the next export request
    pub fn set_export_svg(&self, svg: &str) {
        *self.export_svg.lock() = Some(svg.to_string());
    }

    /// Make `post_message` fail
    pub fn break_surface(&self) {
        *self.broken.lock() = true;
    }
}

#[async_trait]
impl PreviewPanel for RecordingPanel {
    fn set_title(&self, title: &str) {
        self.events.lock().push(PanelEvent::Title(title.to_string()));
    }

    fn reveal(&self) {
        self.events.lock().push(PanelEvent::Reveal);
    }

    fn set_html(&self, html: &str) {
        self.events.lock().push(PanelEvent::Html(html.to_string()));
    }

    async fn post_message(&self, message: SurfaceMessage) -> PreviewResult<()> {
        if *self.broken.lock() {
            return Err(PreviewError::Surface("surface closed".to_string()));
        }
        self.events.lock().push(PanelEvent::Message(message));
        Ok(())
    }

    async fn receive_reply(&self) -> PreviewResult<SurfaceReply> {
        let svg = self.export_svg.lock().clone();
        match svg {
            Some(svg) => Ok(SurfaceReply { svg }),
            None => std::future::pending().await,
        }
    }
}

/// Host handing out [`RecordingPanel`]s and recording notifications
#[derive(Debug, Default)]
pub struct RecordingHost {
    panels: Mutex<Vec<Arc<RecordingPanel>>>,
    errors: Mutex<Vec<String>>,
    export_path: Mutex<Option<PathBuf>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn panels_created(&self) -> usize {
        self.panels.lock().len()
    }

    /// Most recently created panel
    pub fn panel(&self) -> Arc<RecordingPanel> {
        self.panels
            .lock()
            .last()
            .cloned()
            .expect("no panel created")
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Path returned by the save dialog; `None` cancels
    pub fn set_export_path(&self, path: Option<PathBuf>) {
        *self.export_path.lock() = path;
    }
}

impl PanelHost for RecordingHost {
    fn create_panel(&self, _title: &str, _kind: BackendKind) -> Arc<dyn PreviewPanel> {
        let panel = Arc::new(RecordingPanel::default());
        self.panels.lock().push(Arc::clone(&panel));
        panel
    }

    fn notify_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn choose_export_path(&self, _suggested: &Path) -> Option<PathBuf> {
        self.export_path.lock().clone()
    }
}

/// Host with a single [`ChannelPanel`], handed out on every request
#[derive(Debug)]
pub struct ChannelHost {
    panel: Arc<ChannelPanel>,
    errors: Mutex<Vec<String>>,
}

impl ChannelHost {
    pub fn pair(reply_capacity: usize) -> (Arc<Self>, SurfaceEndpoint) {
        let (panel, surface) = ChannelPanel::pair(reply_capacity);
        let host = Arc::new(Self {
            panel: Arc::new(panel),
            errors: Mutex::new(Vec::new()),
        });
        (host, surface)
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl PanelHost for ChannelHost {
    fn create_panel(&self, _title: &str, _kind: BackendKind) -> Arc<dyn PreviewPanel> {
        self.panel.clone()
    }

    fn notify_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}

/// Wait for the next export request on `surface`, skipping other events
pub async fn next_export_request(surface: &mut SurfaceEndpoint) {
    while let Some(event) = surface.events.recv().await {
        if event == PanelEvent::Message(SurfaceMessage::export_request()) {
            return;
        }
    }
    panic!("surface closed before an export request");
}

// ---------------------------------------------------------------------------
// Engine and layout
// ---------------------------------------------------------------------------

/// Engine serving intermediate forms from a per-document table
#[derive(Debug, Default)]
pub struct FakeEngine {
    documents: Mutex<HashMap<String, String>>,
    translations: AtomicUsize,
    failing: Mutex<bool>,
    translate_gate: Mutex<Option<Arc<Notify>>>,
    translate_entered: Notify,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the intermediate form the next translate of `document` returns
    pub fn set_document(&self, document: &str, intermediate: &str) {
        self.documents
            .lock()
            .insert(document.to_string(), intermediate.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn translations(&self) -> usize {
        self.translations.load(Ordering::SeqCst)
    }

    /// Hold the next translate until [`release_translate`](Self::release_translate)
    pub fn hold_translate(&self) {
        *self.translate_gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release_translate(&self) {
        if let Some(gate) = self.translate_gate.lock().take() {
            gate.notify_one();
        }
    }

    /// Wait until a held translate has started
    pub async fn wait_translate_entered(&self) {
        self.translate_entered.notified().await;
    }
}

#[async_trait]
impl DiagramEngine for FakeEngine {
    async fn translate(
        &self,
        _view_key: &str,
        document: &str,
        _format: IntermediateFormat,
    ) -> PreviewResult<String> {
        self.translations.fetch_add(1, Ordering::SeqCst);
        let gate = self.translate_gate.lock().clone();
        if let Some(gate) = gate {
            self.translate_entered.notify_one();
            gate.notified().await;
        }
        if *self.failing.lock() {
            return Err(PreviewError::engine("syntax error at line 3"));
        }
        self.documents
            .lock()
            .get(document)
            .cloned()
            .ok_or_else(|| PreviewError::engine(format!("unknown document {document}")))
    }

    async fn layout(&self, view_key: &str, _document: &str, svg: &str) -> PreviewResult<String> {
        if *self.failing.lock() {
            return Err(PreviewError::engine("layout rejected"));
        }
        Ok(format!("{{\"view\":\"{view_key}\",\"svg\":\"{}\"}}", svg.len()))
    }
}

/// Layout that can hold chosen inputs until released
#[derive(Debug, Default)]
pub struct GatedLayout {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    entered: Notify,
}

impl GatedLayout {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold layouts of DOT text containing `marker` until [`release`](Self::release)
    pub fn hold(&self, marker: &str) {
        self.gates
            .lock()
            .insert(marker.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, marker: &str) {
        if let Some(gate) = self.gates.lock().get(marker) {
            gate.notify_one();
        }
    }

    /// Wait until a held layout has started
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl GraphLayout for GatedLayout {
    async fn layout(&self, dot: &str) -> PreviewResult<String> {
        let gate = self
            .gates
            .lock()
            .iter()
            .find(|(marker, _)| dot.contains(marker.as_str()))
            .map(|(_, gate)| Arc::clone(gate));
        if let Some(gate) = gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        Ok(format!("<svg>{dot}</svg>"))
    }
}

/// Backend wrapper counting render calls
#[derive(Debug)]
pub struct CountingBackend {
    inner: Arc<dyn RenderBackend>,
    renders: AtomicUsize,
}

impl CountingBackend {
    pub fn new(inner: Arc<dyn RenderBackend>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            renders: AtomicUsize::new(0),
        })
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderBackend for CountingBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn format(&self) -> IntermediateFormat {
        self.inner.format()
    }

    fn supports_export(&self) -> bool {
        self.inner.supports_export()
    }

    async fn render(
        &self,
        engine: &dyn DiagramEngine,
        view_key: &str,
        document: &str,
        intermediate: &str,
    ) -> PreviewResult<Rendered> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.inner
            .render(engine, view_key, document, intermediate)
            .await
    }
}
