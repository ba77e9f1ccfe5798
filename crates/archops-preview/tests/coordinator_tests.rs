//! Coordinator Tests
//!
//! Preview state machine against recording panels and controllable engines.
//!
use archops_core::{ContentHash, PreviewConfig};
use archops_preview::{
    BackendKind, LocalBackend, PreviewCoordinator, PreviewError, PreviewState, RemoteBackend,
    RenderOutcome, SurfaceEndpoint, SurfaceMessage, SurfaceReply,
};
use archops_test_utils::{
    next_export_request, ChannelHost, CountingBackend, FakeEngine, GatedLayout, RecordingHost,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const DOC: &str = "/ws/model.dsl";

struct Harness {
    engine: Arc<FakeEngine>,
    layout: Arc<GatedLayout>,
    backend: Arc<CountingBackend>,
    host: Arc<RecordingHost>,
    coordinator: Arc<PreviewCoordinator>,
}

fn local() -> Harness {
    let engine = FakeEngine::new();
    let layout = GatedLayout::new();
    let backend = CountingBackend::new(Arc::new(LocalBackend::new(layout.clone())));
    let host = RecordingHost::new();
    let coordinator = Arc::new(
        PreviewCoordinator::new(engine.clone(), backend.clone(), host.clone())
            .with_export_timeout(Duration::from_millis(50)),
    );
    Harness {
        engine,
        layout,
        backend,
        host,
        coordinator,
    }
}

fn bridged(export_timeout: Duration) -> (Arc<PreviewCoordinator>, SurfaceEndpoint) {
    let (host, surface) = ChannelHost::pair(4);
    let coordinator = PreviewCoordinator::new(
        FakeEngine::new(),
        Arc::new(LocalBackend::new(GatedLayout::new())),
        host,
    )
    .with_export_timeout(export_timeout);
    (Arc::new(coordinator), surface)
}

async fn reply(surface: &SurfaceEndpoint, svg: &str) {
    surface
        .replies
        .send(SurfaceReply {
            svg: svg.to_string(),
        })
        .await
        .unwrap();
}

fn displayed_key(state: &PreviewState) -> Option<&str> {
    match state {
        PreviewState::Displaying { diagram_key, .. } => Some(diagram_key),
        PreviewState::Idle => None,
    }
}

#[tokio::test]
async fn test_show_opens_panel_and_loads_view() {
    let h = local();

    let outcome = h.coordinator.show("Context", DOC, "digraph Context").await;

    assert_eq!(outcome, RenderOutcome::Rendered);
    assert_eq!(h.host.panels_created(), 1);
    assert_eq!(h.host.panel().loaded_views(), vec!["Context".to_string()]);
    assert_eq!(
        h.coordinator.state(),
        PreviewState::Displaying {
            diagram_key: "Context".to_string(),
            document: DOC.to_string(),
            content_hash: Some(ContentHash::of_text("digraph Context")),
        }
    );
}

#[tokio::test]
async fn test_new_diagram_reuses_open_panel() {
    let h = local();

    h.coordinator.show("Context", DOC, "digraph Context").await;
    h.coordinator.show("Containers", DOC, "digraph Containers").await;

    assert_eq!(h.host.panels_created(), 1);
    let panel = h.host.panel();
    assert_eq!(panel.reveals(), 1);
    assert_eq!(
        panel.loaded_views(),
        vec!["Context".to_string(), "Containers".to_string()]
    );
}

#[tokio::test]
async fn test_unchanged_save_skips_backend() {
    let h = local();
    h.engine.set_document(DOC, "digraph Context");
    h.coordinator.show("Context", DOC, "digraph Context").await;
    assert_eq!(h.backend.renders(), 1);

    let outcome = h.coordinator.document_saved(DOC).await;

    assert_eq!(outcome, RenderOutcome::Unchanged);
    assert_eq!(h.engine.translations(), 1);
    assert_eq!(h.backend.renders(), 1);
    assert_eq!(h.host.panel().loaded_views().len(), 1);
}

#[tokio::test]
async fn test_changed_save_rerenders_and_stores_hash() {
    let h = local();
    h.coordinator.show("Context", DOC, "digraph Context").await;
    h.engine.set_document(DOC, "digraph Context { a -> b }");

    let outcome = h.coordinator.document_saved(DOC).await;

    assert_eq!(outcome, RenderOutcome::Rendered);
    assert_eq!(h.backend.renders(), 2);
    let PreviewState::Displaying { content_hash, .. } = h.coordinator.state() else {
        panic!("expected a displayed diagram");
    };
    assert_eq!(
        content_hash,
        Some(ContentHash::of_text("digraph Context { a -> b }"))
    );

    assert_eq!(
        h.coordinator.document_saved(DOC).await,
        RenderOutcome::Unchanged
    );
}

#[tokio::test]
async fn test_save_of_other_document_is_ignored() {
    let h = local();
    h.coordinator.show("Context", DOC, "digraph Context").await;

    let outcome = h.coordinator.document_saved("/ws/other.dsl").await;

    assert_eq!(outcome, RenderOutcome::NotShowing);
    assert_eq!(h.engine.translations(), 0);
}

#[tokio::test]
async fn test_later_show_supersedes_pending_one() {
    let h = local();
    h.layout.hold("view1");

    let coordinator = Arc::clone(&h.coordinator);
    let first =
        tokio::spawn(async move { coordinator.show("view1", DOC, "digraph view1").await });
    h.layout.wait_entered().await;

    let second = h.coordinator.show("view2", DOC, "digraph view2").await;
    h.layout.release("view1");
    let first = first.await.unwrap();

    assert_eq!(second, RenderOutcome::Rendered);
    assert_eq!(first, RenderOutcome::Superseded);
    assert_eq!(h.host.panel().loaded_views(), vec!["view2".to_string()]);
    assert_eq!(displayed_key(&h.coordinator.state()), Some("view2"));
}

#[tokio::test]
async fn test_show_supersedes_in_flight_save() {
    let h = local();
    h.coordinator.show("view1", DOC, "digraph view1").await;
    h.engine.set_document(DOC, "digraph view1 { a -> b }");
    h.engine.hold_translate();

    let coordinator = Arc::clone(&h.coordinator);
    let save = tokio::spawn(async move { coordinator.document_saved(DOC).await });
    h.engine.wait_translate_entered().await;

    let shown = h.coordinator.show("view2", DOC, "digraph view2").await;
    h.engine.release_translate();

    assert_eq!(shown, RenderOutcome::Rendered);
    assert_eq!(save.await.unwrap(), RenderOutcome::Superseded);
    assert_eq!(h.backend.renders(), 2);
    assert_eq!(
        h.host.panel().loaded_views(),
        vec!["view1".to_string(), "view2".to_string()]
    );
    assert_eq!(displayed_key(&h.coordinator.state()), Some("view2"));
}

#[tokio::test]
async fn test_save_after_close_is_a_no_op() {
    let h = local();
    h.engine.set_document(DOC, "digraph changed");
    h.coordinator.show("Context", DOC, "digraph Context").await;

    h.coordinator.panel_closed();
    let outcome = h.coordinator.document_saved(DOC).await;

    assert_eq!(outcome, RenderOutcome::NotShowing);
    assert_eq!(h.engine.translations(), 0);
    assert_eq!(h.backend.renders(), 1);
    assert_eq!(h.coordinator.state(), PreviewState::Idle);
}

#[tokio::test]
async fn test_close_discards_in_flight_render() {
    let h = local();
    h.layout.hold("Context");

    let coordinator = Arc::clone(&h.coordinator);
    let pending =
        tokio::spawn(async move { coordinator.show("Context", DOC, "digraph Context").await });
    h.layout.wait_entered().await;
    h.coordinator.panel_closed();
    h.layout.release("Context");

    assert_eq!(pending.await.unwrap(), RenderOutcome::Superseded);
    assert!(h.host.panel().messages().is_empty());
    assert!(h.host.errors().is_empty());
}

#[tokio::test]
async fn test_show_after_close_opens_new_panel() {
    let h = local();
    h.coordinator.show("Context", DOC, "digraph Context").await;
    h.coordinator.panel_closed();

    h.coordinator.show("Context", DOC, "digraph Context").await;

    assert_eq!(h.host.panels_created(), 2);
    assert_eq!(h.host.panel().loaded_views(), vec!["Context".to_string()]);
}

#[tokio::test]
async fn test_failure_notifies_and_keeps_content() {
    let h = local();
    h.coordinator.show("Context", DOC, "digraph Context").await;
    h.engine.set_failing(true);

    let outcome = h.coordinator.document_saved(DOC).await;

    assert!(matches!(outcome, RenderOutcome::Failed(_)));
    assert_eq!(h.host.errors().len(), 1);
    assert!(h.host.errors()[0].contains("syntax error"));
    assert_eq!(h.host.panel().loaded_views(), vec!["Context".to_string()]);

    // Nothing is considered rendered after a failure, so an identical form renders again.
    h.engine.set_failing(false);
    h.engine.set_document(DOC, "digraph Context");
    assert_eq!(
        h.coordinator.document_saved(DOC).await,
        RenderOutcome::Rendered
    );
    assert_eq!(h.host.panel().loaded_views().len(), 2);
}

#[tokio::test]
async fn test_export_writes_surface_svg() {
    let h = local();
    h.coordinator.show("Context", DOC, "digraph Context").await;
    let panel = h.host.panel();
    panel.set_export_svg("<svg>context</svg>");
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("context.svg");

    let written = h.coordinator.export_svg(Some(target.clone())).await.unwrap();

    assert_eq!(written, Some(target.clone()));
    assert_eq!(std::fs::read_to_string(target).unwrap(), "<svg>context</svg>");
    assert_eq!(
        panel.messages().last(),
        Some(&SurfaceMessage::export_request())
    );
}

#[tokio::test]
async fn test_export_uses_host_destination() {
    let h = local();
    h.coordinator.show("Context", DOC, "digraph Context").await;
    h.host.panel().set_export_svg("<svg/>");
    let dir = tempfile::tempdir().unwrap();
    h.host.set_export_path(Some(dir.path().join("picked.svg")));

    let written = h.coordinator.export_svg(None).await.unwrap();
    assert_eq!(written, Some(dir.path().join("picked.svg")));

    h.host.set_export_path(None);
    assert_eq!(h.coordinator.export_svg(None).await.unwrap(), None);
}

#[tokio::test]
async fn test_export_requires_open_panel() {
    let h = local();
    let err = h.coordinator.export_svg(None).await.unwrap_err();
    assert!(matches!(err, PreviewError::NoActivePanel));
}

#[tokio::test]
async fn test_export_times_out_without_reply() {
    let h = local();
    h.coordinator.show("Context", DOC, "digraph Context").await;

    let err = h.coordinator.export_svg(None).await.unwrap_err();
    assert!(matches!(err, PreviewError::Timeout(_)));
}

#[tokio::test]
async fn test_export_ignores_reply_to_timed_out_request() {
    let (coordinator, mut surface) = bridged(Duration::from_millis(200));
    coordinator.show("view1", DOC, "digraph view1").await;
    let err = coordinator.export_svg(None).await.unwrap_err();
    assert!(matches!(err, PreviewError::Timeout(_)));

    // The surface answers the abandoned request after the next show.
    reply(&surface, "<svg>view1-old</svg>").await;
    coordinator.show("view2", DOC, "digraph view2").await;
    while surface.events.try_recv().is_ok() {}

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("view2.svg");
    let exporting = {
        let coordinator = Arc::clone(&coordinator);
        let target = target.clone();
        tokio::spawn(async move { coordinator.export_svg(Some(target)).await })
    };
    next_export_request(&mut surface).await;
    reply(&surface, "<svg>view2</svg>").await;

    assert_eq!(exporting.await.unwrap().unwrap(), Some(target.clone()));
    assert_eq!(std::fs::read_to_string(target).unwrap(), "<svg>view2</svg>");
}

#[tokio::test]
async fn test_export_fails_when_view_changes_before_reply() {
    let (coordinator, mut surface) = bridged(Duration::from_secs(5));
    coordinator.show("view1", DOC, "digraph view1").await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("view1.svg");
    let exporting = {
        let coordinator = Arc::clone(&coordinator);
        let target = target.clone();
        tokio::spawn(async move { coordinator.export_svg(Some(target)).await })
    };
    next_export_request(&mut surface).await;
    coordinator.show("view2", DOC, "digraph view2").await;
    reply(&surface, "<svg>view1</svg>").await;

    let err = exporting.await.unwrap().unwrap_err();
    assert!(matches!(err, PreviewError::ExportSuperseded));
    assert!(!target.exists());
}

#[tokio::test]
async fn test_export_fails_when_panel_closes_before_reply() {
    let (coordinator, mut surface) = bridged(Duration::from_secs(5));
    coordinator.show("view1", DOC, "digraph view1").await;

    let exporting = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.export_svg(None).await })
    };
    next_export_request(&mut surface).await;
    coordinator.panel_closed();
    reply(&surface, "<svg>view1</svg>").await;

    let err = exporting.await.unwrap().unwrap_err();
    assert!(matches!(err, PreviewError::ExportSuperseded));
}

#[tokio::test]
async fn test_remote_backend_replaces_page() {
    let engine = FakeEngine::new();
    let host = RecordingHost::new();
    let coordinator = PreviewCoordinator::new(
        engine.clone(),
        Arc::new(RemoteBackend::new("https://render.example.com/json")),
        host.clone(),
    );

    let outcome = coordinator.show("Context", DOC, r#"{"views":{}}"#).await;

    assert_eq!(outcome, RenderOutcome::Rendered);
    let pages = host.panel().pages();
    assert_eq!(pages.len(), 1);
    assert!(pages[0].contains("https://render.example.com/json"));
    assert!(host.panel().messages().is_empty());

    let err = coordinator.export_svg(None).await.unwrap_err();
    assert!(matches!(err, PreviewError::ExportUnsupported("remote")));
}

#[tokio::test]
async fn test_config_selects_hosted_renderer() {
    let config = PreviewConfig {
        render: "https://structurizr.com".to_string(),
        ..PreviewConfig::default()
    };
    let coordinator =
        PreviewCoordinator::from_config(&config, FakeEngine::new(), RecordingHost::new());
    assert_eq!(coordinator.backend_kind(), BackendKind::Remote);
}
