//! Catalog Tests
//!
//! Fetch, fallback and materialization against a scripted service.
//!
use archops_auth::{build_request, RequestSigner};
use archops_cache::{FileCache, MemoryCache, PersistentCache};
use archops_catalog::{
    install_artifact, ArchitectureCenter, BusinessCapabilities, CatalogFetcher, CatalogSchema,
    CustomerJourneys, DescriptionView, NodeId, Origin, TreeMaterializer,
};
use archops_test_utils::{ScriptedTransport, BASE_URL};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const INDEX: &str = "/architecture-center/index";

fn fetcher(transport: &Arc<ScriptedTransport>, cache: Arc<dyn PersistentCache>) -> Arc<CatalogFetcher> {
    Arc::new(CatalogFetcher::new(
        BASE_URL,
        RequestSigner::new("key", "secret"),
        Arc::clone(transport) as Arc<dyn archops_catalog::Transport>,
        cache,
    ))
}

fn tree(schema: impl CatalogSchema + 'static, fetcher: Arc<CatalogFetcher>) -> TreeMaterializer {
    TreeMaterializer::new(Arc::new(schema), fetcher).with_warmup(false)
}

#[tokio::test]
async fn test_single_root_leaf() {
    let transport = ScriptedTransport::new();
    transport.route(
        INDEX,
        r#"[{"id":"a","title":"Root","docs":"","dsl":"","childrens":[]}]"#,
    );
    let tree = tree(
        ArchitectureCenter,
        fetcher(&transport, Arc::new(MemoryCache::new(64))),
    );

    let roots = tree.materialize_root().await;
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, NodeId::new("a"));
    assert_eq!(roots[0].display_name, "Root");
    assert!(roots[0].is_leaf);
    assert!(!roots[0].insertable);
    assert_eq!(roots[0].content_ref, None);
}

#[tokio::test]
async fn test_offline_root_served_from_previous_session() {
    let dir = tempfile::tempdir().unwrap();
    let body = r#"[{"title":"Platform","childrens":[{"title":"Payments","dsl":"p/system.dsl","childrens":[]}]}]"#;

    {
        let transport = ScriptedTransport::new();
        transport.route(INDEX, body);
        let cache = FileCache::open(dir.path(), 16).await.unwrap();
        let tree = tree(ArchitectureCenter, fetcher(&transport, Arc::new(cache)));
        assert_eq!(tree.materialize_root().await.len(), 1);
    }

    let transport = ScriptedTransport::new();
    transport.set_offline(true);
    let cache = FileCache::open(dir.path(), 16).await.unwrap();
    let fetcher = fetcher(&transport, Arc::new(cache));

    let fetched = fetcher.fetch_root(&ArchitectureCenter).await;
    assert_eq!(fetched.origin, Origin::Cache);

    let tree = tree(ArchitectureCenter, fetcher);
    let roots = tree.materialize_root().await;
    assert_eq!(roots[0].display_name, "Platform");
    let children = tree.expand(&roots[0].id).await;
    assert_eq!(children[0].display_name, "Payments");
    assert!(children[0].insertable);
}

#[tokio::test]
async fn test_failure_without_cache_is_empty() {
    let transport = ScriptedTransport::new();
    transport.set_offline(true);
    let fetcher = fetcher(&transport, Arc::new(MemoryCache::new(16)));

    let roots = fetcher.fetch_root(&ArchitectureCenter).await;
    assert_eq!(roots.origin, Origin::Empty);
    assert!(roots.value.is_empty());

    let text = fetcher
        .fetch_text(&ArchitectureCenter.content_resource("x.md").unwrap())
        .await;
    assert_eq!(text.value, None);
}

#[tokio::test]
async fn test_server_error_falls_back_to_cache() {
    let transport = ScriptedTransport::new();
    transport.route_status(INDEX, 502);
    let cache = Arc::new(MemoryCache::new(16));
    cache
        .put("/index", r#"[{"title":"Cached","childrens":[]}]"#)
        .await
        .unwrap();
    let tree = tree(ArchitectureCenter, fetcher(&transport, cache));

    let roots = tree.materialize_root().await;
    assert_eq!(roots[0].display_name, "Cached");
}

#[tokio::test]
async fn test_expand_fetches_once() {
    let transport = ScriptedTransport::new();
    transport.route(
        "/capability/api/v1/business-capability?findBy=CORE",
        r#"[{"id":1,"name":"Sales"},{"id":2,"name":"Billing"}]"#,
    );
    transport.route(
        "/capability/api/v1/business-capability/1/children",
        r#"[{"id":11,"name":"Leads","childrens":[]},{"id":12,"name":"Offers"}]"#,
    );
    let tree = tree(
        BusinessCapabilities,
        fetcher(&transport, Arc::new(MemoryCache::new(16))),
    );

    let roots = tree.materialize_root().await;
    assert_eq!(roots.len(), 2);
    assert!(!roots[0].is_leaf);
    assert!(!tree.is_resolved(&roots[0].id));

    let (a, b) = tokio::join!(tree.expand(&roots[0].id), tree.expand(&roots[0].id));
    let again = tree.expand(&roots[0].id).await;
    assert_eq!(a, b);
    assert_eq!(a, again);
    assert_eq!(
        a.iter().map(|n| n.display_name.as_str()).collect::<Vec<_>>(),
        vec!["Leads", "Offers"]
    );
    assert_eq!(
        transport.calls_to("/capability/api/v1/business-capability/1/children"),
        1
    );
    assert!(a[0].is_leaf);
    assert!(!a[1].is_leaf);
}

#[tokio::test]
async fn test_capability_singleton_root_pivots_to_children() {
    let transport = ScriptedTransport::new();
    transport.route(
        "/capability/api/v1/business-capability?findBy=CORE",
        r#"[{"id":9,"name":"Enterprise"}]"#,
    );
    transport.route(
        "/capability/api/v1/business-capability/9/children",
        r#"[{"id":91,"name":"Sales"},{"id":92,"name":"Billing"}]"#,
    );
    let tree = tree(
        BusinessCapabilities,
        fetcher(&transport, Arc::new(MemoryCache::new(16))),
    );

    let roots = tree.materialize_root().await;
    assert_eq!(
        roots.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
        vec!["91", "92"]
    );
    assert_eq!(transport.total_calls(), 2);
}

#[tokio::test]
async fn test_query_is_sent_but_not_signed() {
    let transport = ScriptedTransport::new();
    transport.route("/cx/api/cx/v1/product/cj?sample=ALL", r#"[{"name":"Onboarding","bpmn":true}]"#);
    let tree = tree(
        CustomerJourneys,
        fetcher(&transport, Arc::new(MemoryCache::new(16))),
    );
    let roots = tree.materialize_root().await;
    assert!(roots[0].bpmn);

    let requests = transport.requests();
    let request = &requests[0];
    assert_eq!(request.url, format!("{BASE_URL}/cx/api/cx/v1/product/cj?sample=ALL"));
    let nonce = request.header("Nonce").unwrap();
    let expected = build_request("secret", "GET", "/cx/api/cx/v1/product/cj", None, None, nonce).unwrap();
    assert_eq!(
        request.header("X-Authorization").unwrap(),
        format!("key:{}", expected.mac)
    );
}

#[tokio::test]
async fn test_refresh_rebuilds_tree() {
    let transport = ScriptedTransport::new();
    transport.route(INDEX, r#"[{"title":"First","childrens":[]}]"#);
    let tree = tree(
        ArchitectureCenter,
        fetcher(&transport, Arc::new(MemoryCache::new(16))),
    );

    assert_eq!(tree.materialize_root().await[0].display_name, "First");
    assert_eq!(tree.materialize_root().await[0].display_name, "First");
    assert_eq!(transport.calls_to(INDEX), 1);

    transport.route(INDEX, r#"[{"title":"Second","childrens":[]}]"#);
    tree.refresh().await;
    assert_eq!(tree.materialize_root().await[0].display_name, "Second");
    assert_eq!(transport.calls_to(INDEX), 2);
}

#[tokio::test]
async fn test_self_referencing_ids_terminate() {
    let transport = ScriptedTransport::new();
    transport.route(
        INDEX,
        r#"[{"id":"loop","title":"Loop","childrens":[
            {"id":"child","title":"Child","childrens":[
                {"id":"loop","title":"Loop again","childrens":[]},
                {"id":"child","title":"Child again","childrens":[]},
                {"title":"Fresh","childrens":[]}
            ]}
        ]}]"#,
    );
    let tree = tree(
        ArchitectureCenter,
        fetcher(&transport, Arc::new(MemoryCache::new(16))),
    );

    let roots = tree.materialize_root().await;
    let child = tree.expand(&roots[0].id).await;
    assert_eq!(child.len(), 1);
    let grandchildren = tree.expand(&child[0].id).await;
    assert_eq!(grandchildren.len(), 1);
    assert_eq!(grandchildren[0].display_name, "Fresh");
    assert_eq!(grandchildren[0].id.as_str(), "child/2");
}

#[tokio::test]
async fn test_content_references_are_warmed() {
    let transport = ScriptedTransport::new();
    transport.route(
        INDEX,
        r#"[{"title":"Payments","docs":"p/readme.md","dsl":"p/system.dsl","childrens":[]}]"#,
    );
    transport.route("/architecture-center/content/p/system.dsl", "workspace {}");
    transport.route("/architecture-center/content/p/readme.md", "# Payments");
    let cache = Arc::new(MemoryCache::new(16));
    let fetcher = fetcher(&transport, cache.clone());
    let tree = TreeMaterializer::new(Arc::new(ArchitectureCenter), fetcher);

    tree.materialize_root().await;

    let mut warmed = false;
    for _ in 0..100 {
        let dsl = cache.get("/content/p/system.dsl").await.unwrap();
        let docs = cache.get("/content/p/readme.md").await.unwrap();
        if dsl.is_some() && docs.is_some() {
            warmed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(warmed);
}

#[tokio::test]
async fn test_install_writes_basename_into_workspace() {
    let transport = ScriptedTransport::new();
    transport.route(
        INDEX,
        r#"[{"title":"Payments","dsl":"p/system.dsl","childrens":[]}]"#,
    );
    transport.route("/architecture-center/content/p/system.dsl", "workspace {}");
    let fetcher = fetcher(&transport, Arc::new(MemoryCache::new(16)));
    let tree = tree(ArchitectureCenter, Arc::clone(&fetcher));
    let node = tree.materialize_root().await.remove(0);

    let workspace = tempfile::tempdir().unwrap();
    let written = install_artifact(&fetcher, &ArchitectureCenter, &node, workspace.path())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(written, workspace.path().join("system.dsl"));
    assert_eq!(std::fs::read_to_string(written).unwrap(), "workspace {}");
}

#[tokio::test]
async fn test_install_without_any_copy_writes_nothing() {
    let transport = ScriptedTransport::new();
    transport.route(
        INDEX,
        r#"[{"title":"Payments","dsl":"p/system.dsl","childrens":[]}]"#,
    );
    let fetcher = fetcher(&transport, Arc::new(MemoryCache::new(16)));
    let tree = tree(ArchitectureCenter, Arc::clone(&fetcher));
    let node = tree.materialize_root().await.remove(0);
    transport.set_offline(true);

    let workspace = tempfile::tempdir().unwrap();
    let written = install_artifact(&fetcher, &ArchitectureCenter, &node, workspace.path())
        .await
        .unwrap();
    assert_eq!(written, None);
    assert_eq!(std::fs::read_dir(workspace.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_description_is_not_reloaded_for_same_node() {
    let transport = ScriptedTransport::new();
    transport.route(
        INDEX,
        r#"[{"title":"Payments","docs":"p/readme.md","childrens":[]}]"#,
    );
    transport.route("/architecture-center/content/p/readme.md", "# Payments");
    let fetcher = fetcher(&transport, Arc::new(MemoryCache::new(16)));
    let tree = tree(ArchitectureCenter, Arc::clone(&fetcher));
    let node = tree.materialize_root().await.remove(0);
    let view = DescriptionView::new();

    let first = view.show(&fetcher, &ArchitectureCenter, &node).await.unwrap();
    assert_eq!(first.title, "Payments");
    assert_eq!(first.body, "# Payments");
    assert!(view.show(&fetcher, &ArchitectureCenter, &node).await.is_none());
    assert_eq!(
        transport.calls_to("/architecture-center/content/p/readme.md"),
        1
    );

    view.closed();
    assert!(view.show(&fetcher, &ArchitectureCenter, &node).await.is_some());
}
