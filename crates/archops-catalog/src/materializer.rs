//! Lazy catalog tree
//!
//! Responses are normalized into an arena keyed by [`NodeId`]. Nested
//! payloads are walked with an explicit worklist, and every id is claimed
//! once per tree, so self-referencing or repeated ids cannot recurse.
//!
//! Each node owns a [`OnceCell`] for its children: embedded children fill it
//! during normalization, deferred children fill it on the first `expand`.
//! Concurrent expands of the same node share one fetch.

use crate::fetcher::{CatalogFetcher, Fetched};
use crate::node::{artifact_name, CatalogNode, NodeId};
use crate::schema::{CatalogSchema, RawChildren, RawNode};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

type Children = Arc<OnceCell<Vec<NodeId>>>;

#[derive(Debug)]
struct NodeEntry {
    node: CatalogNode,
    children: Children,
}

/// Builds and memoizes the node tree of one catalog source
#[derive(Debug)]
pub struct TreeMaterializer {
    schema: Arc<dyn CatalogSchema>,
    fetcher: Arc<CatalogFetcher>,
    nodes: DashMap<NodeId, NodeEntry>,
    roots: Mutex<Option<Vec<NodeId>>>,
    generation: AtomicU64,
    warm_content: bool,
}

impl TreeMaterializer {
    /// Create materializer; content warm-up is on
    #[must_use]
    pub fn new(schema: Arc<dyn CatalogSchema>, fetcher: Arc<CatalogFetcher>) -> Self {
        Self {
            schema,
            fetcher,
            nodes: DashMap::new(),
            roots: Mutex::new(None),
            generation: AtomicU64::new(0),
            warm_content: true,
        }
    }

    /// Enable or disable background prefetch of content references
    #[inline]
    #[must_use]
    pub fn with_warmup(mut self, enabled: bool) -> Self {
        self.warm_content = enabled;
        self
    }

    /// Schema this tree is built from
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<dyn CatalogSchema> {
        &self.schema
    }

    /// Fetcher used for roots and children
    #[inline]
    #[must_use]
    pub fn fetcher(&self) -> &Arc<CatalogFetcher> {
        &self.fetcher
    }

    /// Top-level nodes
    ///
    /// The root is fetched once; later calls return the memoized list until
    /// [`refresh`](Self::refresh).
    pub async fn materialize_root(&self) -> Vec<CatalogNode> {
        let mut roots = self.roots.lock().await;
        if let Some(ids) = roots.as_ref() {
            return self.resolve(ids);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let Fetched { value, origin } = self.fetcher.fetch_root(self.schema.as_ref()).await;
        tracing::info!(
            "materialized {} root: {} nodes ({:?})",
            self.schema.name(),
            value.len(),
            origin
        );
        let ids = self.normalize(value, None, generation);
        let nodes = self.resolve(&ids);
        *roots = Some(ids);
        nodes
    }

    /// Children of a node, fetching deferred children at most once
    ///
    /// Unknown ids and leaves yield an empty list.
    pub async fn expand(&self, id: &NodeId) -> Vec<CatalogNode> {
        let Some(children) = self.nodes.get(id).map(|entry| entry.children.clone()) else {
            tracing::debug!("expand of unknown node {}", id);
            return Vec::new();
        };

        let generation = self.generation.load(Ordering::Acquire);
        let ids = children
            .get_or_init(|| async {
                let fetched = self
                    .fetcher
                    .fetch_children(self.schema.as_ref(), id)
                    .await;
                tracing::debug!(
                    "expanded {}: {} children ({:?})",
                    id,
                    fetched.value.len(),
                    fetched.origin
                );
                self.normalize(fetched.value, Some(id), generation)
            })
            .await;
        self.resolve(ids)
    }

    /// Snapshot of a node
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<CatalogNode> {
        self.nodes.get(id).map(|entry| entry.node.clone())
    }

    /// Whether a node's children are already known
    #[must_use]
    pub fn is_resolved(&self, id: &NodeId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|entry| entry.children.initialized())
    }

    /// Discard the tree; the next [`materialize_root`](Self::materialize_root) refetches
    pub async fn refresh(&self) {
        let mut roots = self.roots.lock().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        *roots = None;
        self.nodes.clear();
        tracing::info!("{} tree refreshed", self.schema.name());
    }

    fn resolve(&self, ids: &[NodeId]) -> Vec<CatalogNode> {
        ids.iter().filter_map(|id| self.node(id)).collect()
    }

    /// Insert `raws` (and everything embedded in them) under `parent`
    ///
    /// Returns the ids of the direct entries, in payload order. Nothing is
    /// inserted when the tree was refreshed after `generation` was read.
    fn normalize(
        &self,
        raws: Vec<RawNode>,
        parent: Option<&NodeId>,
        generation: u64,
    ) -> Vec<NodeId> {
        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!("discarding children fetched before refresh");
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let top = self.claim(raws, parent, &mut seen);
        let top_ids: Vec<NodeId> = top.iter().map(|(id, _)| id.clone()).collect();

        let mut work = top;
        work.reverse();
        while let Some((id, raw)) = work.pop() {
            let is_leaf = raw.children == RawChildren::Leaf;
            let (children, pending) = match raw.children {
                RawChildren::Leaf => (Arc::new(OnceCell::new_with(Some(Vec::new()))), Vec::new()),
                RawChildren::Deferred => (Arc::new(OnceCell::new()), Vec::new()),
                RawChildren::Embedded(embedded) => {
                    let claimed = self.claim(embedded, Some(&id), &mut seen);
                    let ids: Vec<NodeId> = claimed.iter().map(|(child, _)| child.clone()).collect();
                    (Arc::new(OnceCell::new_with(Some(ids))), claimed)
                }
            };

            let insertable = is_leaf && raw.source.as_deref().and_then(artifact_name).is_some();
            let node = CatalogNode {
                id: id.clone(),
                display_name: raw.label,
                content_ref: raw.docs,
                source_ref: raw.source,
                is_leaf,
                insertable,
                bpmn: raw.bpmn,
            };
            self.warm(&node);
            self.nodes.insert(id, NodeEntry { node, children });

            work.extend(pending.into_iter().rev());
        }
        top_ids
    }

    /// Assign ids to siblings, dropping any already present in the tree
    fn claim(
        &self,
        raws: Vec<RawNode>,
        parent: Option<&NodeId>,
        seen: &mut HashSet<NodeId>,
    ) -> Vec<(NodeId, RawNode)> {
        let mut claimed = Vec::with_capacity(raws.len());
        for (index, mut raw) in raws.into_iter().enumerate() {
            let id = raw
                .id
                .take()
                .map_or_else(|| NodeId::positional(parent, index), NodeId::new);
            if self.nodes.contains_key(&id) || !seen.insert(id.clone()) {
                tracing::warn!(
                    "{}: duplicate node id {} skipped",
                    self.schema.name(),
                    id
                );
                continue;
            }
            claimed.push((id, raw));
        }
        claimed
    }

    fn warm(&self, node: &CatalogNode) {
        if !self.warm_content {
            return;
        }
        let references = [node.source_ref.as_deref(), node.content_ref.as_deref()];
        for reference in references.into_iter().flatten() {
            let Some(resource) = self.schema.content_resource(reference) else {
                continue;
            };
            let fetcher = Arc::clone(&self.fetcher);
            tokio::spawn(async move {
                fetcher.warm(&resource).await;
            });
        }
    }
}
