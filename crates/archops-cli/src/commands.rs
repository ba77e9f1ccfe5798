//! Subcommand implementations

use anyhow::Context;
use archops_auth::RequestSigner;
use archops_cache::FileCache;
use archops_catalog::{
    install_artifact, ArchitectureCenter, BusinessCapabilities, CatalogFetcher, CatalogNode,
    CatalogSchema, CustomerJourneys, ReqwestTransport, TreeMaterializer,
};
use archops_core::CompanionConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Catalog selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CatalogKind {
    Architecture,
    Capabilities,
    Journeys,
}

impl CatalogKind {
    pub(crate) fn from_name(name: &str) -> Self {
        match name {
            "capabilities" => Self::Capabilities,
            "journeys" => Self::Journeys,
            _ => Self::Architecture,
        }
    }

    fn schema(self) -> Arc<dyn CatalogSchema> {
        match self {
            Self::Architecture => Arc::new(ArchitectureCenter),
            Self::Capabilities => Arc::new(BusinessCapabilities),
            Self::Journeys => Arc::new(CustomerJourneys),
        }
    }
}

/// Fetcher wired to the configured service and the workspace cache
pub(crate) struct Session {
    fetcher: Arc<CatalogFetcher>,
    workspace: PathBuf,
}

impl Session {
    pub(crate) async fn open(config: &CompanionConfig, workspace: &Path) -> anyhow::Result<Self> {
        if config.api.base_url().is_empty() {
            anyhow::bail!("api.url is not configured");
        }
        let cache_dir = config.cache.resolve_dir(workspace);
        let cache = FileCache::open(&cache_dir, config.cache.memory_capacity)
            .await
            .with_context(|| format!("opening cache at {}", cache_dir.display()))?;
        let transport = ReqwestTransport::new(&config.api)?;
        let fetcher = CatalogFetcher::new(
            config.api.base_url(),
            RequestSigner::from_config(&config.api),
            Arc::new(transport),
            Arc::new(cache),
        );
        Ok(Self {
            fetcher: Arc::new(fetcher),
            workspace: workspace.to_path_buf(),
        })
    }

    /// Indented tree, expanded `depth` levels below the root
    pub(crate) async fn tree(&self, kind: CatalogKind, depth: usize) -> Vec<String> {
        let tree = TreeMaterializer::new(kind.schema(), Arc::clone(&self.fetcher));
        let mut lines = Vec::new();
        let mut stack: Vec<(usize, CatalogNode)> = tree
            .materialize_root()
            .await
            .into_iter()
            .rev()
            .map(|node| (0, node))
            .collect();

        while let Some((level, node)) = stack.pop() {
            lines.push(render_line(level, &node));
            if node.is_leaf || level >= depth {
                continue;
            }
            let children = tree.expand(&node.id).await;
            stack.extend(children.into_iter().rev().map(|child| (level + 1, child)));
        }
        lines
    }

    pub(crate) async fn content(&self, reference: &str) -> Option<String> {
        let resource = ArchitectureCenter.content_resource(reference)?;
        self.fetcher.fetch_text(&resource).await.value
    }

    /// Find the architecture leaf whose source is `reference` and install it
    pub(crate) async fn install(&self, reference: &str) -> anyhow::Result<Option<PathBuf>> {
        let tree = TreeMaterializer::new(Arc::new(ArchitectureCenter), Arc::clone(&self.fetcher))
            .with_warmup(false);
        let mut pending = tree.materialize_root().await;
        while let Some(node) = pending.pop() {
            if node.source_ref.as_deref() == Some(reference) {
                return Ok(
                    install_artifact(&self.fetcher, &ArchitectureCenter, &node, &self.workspace)
                        .await?,
                );
            }
            if !node.is_leaf {
                pending.extend(tree.expand(&node.id).await);
            }
        }
        Ok(None)
    }
}

fn render_line(level: usize, node: &CatalogNode) -> String {
    let mut line = format!("{}{}", "  ".repeat(level), node.display_name);
    if let Some(source) = &node.source_ref {
        line.push_str(&format!("  [{source}]"));
    }
    if node.bpmn {
        line.push_str("  (bpmn)");
    }
    line
}

/// `Header: value` lines for a request
pub(crate) fn sign(
    config: &CompanionConfig,
    method: &str,
    path: &str,
    body: Option<&[u8]>,
    content_type: Option<&str>,
) -> anyhow::Result<Vec<String>> {
    let signer = RequestSigner::from_config(&config.api);
    if !signer.is_enabled() {
        tracing::warn!("no api key/secret configured, request would be sent unsigned");
    }
    let headers = signer.sign(&method.to_ascii_uppercase(), path, body, content_type)?;
    Ok(headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect())
}

/// Keys stored in the workspace cache
pub(crate) async fn cached_keys(
    config: &CompanionConfig,
    workspace: &Path,
) -> anyhow::Result<Vec<String>> {
    let cache = FileCache::open(config.cache.resolve_dir(workspace), config.cache.memory_capacity)
        .await?;
    let mut keys: Vec<_> = cache.entries().await?.into_iter().map(|e| e.key).collect();
    keys.sort();
    Ok(keys)
}
