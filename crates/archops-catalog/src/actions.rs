//! User actions on catalog nodes

use crate::error::CatalogError;
use crate::fetcher::CatalogFetcher;
use crate::node::CatalogNode;
use crate::schema::CatalogSchema;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Write a leaf's diagram source into `workspace` under its file name
///
/// Returns `Ok(None)` when the node is not insertable or no copy of the
/// source could be obtained.
///
/// # Errors
/// Returns [`CatalogError::Io`] if the file cannot be written
pub async fn install_artifact(
    fetcher: &CatalogFetcher,
    schema: &dyn CatalogSchema,
    node: &CatalogNode,
    workspace: &Path,
) -> Result<Option<PathBuf>, CatalogError> {
    if !node.insertable {
        return Ok(None);
    }
    let (Some(source), Some(name)) = (node.source_ref.as_deref(), node.artifact_name()) else {
        return Ok(None);
    };
    let Some(resource) = schema.content_resource(source) else {
        return Ok(None);
    };

    let Some(body) = fetcher.fetch_text(&resource).await.value else {
        tracing::warn!("no copy of {} available, nothing installed", source);
        return Ok(None);
    };

    let target = workspace.join(name);
    tokio::fs::write(&target, body)
        .await
        .map_err(|e| CatalogError::io_error(&target, e))?;
    tracing::info!("installed {} into {}", source, target.display());
    Ok(Some(target))
}

/// Documentation shown for a selected node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    /// Panel title (node label)
    pub title: String,
    /// Documentation text, empty when unavailable
    pub body: String,
}

/// Shows node documentation, skipping reloads of the same reference
#[derive(Debug, Default)]
pub struct DescriptionView {
    last: Mutex<Option<String>>,
}

impl DescriptionView {
    /// Create view
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Description for `node`, or `None` if it has no docs or the same docs
    /// are already showing
    pub async fn show(
        &self,
        fetcher: &CatalogFetcher,
        schema: &dyn CatalogSchema,
        node: &CatalogNode,
    ) -> Option<Description> {
        let reference = node.content_ref.as_deref()?;
        let resource = schema.content_resource(reference)?;
        {
            let mut last = self.last.lock();
            if last.as_deref() == Some(reference) {
                return None;
            }
            *last = Some(reference.to_string());
        }

        let body = fetcher.fetch_text(&resource).await.value.unwrap_or_default();
        Some(Description {
            title: node.display_name.clone(),
            body,
        })
    }

    /// The description panel was closed; the next `show` always loads
    pub fn closed(&self) {
        *self.last.lock() = None;
    }
}
