//! Catalog node value types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Stable identifier of a node within one materialized tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a server-provided identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier for a node the server did not name, derived from its position
    #[must_use]
    pub fn positional(parent: Option<&NodeId>, index: usize) -> Self {
        match parent {
            Some(parent) => Self(format!("{}/{index}", parent.0)),
            None => Self(format!("#{index}")),
        }
    }

    /// Identifier as text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One entry of a catalog tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogNode {
    /// Identifier, unique within the tree
    pub id: NodeId,
    /// Label shown to the user
    pub display_name: String,
    /// Reference to the node's documentation content
    pub content_ref: Option<String>,
    /// Reference to the node's diagram source
    pub source_ref: Option<String>,
    /// Node has no children
    pub is_leaf: bool,
    /// Leaf whose source can be installed into the workspace
    pub insertable: bool,
    /// Node carries a BPMN process model
    pub bpmn: bool,
}

impl CatalogNode {
    /// File name an installed source would be written under
    #[must_use]
    pub fn artifact_name(&self) -> Option<&str> {
        self.source_ref.as_deref().and_then(artifact_name)
    }
}

/// Final path component of a source reference, if non-empty
pub(crate) fn artifact_name(reference: &str) -> Option<&str> {
    Path::new(reference)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
}
