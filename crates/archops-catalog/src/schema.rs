//! Source schemas
//!
//! Each catalog source returns a differently shaped JSON document. A
//! [`CatalogSchema`] knows where its root lives and how to turn a response
//! body into [`RawNode`]s, so the fetcher and materializer stay generic.
//!
//! | Schema                  | Root                                               | Children          |
//! |-------------------------|----------------------------------------------------|-------------------|
//! | [`ArchitectureCenter`]  | `/architecture-center/index`                       | embedded          |
//! | [`BusinessCapabilities`]| `/capability/api/v1/business-capability?findBy=CORE` | deferred per node |
//! | [`CustomerJourneys`]    | `/cx/api/cx/v1/product/cj?sample=ALL`              | embedded          |

use crate::error::FetchError;
use crate::node::NodeId;
use archops_core::ResourcePath;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt::Debug;

/// Service prefix of the architecture center
pub const ARCHITECTURE_SERVICE: &str = "/architecture-center";
/// Service prefix of the capability API
pub const CAPABILITY_SERVICE: &str = "/capability/api/v1";
/// Service prefix of the customer journey API
pub const JOURNEY_SERVICE: &str = "/cx/api/cx/v1/product";

/// Child collection of a decoded node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawChildren {
    /// No children
    Leaf,
    /// Children delivered inline
    Embedded(Vec<RawNode>),
    /// Children must be fetched on expand
    Deferred,
}

/// Schema-independent node as decoded from a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    /// Server id, when the schema carries one
    pub id: Option<String>,
    /// Display label
    pub label: String,
    /// Documentation reference
    pub docs: Option<String>,
    /// Diagram source reference
    pub source: Option<String>,
    /// BPMN marker
    pub bpmn: bool,
    /// Children
    pub children: RawChildren,
}

impl RawNode {
    /// Leaf node with a label
    #[must_use]
    pub fn leaf(label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            docs: None,
            source: None,
            bpmn: false,
            children: RawChildren::Leaf,
        }
    }
}

/// Shape and location of one catalog source
pub trait CatalogSchema: Send + Sync + Debug {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Resource holding the root list
    fn root(&self) -> ResourcePath;

    /// Decode a response body (root or children) into nodes
    ///
    /// # Errors
    /// Returns [`FetchError::Decode`] when the body does not match the schema
    fn decode(&self, body: &str) -> Result<Vec<RawNode>, FetchError>;

    /// Resource listing the children of a deferred node
    fn children_resource(&self, _id: &NodeId) -> Option<ResourcePath> {
        None
    }

    /// Resource serving the text behind a docs or source reference
    fn content_resource(&self, _reference: &str) -> Option<ResourcePath> {
        None
    }

    /// A single-element root is replaced by that element's children
    fn collapses_singleton_root(&self) -> bool {
        false
    }
}

/// Bare object or array of objects
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

/// Ids arrive as strings or numbers depending on the endpoint
#[derive(Deserialize)]
#[serde(untagged)]
enum FlexibleId {
    Text(String),
    Number(i64),
}

impl FlexibleId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

fn decode_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, FetchError> {
    let parsed: OneOrMany<T> = serde_json::from_str(body)?;
    Ok(parsed.into_vec())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn embedded<T>(children: Vec<T>, convert: impl Fn(T) -> RawNode) -> RawChildren {
    if children.is_empty() {
        RawChildren::Leaf
    } else {
        RawChildren::Embedded(children.into_iter().map(convert).collect())
    }
}

// ---------------------------------------------------------------------------
// Architecture center
// ---------------------------------------------------------------------------

/// Chapters of the architecture center, each with docs and a DSL source
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchitectureCenter;

#[derive(Deserialize)]
struct Chapter {
    #[serde(default)]
    id: Option<FlexibleId>,
    title: String,
    #[serde(default)]
    docs: String,
    #[serde(default)]
    dsl: String,
    #[serde(default)]
    childrens: Vec<Chapter>,
}

impl Chapter {
    fn into_raw(self) -> RawNode {
        RawNode {
            id: self.id.map(FlexibleId::into_string),
            label: self.title,
            docs: non_empty(self.docs),
            source: non_empty(self.dsl),
            bpmn: false,
            children: embedded(self.childrens, Chapter::into_raw),
        }
    }
}

impl CatalogSchema for ArchitectureCenter {
    fn name(&self) -> &'static str {
        "architecture-center"
    }

    fn root(&self) -> ResourcePath {
        ResourcePath::new(ARCHITECTURE_SERVICE, "/index")
    }

    fn decode(&self, body: &str) -> Result<Vec<RawNode>, FetchError> {
        Ok(decode_list::<Chapter>(body)?
            .into_iter()
            .map(Chapter::into_raw)
            .collect())
    }

    fn content_resource(&self, reference: &str) -> Option<ResourcePath> {
        let reference = reference.trim_start_matches('/');
        if reference.is_empty() {
            return None;
        }
        Some(ResourcePath::new(
            ARCHITECTURE_SERVICE,
            format!("/content/{reference}"),
        ))
    }
}

// ---------------------------------------------------------------------------
// Business capabilities
// ---------------------------------------------------------------------------

/// Core business capabilities; subtrees are loaded per node
#[derive(Debug, Clone, Copy, Default)]
pub struct BusinessCapabilities;

#[derive(Deserialize)]
struct Capability {
    id: FlexibleId,
    name: String,
    #[serde(default)]
    childrens: Option<Vec<Capability>>,
}

impl Capability {
    fn into_raw(self) -> RawNode {
        let children = match self.childrens {
            None => RawChildren::Deferred,
            Some(children) => embedded(children, Capability::into_raw),
        };
        RawNode {
            id: Some(self.id.into_string()),
            label: self.name,
            docs: None,
            source: None,
            bpmn: false,
            children,
        }
    }
}

impl CatalogSchema for BusinessCapabilities {
    fn name(&self) -> &'static str {
        "business-capabilities"
    }

    fn root(&self) -> ResourcePath {
        ResourcePath::new(CAPABILITY_SERVICE, "/business-capability").with_query("findBy=CORE")
    }

    fn decode(&self, body: &str) -> Result<Vec<RawNode>, FetchError> {
        Ok(decode_list::<Capability>(body)?
            .into_iter()
            .map(Capability::into_raw)
            .collect())
    }

    fn children_resource(&self, id: &NodeId) -> Option<ResourcePath> {
        Some(ResourcePath::new(
            CAPABILITY_SERVICE,
            format!("/business-capability/{id}/children"),
        ))
    }

    fn collapses_singleton_root(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Customer journeys
// ---------------------------------------------------------------------------

/// Customer journey samples
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerJourneys;

#[derive(Deserialize)]
struct Journey {
    #[serde(default)]
    id: Option<FlexibleId>,
    name: String,
    #[serde(default)]
    bpmn: bool,
    #[serde(default)]
    childrens: Vec<Journey>,
}

impl Journey {
    fn into_raw(self) -> RawNode {
        RawNode {
            id: self.id.map(FlexibleId::into_string),
            label: self.name,
            docs: None,
            source: None,
            bpmn: self.bpmn,
            children: embedded(self.childrens, Journey::into_raw),
        }
    }
}

impl CatalogSchema for CustomerJourneys {
    fn name(&self) -> &'static str {
        "customer-journeys"
    }

    fn root(&self) -> ResourcePath {
        ResourcePath::new(JOURNEY_SERVICE, "/cj").with_query("sample=ALL")
    }

    fn decode(&self, body: &str) -> Result<Vec<RawNode>, FetchError> {
        Ok(decode_list::<Journey>(body)?
            .into_iter()
            .map(Journey::into_raw)
            .collect())
    }
}
