// Topology resources and the upstream tree/child descriptors they are built from

use serde::{Deserialize, Serialize};

/// Kind of a resource kept in the topology; serializes to lowercase JSON (e.g. "host").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Infrastructure,
    Host,
    Container,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Infrastructure => "infrastructure",
            ResourceKind::Host => "host",
            ResourceKind::Container => "container",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    /// Owning application; every per-entity URL is scoped by it.
    pub application_id: String,
    /// Nearest kept ancestor, by id. `None` for infrastructures.
    pub parent: Option<String>,
    /// Kept descendants whose nearest kept ancestor is this resource, in discovery order.
    pub children: Vec<String>,
}

/// Node of `GET /v1/applications/tree`. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

/// Element of `GET .../entities/{id}/children`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: String,
}
