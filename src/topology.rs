// Topology discovery: filter the application tree down to infrastructures, hosts and containers.

use crate::api_repo::ApiRepo;
use crate::config::TopologyConfig;
use crate::error::FetchError;
use crate::models::{Resource, ResourceKind, TreeNode, now_secs};
use serde::Serialize;
use std::collections::HashMap;

/// Maps upstream entity type names onto resource kinds.
#[derive(Debug, Clone)]
pub struct KindMatcher {
    pub infrastructure_type: String,
    pub host_type: String,
    pub container_type: String,
}

impl KindMatcher {
    pub fn classify(&self, type_name: &str) -> Option<ResourceKind> {
        if type_name == self.infrastructure_type {
            Some(ResourceKind::Infrastructure)
        } else if type_name == self.host_type {
            Some(ResourceKind::Host)
        } else if type_name == self.container_type {
            Some(ResourceKind::Container)
        } else {
            None
        }
    }
}

impl From<&TopologyConfig> for KindMatcher {
    fn from(c: &TopologyConfig) -> Self {
        Self {
            infrastructure_type: c.infrastructure_type.clone(),
            host_type: c.host_type.clone(),
            container_type: c.container_type.clone(),
        }
    }
}

/// One discovery pass. Resources are in depth-first pre-order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// Unix seconds.
    pub fetched_at: i64,
    /// Infrastructure resource ids in response order.
    pub infrastructures: Vec<String>,
    pub resources: Vec<Resource>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Topology {
    pub fn new(fetched_at: i64, resources: Vec<Resource>) -> Self {
        let infrastructures = resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Infrastructure)
            .map(|r| r.id.clone())
            .collect();
        let index = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        Self {
            fetched_at,
            infrastructures,
            resources,
            index,
        }
    }

    /// Builds the topology from a tree response. Applications whose first child is not an
    /// infrastructure (or that have no children) are skipped.
    pub fn from_tree(tree: &[TreeNode], matcher: &KindMatcher, fetched_at: i64) -> Self {
        let mut resources: Vec<Resource> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for app in tree {
            let Some(infra) = app.children.first() else {
                continue;
            };
            if matcher.classify(&infra.type_) != Some(ResourceKind::Infrastructure) {
                continue;
            }
            let root = push_resource(
                &mut resources,
                &mut seen,
                infra,
                ResourceKind::Infrastructure,
                &app.id,
                None,
            );
            if let Some(root) = root {
                collect(&mut resources, &mut seen, &infra.children, matcher, &app.id, root);
            }
        }

        Self::new(fetched_at, resources)
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.index.get(id).and_then(|&i| self.resources.get(i))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position in discovery order; used to sort store snapshots.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// Distinct application ids, in discovery order.
    pub fn application_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for r in &self.resources {
            if !out.contains(&r.application_id) {
                out.push(r.application_id.clone());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Fetches the application tree and filters it. Errors are returned, never swallowed.
pub async fn fetch_topology(repo: &ApiRepo, matcher: &KindMatcher) -> Result<Topology, FetchError> {
    let tree = repo.applications_tree().await?;
    let topology = Topology::from_tree(&tree, matcher, now_secs());
    tracing::debug!(
        operation = "fetch_topology",
        applications = tree.len(),
        infrastructures = topology.infrastructures.len(),
        resources = topology.len(),
        "topology fetched"
    );
    Ok(topology)
}

fn push_resource(
    resources: &mut Vec<Resource>,
    seen: &mut HashMap<String, usize>,
    node: &TreeNode,
    kind: ResourceKind,
    application_id: &str,
    parent: Option<usize>,
) -> Option<usize> {
    if seen.contains_key(&node.id) {
        tracing::warn!(resource_id = %node.id, "resource appears twice in tree; keeping first");
        return None;
    }
    let idx = resources.len();
    let parent_id = parent.map(|p| resources[p].id.clone());
    resources.push(Resource {
        id: node.id.clone(),
        name: node.name.clone(),
        kind,
        application_id: application_id.to_string(),
        parent: parent_id,
        children: Vec::new(),
    });
    if let Some(p) = parent {
        resources[p].children.push(node.id.clone());
    }
    seen.insert(node.id.clone(), idx);
    Some(idx)
}

/// Depth-first walk; kept nodes attach to the nearest kept ancestor `parent`.
fn collect(
    resources: &mut Vec<Resource>,
    seen: &mut HashMap<String, usize>,
    nodes: &[TreeNode],
    matcher: &KindMatcher,
    application_id: &str,
    parent: usize,
) {
    for node in nodes {
        let kept = match matcher.classify(&node.type_) {
            Some(kind @ (ResourceKind::Host | ResourceKind::Container)) => {
                push_resource(resources, seen, node, kind, application_id, Some(parent))
            }
            _ => None,
        };
        collect(
            resources,
            seen,
            &node.children,
            matcher,
            application_id,
            kept.unwrap_or(parent),
        );
    }
}
