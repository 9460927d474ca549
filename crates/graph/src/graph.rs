//! Citation network representation
//!
//! Papers and citation contexts are the two node kinds. Edges are
//! undirected and carry an optional label; citing the same pair twice still
//! yields a single edge.

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Identity of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeId {
    /// A paper, keyed by its database uri
    Paper { uri: String },
    /// One citation context of the paper at `parent_uri`
    Context { parent_uri: String, group_id: String },
}

impl NodeId {
    pub fn paper(uri: impl Into<String>) -> Self {
        NodeId::Paper { uri: uri.into() }
    }

    pub fn context(parent_uri: impl Into<String>, group_id: impl Into<String>) -> Self {
        NodeId::Context {
            parent_uri: parent_uri.into(),
            group_id: group_id.into(),
        }
    }
}

/// A paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperNode {
    pub uri: String,
    /// First ten characters of the title, or "no title"
    pub title: String,
}

/// The text around one citation location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNode {
    pub parent_uri: String,
    pub group_id: String,
    pub text_before: String,
    pub text_after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Paper(PaperNode),
    Context(ContextNode),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Paper(paper) => NodeId::paper(&paper.uri),
            Node::Context(context) => NodeId::context(&context.parent_uri, &context.group_id),
        }
    }

    pub fn as_paper(&self) -> Option<&PaperNode> {
        match self {
            Node::Paper(paper) => Some(paper),
            Node::Context(_) => None,
        }
    }

    pub fn as_context(&self) -> Option<&ContextNode> {
        match self {
            Node::Context(context) => Some(context),
            Node::Paper(_) => None,
        }
    }
}

/// Undirected edge view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge<'a> {
    pub source: &'a NodeId,
    pub target: &'a NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<&'a str>,
}

/// In-memory citation network
///
/// Every edge endpoint is a node of the graph. Iteration order is
/// deterministic (ordered by node identity).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    /// Keyed by the endpoint pair in ascending order
    edges: BTreeMap<(NodeId, NodeId), Option<String>>,
}

fn edge_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing the attributes of an existing node with the same identity
    pub fn add_node(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id(), node)
    }

    /// Connect two existing nodes
    ///
    /// Re-adding an edge with a label replaces its label; re-adding it
    /// without one keeps the existing label. Returns `false`, leaving the
    /// graph untouched, when either endpoint is missing.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, label: Option<String>) -> bool {
        if !self.nodes.contains_key(&a) || !self.nodes.contains_key(&b) {
            debug!(source = ?a, target = ?b, "Skipping edge with a missing endpoint");
            return false;
        }
        self.put_edge(edge_key(a, b), label);
        true
    }

    fn put_edge(&mut self, key: (NodeId, NodeId), label: Option<String>) {
        match self.edges.get_mut(&key) {
            Some(existing) => {
                if label.is_some() {
                    *existing = label;
                }
            }
            None => {
                self.edges.insert(key, label);
            }
        }
    }

    /// Fold `other` into this graph
    ///
    /// Node and edge sets are unioned; on identity collision the attributes
    /// from `other` win.
    pub fn merge(&mut self, other: Graph) {
        self.nodes.extend(other.nodes);
        for (key, label) in other.edges {
            self.put_edge(key, label);
        }
    }

    /// Union of two graphs, `other` taking precedence on collisions
    pub fn compose(mut self, other: Graph) -> Graph {
        self.merge(other);
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_edge(&self, a: &NodeId, b: &NodeId) -> bool {
        self.edges.contains_key(&edge_key(a.clone(), b.clone()))
    }

    /// Label of the edge between `a` and `b`, if the edge exists and has one
    pub fn edge_label(&self, a: &NodeId, b: &NodeId) -> Option<&str> {
        self.edges
            .get(&edge_key(a.clone(), b.clone()))
            .and_then(|label| label.as_deref())
    }

    /// All nodes in identity order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All node identities in order
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// All edges in endpoint order
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> {
        self.edges.iter().map(|((source, target), label)| Edge {
            source,
            target,
            label: label.as_deref(),
        })
    }

    pub fn paper_nodes(&self) -> impl Iterator<Item = &PaperNode> {
        self.nodes.values().filter_map(Node::as_paper)
    }

    pub fn context_nodes(&self) -> impl Iterator<Item = &ContextNode> {
        self.nodes.values().filter_map(Node::as_context)
    }

    /// Nodes sharing an edge with `id`
    pub fn neighbors(&self, id: &NodeId) -> Vec<&NodeId> {
        self.edges
            .keys()
            .filter_map(|(a, b)| {
                if a == id {
                    Some(b)
                } else if b == id {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[derive(Serialize)]
struct GraphView<'a> {
    nodes: Vec<&'a Node>,
    edges: Vec<Edge<'a>>,
}

impl Serialize for Graph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GraphView {
            nodes: self.nodes().collect(),
            edges: self.edges().collect(),
        }
        .serialize(serializer)
    }
}
