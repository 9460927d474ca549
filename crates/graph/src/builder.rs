//! Citation tree expansion
//!
//! Starting from one paper, adds the paper, its citation contexts and its
//! references to the graph, then follows every reference that is cited from
//! at least two contexts, one hop deeper, until `max_depth` is reached.
//!
//! Expansion runs off an explicit stack of `(identifier, kind, depth)`
//! frames. Frames are popped in pre-order (children pushed in reverse), so
//! writes land in the same order a recursive expand-then-merge would apply
//! them and last-write-wins attributes come out identical.

use crate::graph::{ContextNode, Graph, Node, NodeId, PaperNode};
use crate::source::DataSource;
use citenet_common::config::GraphConfig;
use citenet_common::errors::{AppError, Result};
use citenet_common::metrics::{self, Timer};
use citenet_common::records::{IdKind, Record};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Counters collected during one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Records fetched from the data source
    pub records_fetched: usize,
    /// Identifiers the data source did not know
    pub missing: usize,
    /// Child expansions scheduled
    pub expansions: usize,
    /// Expansions skipped by memoization
    pub expansions_skipped: usize,
}

#[derive(Debug)]
struct Frame {
    identifier: String,
    kind: IdKind,
    depth: u32,
}

/// Builds citation networks from a data source
pub struct GraphBuilder {
    source: Arc<dyn DataSource>,
    config: GraphConfig,
}

impl GraphBuilder {
    pub fn new(source: Arc<dyn DataSource>, config: GraphConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Build from depth 0 down to the configured `max_depth`
    pub async fn build(&self, identifier: &str, kind: IdKind) -> Result<Graph> {
        self.build_tree(identifier, kind, 0, self.config.max_depth).await
    }

    /// Expand `identifier` into a citation network
    ///
    /// An identifier unknown to the data source yields an empty graph.
    pub async fn build_tree(
        &self,
        identifier: &str,
        kind: IdKind,
        depth: u32,
        max_depth: u32,
    ) -> Result<Graph> {
        let (graph, _) = self
            .build_tree_with_stats(identifier, kind, depth, max_depth)
            .await?;
        Ok(graph)
    }

    /// `build_tree`, also reporting how much work it took
    #[instrument(skip(self), fields(memoize = self.config.memoize))]
    pub async fn build_tree_with_stats(
        &self,
        identifier: &str,
        kind: IdKind,
        depth: u32,
        max_depth: u32,
    ) -> Result<(Graph, BuildStats)> {
        if identifier.trim().is_empty() {
            return Err(AppError::InvalidIdentifier {
                identifier: identifier.to_string(),
            });
        }

        let timer = Timer::graph_build();
        let mut graph = Graph::new();
        let mut stats = BuildStats::default();

        // uri -> shallowest depth it was expanded at
        let mut expanded: HashMap<String, u32> = HashMap::new();
        let mut missing: HashSet<(String, IdKind)> = HashSet::new();

        let mut stack = vec![Frame {
            identifier: identifier.to_string(),
            kind,
            depth,
        }];

        while let Some(frame) = stack.pop() {
            if self.config.memoize && self.already_covered(&frame, &expanded, &missing) {
                stats.expansions_skipped += 1;
                debug!(identifier = %frame.identifier, depth = frame.depth, "Expansion already covered");
                continue;
            }

            if !self.source.exists(&frame.identifier, frame.kind).await? {
                stats.missing += 1;
                debug!(identifier = %frame.identifier, kind = %frame.kind, "Not in database");
                if self.config.memoize {
                    missing.insert((frame.identifier, frame.kind));
                }
                continue;
            }

            let record = self.source.fetch_record(&frame.identifier, frame.kind).await?;
            stats.records_fetched += 1;
            metrics::record_graph_fetch();

            if self.config.memoize {
                let seen = expanded.entry(record.uri.clone()).or_insert(frame.depth);
                *seen = (*seen).min(frame.depth);
            }

            if !add_record(&mut graph, &record) {
                continue;
            }

            if frame.depth < max_depth {
                let children: Vec<Frame> = record
                    .multiply_cited()
                    .map(|reference| Frame {
                        identifier: reference.uri.clone(),
                        kind: IdKind::Uri,
                        depth: frame.depth + 1,
                    })
                    .collect();

                stats.expansions += children.len();
                stack.extend(children.into_iter().rev());
            }
        }

        let elapsed = timer.finish();
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            records_fetched = stats.records_fetched,
            expansions_skipped = stats.expansions_skipped,
            elapsed_secs = elapsed,
            "Citation tree built"
        );

        Ok((graph, stats))
    }

    fn already_covered(
        &self,
        frame: &Frame,
        expanded: &HashMap<String, u32>,
        missing: &HashSet<(String, IdKind)>,
    ) -> bool {
        if missing.contains(&(frame.identifier.clone(), frame.kind)) {
            return true;
        }
        frame.kind == IdKind::Uri
            && expanded
                .get(&frame.identifier)
                .is_some_and(|&depth| depth <= frame.depth)
    }
}

/// Write one record's paper, contexts and references into `graph`
///
/// Returns `false` when the record has no citation groups, in which case
/// only the paper itself is added and nothing below it is expanded.
fn add_record(graph: &mut Graph, record: &Record) -> bool {
    let root = NodeId::paper(&record.uri);
    graph.add_node(Node::Paper(PaperNode {
        uri: record.uri.clone(),
        title: record.title_label(),
    }));

    let Some(groups) = &record.citation_groups else {
        return false;
    };

    for group in groups {
        graph.add_node(Node::Context(ContextNode {
            parent_uri: record.uri.clone(),
            group_id: group.id.clone(),
            text_before: group.context.text_before.clone(),
            text_after: group.context.text_after.clone(),
        }));
        graph.add_edge(
            root.clone(),
            NodeId::context(&record.uri, &group.id),
            Some(group.id.clone()),
        );
    }

    for reference in &record.references {
        graph.add_node(Node::Paper(PaperNode {
            uri: reference.uri.clone(),
            title: reference.title_label(),
        }));
        for group_id in &reference.citation_groups {
            let context = NodeId::context(&record.uri, group_id);
            if !graph.contains_node(&context) {
                debug!(
                    paper = %record.uri,
                    reference = %reference.uri,
                    group = %group_id,
                    "Reference cites an undeclared citation group"
                );
                graph.add_node(Node::Context(ContextNode {
                    parent_uri: record.uri.clone(),
                    group_id: group_id.clone(),
                    text_before: String::new(),
                    text_after: String::new(),
                }));
            }
            graph.add_edge(context, NodeId::paper(&reference.uri), None);
        }
    }

    true
}
