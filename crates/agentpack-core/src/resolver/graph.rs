//! Stable topological ordering with cycle recovery
//!
//! Kahn's algorithm over a `petgraph` DiGraph, always releasing the ready
//! node that appeared first in the input. When no node is ready but some
//! remain, the graph has a cycle: the first eligible member of a cyclic
//! strongly connected component is released anyway and a warning names it.
//! The returned order always covers every distinct input node.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use tracing::warn;

/// Non-fatal findings from ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolverWarning {
    /// A cycle was broken by releasing `node` early
    Cycle {
        /// Node released ahead of its predecessors
        node: String,
        /// Every member of the cyclic component
        members: Vec<String>,
    },

    /// A precedence edge names a node that is not in the node set
    UnknownNode {
        /// Edge source
        from: String,
        /// Edge target
        to: String,
        /// Whichever endpoint is unknown
        missing: String,
    },

    /// A node name appeared more than once; later copies were ignored
    DuplicateNode {
        /// The repeated name
        node: String,
    },
}

impl fmt::Display for ResolverWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { node, members } => write!(
                f,
                "cycle detected at '{}' (members: {})",
                node,
                members.join(", ")
            ),
            Self::UnknownNode { from, to, missing } => {
                write!(f, "edge {from} -> {to} references unknown node '{missing}'")
            }
            Self::DuplicateNode { node } => write!(f, "duplicate node '{node}' ignored"),
        }
    }
}

/// Ordering plus every warning raised while computing it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Every distinct input node, edges respected where possible
    pub order: Vec<String>,
    /// Findings raised while ordering
    pub warnings: Vec<ResolverWarning>,
}

impl Resolution {
    /// Whether any cycle had to be broken
    pub fn has_cycle(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ResolverWarning::Cycle { .. }))
    }
}

/// Order `nodes` so that for every edge `(a, b)`, `a` precedes `b`
///
/// Unconstrained nodes keep their input order. Never fails: cycles and
/// dangling edges become warnings.
pub fn topological_order<S: AsRef<str>>(nodes: &[S], edges: &[(S, S)]) -> Resolution {
    let mut warnings = Vec::new();
    let mut graph: DiGraph<String, ()> = DiGraph::with_capacity(nodes.len(), edges.len());
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());

    for node in nodes {
        let name = node.as_ref();
        if index.contains_key(name) {
            warnings.push(ResolverWarning::DuplicateNode {
                node: name.to_string(),
            });
            continue;
        }
        index.insert(name, graph.add_node(name.to_string()));
    }

    for (from, to) in edges {
        let (from, to) = (from.as_ref(), to.as_ref());
        match (index.get(from), index.get(to)) {
            (Some(&a), Some(_)) if from == to => {
                // A self-loop can never be satisfied; report it and drop it.
                let warning = ResolverWarning::Cycle {
                    node: graph[a].clone(),
                    members: vec![graph[a].clone()],
                };
                if !warnings.contains(&warning) {
                    warn!(%warning, "dependency cycle");
                    warnings.push(warning);
                }
            }
            (Some(&a), Some(&b)) => {
                graph.add_edge(a, b, ());
            }
            (a, _) => warnings.push(ResolverWarning::UnknownNode {
                from: from.to_string(),
                to: to.to_string(),
                missing: if a.is_none() { from } else { to }.to_string(),
            }),
        }
    }

    // Component id per node; self-loops were dropped above, so a component
    // is cyclic exactly when it has several members.
    let components = tarjan_scc(&graph);
    let mut component_of = vec![0usize; graph.node_count()];
    for (id, members) in components.iter().enumerate() {
        for node in members {
            component_of[node.index()] = id;
        }
    }
    let cyclic = |node: NodeIndex| components[component_of[node.index()]].len() > 1;

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.edges_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();
    let mut emitted = vec![false; graph.node_count()];
    let mut warned = vec![false; components.len()];
    let mut order = Vec::with_capacity(graph.node_count());

    while order.len() < graph.node_count() {
        let Some(Reverse(next)) = ready.pop() else {
            let forced = break_cycle(&graph, &emitted, &component_of, &cyclic);
            let component = component_of[forced.index()];
            if !warned[component] {
                warned[component] = true;
                let mut members = components[component].clone();
                members.sort();
                let warning = ResolverWarning::Cycle {
                    node: graph[forced].clone(),
                    members: members.iter().map(|&m| graph[m].clone()).collect(),
                };
                warn!(%warning, "dependency cycle");
                warnings.push(warning);
            }
            in_degree[forced.index()] = 0;
            ready.push(Reverse(forced.index()));
            continue;
        };

        if emitted[next] {
            continue;
        }
        emitted[next] = true;
        let node = NodeIndex::new(next);
        order.push(graph[node].clone());

        for edge in graph.edges_directed(node, Direction::Outgoing) {
            let target = edge.target().index();
            if emitted[target] {
                continue;
            }
            in_degree[target] = in_degree[target].saturating_sub(1);
            if in_degree[target] == 0 {
                ready.push(Reverse(target));
            }
        }
    }

    Resolution { order, warnings }
}

/// First remaining cyclic node whose outside-component predecessors are done
fn break_cycle(
    graph: &DiGraph<String, ()>,
    emitted: &[bool],
    component_of: &[usize],
    cyclic: &dyn Fn(NodeIndex) -> bool,
) -> NodeIndex {
    let remaining = graph.node_indices().filter(|n| !emitted[n.index()]);
    let mut fallback = None;
    for node in remaining {
        fallback.get_or_insert(node);
        if !cyclic(node) {
            continue;
        }
        let unblocked = graph
            .neighbors_directed(node, Direction::Incoming)
            .all(|pred| emitted[pred.index()] || component_of[pred.index()] == component_of[node.index()]);
        if unblocked {
            return node;
        }
    }
    // Unreachable for a well-formed condensation, but never stall.
    fallback.unwrap_or_else(|| NodeIndex::new(0))
}
